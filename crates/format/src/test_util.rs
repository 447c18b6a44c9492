//! Shared helpers for codec tests

use crate::{
    Dictionary, Encoder, EncoderConfig, JsonRecordHandler, MemSource, RecordParser,
};

/// Encode a stream into memory with the given tuning
pub fn encode_stream<F>(config: EncoderConfig, build: F) -> Vec<u8>
where
    F: FnOnce(&mut Encoder<Vec<u8>>),
{
    let mut encoder =
        Encoder::with_config(Vec::new(), "test stream", config).expect("encoder preamble");
    build(&mut encoder);
    encoder.into_inner().expect("flush")
}

/// Decode a complete stream to JSON lines
pub fn decode_to_json(bytes: &[u8]) -> String {
    let mut source = MemSource::buffered(bytes.to_vec());
    let mut dictionary = Dictionary::new();
    let mut out = Vec::new();
    let mut handler = JsonRecordHandler::new(&mut out);
    RecordParser::new(&mut source, &mut dictionary, &mut handler)
        .parse_stream()
        .expect("parse stream");
    drop(handler);
    String::from_utf8(out).expect("json output is utf-8")
}

/// Build a stream of `n` log-shaped records with a monotonically increasing
/// `logTime` field: `{"logTime": <t>, "level": "info", "seq": <i>}`
///
/// Record `i` gets timestamp `base_nanos + i * step_nanos`.
pub fn log_stream(n: usize, base_nanos: i64, step_nanos: i64) -> Vec<u8> {
    encode_stream(EncoderConfig::default(), |encoder| {
        for i in 0..n {
            encoder
                .encode(|w| {
                    w.start_map();
                    w.key("logTime");
                    w.time(base_nanos + i as i64 * step_nanos);
                    w.key("level");
                    w.string("info", crate::InternHint::Auto);
                    w.key("seq");
                    w.uint(i as u64);
                    w.end_map();
                })
                .expect("encode record");
        }
    })
}
