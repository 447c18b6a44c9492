//! Cat command - decode au files to JSON lines
//!
//! # Usage
//!
//! ```bash
//! au cat file.au                 # decode one file to stdout
//! au cat a.au b.au               # concatenate several
//! au cat - < file.au             # read from stdin
//! ```

use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Args;

use au_format::{open_input, Dictionary, JsonRecordHandler, RecordParser, SourceConfig};

/// Cat command arguments
#[derive(Args, Debug)]
pub struct CatArgs {
    /// Input files; `-` reads stdin
    #[arg(value_name = "FILE", default_value = "-")]
    files: Vec<String>,
}

/// Run the cat command
///
/// A file that fails to parse is reported and abandoned; remaining files
/// are still decoded.
pub fn run(args: CatArgs) -> Result<()> {
    let stdout = io::stdout().lock();
    let mut out = BufWriter::new(stdout);

    let mut failed = false;
    for file in &args.files {
        if let Err(e) = cat_file(file, &mut out) {
            eprintln!("{file}: {e:#}");
            failed = true;
        }
    }

    out.flush()?;
    anyhow::ensure!(!failed, "one or more files failed to decode");
    Ok(())
}

fn cat_file(file: &str, out: &mut impl Write) -> Result<()> {
    let mut source = open_input(file, SourceConfig::default())
        .with_context(|| format!("failed to open {file}"))?;
    let mut dictionary = Dictionary::new();
    let mut handler = JsonRecordHandler::new(out);
    RecordParser::new(&mut source, &mut dictionary, &mut handler).parse_stream()?;
    Ok(())
}
