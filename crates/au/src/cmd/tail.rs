//! Tail command - follow a growing au file
//!
//! Resyncs to a record boundary near the end of the file and emits each new
//! value record as a JSON line, sleeping and retrying at end of data.
//!
//! # Usage
//!
//! ```bash
//! au tail events.au                 # follow from the current end
//! au tail -b 65536 events.au       # re-emit the trailing 64K first
//! ```

use std::io::{self, BufWriter, Write};

use anyhow::{bail, Context, Result};
use clap::Args;

use au_format::{follow, open_input, Dictionary, FollowOptions, SourceConfig};

/// Tail command arguments
#[derive(Args, Debug)]
pub struct TailArgs {
    /// Emit up to this many bytes of existing records before following
    #[arg(short = 'b', long = "lookback", value_name = "BYTES", default_value_t = 0)]
    lookback: u64,

    /// File to follow
    #[arg(value_name = "FILE")]
    file: String,
}

/// Run the tail command
pub fn run(args: TailArgs) -> Result<()> {
    if args.file == "-" {
        bail!("tail requires a seekable file, not stdin");
    }

    let mut source = open_input(&args.file, SourceConfig::waiting())
        .with_context(|| format!("failed to open {}", args.file))?;
    let mut dictionary = Dictionary::new();

    let stdout = io::stdout().lock();
    let mut out = BufWriter::new(stdout);

    follow(
        &mut source,
        &mut dictionary,
        &mut out,
        FollowOptions {
            lookback: args.lookback,
        },
    )
    .with_context(|| format!("failed while following {}", args.file))?;

    out.flush()?;
    Ok(())
}
