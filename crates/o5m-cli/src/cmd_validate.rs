/// Implementation of `o5m validate`.
///
/// Attempts a full decode and prints a set of success checkmarks, or the
/// diagnostic error of the first structural problem. Exit code 1 on any
/// failure.
use std::fs::File;

use anyhow::{Context, Result};
use o5m_decoder::{create_reader, ReaderOptions};

use crate::ValidateArgs;

/// Run the `o5m validate` command.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or any dataset fails
/// to decode.
pub fn run(args: &ValidateArgs) -> Result<()> {
    let file = File::open(&args.file)
        .with_context(|| format!("cannot open {}", args.file.display()))?;

    let mut reader = create_reader("o5m", Box::new(file), ReaderOptions::default())
        .with_context(|| format!("cannot start decoding {}", args.file.display()))?;

    reader
        .header()
        .with_context(|| format!("invalid header in {}", args.file.display()))?;
    println!("  ok  header (magic, variant, version)");

    let mut records = 0u64;
    let mut buffers = 0u64;
    while let Some(buffer) = reader.next_buffer() {
        buffers += 1;
        records += buffer.iter().count() as u64;
    }
    reader
        .finish()
        .with_context(|| format!("invalid dataset in {}", args.file.display()))?;

    println!("  ok  {records} records in {buffers} buffers");
    println!("  ok  stream ended at a dataset boundary");
    println!("{}: valid", args.file.display());
    Ok(())
}
