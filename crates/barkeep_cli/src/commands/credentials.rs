//! Credential file encoding commands.

use crate::error::CliResult;
use barkeep_sync_engine::{decode_file, encode_file};
use std::path::Path;

/// Encodes a plain JSON credentials file for deployment.
pub fn encode(input: &Path, output: &Path) -> CliResult<()> {
    encode_file(input, output)?;
    println!("Encoded {} -> {}", input.display(), output.display());
    Ok(())
}

/// Decodes an encoded credentials file back to JSON.
pub fn decode(input: &Path, output: &Path) -> CliResult<()> {
    decode_file(input, output)?;
    println!("Decoded {} -> {}", input.display(), output.display());
    Ok(())
}
