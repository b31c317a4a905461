// src/commands/verify.rs

//! Verify command - check a local file against a checksum

use anyhow::{bail, Context, Result};
use formulary::hash::{verify_file, Checksum};
use std::path::Path;

pub fn cmd_verify(file: &Path, checksum: &str) -> Result<()> {
    let expected = Checksum::parse(checksum)
        .with_context(|| format!("Invalid checksum: {}", checksum))?;

    let outcome = verify_file(file, &expected)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    match outcome {
        Ok(actual) => {
            println!("[OK] {}: {}", file.display(), actual.to_prefixed_string());
            Ok(())
        }
        Err(mismatch) => {
            println!("[FAILED] {}", file.display());
            bail!("{}", mismatch)
        }
    }
}
