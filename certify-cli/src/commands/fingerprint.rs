//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::Result;
use tracing::info;

use crate::utils::fingerprint_file;

/// Execute the fingerprint command.
///
/// Output follows `sha256sum`: `<hash>  <path>`, or just the hash with `--quiet`.
pub fn execute(file: PathBuf, quiet: bool) -> Result<()> {
    let hash = fingerprint_file(&file)?;
    info!(path = %file.display(), hash = %hash, "Computed fingerprint");

    if quiet {
        println!("{hash}");
    } else {
        println!("{}  {}", hash, file.display());
    }
    Ok(())
}
