//! Content fingerprinting for upload change detection.
//!
//! A fingerprint is a SHA-256 digest over a file's length and byte content.
//! Byte-identical content always produces the same hex string; any content
//! change produces a different one. Pure function of local bytes — no remote
//! dependency.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Fingerprint a file on disk.
///
/// An unreadable or missing file is an error scoped to that file; callers
/// report it per-file and keep the batch going.
pub fn fingerprint_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(fingerprint_bytes(&bytes))
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
