//! MD5 verification for downloaded asset files.
//!
//! The catalog publishes an MD5 hex digest for every archive and texture.
//! Preview images carry no digest, so an absent digest verifies trivially.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read buffer size for streaming hashes
const CHUNK_SIZE: usize = 64 * 1024;

/// Compute the MD5 of a file as lowercase hex.
///
/// Streams the file in fixed-size chunks, memory use does not grow with file size.
pub fn compute_md5(path: &Path) -> Result<String> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file for hashing: {}", path.display()))?;

    let mut reader = BufReader::with_capacity(CHUNK_SIZE, file);
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut context = md5::Context::new();

    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .with_context(|| format!("Failed to read file for hashing: {}", path.display()))?;
        if bytes_read == 0 {
            break;
        }
        context.consume(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", context.compute()))
}

/// Check a file against an expected MD5 digest.
///
/// - No digest (or an empty one): always true, nothing is claimed.
/// - Missing or unreadable file: false.
/// - Otherwise true iff the hex digests match, ignoring case.
pub fn verify_md5(path: &Path, expected: Option<&str>) -> bool {
    let expected = match expected.map(str::trim) {
        Some(e) if !e.is_empty() => e,
        _ => return true,
    };

    if !path.is_file() {
        return false;
    }

    match compute_md5(path) {
        Ok(actual) => actual.eq_ignore_ascii_case(expected),
        Err(e) => {
            tracing::warn!("Hash check failed for {}: {:#}", path.display(), e);
            false
        }
    }
}
