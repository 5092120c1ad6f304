//! sha256 helpers for records, outputs and canonical payloads.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::{ErrorInfo, ProvError};
use crate::serde::to_canonical_json_bytes;

/// Hex encoded sha256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Computes a stable hexadecimal hash for the provided serializable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, ProvError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(sha256_hex(&bytes))
}

/// Streams a file through sha256, returning the hex digest and byte count.
pub fn hash_file(path: &Path) -> Result<(String, u64), ProvError> {
    let file = File::open(path).map_err(|err| io_error(path, err))?;
    hash_reader(file).map_err(|err| io_error(path, err))
}

fn hash_reader<R: Read>(mut reader: R) -> io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        total += read as u64;
    }
    Ok((hex::encode(hasher.finalize()), total))
}

fn io_error(path: &Path, err: io::Error) -> ProvError {
    ProvError::Store(
        ErrorInfo::new("hash_read", err.to_string()).with_context("path", path.display().to_string()),
    )
}
