//! SHA-256 helpers
//!
//! Used for the optional `distributionSha256Sum` check and for the identity
//! segment of cache directories.

use crate::core::error::InstallError;
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Chunk size for reading files during hashing (1MB)
const CHUNK_SIZE: usize = 1024 * 1024;

/// Hex SHA-256 of an in-memory string.
pub fn sha256_hex(data: &str) -> String {
    hex::encode(Sha256::digest(data.as_bytes()))
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(file: &Path) -> Result<String, InstallError> {
    let mut f = std::fs::File::open(file).map_err(InstallError::io("cannot open", file))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let n = f
            .read(&mut buffer)
            .map_err(InstallError::io("cannot read", file))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file's SHA-256 against an expected hex digest (case-insensitive).
pub fn verify_sha256(file: &Path, expected: &str) -> Result<(), InstallError> {
    let expected = expected.trim().to_lowercase();
    let actual = sha256_file(file)?;
    if actual != expected {
        return Err(InstallError::ChecksumMismatch {
            archive: file.to_path_buf(),
            expected,
            actual,
        });
    }
    Ok(())
}
