//! CRC-32C checksum calculation for cached payload files.
//!
//! Manifests record the Castagnoli CRC of every built file, so cached
//! payloads are hashed the same way before comparison.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::{SyncError, SyncResult};

/// Buffer size for reading files during checksum calculation (64KB).
const BUFFER_SIZE: usize = 64 * 1024;

/// Calculate the CRC-32C of a file's full contents.
///
/// # Errors
///
/// Returns [`SyncError::ReadFailed`] if the file cannot be opened or read.
pub fn checksum_of(path: &Path) -> SyncResult<u32> {
    let mut file = File::open(path).map_err(|e| SyncError::ReadFailed {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut crc = 0u32;
    let mut buffer = vec![0u8; BUFFER_SIZE];

    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| SyncError::ReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if bytes_read == 0 {
            break;
        }

        crc = crc32c::crc32c_append(crc, &buffer[..bytes_read]);
    }

    Ok(crc)
}

/// Calculate the CRC-32C of an in-memory buffer.
pub fn checksum_bytes(data: &[u8]) -> u32 {
    crc32c::crc32c(data)
}
