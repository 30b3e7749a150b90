//! Optional zstd compression with magic-number detection on import.

use idman_core::errors::{IdmanResult, StorageError};

/// Leading bytes of every zstd frame.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const LEVEL: i32 = 3;

/// Whether a payload looks like a zstd frame.
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

pub fn compress(data: &[u8]) -> IdmanResult<Vec<u8>> {
    zstd::encode_all(data, LEVEL).map_err(|e| {
        StorageError::Serialization {
            reason: format!("zstd compression failed: {e}"),
        }
        .into()
    })
}

pub fn decompress(data: &[u8]) -> IdmanResult<Vec<u8>> {
    zstd::decode_all(data).map_err(|e| {
        StorageError::Serialization {
            reason: format!("zstd decompression failed: {e}"),
        }
        .into()
    })
}

/// Decompress when the payload carries the zstd magic, else pass it
/// through unchanged.
pub fn decompress_if_needed(data: Vec<u8>) -> IdmanResult<Vec<u8>> {
    if is_compressed(&data) {
        decompress(&data)
    } else {
        Ok(data)
    }
}
