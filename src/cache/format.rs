//! Frame file container
//!
//! Every cache file is a small bincode header followed by the body. The body is
//! the bincode payload, gzip-packed for `CacheFormat::Packed`. The checksum
//! covers the body as stored.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::compression::Compressor;
use crate::constants::cache::{FRAME_FORMAT_VERSION, FRAME_MAGIC};
use crate::domain::CacheFormat;
use crate::error::{corrupted_data, DomainError, DomainResult};

#[derive(Debug, Serialize, Deserialize)]
struct FrameHeader {
    magic: [u8; 4],
    version: u32,
    packed: bool,
    checksum: u32,
}

fn checksum(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Serialize `value` into a complete frame file
pub fn encode<T: Serialize>(value: &T, format: CacheFormat) -> DomainResult<Vec<u8>> {
    let payload = bincode::serialize(value)?;
    let body = Compressor::for_format(format).compress(&payload)?;

    let header = FrameHeader {
        magic: FRAME_MAGIC,
        version: FRAME_FORMAT_VERSION,
        packed: format == CacheFormat::Packed,
        checksum: checksum(&body),
    };
    let mut out = bincode::serialize(&header)?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Validate and deserialize a frame file written by `encode`
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> DomainResult<T> {
    let header: FrameHeader = bincode::deserialize(data)
        .map_err(|e| corrupted_data(format!("Unreadable frame header: {}", e)))?;

    if header.magic != FRAME_MAGIC {
        return Err(corrupted_data("Invalid frame magic"));
    }
    if header.version != FRAME_FORMAT_VERSION {
        return Err(DomainError::VersionMismatch {
            expected: FRAME_FORMAT_VERSION.to_string(),
            found: header.version.to_string(),
        });
    }

    let header_size = bincode::serialized_size(&header)? as usize;
    if data.len() < header_size {
        return Err(corrupted_data("Data smaller than header size"));
    }
    let body = &data[header_size..];
    if checksum(body) != header.checksum {
        return Err(corrupted_data("Checksum mismatch"));
    }

    let format = if header.packed {
        CacheFormat::Packed
    } else {
        CacheFormat::Raw
    };
    let payload = Compressor::for_format(format).decompress(body)?;
    Ok(bincode::deserialize(&payload)?)
}
