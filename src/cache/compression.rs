use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression as FlateCompression;

use crate::domain::CacheFormat;
use crate::error::{DomainError, DomainResult};

/// Packs and unpacks frame bodies according to the channel format
#[derive(Debug, Clone, Copy)]
pub struct Compressor {
    format: CacheFormat,
}

impl Compressor {
    pub fn for_format(format: CacheFormat) -> Self {
        Self { format }
    }

    pub fn compress(&self, data: &[u8]) -> DomainResult<Vec<u8>> {
        match self.format {
            CacheFormat::Raw => Ok(data.to_vec()),
            CacheFormat::Packed => {
                let mut encoder = GzEncoder::new(Vec::new(), FlateCompression::fast());
                encoder.write_all(data).map_err(|e| {
                    DomainError::Compression(format!("Gzip compression failed: {}", e))
                })?;
                encoder.finish().map_err(|e| {
                    DomainError::Compression(format!("Gzip finalization failed: {}", e))
                })
            }
        }
    }

    pub fn decompress(&self, data: &[u8]) -> DomainResult<Vec<u8>> {
        match self.format {
            CacheFormat::Raw => Ok(data.to_vec()),
            CacheFormat::Packed => {
                let mut decoder = GzDecoder::new(data);
                let mut out = Vec::new();
                decoder.read_to_end(&mut out).map_err(|e| {
                    DomainError::Compression(format!("Gzip decompression failed: {}", e))
                })?;
                Ok(out)
            }
        }
    }
}
