//! Archive-tier codec
//!
//! Packed payloads start with a one-byte format code followed by the
//! codec output, so an archive written under one `bundle_format` still
//! unpacks after the configuration changes.
//!
//! ```
//! use tierserve::storage::codec::{pack, unpack, Format};
//!
//! let data = b"the same line again, the same line again, the same line again";
//! let packed = pack(Format::Lz4, data).unwrap();
//! assert_eq!(unpack(&packed).unwrap(), data);
//! ```

use serde::Deserialize;

use crate::error::{Error, Result};

/// Codec selected by `storage.bundle_format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// No compression
    Stored,
    /// LZ4, fast mode
    #[default]
    Lz4,
    /// LZ4, high-compression mode
    Lz4hc,
}

impl Format {
    pub fn code(&self) -> u8 {
        match self {
            Format::Stored => 0,
            Format::Lz4 => 1,
            Format::Lz4hc => 2,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Format::Stored),
            1 => Ok(Format::Lz4),
            2 => Ok(Format::Lz4hc),
            other => Err(Error::UnknownFormat(other)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Stored => "stored",
            Format::Lz4 => "lz4",
            Format::Lz4hc => "lz4hc",
        }
    }

    fn compressor(&self) -> &'static dyn Compressor {
        match self {
            Format::Stored => &StoredCompressor,
            Format::Lz4 => &Lz4Compressor { high: false },
            Format::Lz4hc => &Lz4Compressor { high: true },
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

trait Compressor: Send + Sync {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

struct StoredCompressor;

impl Compressor for StoredCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

struct Lz4Compressor {
    high: bool,
}

impl Compressor for Lz4Compressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mode = if self.high {
            lz4::block::CompressionMode::HIGHCOMPRESSION(9)
        } else {
            lz4::block::CompressionMode::DEFAULT
        };
        lz4::block::compress(data, Some(mode), true).map_err(|e| Error::CompressionFailed {
            format: "lz4".into(),
            reason: e.to_string(),
        })
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4::block::decompress(data, None).map_err(|e| Error::DecompressionFailed {
            format: "lz4".into(),
            reason: e.to_string(),
        })
    }
}

/// Compresses `data` with `format` and prepends the format code.
pub fn pack(format: Format, data: &[u8]) -> Result<Vec<u8>> {
    let body = format.compressor().compress(data)?;
    let mut packed = Vec::with_capacity(body.len() + 1);
    packed.push(format.code());
    packed.extend_from_slice(&body);
    Ok(packed)
}

/// Reverses [`pack`], reading the codec from the header byte.
pub fn unpack(packed: &[u8]) -> Result<Vec<u8>> {
    let (&code, body) = packed.split_first().ok_or_else(|| Error::DecompressionFailed {
        format: "unknown".into(),
        reason: "empty archive".into(),
    })?;
    Format::from_code(code)?.compressor().decompress(body)
}
