//! Zstd and LZ4 compression stage of the codec pipeline
//!
//! Compressed output starts with `COMPRESSED_MARKER` and one algorithm byte
//! so decoding can tell compressed snapshots from raw JSON documents.

use serde::{Deserialize, Serialize};

use crate::error::{ExchangeError, ExchangeResult};

/// Marks bytes as a compressed frame
pub const COMPRESSED_MARKER: &[u8] = b"MCLZ";

const TAG_ZSTD: u8 = 1;
const TAG_LZ4: u8 = 2;

/// Compression algorithm selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase", tag = "algorithm")]
pub enum Compression {
    /// Write the document as plain JSON
    #[default]
    None,
    /// Zstandard, best ratio for text-heavy translation data
    Zstd {
        /// Compression level (1=fastest, 19=best ratio, 3=balanced default)
        level: i32,
    },
    /// LZ4 block with prepended size, fastest
    Lz4,
}

impl Compression {
    /// Zstd at the balanced default level
    pub fn zstd() -> Self {
        Self::Zstd { level: 3 }
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Check whether bytes carry the compression marker
pub fn is_compressed(bytes: &[u8]) -> bool {
    bytes.len() > COMPRESSED_MARKER.len() && bytes.starts_with(COMPRESSED_MARKER)
}

/// Compress data, prefixing the marker and algorithm tag
pub fn compress(data: &[u8], algo: Compression) -> ExchangeResult<Vec<u8>> {
    let (tag, body) = match algo {
        Compression::None => return Ok(data.to_vec()),
        Compression::Zstd { level } => (
            TAG_ZSTD,
            zstd::encode_all(data, level)
                .map_err(|e| ExchangeError::Io(format!("Zstd compression failed: {}", e)))?,
        ),
        Compression::Lz4 => (TAG_LZ4, lz4_flex::compress_prepend_size(data)),
    };

    let mut out = Vec::with_capacity(COMPRESSED_MARKER.len() + 1 + body.len());
    out.extend_from_slice(COMPRESSED_MARKER);
    out.push(tag);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decompress marked data; unmarked data is returned unchanged
pub fn decompress(data: &[u8]) -> ExchangeResult<Vec<u8>> {
    if !is_compressed(data) {
        return Ok(data.to_vec());
    }

    let tag = data[COMPRESSED_MARKER.len()];
    let body = &data[COMPRESSED_MARKER.len() + 1..];

    match tag {
        TAG_ZSTD => zstd::decode_all(body)
            .map_err(|e| ExchangeError::malformed(format!("Zstd stream is corrupt: {}", e))),
        TAG_LZ4 => lz4_flex::decompress_size_prepended(body)
            .map_err(|e| ExchangeError::malformed(format!("LZ4 stream is corrupt: {}", e))),
        other => Err(ExchangeError::malformed(format!(
            "Unknown compression algorithm tag {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        br#"{"translations":[{"id":"t1","key":"item.minecraft.stick","value":"Stick"}]}"#
            .repeat(40)
    }

    #[test]
    fn test_roundtrip_each_algorithm() {
        let data = sample();
        for algo in [Compression::None, Compression::zstd(), Compression::Lz4] {
            let c = compress(&data, algo).unwrap();
            assert_eq!(is_compressed(&c), algo.is_enabled());
            assert_eq!(decompress(&c).unwrap(), data);
        }
    }

    #[test]
    fn test_compression_shrinks_repetitive_text() {
        let data = sample();
        let c = compress(&data, Compression::zstd()).unwrap();
        assert!(c.len() < data.len() / 4);
    }

    #[test]
    fn test_raw_json_passes_through() {
        let raw = br#"{"format_version":"1.0.0"}"#;
        assert_eq!(decompress(raw).unwrap(), raw.to_vec());
    }

    #[test]
    fn test_empty_roundtrips() {
        for algo in [Compression::zstd(), Compression::Lz4] {
            let c = compress(&[], algo).unwrap();
            assert!(decompress(&c).unwrap().is_empty());
        }
    }

    #[test]
    fn test_unknown_tag_is_malformed() {
        let mut bytes = COMPRESSED_MARKER.to_vec();
        bytes.push(9);
        bytes.extend_from_slice(b"xx");
        assert!(matches!(
            decompress(&bytes),
            Err(ExchangeError::MalformedDocument(_))
        ));
    }

    #[test]
    fn test_truncated_stream_is_malformed() {
        let c = compress(&sample(), Compression::Lz4).unwrap();
        let truncated = &c[..c.len() / 2];
        assert!(decompress(truncated).is_err());
    }
}
