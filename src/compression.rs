//! Transparent compression for exported payloads.
//!
//! Uses zstd with magic-bytes detection so legacy uncompressed payloads
//! decode through the same path. Config exports record compression stats
//! (`original_size`, `compressed_size`, `compression_ratio`) alongside the
//! blob; consumers must check the export's `compressed` flag before
//! attempting decompression.

use serde_json::Value;

/// Zstd magic bytes (little-endian): 0xFD2FB528
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Default compression level (3 is a good balance of speed/ratio)
const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Compression error types
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// Failed to compress data
    #[error("compression failed: {0}")]
    CompressFailed(String),

    /// Failed to decompress data
    #[error("decompression failed: {0}")]
    DecompressFailed(String),

    /// Failed to parse JSON
    #[error("JSON parse failed: {0}")]
    JsonParseFailed(#[from] serde_json::Error),
}

/// Check if data is zstd-compressed by checking magic bytes.
#[inline]
#[must_use]
pub fn is_compressed(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == ZSTD_MAGIC
}

/// Compress a JSON value to zstd bytes.
pub fn compress(value: &Value) -> Result<Vec<u8>, CompressionError> {
    let json_bytes = serde_json::to_vec(value)?;

    zstd::encode_all(json_bytes.as_slice(), DEFAULT_COMPRESSION_LEVEL)
        .map_err(|e| CompressionError::CompressFailed(e.to_string()))
}

/// Decompress data to a JSON value.
///
/// Automatically detects whether data is compressed via magic bytes;
/// uncompressed JSON is parsed directly for backwards compatibility.
pub fn decompress(data: &[u8]) -> Result<Value, CompressionError> {
    if is_compressed(data) {
        let decompressed = zstd::decode_all(data)
            .map_err(|e| CompressionError::DecompressFailed(e.to_string()))?;

        serde_json::from_slice(&decompressed).map_err(CompressionError::from)
    } else {
        // Plain JSON (legacy data)
        serde_json::from_slice(data).map_err(CompressionError::from)
    }
}

/// Compression statistics for a single operation.
#[derive(Debug, Clone, Copy)]
pub struct CompressionStats {
    /// Original size in bytes
    pub original_bytes: usize,
    /// Compressed size in bytes
    pub compressed_bytes: usize,
    /// Compression ratio (original / compressed)
    pub ratio: f64,
    /// Space saved as percentage (0.0 - 1.0)
    pub savings: f64,
}

impl CompressionStats {
    /// Calculate stats from original and compressed sizes.
    #[must_use]
    pub fn new(original_bytes: usize, compressed_bytes: usize) -> Self {
        let ratio = if compressed_bytes > 0 {
            original_bytes as f64 / compressed_bytes as f64
        } else {
            0.0
        };
        let savings = if original_bytes > 0 {
            1.0 - (compressed_bytes as f64 / original_bytes as f64)
        } else {
            0.0
        };
        Self {
            original_bytes,
            compressed_bytes,
            ratio,
            savings,
        }
    }
}

/// Compress and return stats.
pub fn compress_with_stats(value: &Value) -> Result<(Vec<u8>, CompressionStats), CompressionError> {
    let json_bytes = serde_json::to_vec(value)?;
    let original_size = json_bytes.len();

    let compressed = zstd::encode_all(json_bytes.as_slice(), DEFAULT_COMPRESSION_LEVEL)
        .map_err(|e| CompressionError::CompressFailed(e.to_string()))?;

    let stats = CompressionStats::new(original_size, compressed.len());
    Ok((compressed, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_compress_decompress_roundtrip() {
        let data = json!({
            "version": "1.3.0",
            "user_id": "user-1",
            "view_configurations": {
                "morning": {"categories": [{"id": "symptoms", "items": ["sleep_quality"]}]}
            }
        });

        let compressed = compress(&data).unwrap();
        let decompressed = decompress(&compressed).unwrap();

        assert_eq!(data, decompressed);
    }

    #[test]
    fn test_is_compressed_detection() {
        let data = json!({"test": "data"});
        let compressed = compress(&data).unwrap();

        assert!(is_compressed(&compressed));
        assert!(!is_compressed(b"{\"test\": \"data\"}"));
        assert!(!is_compressed(b""));
        assert!(!is_compressed(b"abc"));
    }

    #[test]
    fn test_decompress_plain_json() {
        // Simulate legacy uncompressed data
        let plain_json = b"{\"legacy\": true, \"value\": 123}";
        let result = decompress(plain_json).unwrap();

        assert_eq!(result["legacy"], true);
        assert_eq!(result["value"], 123);
    }

    #[test]
    fn test_decompress_garbage_fails() {
        let garbage = b"\x28\xB5\x2F\xFDnot actually zstd";
        assert!(matches!(
            decompress(garbage),
            Err(CompressionError::DecompressFailed(_))
        ));
    }

    #[test]
    fn test_compression_stats() {
        let data = json!({"key": "value".repeat(100)});
        let (_, stats) = compress_with_stats(&data).unwrap();

        assert!(stats.original_bytes > 0);
        assert!(stats.compressed_bytes > 0);
        assert!(stats.ratio > 1.0); // Should compress
        assert!(stats.savings > 0.0);
        assert!(stats.savings < 1.0);
    }

    #[test]
    fn test_repetitive_config_compresses_well() {
        // Per-view configuration blocks are highly repetitive.
        let views = json!({
            "view_configurations": (0..20).map(|i| {
                json!({
                    "id": format!("category_{}", i),
                    "label": "Symptoms",
                    "items": ["sleep_quality", "energy_level", "mood"],
                    "visible": true,
                    "collapsed": false
                })
            }).collect::<Vec<_>>()
        });

        let (_, stats) = compress_with_stats(&views).unwrap();
        assert!(stats.savings > 0.5, "expected >50% savings, got {:.1}%", stats.savings * 100.0);
    }
}
