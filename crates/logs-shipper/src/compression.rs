// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use flate2::write::GzEncoder;
use std::io::Write;
use std::str::FromStr;

const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Codec applied to the serialized batch when compression is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionCodec {
    #[default]
    Gzip,
    Zstd,
}

impl CompressionCodec {
    /// Value sent in the `Content-Encoding` header.
    #[must_use]
    pub fn content_encoding(self) -> &'static str {
        match self {
            CompressionCodec::Gzip => "gzip",
            CompressionCodec::Zstd => "zstd",
        }
    }

    /// Compresses `data`. `level` falls back to the codec default when unset
    /// and is clamped to the codec's valid range.
    pub fn encode(self, data: &[u8], level: Option<i32>) -> std::io::Result<Vec<u8>> {
        match self {
            CompressionCodec::Gzip => {
                let level = level.map_or_else(flate2::Compression::default, |l| {
                    flate2::Compression::new(l.clamp(0, 9).unsigned_abs())
                });
                let mut encoder = GzEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()
            }
            CompressionCodec::Zstd => {
                let level = level.unwrap_or(DEFAULT_ZSTD_LEVEL).clamp(1, 22);
                zstd::stream::encode_all(data, level)
            }
        }
    }
}

impl FromStr for CompressionCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gzip" => Ok(CompressionCodec::Gzip),
            "zstd" => Ok(CompressionCodec::Zstd),
            other => Err(format!("unknown compression codec '{other}'")),
        }
    }
}
