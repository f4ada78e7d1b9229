// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Compression algorithm used for large value arrays
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[allow(clippy::module_name_repetitions)]
pub enum CompressionType {
    /// No compression
    #[default]
    None,

    /// LZ4 compression
    ///
    /// Recommended for use cases with a focus
    /// on speed over compression ratio.
    Lz4,
}

impl std::fmt::Display for CompressionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::None => "no compression",
                Self::Lz4 => "lz4",
            }
        )
    }
}

/// Compresses a byte stream, prepending the uncompressed size.
#[must_use]
pub fn compress(bytes: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(bytes)
}

/// Inverse of [`compress`].
pub fn decompress(bytes: &[u8]) -> Result<Vec<u8>, crate::coding::DecodeError> {
    lz4_flex::decompress_size_prepended(bytes).map_err(|_| crate::coding::DecodeError::Decompress)
}
