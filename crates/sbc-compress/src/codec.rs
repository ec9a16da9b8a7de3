// SPDX-License-Identifier: MIT OR Apache-2.0
//! Compressor / decompressor seams and the built-in codecs.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use sbc_error::{ErrorCode, ShimError};
use std::fmt;
use std::io::{Read, Write};

/// Errors produced by a codec while transforming a payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The underlying encoder or decoder failed (e.g. truncated or corrupt
    /// input).
    #[error("codec I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// The requested algorithm is not known.
    #[error("unsupported compression algorithm: {0}")]
    Unsupported(String),
    /// A custom codec rejected the payload.
    #[error("codec failure: {0}")]
    Custom(String),
}

impl CodecError {
    /// Stable error code for this failure.
    pub fn code(&self) -> ErrorCode {
        ErrorCode::CodecFailed
    }
}

impl From<CodecError> for ShimError {
    fn from(err: CodecError) -> Self {
        ShimError::new(err.code(), err.to_string()).with_source(err)
    }
}

/// Turns a fully buffered payload into its compressed form.
///
/// Implementations must be deterministic and free of side effects: the same
/// input always yields bytes that the matching [`Decompressor`] restores.
pub trait Compressor: Send + Sync {
    /// Compress `data`.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Restores a payload produced by the matching [`Compressor`].
pub trait Decompressor: Send + Sync {
    /// Decompress `data`.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;

    /// Decompress `data`, producing at most `limit + 1` bytes.
    ///
    /// A result longer than `limit` means the payload inflates past the
    /// caller's bound; its tail has been discarded. The default buffers the
    /// full output, so streaming codecs should override it.
    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        let mut out = self.decompress(data)?;
        out.truncate(limit.saturating_add(1));
        Ok(out)
    }
}

fn read_bounded(reader: impl Read, limit: usize, hint: usize) -> Result<Vec<u8>, CodecError> {
    let cap = limit.saturating_add(1);
    let mut out = Vec::with_capacity(hint.min(cap));
    reader
        .take(u64::try_from(cap).unwrap_or(u64::MAX))
        .read_to_end(&mut out)?;
    Ok(out)
}

// ── Gzip ─────────────────────────────────────────────────────────────

/// Gzip codec backed by `flate2`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GzipCodec {
    level: u32,
}

impl GzipCodec {
    /// Highest accepted compression level.
    pub const MAX_LEVEL: u32 = 9;

    /// Codec with an explicit level (`0..=9`). Levels above 9 are clamped.
    #[must_use]
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(Self::MAX_LEVEL),
        }
    }

    /// Compression level in use.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self {
            level: Compression::default().level(),
        }
    }
}

impl Compressor for GzipCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(data.len() / 2),
            Compression::new(self.level),
        );
        encoder.write_all(data)?;
        Ok(encoder.finish()?)
    }
}

impl Decompressor for GzipCodec {
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut decoder = GzDecoder::new(data);
        let mut out = Vec::with_capacity(data.len().saturating_mul(2));
        decoder.read_to_end(&mut out)?;
        Ok(out)
    }

    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        read_bounded(GzDecoder::new(data), limit, data.len().saturating_mul(2))
    }
}

// ── Zstd ─────────────────────────────────────────────────────────────

/// Zstandard codec backed by `zstd`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZstdCodec {
    level: i32,
}

impl ZstdCodec {
    /// Accepted compression levels. `0` selects the library default.
    pub const LEVELS: std::ops::RangeInclusive<i32> = 0..=22;

    /// Codec with an explicit level, clamped into [`Self::LEVELS`].
    #[must_use]
    pub fn new(level: i32) -> Self {
        Self {
            level: level.clamp(*Self::LEVELS.start(), *Self::LEVELS.end()),
        }
    }

    /// Compression level in use.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self {
            level: zstd::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl Compressor for ZstdCodec {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(zstd::encode_all(data, self.level)?)
    }
}

impl Decompressor for ZstdCodec {
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        Ok(zstd::decode_all(data)?)
    }

    fn decompress_bounded(&self, data: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
        let decoder = zstd::stream::read::Decoder::new(data)?;
        read_bounded(decoder, limit, data.len().saturating_mul(2))
    }
}

// ── Closures ─────────────────────────────────────────────────────────

/// Adapts a plain function or closure into a [`Compressor`] and
/// [`Decompressor`].
pub struct FnCodec<F> {
    f: F,
}

impl<F> FnCodec<F>
where
    F: Fn(&[u8]) -> Result<Vec<u8>, CodecError> + Send + Sync,
{
    /// Wrap `f`.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> fmt::Debug for FnCodec<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnCodec")
    }
}

impl<F> Compressor for FnCodec<F>
where
    F: Fn(&[u8]) -> Result<Vec<u8>, CodecError> + Send + Sync,
{
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        (self.f)(data)
    }
}

impl<F> Decompressor for FnCodec<F>
where
    F: Fn(&[u8]) -> Result<Vec<u8>, CodecError> + Send + Sync,
{
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        (self.f)(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letters(len: usize) -> Vec<u8> {
        (b'A'..=b'Z').cycle().take(len).collect()
    }

    #[test]
    fn gzip_roundtrip() {
        let codec = GzipCodec::default();
        let data = letters(512);
        let compressed = codec.compress(&data).unwrap();
        assert_ne!(compressed, data);
        assert!(compressed.len() < data.len());
        assert_eq!(codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn gzip_output_has_gzip_magic() {
        let compressed = GzipCodec::default().compress(b"hello").unwrap();
        assert_eq!(&compressed[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn gzip_level_is_clamped() {
        assert_eq!(GzipCodec::new(42).level(), 9);
    }

    #[test]
    fn gzip_rejects_garbage() {
        let err = GzipCodec::default().decompress(b"not gzip at all").unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
        assert_eq!(err.code(), ErrorCode::CodecFailed);
    }

    #[test]
    fn zstd_roundtrip() {
        let codec = ZstdCodec::new(3);
        let data = letters(4096);
        let compressed = codec.compress(&data).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(codec.decompress(&compressed).unwrap(), data);
    }

    #[test]
    fn zstd_level_is_clamped() {
        assert_eq!(ZstdCodec::new(-5).level(), 0);
        assert_eq!(ZstdCodec::new(99).level(), 22);
    }

    #[test]
    fn zstd_cannot_read_gzip() {
        let gz = GzipCodec::default().compress(&letters(300)).unwrap();
        assert!(ZstdCodec::default().decompress(&gz).is_err());
    }

    #[test]
    fn bounded_gzip_stops_past_the_limit() {
        let zeros = vec![0u8; 8 * 1024 * 1024];
        let compressed = GzipCodec::default().compress(&zeros).unwrap();
        let out = GzipCodec::default()
            .decompress_bounded(&compressed, 10)
            .unwrap();
        assert_eq!(out.len(), 11);
    }

    #[test]
    fn bounded_zstd_stops_past_the_limit() {
        let zeros = vec![0u8; 8 * 1024 * 1024];
        let compressed = ZstdCodec::default().compress(&zeros).unwrap();
        let out = ZstdCodec::default()
            .decompress_bounded(&compressed, 10)
            .unwrap();
        assert_eq!(out.len(), 11);
    }

    #[test]
    fn bounded_decompress_within_limit_is_complete() {
        let data = letters(1000);
        let gz = GzipCodec::default();
        let restored = gz
            .decompress_bounded(&gz.compress(&data).unwrap(), 1000)
            .unwrap();
        assert_eq!(restored, data);
        let zs = ZstdCodec::default();
        let restored = zs
            .decompress_bounded(&zs.compress(&data).unwrap(), 1000)
            .unwrap();
        assert_eq!(restored, data);
    }

    #[test]
    fn default_bounded_truncates_custom_codec_output() {
        let doubler = FnCodec::new(|data: &[u8]| Ok([data, data].concat()));
        assert_eq!(doubler.decompress_bounded(b"abcd", 3).unwrap(), b"abcd");
        assert_eq!(doubler.decompress_bounded(b"ab", 10).unwrap(), b"abab");
    }

    #[test]
    fn fn_codec_delegates() {
        let reverse = FnCodec::new(|data: &[u8]| Ok(data.iter().rev().copied().collect()));
        assert_eq!(reverse.compress(b"abc").unwrap(), b"cba");
        assert_eq!(reverse.decompress(b"cba").unwrap(), b"abc");
    }

    #[test]
    fn codec_error_converts_to_shim_error() {
        let shim: ShimError = CodecError::Custom("bad frame".into()).into();
        assert_eq!(shim.code, ErrorCode::CodecFailed);
        assert!(shim.message.contains("bad frame"));
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn gzip_restores_any_input(data in proptest::collection::vec(any::<u8>(), 0..4096), level in 0u32..=9) {
                let codec = GzipCodec::new(level);
                let restored = codec.decompress(&codec.compress(&data).unwrap()).unwrap();
                prop_assert_eq!(restored, data);
            }

            #[test]
            fn zstd_restores_any_input(data in proptest::collection::vec(any::<u8>(), 0..4096), level in 1i32..=9) {
                let codec = ZstdCodec::new(level);
                let restored = codec.decompress(&codec.compress(&data).unwrap()).unwrap();
                prop_assert_eq!(restored, data);
            }
        }
    }
}
