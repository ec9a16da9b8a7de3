// SPDX-License-Identifier: MIT OR Apache-2.0
//! The immutable compression configuration shared by senders and receivers.

use crate::codec::{CodecError, Compressor, Decompressor, FnCodec, GzipCodec, ZstdCodec};
use crate::CompressionAlgorithm;
use sbc_error::{ErrorCode, ShimError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Default threshold in bytes below which bodies are sent as-is.
///
/// Gzip adds roughly 20 bytes of framing, so payloads of a few hundred bytes
/// rarely shrink enough to be worth the CPU.
pub const DEFAULT_MINIMUM_SIZE: usize = 1024;

/// Errors raised while building a [`CompressionConfiguration`] or a
/// compression-aware client around one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// No configuration was supplied where one is required.
    #[error("compression configuration is required but was not supplied")]
    Missing,
    /// The size threshold must be strictly positive.
    #[error("minimum compression size must be greater than 0")]
    NonPositiveThreshold,
    /// The method name written into metadata must not be empty.
    #[error("compression method name must not be empty")]
    EmptyMethodName,
    /// The builder was finished without a compressor.
    #[error("no compressor configured")]
    MissingCompressor,
    /// A codec level is out of range for its algorithm.
    #[error("compression level {level} is out of range for {algorithm}")]
    InvalidLevel {
        /// Algorithm the level was meant for.
        algorithm: CompressionAlgorithm,
        /// Offending level.
        level: i32,
    },
}

impl ConfigurationError {
    /// Stable error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Missing => ErrorCode::ConfigMissing,
            _ => ErrorCode::ConfigInvalid,
        }
    }
}

impl From<ConfigurationError> for ShimError {
    fn from(err: ConfigurationError) -> Self {
        ShimError::new(err.code(), err.to_string())
    }
}

/// Threshold, compressor and name-keyed decompressors.
///
/// Immutable after construction and `Send + Sync`; wrap it in an [`Arc`] and
/// share it between any number of senders and receivers.
#[derive(Clone)]
pub struct CompressionConfiguration {
    minimum_size: usize,
    method_name: String,
    compressor: Arc<dyn Compressor>,
    decompressors: BTreeMap<String, Arc<dyn Decompressor>>,
}

impl CompressionConfiguration {
    /// Gzip configuration with the default level.
    ///
    /// Receivers built from it also understand `zstd` bodies.
    pub fn gzip(minimum_size: usize) -> Result<Self, ConfigurationError> {
        Self::for_algorithm(CompressionAlgorithm::Gzip, minimum_size, None)
    }

    /// Zstandard configuration with the default level.
    ///
    /// Receivers built from it also understand `gzip` bodies.
    pub fn zstd(minimum_size: usize) -> Result<Self, ConfigurationError> {
        Self::for_algorithm(CompressionAlgorithm::Zstd, minimum_size, None)
    }

    /// Configuration compressing with `algorithm` at an optional `level`
    /// and accepting every built-in algorithm on receipt.
    pub fn for_algorithm(
        algorithm: CompressionAlgorithm,
        minimum_size: usize,
        level: Option<i32>,
    ) -> Result<Self, ConfigurationError> {
        let mut builder = Self::builder()
            .minimum_size(minimum_size)
            .algorithm(algorithm, level)?;
        for accepted in CompressionAlgorithm::ALL {
            builder = builder.accept(accepted);
        }
        builder.build()
    }

    /// Start building a custom configuration.
    #[must_use]
    pub fn builder() -> CompressionConfigurationBuilder {
        CompressionConfigurationBuilder::default()
    }

    /// Bodies at or above this many bytes are compressed.
    #[must_use]
    pub fn minimum_size(&self) -> usize {
        self.minimum_size
    }

    /// Method name written into the `compression-method` property.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// Compress `data` with the configured compressor.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.compressor.compress(data)
    }

    /// Look up the decompressor registered under `method`.
    #[must_use]
    pub fn decompressor(&self, method: &str) -> Option<&dyn Decompressor> {
        self.decompressors.get(method).map(|d| d.as_ref())
    }

    /// Decompress `data` with the decompressor registered under `method`.
    ///
    /// Returns `None` when no decompressor is registered for that name.
    pub fn decompress(&self, method: &str, data: &[u8]) -> Option<Result<Vec<u8>, CodecError>> {
        self.decompressor(method).map(|d| d.decompress(data))
    }

    /// Names of every method this configuration can decompress, sorted.
    pub fn accepted_methods(&self) -> impl Iterator<Item = &str> {
        self.decompressors.keys().map(String::as_str)
    }
}

impl Default for CompressionConfiguration {
    fn default() -> Self {
        let gzip = Arc::new(GzipCodec::default());
        let mut decompressors: BTreeMap<String, Arc<dyn Decompressor>> = BTreeMap::new();
        decompressors.insert(CompressionAlgorithm::Gzip.name().into(), gzip.clone());
        decompressors.insert(
            CompressionAlgorithm::Zstd.name().into(),
            Arc::new(ZstdCodec::default()),
        );
        Self {
            minimum_size: DEFAULT_MINIMUM_SIZE,
            method_name: CompressionAlgorithm::Gzip.name().into(),
            compressor: gzip,
            decompressors,
        }
    }
}

impl fmt::Debug for CompressionConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionConfiguration")
            .field("minimum_size", &self.minimum_size)
            .field("method_name", &self.method_name)
            .field(
                "decompressors",
                &self.decompressors.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Builder for [`CompressionConfiguration`].
#[derive(Default)]
pub struct CompressionConfigurationBuilder {
    minimum_size: Option<usize>,
    compressor: Option<(String, Arc<dyn Compressor>)>,
    decompressors: BTreeMap<String, Arc<dyn Decompressor>>,
}

impl CompressionConfigurationBuilder {
    /// Threshold in bytes. Defaults to [`DEFAULT_MINIMUM_SIZE`].
    #[must_use]
    pub fn minimum_size(mut self, minimum_size: usize) -> Self {
        self.minimum_size = Some(minimum_size);
        self
    }

    /// Compress with `codec`, tagging messages with `method`.
    ///
    /// If `codec` also decompresses, register it separately with
    /// [`decompressor`](Self::decompressor); otherwise receivers sharing this
    /// configuration will not recognise their own senders' messages.
    #[must_use]
    pub fn compressor(mut self, method: impl Into<String>, codec: impl Compressor + 'static) -> Self {
        self.compressor = Some((method.into(), Arc::new(codec)));
        self
    }

    /// Compress with a plain function.
    #[must_use]
    pub fn compressor_fn<F>(self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, CodecError> + Send + Sync + 'static,
    {
        self.compressor(method, FnCodec::new(f))
    }

    /// Compress with a built-in algorithm, at `level` or the codec default.
    pub fn algorithm(
        self,
        algorithm: CompressionAlgorithm,
        level: Option<i32>,
    ) -> Result<Self, ConfigurationError> {
        let invalid = |level| ConfigurationError::InvalidLevel { algorithm, level };
        let builder = match (algorithm, level) {
            (CompressionAlgorithm::Gzip, None) => {
                self.compressor(algorithm.name(), GzipCodec::default())
            }
            (CompressionAlgorithm::Gzip, Some(level)) => {
                let valid = u32::try_from(level)
                    .ok()
                    .filter(|l| *l <= GzipCodec::MAX_LEVEL)
                    .ok_or_else(|| invalid(level))?;
                self.compressor(algorithm.name(), GzipCodec::new(valid))
            }
            (CompressionAlgorithm::Zstd, None) => {
                self.compressor(algorithm.name(), ZstdCodec::default())
            }
            (CompressionAlgorithm::Zstd, Some(level)) => {
                if !ZstdCodec::LEVELS.contains(&level) {
                    return Err(invalid(level));
                }
                self.compressor(algorithm.name(), ZstdCodec::new(level))
            }
        };
        Ok(builder)
    }

    /// Decompress bodies tagged with a built-in algorithm's name.
    #[must_use]
    pub fn accept(self, algorithm: CompressionAlgorithm) -> Self {
        match algorithm {
            CompressionAlgorithm::Gzip => self.decompressor(algorithm.name(), GzipCodec::default()),
            CompressionAlgorithm::Zstd => self.decompressor(algorithm.name(), ZstdCodec::default()),
        }
    }

    /// Register a decompressor for bodies tagged with `method`. A later
    /// registration under the same name replaces the earlier one.
    #[must_use]
    pub fn decompressor(
        mut self,
        method: impl Into<String>,
        codec: impl Decompressor + 'static,
    ) -> Self {
        self.decompressors.insert(method.into(), Arc::new(codec));
        self
    }

    /// Register a plain function as decompressor for `method`.
    #[must_use]
    pub fn decompressor_fn<F>(self, method: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[u8]) -> Result<Vec<u8>, CodecError> + Send + Sync + 'static,
    {
        self.decompressor(method, FnCodec::new(f))
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<CompressionConfiguration, ConfigurationError> {
        let minimum_size = self.minimum_size.unwrap_or(DEFAULT_MINIMUM_SIZE);
        if minimum_size == 0 {
            return Err(ConfigurationError::NonPositiveThreshold);
        }
        let (method_name, compressor) = self
            .compressor
            .ok_or(ConfigurationError::MissingCompressor)?;
        if method_name.trim().is_empty() {
            return Err(ConfigurationError::EmptyMethodName);
        }
        if self.decompressors.keys().any(|k| k.trim().is_empty()) {
            return Err(ConfigurationError::EmptyMethodName);
        }
        Ok(CompressionConfiguration {
            minimum_size,
            method_name,
            compressor,
            decompressors: self.decompressors,
        })
    }
}
