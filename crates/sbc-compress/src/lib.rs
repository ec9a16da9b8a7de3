// SPDX-License-Identifier: MIT OR Apache-2.0
//! Payload codecs and compression configuration for the compression shim.
//!
//! Provides the [`Compressor`] / [`Decompressor`] seams, the built-in
//! [`GzipCodec`] and [`ZstdCodec`], closure-backed [`FnCodec`]s, the
//! immutable [`CompressionConfiguration`] shared by senders and receivers,
//! and the [`headers`] that make up the metadata contract on the wire.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod configuration;
pub mod headers;

pub use codec::{CodecError, Compressor, Decompressor, FnCodec, GzipCodec, ZstdCodec};
pub use configuration::{
    CompressionConfiguration, CompressionConfigurationBuilder, ConfigurationError,
    DEFAULT_MINIMUM_SIZE,
};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifies one of the built-in compression algorithms.
///
/// The [`name`](Self::name) is what travels in the `compression-method`
/// property, so it must never change for an existing variant.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum CompressionAlgorithm {
    /// Gzip (RFC 1952) via `flate2`.
    #[default]
    Gzip,
    /// Zstandard via `zstd`.
    Zstd,
}

impl CompressionAlgorithm {
    /// All built-in algorithms.
    pub const ALL: [CompressionAlgorithm; 2] = [Self::Gzip, Self::Zstd];

    /// Method name written into message metadata.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Gzip => "gzip",
            Self::Zstd => "zstd",
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gzip" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            other => Err(CodecError::Unsupported(other.to_string())),
        }
    }
}
