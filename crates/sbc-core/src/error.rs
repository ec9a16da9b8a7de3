// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors raised by the outbound and inbound decisions.

use crate::message::ReceivedMessage;
use sbc_compress::CodecError;
use sbc_error::{ErrorCode, ShimError};

/// A data fault found while compressing or decompressing a message.
///
/// None of these are transient: retrying the same message reproduces them.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// A compression property is missing or has the wrong type, which points
    /// at an incompatible sender or tampering.
    #[error("'{key}' is {found} on the message, expected {expected}")]
    CorruptMetadata {
        /// Offending property key.
        key: &'static str,
        /// What the key should hold.
        expected: &'static str,
        /// What the message actually carries.
        found: &'static str,
    },
    /// The decompressed body does not have the recorded original length.
    #[error("decompressed size {actual} bytes does not equal the expected size of {expected} bytes")]
    SizeMismatch {
        /// Length actually produced by the decompressor.
        actual: usize,
        /// Length recorded in `compression-original-size`.
        expected: usize,
    },
    /// The body inflates past `compression-original-size`. Decompression
    /// stopped at the bound.
    #[error("decompressed body exceeds the expected size of {expected} bytes")]
    Oversized {
        /// Length recorded in `compression-original-size`.
        expected: usize,
    },
    /// The codec registered for `method` failed on the body.
    #[error("codec '{method}' failed")]
    Codec {
        /// Method whose codec failed.
        method: String,
        /// Underlying codec failure.
        #[source]
        source: CodecError,
    },
}

impl CompressionError {
    /// Stable error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CorruptMetadata { .. } => ErrorCode::MetadataCorrupt,
            Self::SizeMismatch { .. } | Self::Oversized { .. } => ErrorCode::SizeMismatch,
            Self::Codec { .. } => ErrorCode::CodecFailed,
        }
    }
}

impl From<CompressionError> for ShimError {
    fn from(err: CompressionError) -> Self {
        let shim = ShimError::new(err.code(), err.to_string());
        match err {
            CompressionError::CorruptMetadata {
                key,
                expected,
                found,
            } => shim
                .with_context("key", key)
                .with_context("expected", expected)
                .with_context("found", found),
            CompressionError::SizeMismatch { actual, expected } => shim
                .with_context("actual", actual)
                .with_context("expected", expected),
            CompressionError::Oversized { expected } => shim.with_context("expected", expected),
            CompressionError::Codec { method, source } => {
                shim.with_context("method", method).with_source(source)
            }
        }
    }
}

/// A received message the inbound decision refused, returned together with
/// the reason so the caller can dead-letter or inspect it.
///
/// The message is exactly as it came off the bus: body and metadata are
/// untouched.
#[derive(Debug, thiserror::Error)]
#[error("message {} rejected: {error}", .message.sequence_number)]
pub struct RejectedMessage {
    /// The untouched message.
    pub message: Box<ReceivedMessage>,
    /// Why it was rejected.
    #[source]
    pub error: CompressionError,
}

impl RejectedMessage {
    /// Pair a message with the error it produced.
    #[must_use]
    pub fn new(message: ReceivedMessage, error: CompressionError) -> Self {
        Self {
            message: Box::new(message),
            error,
        }
    }

    /// Stable error code of the underlying failure.
    pub fn code(&self) -> ErrorCode {
        self.error.code()
    }
}
