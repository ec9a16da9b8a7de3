// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stable error codes and structured diagnostics for the compression shim.
//!
//! Every typed error in the workspace maps onto an [`ErrorCode`] (a
//! machine-readable string tag that never changes across patch releases).
//! [`ShimError`] bundles a code with a human-readable message, an optional
//! cause and key-value context, and is what callers should log or ship to a
//! dead-letter reason field. [`ErrorReport`] is its wire form.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::fmt;

/// Boxed cause attached to a [`ShimError`].
pub type Cause = Box<dyn StdError + Send + Sync>;

// ---------------------------------------------------------------------------
// Categories and codes
// ---------------------------------------------------------------------------

/// Which part of the pipeline an [`ErrorCode`] comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Compression configuration, raised at construction time.
    Config,
    /// Compression metadata carried on a message is unusable.
    Metadata,
    /// A compressor or decompressor failed on the payload.
    Codec,
    /// Reported by the underlying message bus.
    Transport,
    /// Misuse of the API or a bug.
    Internal,
}

impl ErrorCategory {
    /// Lower-case name, as serialised.
    pub fn name(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Metadata => "metadata",
            Self::Codec => "codec",
            Self::Transport => "transport",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Machine-readable, stable error code.
///
/// Serialises to the same `SCREAMING_SNAKE_CASE` string that
/// [`as_str`](Self::as_str) returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// No compression configuration was supplied to a client.
    ConfigMissing,
    /// The compression configuration or configuration file is invalid.
    ConfigInvalid,
    /// A compression property has the wrong type or a companion property is
    /// missing.
    MetadataCorrupt,
    /// The decompressed body length disagrees with the recorded original size.
    SizeMismatch,
    /// The compressor or decompressor rejected the payload.
    CodecFailed,
    /// The queue, topic or subscription does not exist.
    EntityNotFound,
    /// The sender, receiver or client was closed.
    Closed,
    /// Any other failure reported by the bus client.
    Transport,
    /// A caller passed an argument the operation cannot accept.
    InvalidArgument,
    /// Unexpected failure inside the shim.
    Internal,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [ErrorCode; 10] = [
        Self::ConfigMissing,
        Self::ConfigInvalid,
        Self::MetadataCorrupt,
        Self::SizeMismatch,
        Self::CodecFailed,
        Self::EntityNotFound,
        Self::Closed,
        Self::Transport,
        Self::InvalidArgument,
        Self::Internal,
    ];

    /// The [`ErrorCategory`] this code belongs to.
    pub fn category(self) -> ErrorCategory {
        use ErrorCode::*;
        match self {
            ConfigMissing | ConfigInvalid => ErrorCategory::Config,
            MetadataCorrupt | SizeMismatch => ErrorCategory::Metadata,
            CodecFailed => ErrorCategory::Codec,
            EntityNotFound | Closed | Transport => ErrorCategory::Transport,
            InvalidArgument | Internal => ErrorCategory::Internal,
        }
    }

    /// Wire string, e.g. `"SIZE_MISMATCH"`.
    pub fn as_str(self) -> &'static str {
        use ErrorCode::*;
        match self {
            ConfigMissing => "CONFIG_MISSING",
            ConfigInvalid => "CONFIG_INVALID",
            MetadataCorrupt => "METADATA_CORRUPT",
            SizeMismatch => "SIZE_MISMATCH",
            CodecFailed => "CODEC_FAILED",
            EntityNotFound => "ENTITY_NOT_FOUND",
            Closed => "CLOSED",
            Transport => "TRANSPORT",
            InvalidArgument => "INVALID_ARGUMENT",
            Internal => "INTERNAL",
        }
    }

    /// Whether retrying the same operation could succeed.
    ///
    /// Data faults (corrupt metadata, size mismatch, codec failures) recur
    /// identically on retry; only transport faults are transient.
    pub fn is_retryable(self) -> bool {
        self == Self::Transport
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ShimError
// ---------------------------------------------------------------------------

/// Structured diagnostic error.
///
/// ```
/// use sbc_error::{ErrorCode, ShimError};
///
/// let err = ShimError::new(ErrorCode::SizeMismatch, "decompressed size differs")
///     .with_context("actual", 512)
///     .with_context("expected", 999);
/// assert_eq!(err.context["expected"], 999);
/// assert_eq!(err.to_string(), "SIZE_MISMATCH: decompressed size differs (actual=512, expected=999)");
/// ```
pub struct ShimError {
    /// Stable code.
    pub code: ErrorCode,
    /// What went wrong, for humans.
    pub message: String,
    /// Diagnostic key-value pairs, e.g. `actual` / `expected` lengths.
    pub context: BTreeMap<String, serde_json::Value>,
    /// The lower-level error this one wraps.
    pub cause: Option<Cause>,
}

impl ShimError {
    /// Error with `code` and `message`, no context and no cause.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: BTreeMap::new(),
            cause: None,
        }
    }

    /// Record `key = value` in the context. Values that do not serialise to
    /// JSON are dropped.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.context.insert(key.into(), value);
        }
        self
    }

    /// Chain `cause` behind this error.
    #[must_use]
    pub fn with_source(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Category of [`code`](Self::code).
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Wire form of this error.
    pub fn report(&self) -> ErrorReport {
        ErrorReport::from(self)
    }
}

impl fmt::Debug for ShimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShimError")
            .field("code", &self.code)
            .field("message", &self.message)
            .field("context", &self.context)
            .field("cause", &self.cause.as_ref().map(ToString::to_string))
            .finish()
    }
}

impl fmt::Display for ShimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        let mut pairs = self.context.iter();
        if let Some((key, value)) = pairs.next() {
            write!(f, " ({key}={value}")?;
            for (key, value) in pairs {
                write!(f, ", {key}={value}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl StdError for ShimError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn StdError + 'static))
    }
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Serialisable snapshot of a [`ShimError`], with the cause flattened to text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorReport {
    /// Stable code.
    pub code: ErrorCode,
    /// Category of `code`.
    pub category: ErrorCategory,
    /// Whether a retry could succeed.
    pub retryable: bool,
    /// Human-readable message.
    pub message: String,
    /// Diagnostic context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, serde_json::Value>,
    /// Text of the cause, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

impl From<&ShimError> for ErrorReport {
    fn from(err: &ShimError) -> Self {
        Self {
            code: err.code,
            category: err.category(),
            retryable: err.code.is_retryable(),
            message: err.message.clone(),
            context: err.context.clone(),
            cause: err.cause.as_ref().map(ToString::to_string),
        }
    }
}

impl From<ErrorReport> for ShimError {
    fn from(report: ErrorReport) -> Self {
        let cause = report.cause.map(Cause::from);
        Self {
            code: report.code,
            message: report.message,
            context: report.context,
            cause,
        }
    }
}
