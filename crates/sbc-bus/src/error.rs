// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors surfaced by bus clients and the compression-aware facades.

use sbc_compress::ConfigurationError;
use sbc_core::{CompressionError, ReceivedMessage, RejectedMessage};
use sbc_error::{ErrorCode, ShimError};

/// Failure of a bus operation.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    /// The queue, topic or subscription does not exist.
    #[error("messaging entity '{0}' was not found")]
    EntityNotFound(String),
    /// The client, sender or receiver has been closed.
    #[error("'{0}' has been closed")]
    Closed(String),
    /// The caller passed an argument the operation cannot accept.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Any other failure reported by the underlying transport.
    #[error("transport failure: {0}")]
    Transport(String),
    /// An outgoing message could not be compressed; nothing was sent.
    #[error("outgoing message could not be compressed")]
    Compression(#[source] CompressionError),
    /// A single received message could not be decompressed.
    #[error(transparent)]
    Rejected(#[from] RejectedMessage),
    /// Some messages of a received batch could not be decompressed.
    #[error(transparent)]
    Batch(#[from] BatchFailure),
    /// The compression configuration is unusable.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl BusError {
    /// Stable error code for this failure.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::EntityNotFound(_) => ErrorCode::EntityNotFound,
            Self::Closed(_) => ErrorCode::Closed,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Transport(_) => ErrorCode::Transport,
            Self::Compression(err) => err.code(),
            Self::Rejected(rejected) => rejected.code(),
            Self::Batch(batch) => batch.code(),
            Self::Configuration(err) => err.code(),
        }
    }

    /// Whether retrying the operation could succeed.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

impl From<BusError> for ShimError {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Compression(inner) => inner.into(),
            BusError::Configuration(inner) => inner.into(),
            BusError::Rejected(rejected) => {
                let sequence_number = rejected.message.sequence_number;
                ShimError::from(rejected.error).with_context("sequence_number", sequence_number)
            }
            other => {
                let shim = ShimError::new(other.code(), other.to_string());
                match other {
                    BusError::Batch(batch) => shim
                        .with_context("processed", batch.processed.len())
                        .with_context("failed", batch.failed.len()),
                    _ => shim,
                }
            }
        }
    }
}

/// Outcome of a batch receive or peek where at least one message could not
/// be decompressed.
///
/// Every message the bus handed out is accounted for, either in `processed`
/// or in `failed`, so nothing received destructively is lost.
#[derive(Debug, thiserror::Error)]
#[error("{} of {} messages could not be decompressed", .failed.len(), .failed.len() + .processed.len())]
pub struct BatchFailure {
    /// Messages that passed the inbound decision, in delivery order.
    pub processed: Vec<ReceivedMessage>,
    /// Messages that failed, untouched, with their reasons.
    pub failed: Vec<RejectedMessage>,
}

impl BatchFailure {
    /// Error code of the first failure.
    pub fn code(&self) -> ErrorCode {
        self.failed
            .first()
            .map(RejectedMessage::code)
            .unwrap_or(ErrorCode::Internal)
    }

    /// Total number of messages in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.processed.len() + self.failed.len()
    }

    /// `true` if the batch held no messages at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
