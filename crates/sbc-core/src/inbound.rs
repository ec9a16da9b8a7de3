// SPDX-License-Identifier: MIT OR Apache-2.0
//! Inbound decision: restore a received message body.
//!
//! The procedure runs in four steps, each exposed on its own so callers can
//! drive them individually:
//!
//! 1. [`should_decompress`] reads `compression-method`.
//! 2. [`decompress_to_bytes`] looks up the decompressor and runs it.
//! 3. The same call checks the result against `compression-original-size`.
//! 4. [`decompress_and_apply`] swaps the body in.
//!
//! [`process_received`] runs all four.

use crate::error::CompressionError;
use crate::message::ReceivedMessage;
use sbc_compress::{CompressionConfiguration, headers};
use tracing::{debug, warn};

/// What the inbound decision did to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// No compression metadata, or the body was already restored.
    PassThrough,
    /// Body replaced with its decompressed form.
    Decompressed {
        /// Method named by `compression-method`.
        method: String,
        /// Restored body length.
        original_size: usize,
    },
    /// The message names a method nobody registered. Body and metadata are
    /// left as received.
    UnknownCodec {
        /// The unrecognised method name.
        method: String,
    },
}

impl InboundOutcome {
    /// `true` if the body was replaced.
    #[must_use]
    pub fn is_decompressed(&self) -> bool {
        matches!(self, Self::Decompressed { .. })
    }
}

/// Step 1: return the method name if `message` still needs decompressing.
///
/// `None` when `compression-method` is absent or this layer already restored
/// the body. A non-string method value is corrupt metadata.
pub fn should_decompress(message: &ReceivedMessage) -> Result<Option<String>, CompressionError> {
    if message.is_decompressed() {
        return Ok(None);
    }
    match message
        .application_properties
        .get(headers::COMPRESSION_METHOD)
    {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(|m| Some(m.to_string()))
            .ok_or(CompressionError::CorruptMetadata {
                key: headers::COMPRESSION_METHOD,
                expected: "string",
                found: value.type_name(),
            }),
    }
}

/// Steps 2 and 3: decompress the body with the decompressor registered for
/// `method` and check its length.
///
/// Output is bounded by `compression-original-size`, so a body that inflates
/// past it is rejected without being fully expanded.
///
/// Returns `Ok(None)` when no decompressor is registered for `method`.
pub fn decompress_to_bytes(
    message: &ReceivedMessage,
    method: &str,
    config: &CompressionConfiguration,
) -> Result<Option<Vec<u8>>, CompressionError> {
    let Some(decompressor) = config.decompressor(method) else {
        warn!(
            target: "sbc.inbound",
            method,
            sequence_number = message.sequence_number,
            "no decompressor registered for method, delivering body as received"
        );
        return Ok(None);
    };

    let expected = original_size(message)?;
    let restored = decompressor
        .decompress_bounded(&message.body, expected)
        .map_err(|source| CompressionError::Codec {
            method: method.to_string(),
            source,
        })?;

    if restored.len() > expected {
        return Err(CompressionError::Oversized { expected });
    }
    if restored.len() != expected {
        return Err(CompressionError::SizeMismatch {
            actual: restored.len(),
            expected,
        });
    }
    Ok(Some(restored))
}

/// Step 4: decompress and, on success, replace the body.
///
/// Metadata stays on the message. A zero-length result leaves the message
/// unchanged.
pub fn decompress_and_apply(
    message: &mut ReceivedMessage,
    method: &str,
    config: &CompressionConfiguration,
) -> Result<InboundOutcome, CompressionError> {
    let Some(restored) = decompress_to_bytes(message, method, config)? else {
        return Ok(InboundOutcome::UnknownCodec {
            method: method.to_string(),
        });
    };
    if restored.is_empty() {
        return Ok(InboundOutcome::PassThrough);
    }

    let original_size = restored.len();
    debug!(
        target: "sbc.inbound",
        method,
        compressed_size = message.body.len(),
        original_size,
        sequence_number = message.sequence_number,
        "decompressed message body"
    );
    message.body = restored;
    message.mark_decompressed();
    Ok(InboundOutcome::Decompressed {
        method: method.to_string(),
        original_size,
    })
}

/// Run the full inbound decision on `message`.
///
/// On error the message is left exactly as it was received.
pub fn process_received(
    message: &mut ReceivedMessage,
    config: &CompressionConfiguration,
) -> Result<InboundOutcome, CompressionError> {
    match should_decompress(message)? {
        None => Ok(InboundOutcome::PassThrough),
        Some(method) => decompress_and_apply(message, &method, config),
    }
}

fn original_size(message: &ReceivedMessage) -> Result<usize, CompressionError> {
    let corrupt = |found| CompressionError::CorruptMetadata {
        key: headers::ORIGINAL_SIZE,
        expected: "non-negative integer",
        found,
    };
    let value = message
        .application_properties
        .get(headers::ORIGINAL_SIZE)
        .ok_or_else(|| corrupt("missing"))?;
    value
        .as_i64()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| corrupt(value.type_name()))
}
