// SPDX-License-Identifier: MIT OR Apache-2.0
//! Outbound decision: compress a message body before it is sent.

use crate::error::CompressionError;
use crate::message::{OutgoingMessage, PropertyValue};
use sbc_compress::{CompressionConfiguration, headers};
use tracing::debug;

/// What the outbound decision did to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundOutcome {
    /// Body and properties untouched.
    PassThrough,
    /// Body replaced with its compressed form and metadata written.
    Compressed {
        /// Method name written into `compression-method`.
        method: String,
        /// Body length before compression.
        original_size: usize,
        /// Body length after compression.
        compressed_size: usize,
    },
}

impl OutboundOutcome {
    /// `true` if the body was compressed.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Compressed { .. })
    }
}

/// Returns `true` when `message` should be compressed under `config`.
///
/// The body must be non-empty and at least `minimum_size` bytes, and the
/// message must not already carry a `compression-method` property.
#[must_use]
pub fn should_compress(message: &OutgoingMessage, config: &CompressionConfiguration) -> bool {
    let len = message.body.len();
    if len == 0 || len < config.minimum_size() {
        return false;
    }
    !message
        .application_properties
        .contains_key(headers::COMPRESSION_METHOD)
}

/// Compress the body unconditionally and write the three metadata keys.
///
/// On error the message is left exactly as it was.
pub fn compress_and_set_body(
    message: &mut OutgoingMessage,
    config: &CompressionConfiguration,
) -> Result<OutboundOutcome, CompressionError> {
    let method = config.method_name().to_string();
    let compressed = config
        .compress(&message.body)
        .map_err(|source| CompressionError::Codec {
            method: method.clone(),
            source,
        })?;

    let original_size = message.body.len();
    let compressed_size = compressed.len();
    message.body = compressed;

    let props = &mut message.application_properties;
    props.insert(
        headers::ORIGINAL_SIZE.to_string(),
        PropertyValue::from_len(original_size),
    );
    props.insert(
        headers::COMPRESSION_METHOD.to_string(),
        PropertyValue::String(method.clone()),
    );
    props.insert(
        headers::COMPRESSED_SIZE.to_string(),
        PropertyValue::from_len(compressed_size),
    );

    debug!(
        target: "sbc.outbound",
        method = %method,
        original_size,
        compressed_size,
        "compressed message body"
    );
    Ok(OutboundOutcome::Compressed {
        method,
        original_size,
        compressed_size,
    })
}

/// Run the full outbound decision on `message`.
pub fn prepare_for_send(
    message: &mut OutgoingMessage,
    config: &CompressionConfiguration,
) -> Result<OutboundOutcome, CompressionError> {
    if !should_compress(message, config) {
        debug!(
            target: "sbc.outbound",
            size = message.body.len(),
            minimum_size = config.minimum_size(),
            "body left uncompressed"
        );
        return Ok(OutboundOutcome::PassThrough);
    }
    compress_and_set_body(message, config)
}
