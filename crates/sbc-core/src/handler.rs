// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stateless compression service usable without any bus client.

use crate::error::{CompressionError, RejectedMessage};
use crate::inbound::{self, InboundOutcome};
use crate::message::{OutgoingMessage, ReceivedMessage};
use crate::outbound::{self, OutboundOutcome};
use sbc_compress::CompressionConfiguration;
use std::sync::Arc;

/// Applies the outbound and inbound decisions under one shared
/// configuration.
///
/// Cloning is cheap; every clone shares the same configuration.
#[derive(Debug, Clone, Default)]
pub struct CompressionHandler {
    config: Arc<CompressionConfiguration>,
}

impl CompressionHandler {
    /// Handler over `config`.
    #[must_use]
    pub fn new(config: Arc<CompressionConfiguration>) -> Self {
        Self { config }
    }

    /// The shared configuration.
    #[must_use]
    pub fn configuration(&self) -> &Arc<CompressionConfiguration> {
        &self.config
    }

    /// Compress `message` if it crosses the threshold.
    pub fn before_send(
        &self,
        message: &mut OutgoingMessage,
    ) -> Result<OutboundOutcome, CompressionError> {
        outbound::prepare_for_send(message, &self.config)
    }

    /// Restore `message` if it carries compression metadata.
    pub fn after_receive(
        &self,
        message: &mut ReceivedMessage,
    ) -> Result<InboundOutcome, CompressionError> {
        inbound::process_received(message, &self.config)
    }

    /// Apply [`before_send`](Self::before_send) to each message, one result
    /// per element.
    pub fn before_send_all(
        &self,
        messages: &mut [OutgoingMessage],
    ) -> Vec<Result<OutboundOutcome, CompressionError>> {
        messages.iter_mut().map(|m| self.before_send(m)).collect()
    }

    /// Apply [`after_receive`](Self::after_receive) to each message, one
    /// result per element.
    pub fn after_receive_all(
        &self,
        messages: &mut [ReceivedMessage],
    ) -> Vec<Result<InboundOutcome, CompressionError>> {
        messages.iter_mut().map(|m| self.after_receive(m)).collect()
    }

    /// Owned variant of [`after_receive`](Self::after_receive): hand back the
    /// processed message, or the untouched message with the reason it was
    /// refused.
    pub fn accept(&self, mut message: ReceivedMessage) -> Result<ReceivedMessage, RejectedMessage> {
        match self.after_receive(&mut message) {
            Ok(_) => Ok(message),
            Err(error) => Err(RejectedMessage::new(message, error)),
        }
    }
}
