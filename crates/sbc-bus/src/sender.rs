// SPDX-License-Identifier: MIT OR Apache-2.0
//! Sender facade that compresses outgoing bodies.

use crate::{BusError, MessageSender};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sbc_compress::CompressionConfiguration;
use sbc_core::{CompressionHandler, OutboundOutcome, OutgoingMessage};
use std::sync::Arc;
use tracing::debug;

/// Wraps a [`MessageSender`] and runs the outbound decision on every message
/// of every send and schedule call before delegating.
///
/// A batch is compressed as a whole before anything is handed to the inner
/// sender: if one message cannot be compressed, none are sent.
#[derive(Debug)]
pub struct CompressionAwareSender<S> {
    inner: S,
    handler: CompressionHandler,
}

impl<S: MessageSender> CompressionAwareSender<S> {
    /// Wrap `inner`.
    pub fn new(inner: S, config: Arc<CompressionConfiguration>) -> Self {
        Self {
            inner,
            handler: CompressionHandler::new(config),
        }
    }

    /// The wrapped sender.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Unwrap into the inner sender.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// The shared configuration.
    pub fn configuration(&self) -> &Arc<CompressionConfiguration> {
        self.handler.configuration()
    }

    fn prepare(&self, message: &mut OutgoingMessage) -> Result<(), BusError> {
        let outcome = self
            .handler
            .before_send(message)
            .map_err(BusError::Compression)?;
        if let OutboundOutcome::Compressed {
            original_size,
            compressed_size,
            ..
        } = outcome
        {
            debug!(
                target: "sbc.bus",
                entity = self.inner.entity_path(),
                original_size,
                compressed_size,
                "outgoing message compressed"
            );
        }
        Ok(())
    }

    fn prepare_all(&self, messages: &mut [OutgoingMessage]) -> Result<(), BusError> {
        messages.iter_mut().try_for_each(|m| self.prepare(m))
    }
}

#[async_trait]
impl<S: MessageSender> MessageSender for CompressionAwareSender<S> {
    fn entity_path(&self) -> &str {
        self.inner.entity_path()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    async fn send_message(&self, mut message: OutgoingMessage) -> Result<(), BusError> {
        self.prepare(&mut message)?;
        self.inner.send_message(message).await
    }

    async fn send_messages(&self, mut messages: Vec<OutgoingMessage>) -> Result<(), BusError> {
        self.prepare_all(&mut messages)?;
        self.inner.send_messages(messages).await
    }

    async fn schedule_message(
        &self,
        mut message: OutgoingMessage,
        enqueue_time: DateTime<Utc>,
    ) -> Result<i64, BusError> {
        self.prepare(&mut message)?;
        self.inner.schedule_message(message, enqueue_time).await
    }

    async fn schedule_messages(
        &self,
        mut messages: Vec<OutgoingMessage>,
        enqueue_time: DateTime<Utc>,
    ) -> Result<Vec<i64>, BusError> {
        self.prepare_all(&mut messages)?;
        self.inner.schedule_messages(messages, enqueue_time).await
    }

    async fn cancel_scheduled_message(&self, sequence_number: i64) -> Result<(), BusError> {
        self.inner.cancel_scheduled_message(sequence_number).await
    }

    async fn cancel_scheduled_messages(&self, sequence_numbers: &[i64]) -> Result<(), BusError> {
        self.inner.cancel_scheduled_messages(sequence_numbers).await
    }

    async fn close(&self) -> Result<(), BusError> {
        self.inner.close().await
    }
}
