// SPDX-License-Identifier: MIT OR Apache-2.0
//! Receiver facade that restores compressed bodies.

use crate::{BatchFailure, BusError, MessageReceiver, ReceiveMode};
use async_trait::async_trait;
use sbc_compress::CompressionConfiguration;
use sbc_core::{CompressionHandler, ReceivedMessage, RejectedMessage};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Wraps a [`MessageReceiver`] and runs the inbound decision on every
/// message of every receive and peek call after delegating.
///
/// A message that fails the decision is never dropped: single-message calls
/// return it inside [`BusError::Rejected`], batch calls inside
/// [`BusError::Batch`] next to the messages that succeeded. The
/// [`receive_messages_each`](Self::receive_messages_each) and
/// [`peek_messages_each`](Self::peek_messages_each) variants report one
/// result per message instead.
#[derive(Debug)]
pub struct CompressionAwareReceiver<R> {
    inner: R,
    handler: CompressionHandler,
}

impl<R: MessageReceiver> CompressionAwareReceiver<R> {
    /// Wrap `inner`.
    pub fn new(inner: R, config: Arc<CompressionConfiguration>) -> Self {
        Self {
            inner,
            handler: CompressionHandler::new(config),
        }
    }

    /// The wrapped receiver.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Unwrap into the inner receiver.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// The shared configuration.
    pub fn configuration(&self) -> &Arc<CompressionConfiguration> {
        self.handler.configuration()
    }

    /// Receive a batch and report the inbound decision per message.
    pub async fn receive_messages_each(
        &self,
        max_messages: usize,
        max_wait: Option<Duration>,
    ) -> Result<Vec<Result<ReceivedMessage, RejectedMessage>>, BusError> {
        let messages = self.inner.receive_messages(max_messages, max_wait).await?;
        Ok(self.accept_each(messages))
    }

    /// Peek a batch and report the inbound decision per message.
    pub async fn peek_messages_each(
        &self,
        max_messages: usize,
        from_sequence_number: Option<i64>,
    ) -> Result<Vec<Result<ReceivedMessage, RejectedMessage>>, BusError> {
        let messages = self
            .inner
            .peek_messages(max_messages, from_sequence_number)
            .await?;
        Ok(self.accept_each(messages))
    }

    fn accept(&self, message: ReceivedMessage) -> Result<ReceivedMessage, RejectedMessage> {
        self.handler.accept(message).inspect_err(|rejected| {
            warn!(
                target: "sbc.bus",
                entity = self.inner.entity_path(),
                sequence_number = rejected.message.sequence_number,
                code = %rejected.code(),
                error = %rejected.error,
                "received message could not be decompressed"
            );
        })
    }

    fn accept_one(
        &self,
        message: Option<ReceivedMessage>,
    ) -> Result<Option<ReceivedMessage>, BusError> {
        match message {
            Some(m) => Ok(Some(self.accept(m)?)),
            None => Ok(None),
        }
    }

    fn accept_each(
        &self,
        messages: Vec<ReceivedMessage>,
    ) -> Vec<Result<ReceivedMessage, RejectedMessage>> {
        messages.into_iter().map(|m| self.accept(m)).collect()
    }

    fn accept_all(&self, messages: Vec<ReceivedMessage>) -> Result<Vec<ReceivedMessage>, BusError> {
        let mut processed = Vec::with_capacity(messages.len());
        let mut failed = Vec::new();
        for result in self.accept_each(messages) {
            match result {
                Ok(m) => processed.push(m),
                Err(rejected) => failed.push(rejected),
            }
        }
        if failed.is_empty() {
            Ok(processed)
        } else {
            Err(BatchFailure { processed, failed }.into())
        }
    }
}

#[async_trait]
impl<R: MessageReceiver> MessageReceiver for CompressionAwareReceiver<R> {
    fn entity_path(&self) -> &str {
        self.inner.entity_path()
    }

    fn receive_mode(&self) -> ReceiveMode {
        self.inner.receive_mode()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    async fn receive_message(
        &self,
        max_wait: Option<Duration>,
    ) -> Result<Option<ReceivedMessage>, BusError> {
        let message = self.inner.receive_message(max_wait).await?;
        self.accept_one(message)
    }

    async fn receive_messages(
        &self,
        max_messages: usize,
        max_wait: Option<Duration>,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        let messages = self.inner.receive_messages(max_messages, max_wait).await?;
        self.accept_all(messages)
    }

    async fn peek_message(
        &self,
        from_sequence_number: Option<i64>,
    ) -> Result<Option<ReceivedMessage>, BusError> {
        let message = self.inner.peek_message(from_sequence_number).await?;
        self.accept_one(message)
    }

    async fn peek_messages(
        &self,
        max_messages: usize,
        from_sequence_number: Option<i64>,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        let messages = self
            .inner
            .peek_messages(max_messages, from_sequence_number)
            .await?;
        self.accept_all(messages)
    }

    async fn complete_message(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        self.inner.complete_message(message).await
    }

    async fn close(&self) -> Result<(), BusError> {
        self.inner.close().await
    }
}
