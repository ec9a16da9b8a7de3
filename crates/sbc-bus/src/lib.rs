// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Message bus client traits and compression-aware drop-in facades.
//!
//! [`BusClient`], [`MessageSender`] and [`MessageReceiver`] describe the bus
//! client the shim sits on. [`CompressionAwareClient`],
//! [`CompressionAwareSender`] and [`CompressionAwareReceiver`] wrap any
//! implementation of those traits and implement the very same traits, so
//! they can replace the plain client without touching call sites. Every send,
//! schedule, receive and peek path runs through the compression decisions in
//! [`sbc_core`].

mod client;
mod error;
mod options;
mod receiver;
mod sender;

pub use client::{CompressionAwareClient, CompressionAwareClientBuilder};
pub use error::{BatchFailure, BusError};
pub use options::{DEFAULT_MAX_WAIT, ReceiveMode, ReceiverOptions, SenderOptions};
pub use receiver::CompressionAwareReceiver;
pub use sender::CompressionAwareSender;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sbc_core::{OutgoingMessage, ReceivedMessage};
use std::time::Duration;

/// Sends messages to one queue or topic.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Queue or topic this sender targets.
    fn entity_path(&self) -> &str;

    /// `true` once [`close`](Self::close) has completed.
    fn is_closed(&self) -> bool;

    /// Send a single message.
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), BusError>;

    /// Send a batch of messages atomically.
    async fn send_messages(&self, messages: Vec<OutgoingMessage>) -> Result<(), BusError>;

    /// Schedule a message to become visible at `enqueue_time`, returning its
    /// sequence number.
    async fn schedule_message(
        &self,
        message: OutgoingMessage,
        enqueue_time: DateTime<Utc>,
    ) -> Result<i64, BusError>;

    /// Schedule several messages, returning one sequence number per message
    /// in order.
    async fn schedule_messages(
        &self,
        messages: Vec<OutgoingMessage>,
        enqueue_time: DateTime<Utc>,
    ) -> Result<Vec<i64>, BusError>;

    /// Cancel a scheduled message that has not yet become visible.
    async fn cancel_scheduled_message(&self, sequence_number: i64) -> Result<(), BusError>;

    /// Cancel several scheduled messages.
    async fn cancel_scheduled_messages(&self, sequence_numbers: &[i64]) -> Result<(), BusError>;

    /// Close the sender. Further sends fail with [`BusError::Closed`].
    async fn close(&self) -> Result<(), BusError>;
}

/// Receives messages from one queue or subscription.
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// Queue or `topic/subscriptions/name` path this receiver reads.
    fn entity_path(&self) -> &str;

    /// Settlement mode of this receiver.
    fn receive_mode(&self) -> ReceiveMode;

    /// `true` once [`close`](Self::close) has completed.
    fn is_closed(&self) -> bool;

    /// Wait up to `max_wait` (default [`DEFAULT_MAX_WAIT`]) for a message.
    async fn receive_message(
        &self,
        max_wait: Option<Duration>,
    ) -> Result<Option<ReceivedMessage>, BusError>;

    /// Wait up to `max_wait` for at least one message and return at most
    /// `max_messages`.
    async fn receive_messages(
        &self,
        max_messages: usize,
        max_wait: Option<Duration>,
    ) -> Result<Vec<ReceivedMessage>, BusError>;

    /// Look at the next message without locking or removing it.
    ///
    /// Without `from_sequence_number` the receiver continues after the last
    /// message it peeked.
    async fn peek_message(
        &self,
        from_sequence_number: Option<i64>,
    ) -> Result<Option<ReceivedMessage>, BusError>;

    /// Look at up to `max_messages` messages without locking or removing
    /// them.
    async fn peek_messages(
        &self,
        max_messages: usize,
        from_sequence_number: Option<i64>,
    ) -> Result<Vec<ReceivedMessage>, BusError>;

    /// Settle a peek-locked message, removing it from the entity.
    async fn complete_message(&self, message: &ReceivedMessage) -> Result<(), BusError>;

    /// Close the receiver. Further receives fail with [`BusError::Closed`].
    async fn close(&self) -> Result<(), BusError>;
}

/// Factory for senders and receivers over one namespace.
#[async_trait]
pub trait BusClient: Send + Sync {
    /// Sender type handed out by this client.
    type Sender: MessageSender;
    /// Receiver type handed out by this client.
    type Receiver: MessageReceiver;

    /// Sender for a queue or topic with default options.
    fn create_sender(&self, queue_or_topic: &str) -> Result<Self::Sender, BusError> {
        self.create_sender_with_options(queue_or_topic, SenderOptions::default())
    }

    /// Sender for a queue or topic.
    fn create_sender_with_options(
        &self,
        queue_or_topic: &str,
        options: SenderOptions,
    ) -> Result<Self::Sender, BusError>;

    /// Receiver for a queue with default options.
    fn create_receiver(&self, queue: &str) -> Result<Self::Receiver, BusError> {
        self.create_receiver_with_options(queue, ReceiverOptions::default())
    }

    /// Receiver for a queue.
    fn create_receiver_with_options(
        &self,
        queue: &str,
        options: ReceiverOptions,
    ) -> Result<Self::Receiver, BusError>;

    /// Receiver for a topic subscription with default options.
    fn create_subscription_receiver(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<Self::Receiver, BusError> {
        self.create_subscription_receiver_with_options(
            topic,
            subscription,
            ReceiverOptions::default(),
        )
    }

    /// Receiver for a topic subscription.
    fn create_subscription_receiver_with_options(
        &self,
        topic: &str,
        subscription: &str,
        options: ReceiverOptions,
    ) -> Result<Self::Receiver, BusError>;

    /// `true` once [`close`](Self::close) has completed.
    fn is_closed(&self) -> bool;

    /// Close the client and everything it created.
    async fn close(&self) -> Result<(), BusError>;
}

/// Path of a subscription under a topic, as used in diagnostics.
#[must_use]
pub fn subscription_path(topic: &str, subscription: &str) -> String {
    format!("{topic}/subscriptions/{subscription}")
}
