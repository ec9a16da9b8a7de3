// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! In-memory message bus used for local testing and demos.
//!
//! [`InMemoryBus`] models queues, topics with subscriptions, scheduled
//! messages, peek-lock and receive-and-delete settlement, and blocking
//! receives with a timeout. Lock expiry, dead-lettering and sessions are
//! not modelled.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sbc_bus::{
    BusClient, BusError, DEFAULT_MAX_WAIT, MessageReceiver, MessageSender, ReceiveMode,
    ReceiverOptions, SenderOptions, subscription_path,
};
use sbc_core::{OutgoingMessage, ReceivedMessage};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Entry {
    message: ReceivedMessage,
    visible_at: DateTime<Utc>,
    lock: Option<Uuid>,
}

/// Messages of one queue or subscription, keyed by sequence number.
#[derive(Debug, Default)]
struct Store {
    entries: BTreeMap<i64, Entry>,
    notify: Arc<Notify>,
}

impl Store {
    fn insert(&mut self, entry: Entry) {
        self.entries.insert(entry.message.sequence_number, entry);
    }

    /// Hand out up to `max` visible, unlocked messages. Also returns when the
    /// next scheduled message becomes visible, if any.
    fn take(
        &mut self,
        max: usize,
        mode: ReceiveMode,
        now: DateTime<Utc>,
    ) -> (Vec<ReceivedMessage>, Option<DateTime<Utc>>) {
        let ready: Vec<i64> = self
            .entries
            .iter()
            .filter(|(_, e)| e.visible_at <= now && e.lock.is_none())
            .map(|(seq, _)| *seq)
            .take(max)
            .collect();

        let mut out = Vec::with_capacity(ready.len());
        for seq in ready {
            match mode {
                ReceiveMode::ReceiveAndDelete => {
                    if let Some(mut entry) = self.entries.remove(&seq) {
                        entry.message.delivery_count += 1;
                        out.push(entry.message);
                    }
                }
                ReceiveMode::PeekLock => {
                    if let Some(entry) = self.entries.get_mut(&seq) {
                        let token = Uuid::new_v4();
                        entry.lock = Some(token);
                        entry.message.delivery_count += 1;
                        let mut message = entry.message.clone();
                        message.lock_token = Some(token);
                        out.push(message);
                    }
                }
            }
        }

        let next_visible = self
            .entries
            .values()
            .filter(|e| e.visible_at > now)
            .map(|e| e.visible_at)
            .min();
        (out, next_visible)
    }

    fn peek(&self, from: i64, max: usize, now: DateTime<Utc>) -> Vec<ReceivedMessage> {
        self.entries
            .range(from..)
            .map(|(_, e)| e)
            .filter(|e| e.visible_at <= now)
            .take(max)
            .map(|e| e.message.clone())
            .collect()
    }

    fn complete(&mut self, sequence_number: i64, token: Uuid) -> bool {
        let locked = self
            .entries
            .get(&sequence_number)
            .is_some_and(|e| e.lock == Some(token));
        if locked {
            self.entries.remove(&sequence_number);
        }
        locked
    }

    fn cancel(&mut self, sequence_number: i64, now: DateTime<Utc>) -> bool {
        let pending = self.entries.get(&sequence_number).is_some_and(|e| {
            e.message.scheduled_enqueue_time.is_some() && e.visible_at > now
        });
        if pending {
            self.entries.remove(&sequence_number);
        }
        pending
    }
}

#[derive(Debug, Default)]
struct Queue {
    last_sequence: i64,
    store: Store,
}

#[derive(Debug, Default)]
struct Topic {
    last_sequence: i64,
    subscriptions: BTreeMap<String, Store>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Address {
    Queue(String),
    Subscription { topic: String, name: String },
}

impl Address {
    fn path(&self) -> String {
        match self {
            Self::Queue(name) => name.clone(),
            Self::Subscription { topic, name } => subscription_path(topic, name),
        }
    }
}

#[derive(Debug, Default)]
struct State {
    queues: BTreeMap<String, Queue>,
    topics: BTreeMap<String, Topic>,
}

impl State {
    fn store(&mut self, address: &Address) -> Result<&mut Store, BusError> {
        let store = match address {
            Address::Queue(name) => self.queues.get_mut(name).map(|q| &mut q.store),
            Address::Subscription { topic, name } => self
                .topics
                .get_mut(topic)
                .and_then(|t| t.subscriptions.get_mut(name)),
        };
        store.ok_or_else(|| BusError::EntityNotFound(address.path()))
    }

    fn enqueue(
        &mut self,
        path: &str,
        messages: Vec<OutgoingMessage>,
        scheduled: Option<DateTime<Utc>>,
    ) -> Result<Vec<i64>, BusError> {
        let now = Utc::now();
        let visible_at = scheduled.unwrap_or(now);
        let entry = |message: OutgoingMessage, sequence_number: i64| {
            let mut message = ReceivedMessage::enqueued(message, sequence_number, visible_at);
            message.scheduled_enqueue_time = scheduled;
            Entry {
                message,
                visible_at,
                lock: None,
            }
        };

        let mut sequence_numbers = Vec::with_capacity(messages.len());
        if let Some(queue) = self.queues.get_mut(path) {
            for message in messages {
                queue.last_sequence += 1;
                queue.store.insert(entry(message, queue.last_sequence));
                sequence_numbers.push(queue.last_sequence);
            }
            queue.store.notify.notify_waiters();
        } else if let Some(topic) = self.topics.get_mut(path) {
            for message in messages {
                topic.last_sequence += 1;
                for store in topic.subscriptions.values_mut() {
                    store.insert(entry(message.clone(), topic.last_sequence));
                }
                sequence_numbers.push(topic.last_sequence);
            }
            for store in topic.subscriptions.values() {
                store.notify.notify_waiters();
            }
        } else {
            return Err(BusError::EntityNotFound(path.to_string()));
        }
        Ok(sequence_numbers)
    }

    fn cancel(&mut self, path: &str, sequence_numbers: &[i64]) -> Result<(), BusError> {
        let now = Utc::now();
        let mut stores: Vec<&mut Store> = if let Some(queue) = self.queues.get_mut(path) {
            vec![&mut queue.store]
        } else if let Some(topic) = self.topics.get_mut(path) {
            topic.subscriptions.values_mut().collect()
        } else {
            return Err(BusError::EntityNotFound(path.to_string()));
        };

        for &seq in sequence_numbers {
            let mut found = false;
            for store in stores.iter_mut() {
                found |= store.cancel(seq, now);
            }
            // A topic without subscriptions keeps nothing to cancel.
            if !found && !stores.is_empty() {
                return Err(BusError::InvalidArgument(format!(
                    "no pending scheduled message with sequence number {seq} on '{path}'"
                )));
            }
        }
        Ok(())
    }

    fn notify_all(&self) {
        for queue in self.queues.values() {
            queue.store.notify.notify_waiters();
        }
        for store in self.topics.values().flat_map(|t| t.subscriptions.values()) {
            store.notify.notify_waiters();
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryBus
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<State>,
    closed: AtomicBool,
}

/// A process-local message bus.
///
/// Cloning is cheap; every clone talks to the same entities. Entities must
/// be created with [`create_queue`](Self::create_queue),
/// [`create_topic`](Self::create_topic) and
/// [`create_subscription`](Self::create_subscription) before use; senders
/// and receivers for unknown entities are created lazily and fail with
/// [`BusError::EntityNotFound`] on first use.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBus {
    shared: Arc<Shared>,
}

impl InMemoryBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed("in-memory bus".into()));
        }
        Ok(())
    }

    fn with_store<T>(
        &self,
        address: &Address,
        f: impl FnOnce(&mut Store) -> T,
    ) -> Result<T, BusError> {
        let mut state = self.state();
        state.store(address).map(f)
    }

    /// Create a queue. Creating an existing queue is a no-op.
    pub fn create_queue(&self, name: &str) -> Result<(), BusError> {
        validate_name(name)?;
        let mut state = self.state();
        if state.topics.contains_key(name) {
            return Err(BusError::InvalidArgument(format!(
                "'{name}' already exists as a topic"
            )));
        }
        state.queues.entry(name.to_string()).or_default();
        info!(target: "sbc.memory", queue = name, "queue created");
        Ok(())
    }

    /// Create a topic. Creating an existing topic is a no-op.
    pub fn create_topic(&self, name: &str) -> Result<(), BusError> {
        validate_name(name)?;
        let mut state = self.state();
        if state.queues.contains_key(name) {
            return Err(BusError::InvalidArgument(format!(
                "'{name}' already exists as a queue"
            )));
        }
        state.topics.entry(name.to_string()).or_default();
        info!(target: "sbc.memory", topic = name, "topic created");
        Ok(())
    }

    /// Create a subscription on an existing topic. Messages sent to the
    /// topic before the subscription existed are not delivered to it.
    pub fn create_subscription(&self, topic: &str, name: &str) -> Result<(), BusError> {
        validate_name(name)?;
        let mut state = self.state();
        let entry = state
            .topics
            .get_mut(topic)
            .ok_or_else(|| BusError::EntityNotFound(topic.to_string()))?;
        entry.subscriptions.entry(name.to_string()).or_default();
        info!(target: "sbc.memory", topic, subscription = name, "subscription created");
        Ok(())
    }

    /// Number of messages held by a queue, including locked and scheduled
    /// ones.
    pub fn queue_message_count(&self, queue: &str) -> Result<usize, BusError> {
        self.with_store(&Address::Queue(queue.to_string()), |s| s.entries.len())
    }

    /// Number of messages held by a subscription, including locked and
    /// scheduled ones.
    pub fn subscription_message_count(
        &self,
        topic: &str,
        subscription: &str,
    ) -> Result<usize, BusError> {
        let address = Address::Subscription {
            topic: topic.to_string(),
            name: subscription.to_string(),
        };
        self.with_store(&address, |s| s.entries.len())
    }

    fn receiver(&self, address: Address, options: ReceiverOptions) -> Result<MemoryReceiver, BusError> {
        self.ensure_open()?;
        Ok(MemoryReceiver {
            bus: self.clone(),
            path: address.path(),
            address,
            options,
            cursor: AtomicI64::new(0),
            closed: AtomicBool::new(false),
        })
    }
}

fn validate_name(name: &str) -> Result<(), BusError> {
    if name.trim().is_empty() {
        return Err(BusError::InvalidArgument(
            "entity name must not be empty".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl BusClient for InMemoryBus {
    type Sender = MemorySender;
    type Receiver = MemoryReceiver;

    fn create_sender_with_options(
        &self,
        queue_or_topic: &str,
        options: SenderOptions,
    ) -> Result<MemorySender, BusError> {
        self.ensure_open()?;
        Ok(MemorySender {
            bus: self.clone(),
            path: queue_or_topic.to_string(),
            options,
            closed: AtomicBool::new(false),
        })
    }

    fn create_receiver_with_options(
        &self,
        queue: &str,
        options: ReceiverOptions,
    ) -> Result<MemoryReceiver, BusError> {
        self.receiver(Address::Queue(queue.to_string()), options)
    }

    fn create_subscription_receiver_with_options(
        &self,
        topic: &str,
        subscription: &str,
        options: ReceiverOptions,
    ) -> Result<MemoryReceiver, BusError> {
        let address = Address::Subscription {
            topic: topic.to_string(),
            name: subscription.to_string(),
        };
        self.receiver(address, options)
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> Result<(), BusError> {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            self.state().notify_all();
            info!(target: "sbc.memory", "bus closed");
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySender
// ---------------------------------------------------------------------------

/// Sender handed out by [`InMemoryBus`].
#[derive(Debug)]
pub struct MemorySender {
    bus: InMemoryBus,
    path: String,
    options: SenderOptions,
    closed: AtomicBool,
}

impl MemorySender {
    /// Options the sender was created with.
    pub fn options(&self) -> &SenderOptions {
        &self.options
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed(self.path.clone()));
        }
        self.bus.ensure_open()
    }

    fn enqueue(
        &self,
        messages: Vec<OutgoingMessage>,
        scheduled: Option<DateTime<Utc>>,
    ) -> Result<Vec<i64>, BusError> {
        self.ensure_open()?;
        let count = messages.len();
        let sequence_numbers = self.bus.state().enqueue(&self.path, messages, scheduled)?;
        debug!(
            target: "sbc.memory",
            entity = %self.path,
            count,
            scheduled = scheduled.is_some(),
            "messages enqueued"
        );
        Ok(sequence_numbers)
    }
}

#[async_trait]
impl MessageSender for MemorySender {
    fn entity_path(&self) -> &str {
        &self.path
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.bus.is_closed()
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<(), BusError> {
        self.enqueue(vec![message], None).map(|_| ())
    }

    async fn send_messages(&self, messages: Vec<OutgoingMessage>) -> Result<(), BusError> {
        self.enqueue(messages, None).map(|_| ())
    }

    async fn schedule_message(
        &self,
        message: OutgoingMessage,
        enqueue_time: DateTime<Utc>,
    ) -> Result<i64, BusError> {
        self.enqueue(vec![message], Some(enqueue_time))?
            .pop()
            .ok_or_else(|| BusError::Transport("no sequence number assigned".into()))
    }

    async fn schedule_messages(
        &self,
        messages: Vec<OutgoingMessage>,
        enqueue_time: DateTime<Utc>,
    ) -> Result<Vec<i64>, BusError> {
        self.enqueue(messages, Some(enqueue_time))
    }

    async fn cancel_scheduled_message(&self, sequence_number: i64) -> Result<(), BusError> {
        self.cancel_scheduled_messages(&[sequence_number]).await
    }

    async fn cancel_scheduled_messages(&self, sequence_numbers: &[i64]) -> Result<(), BusError> {
        self.ensure_open()?;
        self.bus.state().cancel(&self.path, sequence_numbers)
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryReceiver
// ---------------------------------------------------------------------------

/// Receiver handed out by [`InMemoryBus`].
#[derive(Debug)]
pub struct MemoryReceiver {
    bus: InMemoryBus,
    address: Address,
    path: String,
    options: ReceiverOptions,
    cursor: AtomicI64,
    closed: AtomicBool,
}

impl MemoryReceiver {
    /// Options the receiver was created with.
    pub fn options(&self) -> &ReceiverOptions {
        &self.options
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed(self.path.clone()));
        }
        self.bus.ensure_open()
    }
}

fn ensure_batch_size(max_messages: usize) -> Result<(), BusError> {
    if max_messages == 0 {
        return Err(BusError::InvalidArgument(
            "max_messages must be at least 1".into(),
        ));
    }
    Ok(())
}

#[async_trait]
impl MessageReceiver for MemoryReceiver {
    fn entity_path(&self) -> &str {
        &self.path
    }

    fn receive_mode(&self) -> ReceiveMode {
        self.options.receive_mode
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.bus.is_closed()
    }

    async fn receive_message(
        &self,
        max_wait: Option<Duration>,
    ) -> Result<Option<ReceivedMessage>, BusError> {
        Ok(self.receive_messages(1, max_wait).await?.into_iter().next())
    }

    async fn receive_messages(
        &self,
        max_messages: usize,
        max_wait: Option<Duration>,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        self.ensure_open()?;
        ensure_batch_size(max_messages)?;
        // A wait too long to represent never expires.
        let deadline = Instant::now().checked_add(max_wait.unwrap_or(DEFAULT_MAX_WAIT));
        let notify = self
            .bus
            .with_store(&self.address, |s| Arc::clone(&s.notify))?;
        let mode = self.options.receive_mode;

        loop {
            // Register interest before looking, so a send between the look
            // and the wait is not missed.
            let mut notified = std::pin::pin!(notify.notified());
            notified.as_mut().enable();

            let (batch, next_visible) = self
                .bus
                .with_store(&self.address, |s| s.take(max_messages, mode, Utc::now()))?;
            if !batch.is_empty() {
                debug!(
                    target: "sbc.memory",
                    entity = %self.path,
                    count = batch.len(),
                    "messages received"
                );
                return Ok(batch);
            }

            let now = Instant::now();
            let mut wait = match deadline {
                Some(deadline) if now >= deadline => return Ok(Vec::new()),
                Some(deadline) => Some(deadline - now),
                None => None,
            };
            if let Some(at) = next_visible {
                let until_visible = (at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                wait = Some(wait.map_or(until_visible, |w| w.min(until_visible)));
            }
            match wait {
                Some(wait) => {
                    let _ = tokio::time::timeout(wait, notified).await;
                }
                None => notified.await,
            }
            self.ensure_open()?;
        }
    }

    async fn peek_message(
        &self,
        from_sequence_number: Option<i64>,
    ) -> Result<Option<ReceivedMessage>, BusError> {
        Ok(self
            .peek_messages(1, from_sequence_number)
            .await?
            .into_iter()
            .next())
    }

    async fn peek_messages(
        &self,
        max_messages: usize,
        from_sequence_number: Option<i64>,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        self.ensure_open()?;
        ensure_batch_size(max_messages)?;
        let from = from_sequence_number.unwrap_or_else(|| self.cursor.load(Ordering::SeqCst) + 1);
        let batch = self
            .bus
            .with_store(&self.address, |s| s.peek(from, max_messages, Utc::now()))?;
        if let Some(last) = batch.last() {
            self.cursor.store(last.sequence_number, Ordering::SeqCst);
        }
        Ok(batch)
    }

    async fn complete_message(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        self.ensure_open()?;
        if self.options.receive_mode == ReceiveMode::ReceiveAndDelete {
            return Err(BusError::InvalidArgument(
                "messages received in receive-and-delete mode cannot be settled".into(),
            ));
        }
        let token = message.lock_token.ok_or_else(|| {
            BusError::InvalidArgument("message carries no lock token".into())
        })?;
        let sequence_number = message.sequence_number;
        let completed = self
            .bus
            .with_store(&self.address, |s| s.complete(sequence_number, token))?;
        if !completed {
            return Err(BusError::InvalidArgument(format!(
                "lock on message {sequence_number} was lost or the message is already settled"
            )));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
