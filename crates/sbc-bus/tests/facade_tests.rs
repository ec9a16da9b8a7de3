// SPDX-License-Identifier: MIT OR Apache-2.0

//! Facade behaviour against hand-rolled recording senders and receivers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sbc_bus::*;
use sbc_compress::{CompressionConfiguration, ConfigurationError, headers};
use sbc_core::{CompressionError, OutgoingMessage, ReceivedMessage};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Fakes ───────────────────────────────────────────────────────────

/// Everything that reached the fake broker.
#[derive(Debug, Default)]
struct Wire {
    messages: Mutex<VecDeque<ReceivedMessage>>,
    scheduled: Mutex<Vec<(i64, DateTime<Utc>)>>,
    cancelled: Mutex<Vec<i64>>,
    next_seq: AtomicI64,
}

impl Wire {
    fn push(&self, message: OutgoingMessage) -> i64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.messages
            .lock()
            .unwrap()
            .push_back(ReceivedMessage::enqueued(message, seq, Utc::now()));
        seq
    }

    fn inject(&self, message: ReceivedMessage) {
        self.messages.lock().unwrap().push_back(message);
    }

    fn snapshot(&self) -> Vec<ReceivedMessage> {
        self.messages.lock().unwrap().iter().cloned().collect()
    }
}

#[derive(Debug)]
struct FakeSender {
    path: String,
    wire: Arc<Wire>,
    closed: AtomicBool,
}

#[async_trait]
impl MessageSender for FakeSender {
    fn entity_path(&self) -> &str {
        &self.path
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn send_message(&self, message: OutgoingMessage) -> Result<(), BusError> {
        self.wire.push(message);
        Ok(())
    }

    async fn send_messages(&self, messages: Vec<OutgoingMessage>) -> Result<(), BusError> {
        for m in messages {
            self.wire.push(m);
        }
        Ok(())
    }

    async fn schedule_message(
        &self,
        message: OutgoingMessage,
        enqueue_time: DateTime<Utc>,
    ) -> Result<i64, BusError> {
        let seq = self.wire.push(message);
        self.wire.scheduled.lock().unwrap().push((seq, enqueue_time));
        Ok(seq)
    }

    async fn schedule_messages(
        &self,
        messages: Vec<OutgoingMessage>,
        enqueue_time: DateTime<Utc>,
    ) -> Result<Vec<i64>, BusError> {
        let mut seqs = Vec::new();
        for m in messages {
            seqs.push(self.schedule_message(m, enqueue_time).await?);
        }
        Ok(seqs)
    }

    async fn cancel_scheduled_message(&self, sequence_number: i64) -> Result<(), BusError> {
        self.wire.cancelled.lock().unwrap().push(sequence_number);
        Ok(())
    }

    async fn cancel_scheduled_messages(&self, sequence_numbers: &[i64]) -> Result<(), BusError> {
        self.wire
            .cancelled
            .lock()
            .unwrap()
            .extend_from_slice(sequence_numbers);
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Debug)]
struct FakeReceiver {
    path: String,
    mode: ReceiveMode,
    wire: Arc<Wire>,
    completed: Mutex<Vec<i64>>,
}

#[async_trait]
impl MessageReceiver for FakeReceiver {
    fn entity_path(&self) -> &str {
        &self.path
    }

    fn receive_mode(&self) -> ReceiveMode {
        self.mode
    }

    fn is_closed(&self) -> bool {
        false
    }

    async fn receive_message(
        &self,
        _max_wait: Option<Duration>,
    ) -> Result<Option<ReceivedMessage>, BusError> {
        Ok(self.wire.messages.lock().unwrap().pop_front())
    }

    async fn receive_messages(
        &self,
        max_messages: usize,
        _max_wait: Option<Duration>,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        let mut q = self.wire.messages.lock().unwrap();
        let n = max_messages.min(q.len());
        Ok(q.drain(..n).collect())
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
        let from = from_sequence_number.unwrap_or(0);
        Ok(self
            .wire
            .snapshot()
            .into_iter()
            .filter(|m| m.sequence_number >= from)
            .take(max_messages)
            .collect())
    }

    async fn complete_message(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        self.completed.lock().unwrap().push(message.sequence_number);
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
struct FakeClient {
    wire: Arc<Wire>,
}

#[async_trait]
impl BusClient for FakeClient {
    type Sender = FakeSender;
    type Receiver = FakeReceiver;

    fn create_sender_with_options(
        &self,
        queue_or_topic: &str,
        _options: SenderOptions,
    ) -> Result<FakeSender, BusError> {
        Ok(FakeSender {
            path: queue_or_topic.to_string(),
            wire: Arc::clone(&self.wire),
            closed: AtomicBool::new(false),
        })
    }

    fn create_receiver_with_options(
        &self,
        queue: &str,
        options: ReceiverOptions,
    ) -> Result<FakeReceiver, BusError> {
        Ok(FakeReceiver {
            path: queue.to_string(),
            mode: options.receive_mode,
            wire: Arc::clone(&self.wire),
            completed: Mutex::new(Vec::new()),
        })
    }

    fn create_subscription_receiver_with_options(
        &self,
        topic: &str,
        subscription: &str,
        options: ReceiverOptions,
    ) -> Result<FakeReceiver, BusError> {
        self.create_receiver_with_options(&subscription_path(topic, subscription), options)
    }

    fn is_closed(&self) -> bool {
        false
    }

    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn letters(len: usize) -> Vec<u8> {
    (b'A'..=b'Z').cycle().take(len).collect()
}

fn client(threshold: usize) -> (CompressionAwareClient<FakeClient>, Arc<Wire>) {
    let inner = FakeClient::default();
    let wire = Arc::clone(&inner.wire);
    (
        CompressionAwareClient::with_threshold(inner, threshold).unwrap(),
        wire,
    )
}

fn mismatched(seq: i64) -> ReceivedMessage {
    let mut out = OutgoingMessage::new(letters(600));
    sbc_core::prepare_for_send(&mut out, &CompressionConfiguration::gzip(1).unwrap()).unwrap();
    ReceivedMessage::enqueued(out, seq, Utc::now()).with_property(headers::ORIGINAL_SIZE, 1)
}

// ── Client construction ─────────────────────────────────────────────

#[test]
fn builder_without_configuration_is_rejected() {
    let err = CompressionAwareClient::builder(FakeClient::default())
        .build()
        .unwrap_err();
    assert_eq!(err, ConfigurationError::Missing);
}

#[test]
fn builder_with_configuration_shares_it() {
    let config = Arc::new(CompressionConfiguration::zstd(64).unwrap());
    let client = CompressionAwareClient::builder(FakeClient::default())
        .configuration(Arc::clone(&config))
        .build()
        .unwrap();
    let sender = client.create_sender("orders").unwrap();
    let receiver = client.create_receiver("orders").unwrap();
    assert!(Arc::ptr_eq(sender.configuration(), &config));
    assert!(Arc::ptr_eq(receiver.configuration(), &config));
}

#[test]
fn zero_threshold_is_rejected() {
    let err = CompressionAwareClient::with_threshold(FakeClient::default(), 0).unwrap_err();
    assert_eq!(err, ConfigurationError::NonPositiveThreshold);
}

#[test]
fn subscription_receiver_keeps_inner_path_and_mode() {
    let (client, _) = client(100);
    let receiver = client
        .create_subscription_receiver_with_options(
            "orders",
            "audit",
            ReceiverOptions::default().with_receive_mode(ReceiveMode::ReceiveAndDelete),
        )
        .unwrap();
    assert_eq!(receiver.entity_path(), "orders/subscriptions/audit");
    assert_eq!(receiver.receive_mode(), ReceiveMode::ReceiveAndDelete);
}

// ── Send paths ──────────────────────────────────────────────────────

#[tokio::test]
async fn send_compresses_large_bodies_only() {
    let (client, wire) = client(256);
    let sender = client.create_sender("orders").unwrap();
    sender
        .send_message(OutgoingMessage::new(letters(512)))
        .await
        .unwrap();
    sender
        .send_message(OutgoingMessage::new(letters(128)))
        .await
        .unwrap();

    let on_wire = wire.snapshot();
    assert_eq!(on_wire[0].application_properties.len(), 3);
    assert!(on_wire[0].body.len() < 512);
    assert!(on_wire[1].application_properties.is_empty());
    assert_eq!(on_wire[1].body, letters(128));
}

#[tokio::test]
async fn batch_and_scheduled_sends_are_compressed() {
    let (client, wire) = client(100);
    let sender = client.create_sender("orders").unwrap();
    sender
        .send_messages(vec![
            OutgoingMessage::new(letters(300)),
            OutgoingMessage::new(letters(10)),
        ])
        .await
        .unwrap();
    let when = Utc::now() + chrono::Duration::minutes(5);
    let seq = sender
        .schedule_message(OutgoingMessage::new(letters(400)), when)
        .await
        .unwrap();
    let seqs = sender
        .schedule_messages(vec![OutgoingMessage::new(letters(500))], when)
        .await
        .unwrap();
    assert_eq!(seq, 3);
    assert_eq!(seqs, vec![4]);
    assert_eq!(*wire.scheduled.lock().unwrap(), vec![(3, when), (4, when)]);

    let compressed: Vec<bool> = wire
        .snapshot()
        .iter()
        .map(|m| m.application_properties.contains_key(headers::COMPRESSION_METHOD))
        .collect();
    assert_eq!(compressed, vec![true, false, true, true]);
}

#[tokio::test]
async fn cancel_and_close_are_delegated() {
    let (client, wire) = client(100);
    let sender = client.create_sender("orders").unwrap();
    sender.cancel_scheduled_message(7).await.unwrap();
    sender.cancel_scheduled_messages(&[8, 9]).await.unwrap();
    assert_eq!(*wire.cancelled.lock().unwrap(), vec![7, 8, 9]);

    sender.close().await.unwrap();
    assert!(sender.is_closed());
    assert!(sender.inner().is_closed());
}

#[tokio::test]
async fn failing_compressor_sends_nothing() {
    let config = CompressionConfiguration::builder()
        .minimum_size(1)
        .compressor_fn("broken", |_| {
            Err(sbc_compress::CodecError::Custom("boom".into()))
        })
        .build()
        .unwrap();
    let inner = FakeClient::default();
    let wire = Arc::clone(&inner.wire);
    let client = CompressionAwareClient::new(inner, Arc::new(config));
    let sender = client.create_sender("orders").unwrap();
    let err = sender
        .send_messages(vec![OutgoingMessage::new("a"), OutgoingMessage::new("b")])
        .await
        .unwrap_err();
    assert!(matches!(err, BusError::Compression(CompressionError::Codec { .. })));
    assert!(wire.snapshot().is_empty());
}

// ── Receive paths ───────────────────────────────────────────────────

#[tokio::test]
async fn all_retrieval_modes_decompress() {
    let (client, _) = client(100);
    let sender = client.create_sender("orders").unwrap();
    let receiver = client.create_receiver("orders").unwrap();
    for _ in 0..4 {
        sender
            .send_message(OutgoingMessage::new(letters(1000)))
            .await
            .unwrap();
    }

    let peeked = receiver.peek_message(None).await.unwrap().unwrap();
    assert_eq!(peeked.body, letters(1000));
    let peeked_all = receiver.peek_messages(10, Some(2)).await.unwrap();
    assert_eq!(peeked_all.len(), 3);
    assert!(peeked_all.iter().all(|m| m.body == letters(1000)));

    let one = receiver.receive_message(None).await.unwrap().unwrap();
    assert_eq!(one.body, letters(1000));
    assert!(one.is_decompressed());
    let rest = receiver.receive_messages(10, None).await.unwrap();
    assert_eq!(rest.len(), 3);
    assert!(rest.iter().all(|m| m.body == letters(1000)));
}

#[tokio::test]
async fn empty_receive_is_not_an_error() {
    let (client, _) = client(100);
    let receiver = client.create_receiver("orders").unwrap();
    assert!(receiver
        .receive_message(Some(Duration::from_millis(1)))
        .await
        .unwrap()
        .is_none());
    assert!(receiver.receive_messages(5, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn single_failure_returns_the_untouched_message() {
    let (client, wire) = client(100);
    let bad = mismatched(1);
    wire.inject(bad.clone());
    let receiver = client.create_receiver("orders").unwrap();
    let err = receiver.receive_message(None).await.unwrap_err();
    let BusError::Rejected(rejected) = err else {
        panic!("expected a rejected message, got {err:?}");
    };
    assert_eq!(*rejected.message, bad);
    assert!(matches!(rejected.error, CompressionError::SizeMismatch { .. }));
}

#[tokio::test]
async fn batch_failure_keeps_every_message() {
    let (client, wire) = client(100);
    let sender = client.create_sender("orders").unwrap();
    sender
        .send_message(OutgoingMessage::new(letters(300)))
        .await
        .unwrap();
    wire.inject(mismatched(2));
    sender
        .send_message(OutgoingMessage::new("small"))
        .await
        .unwrap();

    let receiver = client.create_receiver("orders").unwrap();
    let err = receiver.receive_messages(10, None).await.unwrap_err();
    let BusError::Batch(batch) = err else {
        panic!("expected a batch failure, got {err:?}");
    };
    assert_eq!(batch.len(), 3);
    assert_eq!(batch.processed.len(), 2);
    assert_eq!(batch.processed[0].body, letters(300));
    assert_eq!(batch.processed[1].body_str(), Some("small"));
    assert_eq!(batch.failed.len(), 1);
    assert_eq!(batch.failed[0].message.sequence_number, 2);
}

#[tokio::test]
async fn each_variants_report_per_message() {
    let (client, wire) = client(100);
    let sender = client.create_sender("orders").unwrap();
    wire.inject(mismatched(1));
    sender
        .send_message(OutgoingMessage::new(letters(300)))
        .await
        .unwrap();
    let receiver = client.create_receiver("orders").unwrap();

    let peeked = receiver.peek_messages_each(10, None).await.unwrap();
    assert_eq!(peeked.len(), 2);
    assert!(peeked[0].is_err());
    assert_eq!(peeked[1].as_ref().unwrap().body, letters(300));

    let received = receiver.receive_messages_each(10, None).await.unwrap();
    assert!(received[0].is_err());
    assert!(received[1].is_ok());
}

#[tokio::test]
async fn complete_is_delegated() {
    let (client, _) = client(100);
    let sender = client.create_sender("orders").unwrap();
    sender
        .send_message(OutgoingMessage::new(letters(300)))
        .await
        .unwrap();
    let receiver = client.create_receiver("orders").unwrap();
    let msg = receiver.receive_message(None).await.unwrap().unwrap();
    receiver.complete_message(&msg).await.unwrap();
    assert_eq!(*receiver.inner().completed.lock().unwrap(), vec![1]);
}
