// SPDX-License-Identifier: MIT OR Apache-2.0

//! Broker semantics of the in-memory bus.

use chrono::Utc;
use sbc_bus::{
    BusClient, BusError, MessageReceiver, MessageSender, ReceiveMode, ReceiverOptions,
};
use sbc_bus_memory::InMemoryBus;
use sbc_core::OutgoingMessage;
use std::time::Duration;

const SHORT: Option<Duration> = Some(Duration::from_millis(20));

fn bus_with_queue(name: &str) -> InMemoryBus {
    let bus = InMemoryBus::new();
    bus.create_queue(name).unwrap();
    bus
}

fn receive_and_delete() -> ReceiverOptions {
    ReceiverOptions::default().with_receive_mode(ReceiveMode::ReceiveAndDelete)
}

#[tokio::test]
async fn receive_and_delete_removes_messages() {
    let bus = bus_with_queue("orders");
    let sender = bus.create_sender("orders").unwrap();
    let receiver = bus
        .create_receiver_with_options("orders", receive_and_delete())
        .unwrap();

    sender.send_message(OutgoingMessage::new("one")).await.unwrap();
    sender.send_message(OutgoingMessage::new("two")).await.unwrap();

    let batch = receiver.receive_messages(10, SHORT).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch[0].body_str(), Some("one"));
    assert_eq!(batch[0].sequence_number, 1);
    assert_eq!(batch[1].sequence_number, 2);
    assert_eq!(batch[0].delivery_count, 1);
    assert!(batch[0].lock_token.is_none());
    assert_eq!(bus.queue_message_count("orders").unwrap(), 0);
}

#[tokio::test]
async fn peek_lock_holds_message_until_completed() {
    let bus = bus_with_queue("orders");
    let sender = bus.create_sender("orders").unwrap();
    let receiver = bus.create_receiver("orders").unwrap();
    sender.send_message(OutgoingMessage::new("job")).await.unwrap();

    let msg = receiver.receive_message(SHORT).await.unwrap().unwrap();
    assert!(msg.lock_token.is_some());
    assert!(receiver.receive_message(SHORT).await.unwrap().is_none());
    assert_eq!(bus.queue_message_count("orders").unwrap(), 1);

    receiver.complete_message(&msg).await.unwrap();
    assert_eq!(bus.queue_message_count("orders").unwrap(), 0);

    let again = receiver.complete_message(&msg).await.unwrap_err();
    assert!(matches!(again, BusError::InvalidArgument(_)));
}

#[tokio::test]
async fn receive_and_delete_messages_cannot_be_completed() {
    let bus = bus_with_queue("orders");
    bus.create_sender("orders")
        .unwrap()
        .send_message(OutgoingMessage::new("x"))
        .await
        .unwrap();
    let receiver = bus
        .create_receiver_with_options("orders", receive_and_delete())
        .unwrap();
    let msg = receiver.receive_message(SHORT).await.unwrap().unwrap();
    assert!(matches!(
        receiver.complete_message(&msg).await,
        Err(BusError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn receive_times_out_empty() {
    let bus = bus_with_queue("orders");
    let receiver = bus.create_receiver("orders").unwrap();
    let started = std::time::Instant::now();
    let batch = receiver
        .receive_messages(5, Some(Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(batch.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(50));
}

#[tokio::test]
async fn blocked_receiver_wakes_on_send() {
    let bus = bus_with_queue("orders");
    let receiver = bus.create_receiver("orders").unwrap();
    let waiter =
        tokio::spawn(async move { receiver.receive_message(Some(Duration::from_secs(10))).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.create_sender("orders")
        .unwrap()
        .send_message(OutgoingMessage::new("late"))
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("receiver did not wake")
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(msg.body_str(), Some("late"));
}

#[tokio::test]
async fn unbounded_wait_returns_a_waiting_message() {
    let bus = bus_with_queue("orders");
    bus.create_sender("orders")
        .unwrap()
        .send_message(OutgoingMessage::new("ready"))
        .await
        .unwrap();
    let receiver = bus.create_receiver("orders").unwrap();
    let msg = receiver
        .receive_message(Some(Duration::MAX))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.body_str(), Some("ready"));
}

#[tokio::test]
async fn unbounded_wait_wakes_on_send() {
    let bus = bus_with_queue("orders");
    let receiver = bus.create_receiver("orders").unwrap();
    let waiter = tokio::spawn(async move { receiver.receive_message(Some(Duration::MAX)).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.create_sender("orders")
        .unwrap()
        .send_message(OutgoingMessage::new("late"))
        .await
        .unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("receiver did not wake")
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(msg.body_str(), Some("late"));
}

#[tokio::test]
async fn topic_fans_out_to_every_subscription() {
    let bus = InMemoryBus::new();
    bus.create_topic("events").unwrap();
    bus.create_subscription("events", "audit").unwrap();
    bus.create_subscription("events", "billing").unwrap();

    let sender = bus.create_sender("events").unwrap();
    sender
        .send_messages(vec![OutgoingMessage::new("a"), OutgoingMessage::new("b")])
        .await
        .unwrap();

    for name in ["audit", "billing"] {
        let receiver = bus
            .create_subscription_receiver_with_options("events", name, receive_and_delete())
            .unwrap();
        assert_eq!(receiver.entity_path(), format!("events/subscriptions/{name}"));
        let batch = receiver.receive_messages(10, SHORT).await.unwrap();
        let bodies: Vec<_> = batch.iter().filter_map(|m| m.body_str()).collect();
        assert_eq!(bodies, ["a", "b"]);
        assert_eq!(bus.subscription_message_count("events", name).unwrap(), 0);
    }
}

#[tokio::test]
async fn scheduled_message_becomes_visible_later() {
    let bus = bus_with_queue("orders");
    let sender = bus.create_sender("orders").unwrap();
    let receiver = bus
        .create_receiver_with_options("orders", receive_and_delete())
        .unwrap();
    let at = Utc::now() + chrono::Duration::milliseconds(80);
    let seq = sender
        .schedule_message(OutgoingMessage::new("later"), at)
        .await
        .unwrap();

    assert!(receiver.receive_message(Some(Duration::ZERO)).await.unwrap().is_none());
    assert!(receiver.peek_message(None).await.unwrap().is_none());

    let msg = receiver
        .receive_message(Some(Duration::from_secs(5)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(msg.sequence_number, seq);
    assert_eq!(msg.scheduled_enqueue_time, Some(at));
}

#[tokio::test]
async fn cancelled_schedule_never_arrives() {
    let bus = bus_with_queue("orders");
    let sender = bus.create_sender("orders").unwrap();
    let at = Utc::now() + chrono::Duration::hours(1);
    let seqs = sender
        .schedule_messages(vec![OutgoingMessage::new("a"), OutgoingMessage::new("b")], at)
        .await
        .unwrap();
    assert_eq!(seqs, vec![1, 2]);

    sender.cancel_scheduled_messages(&seqs).await.unwrap();
    assert_eq!(bus.queue_message_count("orders").unwrap(), 0);
    assert!(matches!(
        sender.cancel_scheduled_message(1).await,
        Err(BusError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn peek_cursor_advances_and_does_not_consume() {
    let bus = bus_with_queue("orders");
    let sender = bus.create_sender("orders").unwrap();
    for body in ["1", "2", "3"] {
        sender.send_message(OutgoingMessage::new(body)).await.unwrap();
    }
    let receiver = bus.create_receiver("orders").unwrap();

    assert_eq!(receiver.peek_message(None).await.unwrap().unwrap().sequence_number, 1);
    let rest = receiver.peek_messages(10, None).await.unwrap();
    assert_eq!(
        rest.iter().map(|m| m.sequence_number).collect::<Vec<_>>(),
        vec![2, 3]
    );
    assert!(receiver.peek_message(None).await.unwrap().is_none());

    let from_start = receiver.peek_messages(2, Some(1)).await.unwrap();
    assert_eq!(from_start.len(), 2);
    assert!(from_start.iter().all(|m| m.lock_token.is_none() && m.delivery_count == 0));
    assert_eq!(bus.queue_message_count("orders").unwrap(), 3);
}

#[tokio::test]
async fn closed_sender_and_bus_refuse_work() {
    let bus = bus_with_queue("orders");
    let sender = bus.create_sender("orders").unwrap();
    sender.close().await.unwrap();
    assert!(sender.is_closed());
    assert!(matches!(
        sender.send_message(OutgoingMessage::new("x")).await,
        Err(BusError::Closed(_))
    ));

    let receiver = bus.create_receiver("orders").unwrap();
    bus.close().await.unwrap();
    assert!(bus.is_closed());
    assert!(receiver.is_closed());
    assert!(matches!(
        receiver.receive_message(SHORT).await,
        Err(BusError::Closed(_))
    ));
    assert!(matches!(bus.create_sender("orders"), Err(BusError::Closed(_))));
}

#[tokio::test]
async fn closing_the_bus_wakes_blocked_receivers() {
    let bus = bus_with_queue("orders");
    let receiver = bus.create_receiver("orders").unwrap();
    let waiter =
        tokio::spawn(async move { receiver.receive_message(Some(Duration::from_secs(30))).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    bus.close().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .expect("receiver did not wake")
        .unwrap();
    assert!(matches!(result, Err(BusError::Closed(_))));
}
