//! Integration tests for NATS transport
//!
//! Run with: cargo test -p reverser-middleware --test nats_integration -- --ignored
//! Requires: docker run -p 4222:4222 nats:latest -js

use bytes::Bytes;
use reverser_middleware::{NatsTransport, Publisher, Transport};

#[tokio::test]
#[ignore]
async fn test_jetstream_keyed_roundtrip() {
    let transport = NatsTransport::connect("nats://localhost:4222")
        .await
        .expect("Failed to connect to NATS");

    transport
        .ensure_stream("REVERSER_IT", vec!["reverser.it.>".to_string()])
        .await
        .expect("Failed to create stream");

    let mut sub = transport
        .subscribe("reverser.it.keyed", "reverser-it")
        .await
        .expect("Failed to subscribe");

    transport
        .publish("reverser.it.keyed", Some("a"), Bytes::from("hello"))
        .await
        .expect("Failed to publish");

    let record = sub
        .next()
        .await
        .expect("Failed to receive")
        .expect("Subscription closed");
    assert_eq!(record.key.as_deref(), Some("a"));
    assert_eq!(record.value, Some(Bytes::from("hello")));

    sub.ack(record.sequence.expect("JetStream records carry a sequence"))
        .await
        .expect("Failed to ack");
}

#[tokio::test]
#[ignore]
async fn test_jetstream_unkeyed_record_has_no_key() {
    let transport = NatsTransport::connect("nats://localhost:4222")
        .await
        .expect("Failed to connect to NATS");

    transport
        .ensure_stream("REVERSER_IT", vec!["reverser.it.>".to_string()])
        .await
        .expect("Failed to create stream");

    let mut sub = transport
        .subscribe("reverser.it.unkeyed", "reverser-it-unkeyed")
        .await
        .expect("Failed to subscribe");

    transport
        .publish("reverser.it.unkeyed", None, Bytes::from("racecar"))
        .await
        .expect("Failed to publish");

    let record = sub
        .next()
        .await
        .expect("Failed to receive")
        .expect("Subscription closed");
    assert_eq!(record.key, None);
    sub.ack(record.sequence.unwrap()).await.expect("Failed to ack");
}

#[tokio::test]
#[ignore]
async fn test_jetstream_nak_redelivers_before_next_record() {
    let transport = NatsTransport::connect("nats://localhost:4222")
        .await
        .expect("Failed to connect to NATS");

    transport
        .ensure_stream("REVERSER_IT", vec!["reverser.it.>".to_string()])
        .await
        .expect("Failed to create stream");

    // Fresh subject and consumer per run so earlier runs' records don't interfere
    let run = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let topic = format!("reverser.it.nak.{}", run);
    let group = format!("reverser-it-nak-{}", run);

    let mut sub = transport.subscribe(&topic, &group).await.expect("Failed to subscribe");

    for value in ["first", "second"] {
        transport
            .publish(&topic, None, Bytes::from(value))
            .await
            .expect("Failed to publish");
    }

    let first = sub.next().await.unwrap().expect("Subscription closed");
    assert_eq!(first.value, Some(Bytes::from("first")));
    sub.nak(first.sequence.unwrap()).await.expect("Failed to nak");

    let redelivered = sub.next().await.unwrap().expect("Subscription closed");
    assert_eq!(redelivered.value, Some(Bytes::from("first")));
    assert_eq!(redelivered.sequence, first.sequence);
    sub.ack(redelivered.sequence.unwrap()).await.expect("Failed to ack");

    let second = sub.next().await.unwrap().expect("Subscription closed");
    assert_eq!(second.value, Some(Bytes::from("second")));
    sub.ack(second.sequence.unwrap()).await.expect("Failed to ack");
}
