use std::collections::HashMap;

use async_nats::jetstream::{self, consumer::pull, AckKind, Context};
use async_nats::jetstream::stream::{Config, RetentionPolicy, StorageType};
use async_nats::Client;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;

use crate::error::TransportError;
use crate::transport::{Publisher, Record, Subscription, Transport};

/// Header carrying the record key. JetStream messages have no native key.
pub const KEY_HEADER: &str = "Relay-Key";

const DEFAULT_MAX_DELIVER: i64 = 10;

/// JetStream pull subscription with explicit acks
struct NatsSubscription {
    topic: String,
    messages: pull::Stream,
    in_flight: HashMap<u64, jetstream::Message>,
}

impl NatsSubscription {
    fn new(topic: &str, messages: pull::Stream) -> Self {
        Self {
            topic: topic.to_string(),
            messages,
            in_flight: HashMap::new(),
        }
    }

    fn take(&mut self, sequence: u64) -> Result<jetstream::Message, TransportError> {
        self.in_flight
            .remove(&sequence)
            .ok_or_else(|| TransportError::AckFailed(format!("unknown sequence {}", sequence)))
    }
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn next(&mut self) -> Result<Option<Record>, TransportError> {
        let Some(msg) = self.messages.next().await else {
            return Ok(None);
        };
        let msg = msg.map_err(|e| TransportError::SubscribeFailed(e.to_string()))?;

        let sequence = msg
            .info()
            .map_err(|e| TransportError::SubscribeFailed(format!("message info: {}", e)))?
            .stream_sequence;

        let key = msg
            .headers
            .as_ref()
            .and_then(|headers| headers.get(KEY_HEADER))
            .map(|value| value.as_str().to_string());

        let record = Record {
            topic: msg.subject.to_string(),
            key,
            value: Some(msg.payload.clone()),
            sequence: Some(sequence),
        };

        tracing::trace!(topic = %self.topic, sequence, "Received record");
        self.in_flight.insert(sequence, msg);
        Ok(Some(record))
    }

    async fn ack(&mut self, sequence: u64) -> Result<(), TransportError> {
        self.take(sequence)?
            .ack()
            .await
            .map_err(|e| TransportError::AckFailed(e.to_string()))
    }

    async fn nak(&mut self, sequence: u64) -> Result<(), TransportError> {
        self.take(sequence)?
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| TransportError::AckFailed(e.to_string()))
    }
}

/// NATS JetStream transport implementation
pub struct NatsTransport {
    jetstream: Context,
    max_deliver: i64,
}

impl NatsTransport {
    /// Create a new NatsTransport from an existing client
    pub fn new(client: Client) -> Self {
        Self {
            jetstream: jetstream::new(client),
            max_deliver: DEFAULT_MAX_DELIVER,
        }
    }

    /// Connect to NATS server and create transport
    pub async fn connect(url: &str) -> Result<Self, TransportError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        Ok(Self::new(client))
    }

    /// Delivery attempts before JetStream stops redelivering a nak'd record
    pub fn with_max_deliver(mut self, max_deliver: i64) -> Self {
        self.max_deliver = max_deliver;
        self
    }

    /// Create the stream capturing `subjects` unless it already exists
    pub async fn ensure_stream(
        &self,
        stream_name: &str,
        subjects: Vec<String>,
    ) -> Result<(), TransportError> {
        let config = Config {
            name: stream_name.to_string(),
            subjects,
            retention: RetentionPolicy::Limits,
            storage: StorageType::File,
            max_age: std::time::Duration::from_secs(7 * 24 * 60 * 60), // 7 days
            ..Default::default()
        };

        self.jetstream
            .get_or_create_stream(config)
            .await
            .map_err(|e| TransportError::StreamSetup(format!("{}: {}", stream_name, e)))?;

        tracing::info!(stream = %stream_name, "Stream ready");
        Ok(())
    }
}

#[async_trait]
impl Publisher for NatsTransport {
    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        value: Bytes,
    ) -> Result<(), TransportError> {
        let ack = match key {
            Some(key) => {
                let mut headers = async_nats::HeaderMap::new();
                headers.insert(KEY_HEADER, key);
                self.jetstream
                    .publish_with_headers(topic.to_string(), headers, value)
                    .await
            }
            None => self.jetstream.publish(topic.to_string(), value).await,
        }
        .map_err(|e| TransportError::PublishFailed(e.to_string()))?;

        ack.await
            .map_err(|e| TransportError::PublishFailed(format!("publish ack: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl Transport for NatsTransport {
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        let stream_name = self
            .jetstream
            .stream_by_subject(topic.to_string())
            .await
            .map_err(|e| TransportError::SubscribeFailed(format!("no stream for {}: {}", topic, e)))?;

        let consumer = self
            .jetstream
            .get_stream(&stream_name)
            .await
            .map_err(|e| TransportError::SubscribeFailed(format!("get stream {}: {}", stream_name, e)))?
            .get_or_create_consumer(
                group,
                pull::Config {
                    durable_name: Some(group.to_string()),
                    filter_subject: topic.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    max_deliver: self.max_deliver,
                    // One unacked record at a time: a nak'd record is
                    // redelivered before anything after it
                    max_ack_pending: 1,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| TransportError::SubscribeFailed(format!("create consumer {}: {}", group, e)))?;

        let messages = consumer
            .messages()
            .await
            .map_err(|e| TransportError::SubscribeFailed(e.to_string()))?;

        tracing::info!(
            stream = %stream_name,
            consumer = %group,
            topic,
            "Subscribed to JetStream"
        );
        Ok(Box::new(NatsSubscription::new(topic, messages)))
    }
}
