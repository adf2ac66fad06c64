use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;

/// One record read from a topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub topic: String,
    pub key: Option<String>,
    pub value: Option<Bytes>,
    /// Transport sequence used to ack/nak the record
    pub sequence: Option<u64>,
}

impl Record {
    pub fn new(topic: impl Into<String>, key: Option<String>, value: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            key,
            value: Some(value.into()),
            sequence: None,
        }
    }
}

/// Narrow publish capability handed to the relay.
///
/// Implementations are shared across every invocation and must be safe for
/// concurrent use.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one record. Returns once the log client accepted it.
    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        value: Bytes,
    ) -> Result<(), TransportError>;
}

/// Subscription handle for receiving records
#[async_trait]
pub trait Subscription: Send {
    /// Receive the next record. `None` once the subscription is closed.
    async fn next(&mut self) -> Result<Option<Record>, TransportError>;

    /// Acknowledge a processed record
    async fn ack(&mut self, sequence: u64) -> Result<(), TransportError>;

    /// Reject a record so the log client redelivers it
    async fn nak(&mut self, sequence: u64) -> Result<(), TransportError>;
}

/// Transport abstraction for the event log
#[async_trait]
pub trait Transport: Publisher {
    /// Subscribe to a topic as a member of a consumer group
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn Subscription>, TransportError>;
}
