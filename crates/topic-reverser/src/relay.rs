//! Relay: inbound record → Message → Reverser → outbound publish

use std::sync::Arc;

use bytes::Bytes;
use reverser_middleware::{Publisher, Record};

use crate::{Error, Message, Result, Reverser, Transform};

/// Settings the relay needs at construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub producer_topic: String,
}

impl RelayConfig {
    pub fn new(producer_topic: impl Into<String>) -> Result<Self> {
        let producer_topic = producer_topic.into();
        if producer_topic.trim().is_empty() {
            return Err(Error::Config("producer topic must not be empty".into()));
        }
        Ok(Self { producer_topic })
    }
}

/// Applies a transform (the reverser by default) to each inbound record and
/// publishes the result.
///
/// Holds no per-record state, so one instance can serve concurrent callers.
/// Every failure goes back to the caller; nothing is retried here.
pub struct Relay {
    config: RelayConfig,
    transformer: Arc<dyn Transform>,
    publisher: Arc<dyn Publisher>,
}

impl Relay {
    pub fn new(config: RelayConfig, publisher: Arc<dyn Publisher>) -> Self {
        Self::with_transform(config, Arc::new(Reverser), publisher)
    }

    pub fn with_transform(
        config: RelayConfig,
        transformer: Arc<dyn Transform>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            config,
            transformer,
            publisher,
        }
    }

    pub fn producer_topic(&self) -> &str {
        &self.config.producer_topic
    }

    /// Relay one inbound record: exactly one publish on success.
    pub async fn consume(&self, record: Record) -> Result<()> {
        let source = record.topic.clone();
        let message = Message::try_from(record)?;
        let (key, value) = self.transformer.apply(&message)?.into_parts();
        let value = value.ok_or_else(|| Error::InvalidInput("transform produced no value".into()))?;

        self.publisher
            .publish(&self.config.producer_topic, key.as_deref(), Bytes::from(value))
            .await
            .map_err(Error::PublishFailure)?;

        tracing::debug!(
            from = %source,
            to = %self.config.producer_topic,
            key = ?key,
            "Relayed record"
        );
        Ok(())
    }
}
