//! Configuration module for topic-reverser

use clap::Parser;

use crate::{Error, RelayConfig, Result};

/// topic-reverser: republish records from one topic to another with reversed values
#[derive(Parser, Debug, Clone)]
#[command(name = "topic-reverser")]
pub struct Config {
    /// NATS server URL
    #[arg(long, env = "NATS_URL", default_value = "nats://localhost:4222")]
    pub nats_url: String,

    /// Input topic (consumer.topic)
    #[arg(long, env = "CONSUMER_TOPIC")]
    pub consumer_topic: String,

    /// Output topic (producer.topic)
    #[arg(long, env = "PRODUCER_TOPIC")]
    pub producer_topic: String,

    /// Durable consumer name shared by every relay instance
    #[arg(long, env = "CONSUMER_GROUP", default_value = "topic-reverser")]
    pub consumer_group: String,

    /// JetStream stream capturing the input topic
    #[arg(long, env = "INPUT_STREAM", default_value = "REVERSER_INPUT")]
    pub input_stream: String,

    /// JetStream stream capturing the output topic
    #[arg(long, env = "OUTPUT_STREAM", default_value = "REVERSER_OUTPUT")]
    pub output_stream: String,

    /// Create the input and output streams at startup if missing
    #[arg(long, env = "ENSURE_STREAMS", default_value_t = false)]
    pub ensure_streams: bool,

    /// Delivery attempts per record before JetStream gives up on it
    #[arg(long, env = "MAX_DELIVER", default_value_t = 10)]
    pub max_deliver: i64,

    /// Liveness/metrics listen address
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Config {
    /// Fail fast on settings the relay cannot run with
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("consumer topic", &self.consumer_topic),
            ("producer topic", &self.producer_topic),
            ("consumer group", &self.consumer_group),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }

        if self.max_deliver < 1 {
            return Err(Error::Config(format!(
                "max deliver must be positive, got {}",
                self.max_deliver
            )));
        }

        Ok(())
    }

    pub fn relay_config(&self) -> Result<RelayConfig> {
        RelayConfig::new(self.producer_topic.clone())
    }
}
