use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

use crate::Result;

pub struct Metrics {
    pub registry: Registry,
    pub records_received: IntCounter,
    pub records_published: IntCounter,
    pub errors: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let records_received = IntCounter::new(
            "relay_records_received_total",
            "Records delivered from the input topic",
        )?;

        let records_published = IntCounter::new(
            "relay_records_published_total",
            "Records published to the output topic and acked",
        )?;

        let errors = IntCounterVec::new(
            Opts::new("relay_errors_total", "Failed relay invocations"),
            &["kind"],
        )?;

        registry.register(Box::new(records_received.clone()))?;
        registry.register(Box::new(records_published.clone()))?;
        registry.register(Box::new(errors.clone()))?;

        Ok(Self {
            registry,
            records_received,
            records_published,
            errors,
        })
    }

    /// Prometheus text exposition of every registered metric
    pub fn encode(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
