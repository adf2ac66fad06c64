use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::error::TransportError;
use crate::transport::{Publisher, Record, Subscription, Transport};

const CHANNEL_BUFFER_SIZE: usize = 1024;
const DEFAULT_MAX_DELIVER: u32 = 10;

/// Broadcast-backed transport. Subscribers only see records published after
/// they subscribed; every published record is also retained per topic so
/// tests can inspect what was written.
pub struct InMemoryTransport {
    channels: DashMap<String, broadcast::Sender<Record>>,
    log: DashMap<String, Vec<Record>>,
    sequence: AtomicU64,
    fail_publishes: AtomicBool,
    max_deliver: u32,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_max_deliver(DEFAULT_MAX_DELIVER)
    }

    /// Records nak'd this many times are dropped instead of redelivered.
    pub fn with_max_deliver(max_deliver: u32) -> Self {
        Self {
            channels: DashMap::new(),
            log: DashMap::new(),
            sequence: AtomicU64::new(0),
            fail_publishes: AtomicBool::new(false),
            max_deliver: max_deliver.max(1),
        }
    }

    #[inline]
    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }

    fn get_or_create_channel(&self, topic: &str) -> broadcast::Sender<Record> {
        self.channels
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_BUFFER_SIZE).0)
            .clone()
    }

    /// Make every subsequent `publish` fail with `PublishFailed`.
    pub fn fail_publishes(&self, fail: bool) {
        self.fail_publishes.store(fail, Ordering::SeqCst);
    }

    /// Append an arbitrary record to its topic, bypassing failure injection.
    /// Lets tests deliver records a real broker could not express, such as a
    /// missing value. Returns the assigned sequence.
    pub fn append(&self, mut record: Record) -> u64 {
        let seq = self.next_sequence();
        record.sequence = Some(seq);

        self.log
            .entry(record.topic.clone())
            .or_default()
            .push(record.clone());

        let tx = self.get_or_create_channel(&record.topic);
        // No receivers is fine, the record stays in the log
        let _ = tx.send(record);
        seq
    }

    /// Every record published to `topic` so far, in publish order.
    pub fn records(&self, topic: &str) -> Vec<Record> {
        self.log
            .get(topic)
            .map(|records| records.value().clone())
            .unwrap_or_default()
    }

    /// Close a topic. Subscribers drain what is buffered, then see end of stream.
    pub fn close(&self, topic: &str) {
        self.channels.remove(topic);
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

struct InMemorySubscription {
    rx: broadcast::Receiver<Record>,
    redeliver: VecDeque<Record>,
    in_flight: HashMap<u64, Record>,
    deliveries: HashMap<u64, u32>,
    max_deliver: u32,
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn next(&mut self) -> Result<Option<Record>, TransportError> {
        let record = match self.redeliver.pop_front() {
            Some(record) => record,
            None => match self.rx.recv().await {
                Ok(record) => record,
                Err(RecvError::Closed) => return Ok(None),
                Err(e @ RecvError::Lagged(_)) => {
                    return Err(TransportError::SubscribeFailed(e.to_string()))
                }
            },
        };

        if let Some(seq) = record.sequence {
            *self.deliveries.entry(seq).or_insert(0) += 1;
            self.in_flight.insert(seq, record.clone());
        }
        Ok(Some(record))
    }

    async fn ack(&mut self, sequence: u64) -> Result<(), TransportError> {
        self.deliveries.remove(&sequence);
        self.in_flight
            .remove(&sequence)
            .map(|_| ())
            .ok_or_else(|| TransportError::AckFailed(format!("unknown sequence {}", sequence)))
    }

    async fn nak(&mut self, sequence: u64) -> Result<(), TransportError> {
        let record = self
            .in_flight
            .remove(&sequence)
            .ok_or_else(|| TransportError::AckFailed(format!("unknown sequence {}", sequence)))?;

        let delivered = self.deliveries.get(&sequence).copied().unwrap_or(0);
        if delivered >= self.max_deliver {
            tracing::warn!(sequence, delivered, "max deliveries reached, dropping record");
            self.deliveries.remove(&sequence);
        } else {
            self.redeliver.push_back(record);
        }
        Ok(())
    }
}

#[async_trait]
impl Publisher for InMemoryTransport {
    async fn publish(
        &self,
        topic: &str,
        key: Option<&str>,
        value: Bytes,
    ) -> Result<(), TransportError> {
        if self.fail_publishes.load(Ordering::SeqCst) {
            return Err(TransportError::PublishFailed(format!(
                "injected failure publishing to {}",
                topic
            )));
        }
        self.append(Record::new(topic, key.map(str::to_string), value));
        Ok(())
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn subscribe(
        &self,
        topic: &str,
        _group: &str,
    ) -> Result<Box<dyn Subscription>, TransportError> {
        let tx = self.get_or_create_channel(topic);
        Ok(Box::new(InMemorySubscription {
            rx: tx.subscribe(),
            redeliver: VecDeque::new(),
            in_flight: HashMap::new(),
            deliveries: HashMap::new(),
            max_deliver: self.max_deliver,
        }))
    }
}
