//! Subscription loop driving the relay

use std::future::Future;
use std::io;
use std::sync::Arc;

use reverser_middleware::{Record, Subscription};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::metrics::Metrics;
use crate::{Error, Relay, Result};

type ServerTask = JoinHandle<io::Result<()>>;

/// Pulls records one at a time and hands each to [`Relay::consume`].
///
/// A successful relay acks the record. A failed one is nak'd so the log
/// client redelivers it under its own delivery limits.
pub struct RelayConsumer {
    subscription: Box<dyn Subscription>,
    relay: Relay,
    metrics: Arc<Metrics>,
}

impl RelayConsumer {
    pub fn new(subscription: Box<dyn Subscription>, relay: Relay, metrics: Arc<Metrics>) -> Self {
        Self {
            subscription,
            relay,
            metrics,
        }
    }

    /// Run until `shutdown` resolves or the subscription closes.
    ///
    /// Receive and ack errors end the loop; relay errors do not.
    pub async fn run(&mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);
        info!(producer_topic = %self.relay.producer_topic(), "Starting relay consumer");

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping relay consumer");
                    return Ok(());
                }
                next = self.subscription.next() => next?,
            };

            let Some(record) = next else {
                info!("Subscription closed, stopping relay consumer");
                return Ok(());
            };
            self.handle(record).await?;
        }
    }

    /// Run alongside the liveness server task.
    ///
    /// The server exiting on its own stops the consumer with an error.
    /// Otherwise the server is signalled through `stop_server` once the
    /// consumer returns, and awaited.
    pub async fn run_with_server(
        &mut self,
        shutdown: impl Future<Output = ()>,
        mut server: ServerTask,
        stop_server: watch::Sender<bool>,
    ) -> Result<()> {
        let result = tokio::select! {
            result = self.run(shutdown) => result,
            joined = &mut server => {
                let err = server_error(joined);
                error!(error = %err, "Liveness server stopped, stopping relay consumer");
                return Err(err);
            }
        };

        let _ = stop_server.send(true);
        let stopped = server.await;
        result?;
        match stopped {
            Ok(Ok(())) => Ok(()),
            joined => Err(server_error(joined)),
        }
    }

    async fn handle(&mut self, record: Record) -> Result<()> {
        self.metrics.records_received.inc();
        let sequence = record.sequence;

        match self.relay.consume(record).await {
            Ok(()) => {
                if let Some(seq) = sequence {
                    self.subscription.ack(seq).await?;
                }
                self.metrics.records_published.inc();
            }
            Err(e) => {
                warn!(
                    error = %e,
                    kind = e.kind(),
                    sequence = ?sequence,
                    "Relay failed, requesting redelivery"
                );
                self.metrics.errors.with_label_values(&[e.kind()]).inc();
                if let Some(seq) = sequence {
                    self.subscription.nak(seq).await?;
                }
            }
        }
        Ok(())
    }
}

fn server_error(joined: std::result::Result<io::Result<()>, JoinError>) -> Error {
    match joined {
        Ok(Ok(())) => Error::Io(io::Error::other("liveness server exited")),
        Ok(Err(e)) => Error::Io(e),
        Err(e) => Error::Io(io::Error::other(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelayConfig;
    use bytes::Bytes;
    use reverser_middleware::{InMemoryTransport, Publisher, Transport};

    const IN: &str = "reverser.in";
    const OUT: &str = "reverser.out";

    async fn consumer(transport: &Arc<InMemoryTransport>) -> (RelayConsumer, Arc<Metrics>) {
        let subscription = transport.subscribe(IN, "test-group").await.unwrap();
        let relay = Relay::new(RelayConfig::new(OUT).unwrap(), transport.clone());
        let metrics = Arc::new(Metrics::new().unwrap());
        (RelayConsumer::new(subscription, relay, metrics.clone()), metrics)
    }

    #[tokio::test]
    async fn test_run_until_subscription_closes() {
        let transport = Arc::new(InMemoryTransport::new());
        let (mut consumer, metrics) = consumer(&transport).await;

        transport.publish(IN, Some("a"), Bytes::from("hello")).await.unwrap();
        transport.publish(IN, None, Bytes::from("abc")).await.unwrap();
        transport.close(IN);

        consumer.run(std::future::pending()).await.unwrap();

        let out: Vec<_> = transport.records(OUT).into_iter().map(|r| r.value.unwrap()).collect();
        assert_eq!(out, vec!["olleh", "cba"]);
        assert_eq!(metrics.records_received.get(), 2);
        assert_eq!(metrics.records_published.get(), 2);
    }

    #[tokio::test]
    async fn test_shutdown_stops_idle_consumer() {
        let transport = Arc::new(InMemoryTransport::new());
        let (mut consumer, metrics) = consumer(&transport).await;

        consumer.run(async {}).await.unwrap();
        assert_eq!(metrics.records_received.get(), 0);
    }

    #[tokio::test]
    async fn test_invalid_record_is_nakd_until_dropped() {
        let transport = Arc::new(InMemoryTransport::with_max_deliver(3));
        let (mut consumer, metrics) = consumer(&transport).await;

        transport.append(Record {
            topic: IN.into(),
            key: Some("k".into()),
            value: None,
            sequence: None,
        });
        transport.publish(IN, Some("k"), Bytes::from("ok")).await.unwrap();
        transport.close(IN);

        consumer.run(std::future::pending()).await.unwrap();

        assert_eq!(
            metrics.errors.with_label_values(&["invalid_input"]).get(),
            3
        );
        let out = transport.records(OUT);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].value, Some(Bytes::from("ko")));
    }

    #[tokio::test]
    async fn test_publish_failure_is_counted_and_not_acked() {
        let transport = Arc::new(InMemoryTransport::with_max_deliver(2));
        let (mut consumer, metrics) = consumer(&transport).await;

        transport.publish(IN, Some("a"), Bytes::from("hello")).await.unwrap();
        transport.close(IN);
        transport.fail_publishes(true);

        consumer.run(std::future::pending()).await.unwrap();

        assert_eq!(
            metrics.errors.with_label_values(&["publish_failure"]).get(),
            2
        );
        assert_eq!(metrics.records_published.get(), 0);
        assert!(transport.records(OUT).is_empty());
    }

    #[tokio::test]
    async fn test_failed_server_stops_consumer() {
        let transport = Arc::new(InMemoryTransport::new());
        let (mut consumer, _) = consumer(&transport).await;
        let (stop_tx, _stop_rx) = watch::channel(false);
        let server = tokio::spawn(async {
            Err::<(), _>(io::Error::new(io::ErrorKind::AddrInUse, "address in use"))
        });

        let err = consumer
            .run_with_server(std::future::pending(), server, stop_tx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::AddrInUse));
    }

    #[tokio::test]
    async fn test_server_exiting_early_is_an_error() {
        let transport = Arc::new(InMemoryTransport::new());
        let (mut consumer, _) = consumer(&transport).await;
        let (stop_tx, _stop_rx) = watch::channel(false);
        let server = tokio::spawn(async { Ok::<(), io::Error>(()) });

        let err = consumer
            .run_with_server(std::future::pending(), server, stop_tx)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[tokio::test]
    async fn test_shutdown_stops_server() {
        let transport = Arc::new(InMemoryTransport::new());
        let (mut consumer, _) = consumer(&transport).await;
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let server = tokio::spawn(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
            Ok::<(), io::Error>(())
        });

        consumer
            .run_with_server(async {}, server, stop_tx)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_relays_while_server_runs() {
        let transport = Arc::new(InMemoryTransport::new());
        let (mut consumer, metrics) = consumer(&transport).await;
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let server = tokio::spawn(async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
            Ok::<(), io::Error>(())
        });

        transport.publish(IN, None, Bytes::from("abc")).await.unwrap();
        transport.close(IN);

        consumer
            .run_with_server(std::future::pending(), server, stop_tx)
            .await
            .unwrap();
        assert_eq!(metrics.records_published.get(), 1);
        assert_eq!(transport.records(OUT)[0].value, Some(Bytes::from("cba")));
    }
}
