use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use reverser_middleware::{NatsTransport, Transport};
use topic_reverser::{
    metrics::Metrics,
    server::{self, ServerState},
    shutdown::shutdown_signal,
    Config, Relay, RelayConsumer,
};

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("topic_reverser=info,reverser_middleware=info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);
    config.validate()?;

    info!(
        nats_url = %config.nats_url,
        consumer_topic = %config.consumer_topic,
        producer_topic = %config.producer_topic,
        consumer_group = %config.consumer_group,
        "Starting topic-reverser"
    );

    let transport = Arc::new(
        NatsTransport::connect(&config.nats_url)
            .await?
            .with_max_deliver(config.max_deliver),
    );

    if config.ensure_streams {
        transport
            .ensure_stream(&config.input_stream, vec![config.consumer_topic.clone()])
            .await?;
        transport
            .ensure_stream(&config.output_stream, vec![config.producer_topic.clone()])
            .await?;
    }

    let metrics = Arc::new(Metrics::new()?);
    let subscription = transport
        .subscribe(&config.consumer_topic, &config.consumer_group)
        .await?;
    let relay = Relay::new(config.relay_config()?, transport.clone());
    let mut consumer = RelayConsumer::new(subscription, relay, metrics.clone());

    // Liveness server
    let (stop_tx, stop_rx) = watch::channel(false);
    let listener = TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "liveness/metrics server listening");
    let state = ServerState {
        consumer_topic: config.consumer_topic.clone(),
        producer_topic: config.producer_topic.clone(),
        metrics,
    };
    let server = tokio::spawn(server::run_server(listener, state, stopped(stop_rx)));

    consumer
        .run_with_server(shutdown_signal(), server, stop_tx)
        .await?;

    info!("topic-reverser stopped");
    Ok(())
}
