use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod cache;
mod config;
mod domain;
mod ingest;
mod messaging;
mod metrics;
mod service;
mod storage;
mod utils;

use api::AppState;
use cache::InMemoryOrderCache;
use config::{Config, Environment};
use ingest::OrderConsumer;
use messaging::KafkaOrderSource;
use metrics::Metrics;
use service::OrderService;
use storage::PostgresStorage;
use utils::{retry_with_backoff, RetryConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.environment);

    tracing::info!(
        env = %config.environment,
        topic = %config.kafka.topic,
        port = config.http_port,
        "Starting order service"
    );

    // === 1. Persistence store ===
    let storage = retry_with_backoff(RetryConfig::startup(), |attempt| {
        let database = config.database.clone();
        async move {
            tracing::info!(attempt = attempt, "Connecting to PostgreSQL...");
            PostgresStorage::connect(&database).await
        }
    })
    .await?;

    // === 2. Read cache, metrics and service ===
    let metrics = Arc::new(Metrics::new()?);
    let cache = Arc::new(InMemoryOrderCache::new());
    let service = Arc::new(OrderService::new(
        Arc::new(storage),
        cache,
        metrics.clone(),
    ));

    // === 3. Warm the cache before any new order can arrive ===
    if let Err(e) = service.restore_cache().await {
        tracing::error!(error = %e, "Failed to restore cache, continuing with an empty cache");
    }

    // === 4. Ingest consumer ===
    let shutdown = CancellationToken::new();
    let source = KafkaOrderSource::new(&config.kafka)?;
    let mut consumer = OrderConsumer::new(
        source,
        service.clone(),
        metrics.clone(),
        RetryConfig::redelivery(config.redelivery_backoff, config.redelivery_backoff_max),
        shutdown.clone(),
    );
    let consumer_task = tokio::spawn(async move {
        consumer.run().await;
        consumer.state()
    });

    // === 5. Query surface ===
    let server = api::start_http_server(
        AppState {
            service: service.clone(),
            metrics: metrics.clone(),
        },
        config.http_port,
        config.shutdown_timeout,
    )?;
    let server_handle = server.handle();
    let server_task = tokio::spawn(server);

    tracing::info!("Order service started");

    shutdown_signal().await;
    tracing::info!("Shutting down...");

    // Stop ingesting first (an in-flight message finishes), then stop
    // serving, then release the database.
    shutdown.cancel();
    match consumer_task.await {
        Ok(state) => tracing::info!(state = ?state, "Consumer stopped"),
        Err(e) => tracing::error!(error = %e, "Consumer task failed"),
    }

    server_handle.stop(true).await;
    match server_task.await {
        Ok(Err(e)) => tracing::error!(error = %e, "HTTP server error"),
        Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
        Ok(Ok(())) => {}
    }

    if let Err(e) = service.close().await {
        tracing::error!(error = %e, "Order service close error");
    }

    tracing::info!("Order service stopped");
    Ok(())
}

/// Level defaults per environment, can be overridden with RUST_LOG env var
/// Example: RUST_LOG=debug cargo run
fn init_tracing(environment: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(environment.default_log_filter()));
    let registry = tracing_subscriber::registry().with(filter);

    if environment.json_logs() {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
