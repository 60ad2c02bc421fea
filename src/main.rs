//! fanout-relay server entry point.
//!
//! Connects the queue registry and the broker, launches the consumer
//! workers, serves the REST and WebSocket endpoints, and runs the ordered
//! teardown once SIGINT or SIGTERM arrives.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use fanout_relay::api;
use fanout_relay::app_state::AppState;
use fanout_relay::broker::{AmqpBroker, Broker};
use fanout_relay::cancel::CancellationSignal;
use fanout_relay::config::{ConfigHandle, RelayConfig};
use fanout_relay::context::RelayContext;
use fanout_relay::registry::{PostgresQueueRegistry, QueueRegistry};
use fanout_relay::retry::RetryPolicy;
use fanout_relay::service::ShutdownCoordinator;
use fanout_relay::telemetry;

/// Registry-coordinated RabbitMQ fan-out relay.
#[derive(Debug, Parser)]
#[command(name = "fanout-relay", version, about)]
struct Cli {
    /// Development mode: human-readable logs instead of JSON.
    #[arg(long, env = "RELAY_DEBUG")]
    debug: bool,

    /// JSON object to send once every worker is consuming.
    #[arg(long, env = "RELAY_SEND_ON_START", value_parser = parse_json_object)]
    send_on_start: Option<serde_json::Value>,
}

fn parse_json_object(raw: &str) -> Result<serde_json::Value, String> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err("expected a JSON object".to_string()),
        Err(e) => Err(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = RelayConfig::from_env().context("failed to load configuration")?;
    telemetry::init(cli.debug, &config.log_level).context("failed to initialise logging")?;
    tracing::info!(
        addr = %config.listen_addr,
        workers = config.worker_count,
        debug = cli.debug,
        "starting fanout-relay"
    );

    let cancel = CancellationSignal::new();
    let _termination = cancel.listen_for_termination();
    let config = ConfigHandle::new(config);
    #[cfg(unix)]
    let _reload = spawn_reload_listener(config.clone(), cancel.clone());

    // Connect backends
    let snapshot = config.snapshot();
    let retry = RetryPolicy::from_config(&snapshot.backoff);

    let registry = retry
        .execute(&cancel, || PostgresQueueRegistry::connect(&snapshot.registry))
        .await
        .context("failed to connect to queue registry")?;
    if snapshot.registry.run_migrations {
        registry
            .migrate()
            .await
            .context("failed to migrate queue registry")?;
    }
    let registry = Arc::new(registry);

    let broker = retry
        .execute(&cancel, || AmqpBroker::connect(&snapshot.broker))
        .await
        .context("failed to connect to broker")?;

    let ctx = RelayContext::new(
        config.clone(),
        cancel.clone(),
        Arc::clone(&registry) as Arc<dyn QueueRegistry>,
        Arc::new(broker) as Arc<dyn Broker>,
    );

    // Launch workers
    let mut coordinator = ShutdownCoordinator::new(ctx.clone());
    let ready = coordinator.spawn_workers(snapshot.worker_count).await;
    if ready.len() < snapshot.worker_count {
        tracing::warn!(
            requested = snapshot.worker_count,
            ready = ready.len(),
            "some workers failed to start"
        );
    }

    let state = AppState::new(ctx);
    if let Some(message) = cli.send_on_start.as_ref() {
        match state.send_service.send(message).await {
            Ok(report) => tracing::info!(bound_queues = report.bound_queues, "startup message sent"),
            Err(e) => tracing::error!(error = %e, "startup message failed"),
        }
    }

    // Start server
    let listener = tokio::net::TcpListener::bind(snapshot.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", snapshot.listen_addr))?;
    tracing::info!(addr = %snapshot.listen_addr, "server listening");

    let app = api::build_app(state);
    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        let graceful = server_cancel.clone();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { graceful.cancelled().await })
            .await;
        if let Err(e) = &result {
            tracing::error!(error = %e, "http server failed");
            server_cancel.cancel();
        }
        result
    });

    let report = coordinator.run_until_cancelled().await;
    tracing::info!(
        workers = report.workers.len(),
        drained = report.drained,
        registry_swept = report.registry_swept,
        "relay stopped"
    );

    match server.await {
        Ok(Ok(())) => tracing::info!("http server stopped"),
        Ok(Err(e)) => tracing::error!(error = %e, "http server exited with error"),
        Err(e) => tracing::error!(error = %e, "http server task failed"),
    }
    registry.close().await;

    Ok(())
}

/// Re-reads `.env` on SIGHUP and installs the fresh snapshot.
#[cfg(unix)]
fn spawn_reload_listener(
    config: ConfigHandle,
    cancel: CancellationSignal,
) -> tokio::task::JoinHandle<()> {
    use tokio::signal::unix::{SignalKind, signal};

    tokio::spawn(async move {
        let mut hangup = match signal(SignalKind::hangup()) {
            Ok(hangup) => hangup,
            Err(e) => {
                tracing::warn!(error = %e, "unable to listen for SIGHUP, reload disabled");
                return;
            }
        };
        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                received = hangup.recv() => {
                    if received.is_none() {
                        return;
                    }
                    match RelayConfig::reload() {
                        Ok(fresh) => {
                            config.replace(fresh);
                            tracing::info!("configuration reloaded");
                        }
                        Err(e) => tracing::warn!(error = %e, "reload rejected, keeping previous configuration"),
                    }
                }
            }
        }
    })
}
