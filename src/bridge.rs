//! Startup and shutdown orchestration.
//!
//! Order matters here:
//! 1. connect to the broker (fatal on failure, the serial device is never touched)
//! 2. open the serial device, then wait for the board to settle
//! 3. run the read loop on a blocking thread until shutdown or a fatal read error
//! 4. disconnect from the broker, then close the serial device

use crate::config::BridgeConfig;
use crate::mqtt::{PublishError, Publisher};
use crate::pipeline::{LineSource, Pipeline, PipelineStats};
use crate::serial::{self, SerialConfig, SerialError};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Broker connection failed: {0}")]
    Broker(#[from] PublishError),

    #[error("Serial port failure: {0}")]
    Serial(#[from] SerialError),

    #[error("Read loop task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Runs the bridge until `shutdown` is cancelled or a fatal error occurs.
///
/// Returns the loop counters on a requested shutdown, including one that
/// arrives during startup (in which case they are all zero).
pub async fn run(
    config: BridgeConfig,
    shutdown: CancellationToken,
) -> Result<PipelineStats, BridgeError> {
    run_with_source(config, shutdown, serial::open).await
}

/// Same as [`run`], with the line source produced by `open_source` once the
/// broker has accepted the connection.
pub async fn run_with_source<L, F>(
    config: BridgeConfig,
    shutdown: CancellationToken,
    open_source: F,
) -> Result<PipelineStats, BridgeError>
where
    L: LineSource + Send + 'static,
    F: FnOnce(&SerialConfig) -> Result<L, SerialError>,
{
    let publisher = Publisher::create(&config.mqtt);
    let publisher = tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            info!("Shutdown requested while connecting to broker");
            return Ok(PipelineStats::default());
        }
        connected = publisher.connect() => connected?,
    };

    let reader = match open_source(&config.serial) {
        Ok(reader) => reader,
        Err(e) => {
            publisher.disconnect().await;
            return Err(e.into());
        }
    };

    tokio::select! {
        biased;
        _ = shutdown.cancelled() => {
            info!("Shutdown requested while waiting for serial device to settle");
            publisher.disconnect().await;
            drop(reader);
            return Ok(PipelineStats::default());
        }
        _ = tokio::time::sleep(config.serial.settle_delay()) => {}
    }

    info!(
        "Forwarding {} to topic {} on {}",
        config.serial.port,
        publisher.topic(),
        publisher.broker()
    );

    let sink = publisher.sink();
    let loop_shutdown = shutdown.clone();
    let handle = tokio::task::spawn_blocking(move || {
        let mut pipeline = Pipeline::new(reader, sink, loop_shutdown);
        let result = pipeline.run();
        let (reader, _, stats) = pipeline.into_parts();
        (reader, stats, result)
    });

    let outcome = handle.await;

    // Whatever happened to the loop, the broker session is closed first
    publisher.disconnect().await;

    let (reader, stats, result) = outcome?;
    drop(reader);
    info!("Serial port {} closed", config.serial.port);
    info!("Bridge summary: {}", stats);

    match result {
        Ok(()) => Ok(stats),
        Err(e) => {
            error!(error = %e, "Serial read loop failed");
            Err(e.into())
        }
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Interrupt received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
