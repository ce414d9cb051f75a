pub mod bridge;
pub mod config;
pub mod mqtt;
pub mod pipeline;
pub mod reading;
pub mod serial;

use crate::config::BridgeConfig;
use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Forwards integer light readings from a micro:bit serial port to an MQTT topic
#[derive(Parser, Debug)]
#[command(name = "microbit-bridge", version)]
struct Cli {
    /// Config file (default: <user config dir>/microbit-bridge/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial device, e.g. /dev/ttyUSB0 or COM3
    #[arg(short = 'p', long)]
    serial_port: Option<String>,

    #[arg(short, long)]
    baud_rate: Option<u32>,

    /// Broker host name or IP address
    #[arg(long)]
    broker_host: Option<String>,

    #[arg(long)]
    broker_port: Option<u16>,

    /// Topic every reading is published to
    #[arg(short, long)]
    topic: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut BridgeConfig) {
        if let Some(port) = &self.serial_port {
            config.serial.port = port.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if let Some(host) = &self.broker_host {
            config.mqtt.host = host.clone();
        }
        if let Some(port) = self.broker_port {
            config.mqtt.port = port;
        }
        if let Some(topic) = &self.topic {
            config.mqtt.topic = topic.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup(cli.verbose)?;

    let mut config = BridgeConfig::load(cli.config.as_deref()).await?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    info!("Reading from micro:bit and publishing to MQTT, press Ctrl+C to stop");

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        bridge::shutdown_signal().await;
        trigger.cancel();
    });

    bridge::run(config, shutdown)
        .await
        .map_err(|e| eyre!("Bridge stopped: {}", e))?;

    info!("Stopped by user");
    Ok(())
}

fn setup(verbose: bool) -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    setup_logging(if verbose { Level::DEBUG } else { Level::INFO });
    Ok(())
}

fn setup_logging(level: Level) {
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .compact()
        .init();
}
