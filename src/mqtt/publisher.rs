//! Broker connection with its lifecycle encoded in the type via statum.
//!
//! ```text
//! Publisher<Disconnected> ──connect()──► Publisher<Connected> ──disconnect()──► (closed)
//! ```
//!
//! `connect` blocks until the broker acknowledges the session and fails
//! outright otherwise; there is no retry. Once connected, a spawned task
//! drives the rumqttc event loop until a disconnect is sent or the first
//! connection error occurs. The loop is not restarted after an error, so
//! later publishes fail and are reported to the caller.

use super::{config::MqttConfig, error::PublishError};
use crate::pipeline::ReadingSink;
use crate::reading::Reading;
use rumqttc::{
    AsyncClient, ConnAck, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions,
    Outgoing, Packet, QoS,
};
use statum::{machine, state};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[state]
#[derive(Debug, Clone)]
pub enum PublisherState {
    Disconnected,
    Connected,
}

#[machine]
pub struct Publisher<S: PublisherState> {
    client: AsyncClient,
    event_loop: Option<EventLoop>,
    driver: Option<JoinHandle<()>>,
    broker: String,
    topic: String,
    connect_timeout: Duration,
    shutdown_timeout: Duration,
}

impl<S: PublisherState> Publisher<S> {
    pub fn broker(&self) -> &str {
        &self.broker
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Publisher<Disconnected> {
    pub fn create(config: &MqttConfig) -> Self {
        let client_id = config.client_id();
        debug!(
            "Creating MQTT client {} for {}",
            client_id,
            config.broker_address()
        );

        let mut options = MqttOptions::new(client_id, config.host.clone(), config.port);
        options
            .set_keep_alive(config.keep_alive())
            .set_clean_session(config.clean_session);

        let (client, event_loop) = AsyncClient::new(options, config.channel_capacity);

        Self::new(
            client,
            Some(event_loop),
            None, // driver
            config.broker_address(),
            config.topic.clone(),
            config.connect_timeout(),
            config.shutdown_timeout(),
        )
    }

    /// Waits for the broker's ConnAck, then hands the event loop to a background task.
    pub async fn connect(mut self) -> Result<Publisher<Connected>, PublishError> {
        let event_loop = self
            .event_loop
            .take()
            .ok_or(PublishError::AlreadyConnected)?;

        info!("Connecting to MQTT broker {}", self.broker);
        let timeout_millis = self.connect_timeout.as_millis() as u64;
        let event_loop = tokio::time::timeout(self.connect_timeout, establish_connection(event_loop))
            .await
            .map_err(|_| PublishError::ConnectTimeout { timeout_millis })??;

        info!("Connected to MQTT broker {}", self.broker);
        self.driver = Some(tokio::spawn(drive_event_loop(event_loop)));
        Ok(self.transition())
    }
}

impl Publisher<Connected> {
    /// Cheap handle the read loop publishes through.
    pub fn sink(&self) -> ReadingPublisher {
        ReadingPublisher::new(self.client.clone(), self.topic.clone())
    }

    /// Sends DISCONNECT and waits (bounded) for the event loop to flush it.
    pub async fn disconnect(mut self) {
        info!("Disconnecting from MQTT broker {}", self.broker);
        if let Err(e) = self.client.try_disconnect() {
            warn!(error = %e, "Failed to queue MQTT disconnect");
        }

        let Some(mut handle) = self.driver.take() else {
            return;
        };
        match tokio::time::timeout(self.shutdown_timeout, &mut handle).await {
            Ok(Ok(())) => info!("Disconnected from MQTT broker"),
            Ok(Err(e)) => warn!(error = %e, "MQTT event loop task failed"),
            Err(_) => {
                warn!(
                    "MQTT event loop still busy after {}ms, aborting it",
                    self.shutdown_timeout.as_millis()
                );
                handle.abort();
            }
        }
    }
}

/// Publishes readings on one fixed topic, QoS 0, without waiting for the broker.
#[derive(Clone)]
pub struct ReadingPublisher {
    client: AsyncClient,
    topic: String,
}

impl ReadingPublisher {
    pub fn new(client: AsyncClient, topic: String) -> Self {
        Self { client, topic }
    }
}

impl ReadingSink for ReadingPublisher {
    fn publish(&mut self, reading: Reading) -> Result<(), PublishError> {
        self.client
            .try_publish(self.topic.as_str(), QoS::AtMostOnce, false, reading.payload())?;
        Ok(())
    }
}

async fn establish_connection(mut event_loop: EventLoop) -> Result<EventLoop, PublishError> {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ConnAck {
                code: ConnectReturnCode::Success,
                ..
            }))) => return Ok(event_loop),
            Ok(notification) => {
                debug!(notification = ?notification, "Bootstrap phase notification");
            }
            // rumqttc surfaces a non-success CONNACK as an error, not as an event
            Err(ConnectionError::ConnectionRefused(code)) => {
                debug!(code = ?code, "MQTT connection rejected by broker");
                return Err(PublishError::BrokerRejected { code });
            }
            Err(e) => {
                debug!(error = %e, "MQTT connection error during bootstrap phase");
                return Err(PublishError::Network(e));
            }
        }
    }
}

async fn drive_event_loop(mut event_loop: EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!("Sent MQTT Disconnect packet");
                break;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("Broker closed the MQTT session");
                break;
            }
            Ok(notification) => {
                debug!(notification = ?notification, "MQTT notification");
            }
            Err(e) => {
                // no reconnect: publishes from here on fail and get logged
                error!(error = %e, "MQTT connection lost");
                break;
            }
        }
    }
    debug!("MQTT event loop stopped");
}
