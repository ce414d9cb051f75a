use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MQTT_PORT: u16 = 1883;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    /// Fixed topic every reading is published to
    pub topic: String,
    /// Empty means "derive one from the process id"
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub clean_session: bool,
    pub connect_timeout_ms: u64,
    /// Capacity of the request queue between the client handle and the event loop
    pub channel_capacity: usize,
    /// How long shutdown waits for the event loop to flush the disconnect
    pub shutdown_timeout_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: DEFAULT_MQTT_PORT,
            topic: String::from("lab/3pm25b/microbit/luz"),
            client_id: String::from("microbit_reader"),
            keep_alive_secs: 30,
            clean_session: true,
            connect_timeout_ms: 5000,
            channel_capacity: 100,
            shutdown_timeout_ms: 250,
        }
    }
}

impl MqttConfig {
    pub fn client_id(&self) -> String {
        match self.client_id.trim() {
            "" => format!("microbit-bridge-{}", std::process::id()),
            id => id.to_string(),
        }
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    pub fn broker_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
