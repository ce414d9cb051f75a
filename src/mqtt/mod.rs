//! # MQTT publishing
//!
//! Owns the single broker connection of the bridge and turns readings into
//! QoS 0 publishes on one fixed topic.
//!
//! ```text
//! mqtt/
//! ├── config.rs     - Broker address, topic and client settings
//! ├── error.rs      - Connection and publish failures
//! └── publisher.rs  - Connection state machine and the publish handle
//! ```
//!
//! Startup is strict: the broker must acknowledge the connection or the
//! bridge does not start. After that every publish is fire-and-forget and a
//! failed publish is only logged by the caller.

pub mod config;
pub mod error;
pub mod publisher;

#[cfg(test)]
pub(crate) mod test_broker;

pub use config::MqttConfig;
pub use error::PublishError;
pub use publisher::Publisher;
