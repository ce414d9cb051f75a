//! Bridge configuration.
//!
//! Everything has a default matching the classroom setup (micro:bit on
//! `/dev/ttyUSB0`, broker on port 1883), so the config file is optional and
//! may set only the keys that differ:
//!
//! ```toml
//! [serial]
//! port = "/dev/ttyACM0"
//!
//! [mqtt]
//! host = "broker.lab.local"
//! topic = "lab/3pm25b/microbit/luz"
//! ```

use crate::mqtt::MqttConfig;
use crate::serial::SerialConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR: &str = "microbit-bridge";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub serial: SerialConfig,
    pub mqtt: MqttConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl BridgeConfig {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one the per-user config file is
    /// used when present, otherwise the defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path).await;
        }

        let Some(path) = default_config_path() else {
            debug!("No user config directory on this platform, using defaults");
            return Ok(Self::default());
        };

        Self::from_optional_file(&path).await
    }

    /// Reads `path` when it exists, defaults when it does not. Errors while
    /// checking (permissions, a file where a directory should be) are reported.
    pub async fn from_optional_file(path: &Path) -> Result<Self, ConfigError> {
        match tokio::fs::try_exists(path).await {
            Ok(true) => Self::from_file(path).await,
            Ok(false) => {
                info!("No config file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub async fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let config: Self = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let serial = &self.serial;
        let mqtt = &self.mqtt;

        if serial.port.trim().is_empty() {
            return Err(invalid("serial.port must not be empty"));
        }
        if serial.baud_rate == 0 {
            return Err(invalid("serial.baud_rate must be greater than 0"));
        }
        if serial.read_timeout_ms == 0 {
            return Err(invalid("serial.read_timeout_ms must be greater than 0"));
        }
        if mqtt.host.trim().is_empty() {
            return Err(invalid("mqtt.host must not be empty"));
        }
        if mqtt.port == 0 {
            return Err(invalid("mqtt.port must be greater than 0"));
        }
        if mqtt.topic.is_empty() {
            return Err(invalid("mqtt.topic must not be empty"));
        }
        if mqtt.topic.contains(['+', '#']) {
            return Err(invalid(format!(
                "mqtt.topic {:?} contains a wildcard and cannot be published to",
                mqtt.topic
            )));
        }
        if mqtt.keep_alive_secs < 5 {
            return Err(invalid("mqtt.keep_alive_secs must be at least 5"));
        }
        if mqtt.channel_capacity == 0 {
            return Err(invalid("mqtt.channel_capacity must be greater than 0"));
        }
        if mqtt.connect_timeout_ms == 0 {
            return Err(invalid("mqtt.connect_timeout_ms must be greater than 0"));
        }

        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(reason.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_lab_setup() {
        let config = BridgeConfig::default();
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.serial.read_timeout_ms, 1000);
        assert_eq!(config.serial.settle_delay_ms, 2000);
        assert_eq!(config.mqtt.port, 1883);
        assert_eq!(config.mqtt.topic, "lab/3pm25b/microbit/luz");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[serial]\nport = \"/dev/ttyACM1\"\n\n[mqtt]\nhost = \"10.1.2.3\"\n",
        )
        .unwrap();

        let config = BridgeConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.baud_rate, 115_200);
        assert_eq!(config.mqtt.host, "10.1.2.3");
        assert_eq!(config.mqtt.topic, MqttConfig::default().topic);
    }

    #[tokio::test]
    async fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.toml");

        assert!(matches!(
            BridgeConfig::load(Some(&path)).await,
            Err(ConfigError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn absent_default_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = BridgeConfig::from_optional_file(&path).await.unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[tokio::test]
    async fn unreadable_config_location_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // a plain file where the config directory should be
        let not_a_dir = dir.path().join("microbit-bridge");
        std::fs::write(&not_a_dir, "").unwrap();
        let path = not_a_dir.join("config.toml");

        assert!(matches!(
            BridgeConfig::from_optional_file(&path).await,
            Err(ConfigError::Read { .. })
        ));
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[mqtt]\nport = \"not a number\"\n").unwrap();

        assert!(matches!(
            BridgeConfig::from_file(&path).await,
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn wildcard_topics_are_rejected() {
        let mut config = BridgeConfig::default();
        config.mqtt.topic = String::from("lab/+/microbit/luz");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.mqtt.topic = String::from("lab/#");
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn short_keep_alive_is_rejected() {
        let mut config = BridgeConfig::default();
        config.mqtt.keep_alive_secs = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_serial_port_is_rejected() {
        let mut config = BridgeConfig::default();
        config.serial.port = String::from("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = BridgeConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: BridgeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }
}
