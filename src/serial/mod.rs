//! Serial side of the bridge.
//!
//! Opens the micro:bit's USB serial device and turns its byte stream into
//! trimmed text lines. Reads carry a timeout so the loop above never blocks
//! indefinitely; a timeout is reported as [`LineEvent::Timeout`] rather than
//! an error.
//!
//! ```text
//! /dev/ttyUSB0 ──► LineReader ──► LineEvent::Line("42")
//!                              └► LineEvent::Timeout
//! ```

pub mod reader;

pub use reader::{open, LineReader};

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Wait after opening before reads are trusted; the board resets on open
    pub settle_delay_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 1000,
            settle_delay_ms: 2000,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// One step of the line stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete line, decoded and trimmed
    Line(String),
    /// No complete line arrived within the read timeout
    Timeout,
    /// A line exceeded the length cap and was dropped
    Overflow,
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Failed to open serial port {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("Failed to read from serial port: {0}")]
    Read(#[from] std::io::Error),

    #[error("Serial device closed the stream")]
    Closed,
}
