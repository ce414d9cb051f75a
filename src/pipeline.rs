//! Read → parse → publish loop.
//!
//! ```text
//! LineSource ──► Reading::from_str ──► ReadingSink
//!     │                 │                  │
//!  Timeout: skip   Err: skip (silent)   Err: log, continue
//! ```
//!
//! Only a failing [`LineSource`] ends the loop with an error. Cancellation is
//! checked before every read and again before every publish, so nothing is
//! published once shutdown has been requested.

use crate::mqtt::PublishError;
use crate::reading::Reading;
use crate::serial::{LineEvent, LineReader, SerialError};
use chrono::{DateTime, Local};
use std::fmt;
use std::io::Read;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Anything that yields serial lines one at a time.
pub trait LineSource {
    fn next_line(&mut self) -> Result<LineEvent, SerialError>;
}

/// Destination for parsed readings.
pub trait ReadingSink {
    fn publish(&mut self, reading: Reading) -> Result<(), PublishError>;
}

impl<R: Read> LineSource for LineReader<R> {
    fn next_line(&mut self) -> Result<LineEvent, SerialError> {
        LineReader::next_line(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineStats {
    pub lines_read: u64,
    pub readings_published: u64,
    pub lines_skipped: u64,
    pub timeouts: u64,
    pub publish_failures: u64,
    pub last_published: Option<DateTime<Local>>,
}

impl fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} lines read, {} published, {} skipped, {} publish failures, {} read timeouts",
            self.lines_read,
            self.readings_published,
            self.lines_skipped,
            self.publish_failures,
            self.timeouts
        )?;
        if let Some(last) = self.last_published {
            write!(f, ", last publish at {}", last.format("%H:%M:%S%.3f"))?;
        }
        Ok(())
    }
}

pub struct Pipeline<L, S> {
    source: L,
    sink: S,
    shutdown: CancellationToken,
    stats: PipelineStats,
}

impl<L: LineSource, S: ReadingSink> Pipeline<L, S> {
    pub fn new(source: L, sink: S, shutdown: CancellationToken) -> Self {
        Self {
            source,
            sink,
            shutdown,
            stats: PipelineStats::default(),
        }
    }

    /// Runs until cancelled (`Ok`) or until the source fails (`Err`).
    pub fn run(&mut self) -> Result<(), SerialError> {
        info!("Forwarding readings to MQTT");

        while !self.shutdown.is_cancelled() {
            match self.source.next_line()? {
                LineEvent::Timeout => self.stats.timeouts += 1,
                LineEvent::Line(line) => self.handle_line(&line),
                LineEvent::Overflow => {
                    self.stats.lines_read += 1;
                    self.stats.lines_skipped += 1;
                }
            }
        }

        debug!("Read loop stopped by shutdown request");
        Ok(())
    }

    pub fn into_parts(self) -> (L, S, PipelineStats) {
        (self.source, self.sink, self.stats)
    }

    fn handle_line(&mut self, line: &str) {
        self.stats.lines_read += 1;

        let Ok(reading) = line.parse::<Reading>() else {
            self.stats.lines_skipped += 1;
            return;
        };

        if self.shutdown.is_cancelled() {
            return;
        }

        match self.sink.publish(reading) {
            Ok(()) => {
                self.stats.readings_published += 1;
                self.stats.last_published = Some(Local::now());
                info!(level = reading.level(), "Published reading");
            }
            Err(e) => {
                self.stats.publish_failures += 1;
                error!(level = reading.level(), error = %e, "Failed to publish reading");
            }
        }
    }
}
