//! A single light-sensor sample parsed from one serial line.
//!
//! The micro:bit occasionally prints diagnostic text between samples, so a
//! failed parse is an expected outcome. Callers inspect the result only to
//! decide whether to publish.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Reading(i64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseReadingError {
    #[error("empty line")]
    Empty,

    #[error("not an integer reading {line:?}: {source}")]
    NotAnInteger {
        line: String,
        #[source]
        source: ParseIntError,
    },
}

impl Reading {
    pub fn new(level: i64) -> Self {
        Self(level)
    }

    pub fn level(&self) -> i64 {
        self.0
    }

    /// MQTT payload for this reading: the decimal representation of the level.
    pub fn payload(&self) -> String {
        self.0.to_string()
    }
}

impl FromStr for Reading {
    type Err = ParseReadingError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseReadingError::Empty);
        }

        line.parse::<i64>()
            .map(Reading::new)
            .map_err(|source| ParseReadingError::NotAnInteger {
                line: line.to_string(),
                source,
            })
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
