use super::{LineEvent, SerialConfig, SerialError};
use serialport::SerialPort;
use std::io::{BufRead, BufReader, ErrorKind, Read};
use tracing::{debug, info};

/// Longest line kept; anything longer is dropped up to its newline.
pub const MAX_LINE_BYTES: usize = 4096;

/// Line reader bound to an opened serial device.
pub type SerialReader = LineReader<Box<dyn SerialPort>>;

/// Splits a byte stream on `\n`, keeping partial lines across read timeouts.
pub struct LineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
    // set after an overflow until the rest of that line has gone by
    discarding: bool,
}

/// Opens the configured device with its read timeout applied.
pub fn open(config: &SerialConfig) -> Result<SerialReader, SerialError> {
    debug!(
        "Opening serial port {} at {} baud (timeout {}ms)",
        config.port, config.baud_rate, config.read_timeout_ms
    );

    let port = serialport::new(&config.port, config.baud_rate)
        .timeout(config.read_timeout())
        .open()
        .map_err(|source| SerialError::Open {
            port: config.port.clone(),
            source,
        })?;

    info!("Connected to serial port {}", config.port);
    Ok(LineReader::new(port))
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: BufReader::new(inner),
            pending: Vec::new(),
            discarding: false,
        }
    }

    /// Blocks until a full line arrives, the read times out, or the device fails.
    pub fn next_line(&mut self) -> Result<LineEvent, SerialError> {
        loop {
            // pending is always below the cap here, so the budget is never zero
            let budget = MAX_LINE_BYTES.saturating_sub(self.pending.len()) as u64;
            let read = (&mut self.inner)
                .take(budget)
                .read_until(b'\n', &mut self.pending);

            let n = match read {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(LineEvent::Timeout),
                Err(e) => return Err(SerialError::Read(e)),
            };

            let complete = self.pending.ends_with(b"\n");
            let eof = n == 0;

            // EOF with a trailing partial line: hand it out, the next call reports Closed
            if complete || (eof && !self.pending.is_empty()) {
                if std::mem::take(&mut self.discarding) {
                    self.pending.clear();
                    continue;
                }
                return Ok(LineEvent::Line(self.take_line()));
            }
            if eof {
                return Err(SerialError::Closed);
            }
            if self.pending.len() >= MAX_LINE_BYTES {
                self.pending.clear();
                if !self.discarding {
                    self.discarding = true;
                    debug!("Dropping serial line longer than {} bytes", MAX_LINE_BYTES);
                    return Ok(LineEvent::Overflow);
                }
            }
        }
    }

    fn take_line(&mut self) -> String {
        let raw = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&raw).trim().to_string()
    }
}
