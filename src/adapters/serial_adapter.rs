use super::{strip_terminator, Framing, Transport};
use crate::config::ConnectionConfig;
use crate::error::{AppResult, DaqError, ProtocolError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "instrument_serial")]
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
#[cfg(feature = "instrument_serial")]
use std::sync::Arc;
#[cfg(feature = "instrument_serial")]
use tokio::sync::Mutex;

/// Poll interval of the underlying port; the exchange deadline is enforced on top.
#[cfg(feature = "instrument_serial")]
const PORT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial adapter for RS-232 communication
///
/// This adapter wraps the serialport crate and provides async I/O
/// using Tokio's blocking task executor for synchronous serial operations.
/// The line is always opened as 8 data bits, no parity, one stop bit.
pub struct SerialAdapter {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    port_name: String,

    /// Baud rate (e.g., 9600, 115200)
    baud_rate: u32,

    /// Line terminators for commands and replies
    framing: Framing,

    /// The actual serial port (behind Arc<Mutex> for async access)
    #[cfg(feature = "instrument_serial")]
    port: Option<Arc<Mutex<Box<dyn SerialPort>>>>,
}

impl SerialAdapter {
    /// Create a new, closed serial adapter
    ///
    /// # Arguments
    /// * `connection` - Port path and baud rate
    /// * `framing` - Command and reply terminators
    pub fn new(connection: &ConnectionConfig, framing: Framing) -> Self {
        Self {
            port_name: connection.address().to_string(),
            baud_rate: connection.baud_rate(),
            framing,
            #[cfg(feature = "instrument_serial")]
            port: None,
        }
    }

    #[cfg(feature = "instrument_serial")]
    fn handle(&self) -> Result<Arc<Mutex<Box<dyn SerialPort>>>, ProtocolError> {
        self.port.clone().ok_or(ProtocolError::NotConnected)
    }
}

#[async_trait]
impl Transport for SerialAdapter {
    fn name(&self) -> &str {
        "serial"
    }

    fn info(&self) -> String {
        format!("SerialAdapter({} @ {} baud, 8N1)", self.port_name, self.baud_rate)
    }

    async fn open(&mut self) -> AppResult<()> {
        #[cfg(feature = "instrument_serial")]
        {
            if self.port.is_some() {
                return Ok(());
            }

            let port_name = self.port_name.clone();
            let baud_rate = self.baud_rate;

            let port = tokio::task::spawn_blocking(move || {
                serialport::new(port_name.as_str(), baud_rate)
                    .data_bits(DataBits::Eight)
                    .parity(Parity::None)
                    .stop_bits(StopBits::One)
                    .flow_control(FlowControl::None)
                    .timeout(PORT_POLL_TIMEOUT)
                    .open()
            })
            .await
            .map_err(|e| DaqError::Connection(format!("Serial open task failed: {}", e)))?
            .map_err(|e| {
                DaqError::Connection(format!(
                    "Failed to open serial port '{}' at {} baud: {}",
                    self.port_name, self.baud_rate, e
                ))
            })?;

            self.port = Some(Arc::new(Mutex::new(port)));

            debug!(
                "Serial port '{}' opened at {} baud",
                self.port_name, self.baud_rate
            );
            Ok(())
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            Err(DaqError::Connection(
                "Serial support not enabled. Rebuild with --features instrument_serial"
                    .to_string(),
            ))
        }
    }

    fn close(&mut self) {
        #[cfg(feature = "instrument_serial")]
        {
            if self.port.take().is_some() {
                debug!("Serial port '{}' closed", self.port_name);
            }
        }
    }

    fn is_open(&self) -> bool {
        #[cfg(feature = "instrument_serial")]
        {
            self.port.is_some()
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            false
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        #[cfg(feature = "instrument_serial")]
        {
            let port = self.handle()?;
            let frame = format!("{}{}", line, self.framing.write_terminator);

            // Execute blocking serial I/O on dedicated thread
            tokio::task::spawn_blocking(move || {
                use std::io::Write;

                let mut port_guard = port.blocking_lock();

                // Drop anything left over from a previous, possibly timed-out exchange
                port_guard
                    .clear(ClearBuffer::All)
                    .map_err(|e| ProtocolError::Io(format!("Failed to flush serial port: {}", e)))?;

                port_guard
                    .write_all(frame.as_bytes())
                    .map_err(|e| ProtocolError::Io(format!("Failed to write to serial port: {}", e)))?;

                port_guard
                    .flush()
                    .map_err(|e| ProtocolError::Io(format!("Failed to flush serial port: {}", e)))
            })
            .await
            .map_err(|e| ProtocolError::Io(format!("Serial I/O task failed: {}", e)))??;

            debug!("Sent serial command: {}", line);
            Ok(())
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            let _ = line;
            Err(ProtocolError::NotConnected)
        }
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        #[cfg(feature = "instrument_serial")]
        {
            let port = self.handle()?;
            let terminator = self.framing.read_terminator.clone();

            let response = tokio::task::spawn_blocking(move || -> Result<String, ProtocolError> {
                use std::io::Read;

                let mut port_guard = port.blocking_lock();
                let mut response: Vec<u8> = Vec::new();
                let mut buffer = [0u8; 1];
                let start = std::time::Instant::now();

                // Read byte-by-byte until the terminator or the deadline
                loop {
                    if start.elapsed() > timeout {
                        return Err(ProtocolError::Timeout(timeout));
                    }

                    match port_guard.read(&mut buffer) {
                        Ok(1) => {
                            response.push(buffer[0]);
                            if response.ends_with(terminator.as_bytes()) {
                                break;
                            }
                        }
                        Ok(0) => {
                            return Err(ProtocolError::Io("Unexpected EOF from serial port".into()));
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                            // Port timeout is shorter than our overall timeout
                            continue;
                        }
                        Err(e) => {
                            return Err(ProtocolError::Io(format!("Serial read error: {}", e)));
                        }
                        Ok(_) => {
                            return Err(ProtocolError::Io(
                                "Read into single-byte buffer returned more than one byte".into(),
                            ));
                        }
                    }
                }

                Ok(String::from_utf8_lossy(&response).into_owned())
            })
            .await
            .map_err(|e| ProtocolError::Io(format!("Serial I/O task failed: {}", e)))??;

            let response = strip_terminator(&response, &self.framing.read_terminator).to_string();
            debug!("Received serial response: {}", response);
            Ok(response)
        }

        #[cfg(not(feature = "instrument_serial"))]
        {
            let _ = (timeout, strip_terminator);
            Err(ProtocolError::NotConnected)
        }
    }
}

impl Drop for SerialAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
