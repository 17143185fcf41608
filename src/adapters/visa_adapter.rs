//! VISA Hardware Adapter
//!
//! The HGM09s ships with a USB-serial bridge that is normally addressed
//! through a VISA resource string such as `ASRL/dev/ttyUSB0::INSTR`.
//! GPIB, USB-TMC and TCPIP resources work the same way.

use super::{strip_terminator, Framing, Transport};
use crate::config::ConnectionConfig;
use crate::error::{AppResult, DaqError, ProtocolError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

#[cfg(feature = "instrument_visa")]
use std::sync::Arc;
#[cfg(feature = "instrument_visa")]
use tokio::sync::Mutex;
#[cfg(feature = "instrument_visa")]
use visa_rs::prelude::*;

/// An open session. The resource manager must outlive the instrument.
#[cfg(feature = "instrument_visa")]
struct VisaSession {
    instrument: Instrument,
    _rm: DefaultRM,
}

/// VISA adapter for instrument communication
///
/// This adapter wraps the visa-rs crate and provides async I/O
/// using Tokio's blocking task executor for synchronous VISA operations.
///
/// Supports resource strings like:
/// - "ASRL/dev/ttyUSB0::INSTR" (serial bridge)
/// - "GPIB0::1::INSTR" (GPIB interface)
/// - "TCPIP0::192.168.1.100::INSTR" (Ethernet/LXI)
pub struct VisaAdapter {
    /// VISA resource string
    pub(crate) resource_string: String,

    /// Timeout used when opening the session
    pub(crate) timeout: Duration,

    /// Line terminators for commands and replies
    pub(crate) framing: Framing,

    #[cfg(feature = "instrument_visa")]
    session: Option<Arc<Mutex<VisaSession>>>,
}

impl VisaAdapter {
    /// Create a new, closed VISA adapter
    ///
    /// # Arguments
    /// * `connection` - Resource string and timeout
    /// * `framing` - Command and reply terminators
    pub fn new(connection: &ConnectionConfig, framing: Framing) -> Self {
        Self {
            resource_string: connection.address().to_string(),
            timeout: connection.timeout(),
            framing,
            #[cfg(feature = "instrument_visa")]
            session: None,
        }
    }

    #[cfg(feature = "instrument_visa")]
    fn handle(&self) -> Result<Arc<Mutex<VisaSession>>, ProtocolError> {
        self.session.clone().ok_or(ProtocolError::NotConnected)
    }
}

#[async_trait]
impl Transport for VisaAdapter {
    fn name(&self) -> &str {
        "visa"
    }

    fn info(&self) -> String {
        format!(
            "VisaAdapter({} @ {}ms timeout)",
            self.resource_string,
            self.timeout.as_millis()
        )
    }

    async fn open(&mut self) -> AppResult<()> {
        #[cfg(feature = "instrument_visa")]
        {
            use std::ffi::CString;

            if self.session.is_some() {
                return Ok(());
            }

            let resource_str = self.resource_string.clone();
            let open_timeout = self.timeout;

            let session = tokio::task::spawn_blocking(move || -> Result<VisaSession, String> {
                let rm = DefaultRM::new()
                    .map_err(|e| format!("Failed to create VISA resource manager: {}", e))?;
                let c_string = CString::new(resource_str.as_str())
                    .map_err(|e| format!("Invalid VISA resource string: {}", e))?;
                let visa_string = VisaString::from(c_string);
                let instrument = rm
                    .open(&visa_string, AccessMode::NO_LOCK, open_timeout)
                    .map_err(|e| format!("Failed to open VISA resource {}: {}", resource_str, e))?;
                Ok(VisaSession {
                    instrument,
                    _rm: rm,
                })
            })
            .await
            .map_err(|e| DaqError::Connection(format!("VISA open task failed: {}", e)))?
            .map_err(DaqError::Connection)?;

            self.session = Some(Arc::new(Mutex::new(session)));

            debug!(
                "VISA resource '{}' opened with {}ms timeout",
                self.resource_string,
                self.timeout.as_millis()
            );
            Ok(())
        }

        #[cfg(not(feature = "instrument_visa"))]
        {
            Err(DaqError::Connection(
                "VISA support not enabled. Rebuild with --features instrument_visa".to_string(),
            ))
        }
    }

    fn close(&mut self) {
        #[cfg(feature = "instrument_visa")]
        {
            if self.session.take().is_some() {
                debug!("VISA resource '{}' closed", self.resource_string);
            }
        }
    }

    fn is_open(&self) -> bool {
        #[cfg(feature = "instrument_visa")]
        {
            self.session.is_some()
        }

        #[cfg(not(feature = "instrument_visa"))]
        {
            false
        }
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError> {
        #[cfg(feature = "instrument_visa")]
        {
            let session = self.handle()?;
            let frame = format!("{}{}", line, self.framing.write_terminator);

            tokio::task::spawn_blocking(move || {
                use std::io::Write;

                let mut guard = session.blocking_lock();

                guard
                    .instrument
                    .visa_flush(pre_write_flush())
                    .map_err(|e| ProtocolError::Io(format!("Failed to flush VISA buffers: {}", e)))?;

                guard
                    .instrument
                    .write_all(frame.as_bytes())
                    .map_err(|e| ProtocolError::Io(format!("VISA write failed: {}", e)))
            })
            .await
            .map_err(|e| ProtocolError::Io(format!("VISA I/O task failed: {}", e)))??;

            debug!("VISA command sent: {}", line);
            Ok(())
        }

        #[cfg(not(feature = "instrument_visa"))]
        {
            let _ = line;
            Err(ProtocolError::NotConnected)
        }
    }

    async fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError> {
        #[cfg(feature = "instrument_visa")]
        {
            let session = self.handle()?;
            let terminator = self.framing.read_terminator.clone();

            let response = tokio::task::spawn_blocking(move || -> Result<String, ProtocolError> {
                use std::io::Read;

                let mut guard = session.blocking_lock();

                let tmo = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX);
                let tmo_attr = attribute::AttrTmoValue::new_checked(tmo)
                    .ok_or_else(|| ProtocolError::Io(format!("Invalid VISA timeout {}ms", tmo)))?;
                guard
                    .instrument
                    .set_attr(tmo_attr)
                    .map_err(|e| ProtocolError::Io(format!("Failed to set VISA timeout: {}", e)))?;

                let mut response: Vec<u8> = Vec::new();
                let mut buffer = [0u8; 256];
                let start = std::time::Instant::now();

                // The session's termchar ('\n') may end a read before the full terminator
                loop {
                    match guard.instrument.read(&mut buffer) {
                        Ok(0) => {}
                        Ok(n) => {
                            response.extend_from_slice(&buffer[..n]);
                            if response.ends_with(terminator.as_bytes())
                                || response.last() == Some(&b'\n')
                            {
                                break;
                            }
                        }
                        Err(e) => return Err(read_error(&e, timeout)),
                    }

                    if start.elapsed() > timeout {
                        return Err(ProtocolError::Timeout(timeout));
                    }
                }

                Ok(String::from_utf8_lossy(&response).into_owned())
            })
            .await
            .map_err(|e| ProtocolError::Io(format!("VISA I/O task failed: {}", e)))??;

            let response = strip_terminator(&response, &self.framing.read_terminator).to_string();
            debug!("VISA reply: {}", response);
            Ok(response)
        }

        #[cfg(not(feature = "instrument_visa"))]
        {
            let _ = (timeout, strip_terminator);
            Err(ProtocolError::NotConnected)
        }
    }
}

/// Input and output buffers discarded before every command.
#[cfg(feature = "instrument_visa")]
fn pre_write_flush() -> flags::FlushMode {
    flags::FlushMode::READ_BUF_DISCARD
        | flags::FlushMode::IO_IN_BUF_DISCARD
        | flags::FlushMode::WRITE_BUF_DISCARD
        | flags::FlushMode::IO_OUT_BUF_DISCARD
}

/// Map a session read error. Only a VISA timeout counts as `Timeout`.
#[cfg_attr(not(feature = "instrument_visa"), allow(dead_code))]
fn read_error(err: &std::io::Error, timeout: Duration) -> ProtocolError {
    if err.kind() == std::io::ErrorKind::TimedOut {
        ProtocolError::Timeout(timeout)
    } else {
        ProtocolError::Io(format!("VISA read error: {}", err))
    }
}

impl Drop for VisaAdapter {
    fn drop(&mut self) {
        self.close();
    }
}
