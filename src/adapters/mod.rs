//! Hardware adapter implementations
//!
//! This module contains implementations of the [`Transport`] trait, the
//! line-oriented byte channel the gaussmeter is reached over:
//!
//! - [`SerialAdapter`]: raw RS-232 / USB-serial line (8N1) via `serialport`
//! - [`VisaAdapter`]: VISA resource via `visa-rs`
//! - [`MockAdapter`]: scripted in-memory instrument for tests
//!
//! Every `write_line` flushes pending input and output first. That flush is
//! what keeps replies in step after a read timed out: a late reply to the
//! previous command is discarded instead of being read as the answer to the
//! next one.

pub mod mock_adapter;
pub mod serial_adapter;
pub mod visa_adapter;

pub use mock_adapter::{MockAdapter, MockReply};
pub use serial_adapter::SerialAdapter;
pub use visa_adapter::VisaAdapter;

use crate::config::{ConnectionConfig, TransportKind};
use crate::error::{AppResult, ProtocolError};
use crate::protocol::CommandCodec;
use async_trait::async_trait;
use std::time::Duration;

/// Frame terminators used on one link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Framing {
    /// Appended to every outgoing frame
    pub write_terminator: String,
    /// Ends every reply
    pub read_terminator: String,
}

impl Framing {
    /// Framing declared by a codec.
    pub fn for_codec(codec: &dyn CommandCodec) -> Self {
        Self {
            write_terminator: codec.write_terminator().to_string(),
            read_terminator: codec.read_terminator().to_string(),
        }
    }
}

impl Default for Framing {
    fn default() -> Self {
        Self {
            write_terminator: "\r".to_string(),
            read_terminator: "\n".to_string(),
        }
    }
}

/// Line-oriented transport to an instrument.
///
/// Callers must not interleave exchanges: the link has no request tagging
/// and relies on strict write-then-read alternation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short transport name ("serial", "visa", "mock").
    fn name(&self) -> &str;

    /// Human-readable description for logs.
    fn info(&self) -> String;

    /// Open the channel. Opening an open transport is a no-op.
    ///
    /// # Errors
    /// `DaqError::Connection` if the port or resource cannot be opened.
    async fn open(&mut self) -> AppResult<()>;

    /// Release the channel. No-op when already closed; never fails.
    fn close(&mut self);

    /// Whether a handle is currently held.
    fn is_open(&self) -> bool;

    /// Flush pending input/output, then write `line` plus the write terminator.
    async fn write_line(&mut self, line: &str) -> Result<(), ProtocolError>;

    /// Read one reply, without its terminator, waiting at most `timeout`.
    async fn read_line(&mut self, timeout: Duration) -> Result<String, ProtocolError>;
}

/// Build the transport for a connection.
pub fn transport_for(
    kind: TransportKind,
    connection: &ConnectionConfig,
    framing: Framing,
) -> Box<dyn Transport> {
    match kind {
        TransportKind::Serial => Box::new(SerialAdapter::new(connection, framing)),
        TransportKind::Visa => Box::new(VisaAdapter::new(connection, framing)),
    }
}

/// Strip a trailing terminator (and stray CR/LF) from a reply.
pub(crate) fn strip_terminator<'a>(reply: &'a str, terminator: &str) -> &'a str {
    reply
        .strip_suffix(terminator)
        .unwrap_or(reply)
        .trim_end_matches(['\r', '\n'])
}
