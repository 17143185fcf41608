//! Custom error types for the gaussmeter adapter.
//!
//! Errors are split by the stage at which they occur:
//!
//! - **`ProtocolError`**: failures inside one exchange with the instrument. The transport
//!   timed out, the link reported an I/O failure, or the reply could not be decoded into
//!   the requested type.
//! - **`DaqError`**: what callers of [`Gaussmeter`](crate::instrument::Gaussmeter) see.
//!   - **`Validation`**: the caller supplied an argument that was rejected before any
//!     bytes were sent (e.g. a measurement range outside `0..=3`).
//!   - **`Connection`**: the transport could not be opened, or the instrument did not
//!     answer the liveness handshake during `connect()`.
//!   - **`Device`**: an exchange failed after the adapter was ready. Wraps the
//!     underlying `ProtocolError` so callers can still tell a timeout from a bad reply.
//!   - **`Unsupported`**: the instrument family has no command for the request.
//!   - **`NotReady`**: an exchange was requested while the adapter was not `Ready`.
//!
//! By using `#[from]`, a `ProtocolError` converts into `DaqError::Device` with `?`.

use crate::config::ConfigError;
use crate::lifecycle::AdapterState;
use crate::protocol::FieldKind;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the adapter error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Failure of a single request/response exchange.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// No terminated reply arrived before the read deadline.
    #[error("No reply within {0:?}")]
    Timeout(Duration),

    /// A reply arrived but does not match the expected lexical form.
    #[error("Cannot decode {field} reply {reply:?}")]
    Parse {
        /// The field whose reply was being decoded
        field: FieldKind,
        /// The raw reply text
        reply: String,
    },

    /// The underlying serial/VISA link reported an error.
    #[error("Transport I/O error: {0}")]
    Io(String),

    /// The transport handle is not open.
    #[error("Transport not open")]
    NotConnected,
}

/// Errors surfaced by the device adapter.
#[derive(Error, Debug)]
pub enum DaqError {
    /// An argument was rejected before any I/O.
    #[error("Invalid argument: {0}")]
    Validation(String),

    /// Opening the transport or the handshake failed.
    #[error("Connection failed: {0}")]
    Connection(String),

    /// An exchange failed while Ready.
    #[error("Device error: {0}")]
    Device(#[from] ProtocolError),

    /// The instrument family has no command for the request.
    #[error("Not supported by this instrument: {0}")]
    Unsupported(String),

    /// An exchange was requested outside the Ready state.
    #[error("Adapter is {0}, not Ready")]
    NotReady(AdapterState),

    /// The lifecycle refused a state change.
    #[error("Invalid state transition {from} -> {to}")]
    InvalidTransition {
        /// State before the attempted change
        from: AdapterState,
        /// Requested state
        to: AdapterState,
    },

    /// No attribute with this name in the interface table.
    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// No command with this name in the interface table.
    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl DaqError {
    /// The exchange-level cause, if this is a [`DaqError::Device`].
    pub fn protocol(&self) -> Option<&ProtocolError> {
        match self {
            DaqError::Device(inner) => Some(inner),
            _ => None,
        }
    }

    /// True when a reply was received but could not be decoded.
    pub fn is_parse(&self) -> bool {
        matches!(self.protocol(), Some(ProtocolError::Parse { .. }))
    }

    /// True when the instrument did not answer in time.
    pub fn is_timeout(&self) -> bool {
        matches!(self.protocol(), Some(ProtocolError::Timeout(_)))
    }
}
