//! Adapter lifecycle state machine.
//!
//! ```text
//!              connect()                 handshake ok
//! Disconnected ─────────► Connecting ─────────────────► Ready
//!      ▲  ▲                   │                           │
//!      │  │                   │ open / handshake failed   │ disconnect()
//!      │  │                   ▼                           │
//!      │  └─── disconnect() ─ Faulted                     │
//!      │                      │  connect() ─► Connecting  │
//!      └──────────────────────┴───────────────────────────┘
//! ```
//!
//! A failed exchange while `Ready` leaves the state alone; only connection
//! establishment can fault the adapter, and nothing recovers from `Faulted`
//! except an explicit `connect()`.
//!
//! The current state is held in a `tokio::sync::watch` channel so a
//! scheduler or display can await changes instead of polling.

use crate::error::DaqError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::{info, warn};

/// Connection state of the adapter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AdapterState {
    /// No transport handle (initial state)
    Disconnected,
    /// Transport opening or handshake in flight
    Connecting,
    /// Handshake confirmed; exchanges allowed
    Ready,
    /// Connection establishment failed
    Faulted,
}

impl AdapterState {
    /// Whether the state machine allows `self -> next`.
    pub fn can_transition_to(self, next: AdapterState) -> bool {
        use AdapterState::*;
        matches!(
            (self, next),
            (Disconnected, Connecting)
                | (Faulted, Connecting)
                | (Connecting, Ready)
                | (Connecting, Faulted)
                | (_, Disconnected)
        )
    }
}

impl fmt::Display for AdapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdapterState::Disconnected => "Disconnected",
            AdapterState::Connecting => "Connecting",
            AdapterState::Ready => "Ready",
            AdapterState::Faulted => "Faulted",
        })
    }
}

/// Outcome of asking to start a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectStart {
    /// The adapter moved to `Connecting`; the caller must finish or fault it.
    Started,
    /// Already `Ready`; nothing to do.
    AlreadyReady,
}

/// Drives and publishes [`AdapterState`] transitions.
#[derive(Debug)]
pub struct Lifecycle {
    sender: watch::Sender<AdapterState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start in `Disconnected`.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(AdapterState::Disconnected);
        Self { sender }
    }

    /// Current state.
    pub fn state(&self) -> AdapterState {
        *self.sender.borrow()
    }

    /// Receiver that observes every published transition.
    pub fn subscribe(&self) -> watch::Receiver<AdapterState> {
        self.sender.subscribe()
    }

    /// Begin `connect()`: Disconnected/Faulted -> Connecting.
    pub fn begin_connect(&self) -> Result<ConnectStart, DaqError> {
        if self.state() == AdapterState::Ready {
            return Ok(ConnectStart::AlreadyReady);
        }
        self.transition(AdapterState::Connecting)?;
        Ok(ConnectStart::Started)
    }

    /// Handshake confirmed: Connecting -> Ready.
    pub fn mark_ready(&self) -> Result<(), DaqError> {
        self.transition(AdapterState::Ready)
    }

    /// Open or handshake failed: Connecting -> Faulted.
    pub fn mark_faulted(&self, reason: &str) -> Result<(), DaqError> {
        warn!(reason, "connection attempt faulted");
        self.transition(AdapterState::Faulted)
    }

    /// Any state -> Disconnected.
    pub fn mark_disconnected(&self) {
        let previous = self.sender.send_replace(AdapterState::Disconnected);
        if previous != AdapterState::Disconnected {
            info!(from = %previous, to = %AdapterState::Disconnected, "adapter state changed");
        }
    }

    /// Fail with `NotReady` unless the adapter is `Ready`.
    pub fn require_ready(&self) -> Result<(), DaqError> {
        match self.state() {
            AdapterState::Ready => Ok(()),
            other => Err(DaqError::NotReady(other)),
        }
    }

    fn transition(&self, next: AdapterState) -> Result<(), DaqError> {
        let mut result = Ok(());
        self.sender.send_if_modified(|state| {
            let from = *state;
            if from.can_transition_to(next) {
                info!(from = %from, to = %next, "adapter state changed");
                *state = next;
                true
            } else {
                result = Err(DaqError::InvalidTransition { from, to: next });
                false
            }
        });
        result
    }
}
