//! MAGSYS HGM09s gaussmeter adapter
//!
//! `Gaussmeter` owns one transport and one command codec. Every public
//! operation is a single request/response exchange (or, for settings, a
//! parameter write followed by a save) performed while holding the transport
//! lock, so concurrent callers are serialized and replies cannot cross.
//!
//! Exchanges are one-shot: a timeout or an undecodable reply is reported as
//! [`DaqError::Device`] and the adapter stays `Ready`. Only `connect()` can
//! move the adapter to `Faulted`.
//!
//! ## Configuration
//!
//! ```toml
//! [instrument]
//! family = "hgm"
//! transport = "serial"
//! address = "/dev/ttyUSB0"
//! timeout = "1s"
//! ```

use crate::adapters::{transport_for, Framing, Transport};
use crate::config::{ConnectionConfig, InstrumentConfig};
use crate::core::{MeasRange, Measurement, Mode, Unit};
use crate::error::{AppResult, DaqError, ProtocolError};
use crate::lifecycle::{AdapterState, ConnectStart, Lifecycle};
use crate::protocol::{codec_for, CommandCodec, FieldKind, Reading, Setting};
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

/// Device-derived values from the most recent successful exchanges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observed {
    /// Last successful field reading
    pub field: Option<Measurement>,
    /// Last unit read or written
    pub unit: Option<Unit>,
    /// Last range read or written
    pub range: Option<MeasRange>,
    /// Last mode read or written
    pub mode: Option<Mode>,
    /// Identification string from the handshake
    pub identity: Option<String>,
}

impl Observed {
    fn record(&mut self, reading: &Reading) {
        match reading {
            Reading::Unit(unit) => self.unit = Some(*unit),
            Reading::Range(range) => self.range = Some(*range),
            Reading::Mode(mode) => self.mode = Some(*mode),
            Reading::Identity(text) => self.identity = Some(text.clone()),
            // Field readings become a Measurement in `read_field`
            Reading::Field(_) => {}
        }
    }

    fn apply(&mut self, setting: Setting) {
        match setting {
            Setting::Range(range) => self.range = Some(range),
            Setting::Unit(unit) => self.unit = Some(unit),
            Setting::Mode(mode) => self.mode = Some(mode),
        }
    }
}

struct Inner {
    transport: Box<dyn Transport>,
    observed: Observed,
}

/// Adapter for one physical gaussmeter connection.
pub struct Gaussmeter {
    connection: ConnectionConfig,
    codec: Arc<dyn CommandCodec>,
    inner: Mutex<Inner>,
    lifecycle: Lifecycle,
}

impl fmt::Debug for Gaussmeter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gaussmeter")
            .field("address", &self.connection.address())
            .field("codec", &self.codec.name())
            .field("state", &self.state())
            .finish()
    }
}

impl Gaussmeter {
    /// Create a disconnected adapter over an explicit transport and codec.
    pub fn new(
        connection: ConnectionConfig,
        transport: Box<dyn Transport>,
        codec: Arc<dyn CommandCodec>,
    ) -> Self {
        Self {
            connection,
            codec,
            inner: Mutex::new(Inner {
                transport,
                observed: Observed::default(),
            }),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Build the transport and codec described by the instrument configuration.
    pub fn from_config(config: &InstrumentConfig) -> AppResult<Self> {
        let connection = config.connection()?;
        let codec = codec_for(config.family);
        let framing = Framing::for_codec(codec.as_ref());
        let transport = transport_for(config.transport, &connection, framing);
        Ok(Self::new(connection, transport, codec))
    }

    /// Connection settings fixed at construction.
    pub fn connection(&self) -> &ConnectionConfig {
        &self.connection
    }

    /// The command vocabulary in use.
    pub fn codec(&self) -> &dyn CommandCodec {
        self.codec.as_ref()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> AdapterState {
        self.lifecycle.state()
    }

    /// Receiver that is notified on every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<AdapterState> {
        self.lifecycle.subscribe()
    }

    /// Open the transport and confirm the instrument answers.
    ///
    /// Succeeds immediately when already `Ready`. On failure the transport is
    /// released, the adapter is `Faulted` and no retry is attempted.
    ///
    /// # Errors
    /// `DaqError::Connection` if the transport cannot be opened or the
    /// handshake query fails.
    pub async fn connect(&self) -> AppResult<()> {
        let mut inner = self.inner.lock().await;
        if self.lifecycle.begin_connect()? == ConnectStart::AlreadyReady {
            debug!("connect() while Ready, nothing to do");
            return Ok(());
        }

        info!(
            transport = %inner.transport.info(),
            codec = self.codec.name(),
            "Connecting to gaussmeter"
        );

        match self.establish(&mut inner).await {
            Ok(()) => {
                self.lifecycle.mark_ready()?;
                info!(
                    identity = inner.observed.identity.as_deref().unwrap_or(""),
                    "Gaussmeter ready"
                );
                Ok(())
            }
            Err(err) => {
                inner.transport.close();
                let reason = match err {
                    DaqError::Connection(reason) => reason,
                    other => format!("Handshake with {} failed: {}", self.connection.address(), other),
                };
                self.lifecycle.mark_faulted(&reason)?;
                Err(DaqError::Connection(reason))
            }
        }
    }

    async fn establish(&self, inner: &mut Inner) -> AppResult<()> {
        inner.transport.open().await?;
        let field = self.codec.handshake();
        let query = self.codec.encode_query(field)?;
        let reply = self.exchange(inner, field, &query).await?;
        let reading = self.codec.decode(field, &reply)?;
        if let Reading::Field(value) = reading {
            inner.observed.field = Some(Measurement::new(value, unit_label(&*self.codec, &inner.observed)));
        }
        inner.observed.record(&reading);
        Ok(())
    }

    /// Release the transport. Always ends `Disconnected`.
    pub async fn disconnect(&self) {
        let mut inner = self.inner.lock().await;
        inner.transport.close();
        self.lifecycle.mark_disconnected();
    }

    /// Query the field strength.
    ///
    /// The measurement is labelled with the last known unit (or the fixed
    /// label of the serial probe) and retained for [`last_field`](Self::last_field).
    pub async fn read_field(&self) -> AppResult<Measurement> {
        self.query(FieldKind::Field, |codec, observed, reading| match reading {
            Reading::Field(value) => {
                let measurement = Measurement::new(value, unit_label(codec, observed));
                observed.field = Some(measurement.clone());
                Some(measurement)
            }
            _ => None,
        })
        .await
    }

    /// Query the unit setting.
    pub async fn read_unit(&self) -> AppResult<Unit> {
        self.query(FieldKind::Unit, |_, _, reading| match reading {
            Reading::Unit(unit) => Some(unit),
            _ => None,
        })
        .await
    }

    /// Query the measurement range code.
    pub async fn read_range(&self) -> AppResult<MeasRange> {
        self.query(FieldKind::Range, |_, _, reading| match reading {
            Reading::Range(range) => Some(range),
            _ => None,
        })
        .await
    }

    /// Query the acquisition mode.
    pub async fn read_mode(&self) -> AppResult<Mode> {
        self.query(FieldKind::Mode, |_, _, reading| match reading {
            Reading::Mode(mode) => Some(mode),
            _ => None,
        })
        .await
    }

    /// Write and save a new measurement range.
    ///
    /// # Errors
    /// `DaqError::Validation` without any I/O if `code` is outside `0..=3`.
    pub async fn set_range(&self, code: i64) -> AppResult<()> {
        let range = MeasRange::new(code)?;
        self.apply(Setting::Range(range)).await
    }

    /// Write and save a new unit.
    pub async fn set_unit(&self, unit: Unit) -> AppResult<()> {
        self.apply(Setting::Unit(unit)).await
    }

    /// Write and save a new acquisition mode.
    pub async fn set_mode(&self, mode: Mode) -> AppResult<()> {
        self.apply(Setting::Mode(mode)).await
    }

    /// Last successful field reading, marked stale.
    pub async fn last_field(&self) -> Option<Measurement> {
        let inner = self.inner.lock().await;
        inner.observed.field.as_ref().map(Measurement::to_stale)
    }

    /// Snapshot of every value observed so far.
    pub async fn observed(&self) -> Observed {
        self.inner.lock().await.observed.clone()
    }

    /// Identification string returned by the handshake, if the family has one.
    pub async fn identity(&self) -> Option<String> {
        self.inner.lock().await.observed.identity.clone()
    }

    async fn query<T, F>(&self, field: FieldKind, accept: F) -> AppResult<T>
    where
        F: FnOnce(&dyn CommandCodec, &mut Observed, Reading) -> Option<T> + Send,
    {
        let query = self.codec.encode_query(field)?;

        let mut inner = self.inner.lock().await;
        self.lifecycle.require_ready()?;

        let result = match self.exchange(&mut inner, field, &query).await {
            Ok(reply) => self.codec.decode(field, &reply).and_then(|reading| {
                inner.observed.record(&reading);
                accept(&*self.codec, &mut inner.observed, reading).ok_or_else(|| {
                    ProtocolError::Parse {
                        field,
                        reply: reply.clone(),
                    }
                })
            }),
            Err(err) => Err(err),
        };

        result.map_err(|err| {
            warn!(%field, error = %err, "Gaussmeter query failed");
            DaqError::Device(err)
        })
    }

    async fn apply(&self, setting: Setting) -> AppResult<()> {
        let frames = self.codec.encode_set(&setting)?;

        let mut inner = self.inner.lock().await;
        self.lifecycle.require_ready()?;

        for frame in &frames {
            if let Err(err) = inner.transport.write_line(frame).await {
                warn!(%setting, frame = frame.as_str(), error = %err, "Gaussmeter setting failed");
                return Err(DaqError::Device(err));
            }
        }

        inner.observed.apply(setting);
        info!(%setting, "Gaussmeter setting saved");
        Ok(())
    }

    async fn exchange(
        &self,
        inner: &mut Inner,
        field: FieldKind,
        query: &str,
    ) -> Result<String, ProtocolError> {
        inner.transport.write_line(query).await?;
        let reply = inner.transport.read_line(self.connection.timeout()).await?;
        debug!(%field, query, reply = reply.as_str(), "Gaussmeter exchange");
        Ok(reply)
    }
}

fn unit_label(codec: &dyn CommandCodec, observed: &Observed) -> String {
    observed
        .unit
        .map(|unit| unit.symbol().to_string())
        .or_else(|| codec.fixed_unit_label().map(str::to_string))
        .unwrap_or_default()
}

impl Drop for Gaussmeter {
    fn drop(&mut self) {
        self.inner.get_mut().transport.close();
    }
}
