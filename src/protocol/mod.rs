//! Command codecs for the gaussmeter families.
//!
//! A [`CommandCodec`] turns a typed request into the text frames the instrument
//! understands and turns reply text back into a typed [`Reading`]. It never
//! touches a transport, so the same request/response cycle in
//! [`Gaussmeter`](crate::instrument::Gaussmeter) serves every family:
//!
//! - [`HgmCodec`]: the SCPI-style vocabulary of the HGM09s (`:MEAS?`, `:PAR:RANG 2`, ...)
//! - [`SerialProbeCodec`]: the bare serial probe, which only answers `:MEAS?`
//!
//! Reply parsing is shared: every decode path trims the reply and reports a
//! [`ProtocolError::Parse`] for anything that does not match the expected
//! lexical form.

pub mod hgm;
pub mod serial_probe;

pub use hgm::HgmCodec;
pub use serial_probe::SerialProbeCodec;

use crate::config::InstrumentFamily;
use crate::core::{MeasRange, Mode, Unit};
use crate::error::{DaqError, ProtocolError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kinds of value that can be queried from the instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Magnetic field strength
    Field,
    /// Unit setting
    Unit,
    /// Measurement range code
    Range,
    /// AC/DC mode
    Mode,
    /// Instrument identification string
    Identity,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FieldKind::Field => "field",
            FieldKind::Unit => "unit",
            FieldKind::Range => "range",
            FieldKind::Mode => "mode",
            FieldKind::Identity => "identity",
        })
    }
}

/// A new value for one of the persistent instrument settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Setting {
    /// Measurement range code
    Range(MeasRange),
    /// Unit
    Unit(Unit),
    /// Acquisition mode
    Mode(Mode),
}

impl Setting {
    /// The field this setting changes.
    pub fn field(&self) -> FieldKind {
        match self {
            Setting::Range(_) => FieldKind::Range,
            Setting::Unit(_) => FieldKind::Unit,
            Setting::Mode(_) => FieldKind::Mode,
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Range(range) => write!(f, "range={}", range),
            Setting::Unit(unit) => write!(f, "unit={}", unit),
            Setting::Mode(mode) => write!(f, "mode={}", mode),
        }
    }
}

/// A decoded reply.
#[derive(Clone, Debug, PartialEq)]
pub enum Reading {
    /// Field strength
    Field(f64),
    /// Unit setting
    Unit(Unit),
    /// Measurement range code
    Range(MeasRange),
    /// Acquisition mode
    Mode(Mode),
    /// Identification text
    Identity(String),
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Field(value) => write!(f, "{}", value),
            Reading::Unit(unit) => write!(f, "{}", unit),
            Reading::Range(range) => write!(f, "{}", range),
            Reading::Mode(mode) => write!(f, "{}", mode),
            Reading::Identity(text) => f.write_str(text),
        }
    }
}

/// Vocabulary and reply rules of one instrument family.
pub trait CommandCodec: Send + Sync + fmt::Debug {
    /// Short family name used in logs.
    fn name(&self) -> &'static str;

    /// Terminator appended to every outgoing frame.
    fn write_terminator(&self) -> &'static str;

    /// Terminator that ends a reply.
    fn read_terminator(&self) -> &'static str;

    /// Query used to confirm the instrument is alive during `connect()`.
    fn handshake(&self) -> FieldKind;

    /// Fixed unit label for families that do not report a unit setting.
    fn fixed_unit_label(&self) -> Option<&'static str> {
        None
    }

    /// Whether `field` can be queried on this family.
    fn supports(&self, field: FieldKind) -> bool;

    /// The fixed query frame for `field`.
    ///
    /// # Errors
    /// `DaqError::Unsupported` when the family has no such query.
    fn encode_query(&self, field: FieldKind) -> Result<String, DaqError>;

    /// The frames that persist `setting`: the parameter write, then the save.
    ///
    /// # Errors
    /// `DaqError::Unsupported` when the family cannot change this setting.
    fn encode_set(&self, setting: &Setting) -> Result<Vec<String>, DaqError>;

    /// Decode the reply to a `field` query.
    ///
    /// # Errors
    /// `ProtocolError::Parse` when the reply does not match the expected form.
    fn decode(&self, field: FieldKind, reply: &str) -> Result<Reading, ProtocolError>;
}

/// Build the codec for an instrument family.
pub fn codec_for(family: InstrumentFamily) -> Arc<dyn CommandCodec> {
    match family {
        InstrumentFamily::Hgm => Arc::new(HgmCodec),
        InstrumentFamily::SerialProbe => Arc::new(SerialProbeCodec),
    }
}

// =============================================================================
// Shared reply parsing
// =============================================================================

fn parse_error(field: FieldKind, reply: &str) -> ProtocolError {
    ProtocolError::Parse {
        field,
        reply: reply.to_string(),
    }
}

/// Parse a decimal (optionally exponent-notation) field value.
///
/// `inf` and `NaN` are rejected: the instrument never sends them, so seeing
/// one means the stream is out of step.
pub(crate) fn parse_field(reply: &str) -> Result<f64, ProtocolError> {
    let trimmed = reply.trim();
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(parse_error(FieldKind::Field, reply)),
    }
}

pub(crate) fn parse_range(reply: &str) -> Result<MeasRange, ProtocolError> {
    reply
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|code| MeasRange::new(code).ok())
        .ok_or_else(|| parse_error(FieldKind::Range, reply))
}

/// Unit replies carry the member name; a bare ordinal is accepted too.
pub(crate) fn parse_unit(reply: &str) -> Result<Unit, ProtocolError> {
    let trimmed = reply.trim();
    Unit::from_name(trimmed)
        .or_else(|| trimmed.parse::<i64>().ok().and_then(Unit::from_ordinal))
        .ok_or_else(|| parse_error(FieldKind::Unit, reply))
}

pub(crate) fn parse_mode(reply: &str) -> Result<Mode, ProtocolError> {
    let trimmed = reply.trim();
    Mode::from_name(trimmed)
        .or_else(|| trimmed.parse::<i64>().ok().and_then(Mode::from_ordinal))
        .ok_or_else(|| parse_error(FieldKind::Mode, reply))
}

pub(crate) fn parse_identity(reply: &str) -> Result<String, ProtocolError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        Err(parse_error(FieldKind::Identity, reply))
    } else {
        Ok(trimmed.to_string())
    }
}
