//! Core value types for the gaussmeter adapter.
//!
//! These are the device-derived values the adapter hands back to callers:
//!
//! - [`Measurement`]: one field reading in the instrument's native unit
//! - [`Unit`]: the instrument's unit setting (`TESL`, `APM`, `GAUS`, `OE`)
//! - [`MeasRange`]: the sensitivity tier, a code in `0..=3`
//! - [`Mode`]: DC or AC acquisition
//!
//! Unit and mode keep the instrument's own encoding. The ordinal and the
//! protocol name of every member are fixed and round-trip exactly.

use crate::error::DaqError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Measurement
// =============================================================================

/// A single field reading.
///
/// Each `read_field()` produces a fresh measurement. The adapter keeps the
/// last successful one so a display can fall back to it; that copy is
/// handed out with `stale` set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// Field strength as reported by the instrument
    pub value: f64,
    /// Unit label (e.g. "T", "G", "mT"); empty when not yet known
    pub unit: String,
    /// UTC time the reply was decoded
    pub timestamp: DateTime<Utc>,
    /// True when this is a retained value rather than a fresh read
    pub stale: bool,
}

impl Measurement {
    /// Create a fresh measurement stamped with the current time.
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
            timestamp: Utc::now(),
            stale: false,
        }
    }

    /// Copy of this measurement marked as stale.
    pub fn to_stale(&self) -> Self {
        Self {
            stale: true,
            ..self.clone()
        }
    }

    /// Value rendered with the 5-decimal precision of the field attribute.
    pub fn formatted(&self) -> String {
        format!("{:.5}", self.value)
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}", self.value)?;
        if !self.unit.is_empty() {
            write!(f, " {}", self.unit)?;
        }
        if self.stale {
            write!(f, " (stale)")?;
        }
        Ok(())
    }
}

// =============================================================================
// Unit
// =============================================================================

/// Unit setting of the HGM09s.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    /// Tesla (`TESL`)
    Tesla,
    /// Ampere per meter (`APM`)
    AmpPerMeter,
    /// Gauss (`GAUS`)
    Gauss,
    /// Oersted (`OE`)
    Oersted,
}

impl Unit {
    /// All members in ordinal order.
    pub const ALL: [Unit; 4] = [Unit::Tesla, Unit::AmpPerMeter, Unit::Gauss, Unit::Oersted];

    /// Protocol names in ordinal order.
    pub const NAMES: [&'static str; 4] = ["TESL", "APM", "GAUS", "OE"];

    /// Ordinal used by the instrument.
    pub fn ordinal(self) -> u8 {
        match self {
            Unit::Tesla => 0,
            Unit::AmpPerMeter => 1,
            Unit::Gauss => 2,
            Unit::Oersted => 3,
        }
    }

    /// Name the instrument uses on the wire.
    pub fn name(self) -> &'static str {
        Self::NAMES[self.ordinal() as usize]
    }

    /// Physical unit symbol for labelling readings.
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Tesla => "T",
            Unit::AmpPerMeter => "A/m",
            Unit::Gauss => "G",
            Unit::Oersted => "Oe",
        }
    }

    /// Look up a member by ordinal.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Look up a member by protocol name (ASCII case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|unit| unit.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Unit {
    type Error = DaqError;

    fn try_from(ordinal: i64) -> Result<Self, Self::Error> {
        Self::from_ordinal(ordinal).ok_or_else(|| {
            DaqError::Validation(format!(
                "Unit ordinal {} invalid. Valid ordinals: 0=TESL, 1=APM, 2=GAUS, 3=OE",
                ordinal
            ))
        })
    }
}

impl FromStr for Unit {
    type Err = DaqError;

    /// Accepts either the protocol name or the ordinal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(unit) = Self::from_name(s) {
            return Ok(unit);
        }
        match s.parse::<i64>() {
            Ok(ordinal) => Self::try_from(ordinal),
            Err(_) => Err(DaqError::Validation(format!(
                "Unknown unit '{}'. Expected one of: {}",
                s,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

// =============================================================================
// Mode
// =============================================================================

/// Acquisition mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mode {
    /// Static field (`DC`)
    Dc,
    /// Alternating field (`AC`)
    Ac,
}

impl Mode {
    /// All members in ordinal order.
    pub const ALL: [Mode; 2] = [Mode::Dc, Mode::Ac];

    /// Protocol names in ordinal order.
    pub const NAMES: [&'static str; 2] = ["DC", "AC"];

    /// Ordinal used by the instrument.
    pub fn ordinal(self) -> u8 {
        match self {
            Mode::Dc => 0,
            Mode::Ac => 1,
        }
    }

    /// Name the instrument uses on the wire.
    pub fn name(self) -> &'static str {
        Self::NAMES[self.ordinal() as usize]
    }

    /// Look up a member by ordinal.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    /// Look up a member by protocol name (ASCII case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<i64> for Mode {
    type Error = DaqError;

    fn try_from(ordinal: i64) -> Result<Self, Self::Error> {
        Self::from_ordinal(ordinal).ok_or_else(|| {
            DaqError::Validation(format!(
                "Mode ordinal {} invalid. Valid ordinals: 0=DC, 1=AC",
                ordinal
            ))
        })
    }
}

impl FromStr for Mode {
    type Err = DaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(mode) = Self::from_name(s) {
            return Ok(mode);
        }
        match s.parse::<i64>() {
            Ok(ordinal) => Self::try_from(ordinal),
            Err(_) => Err(DaqError::Validation(format!(
                "Unknown mode '{}'. Expected one of: {}",
                s,
                Self::NAMES.join(", ")
            ))),
        }
    }
}

// =============================================================================
// MeasRange
// =============================================================================

/// Measurement range code. Only `0..=3` can be constructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct MeasRange(u8);

impl MeasRange {
    /// Highest valid range code.
    pub const MAX: u8 = 3;

    /// Validate a caller-supplied range code.
    pub fn new(code: i64) -> Result<Self, DaqError> {
        match u8::try_from(code) {
            Ok(code) if code <= Self::MAX => Ok(Self(code)),
            _ => Err(DaqError::Validation(format!(
                "Measurement range {} out of range [0, {}]",
                code,
                Self::MAX
            ))),
        }
    }

    /// The range code.
    pub fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Display for MeasRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<i64> for MeasRange {
    type Error = DaqError;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        Self::new(code)
    }
}

impl From<MeasRange> for i64 {
    fn from(range: MeasRange) -> Self {
        i64::from(range.0)
    }
}
