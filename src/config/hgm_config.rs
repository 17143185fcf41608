//! Gaussmeter configuration using Figment
//!
//! Strongly-typed configuration loading. Values are merged from built-in
//! defaults, an optional TOML file and `HGM_`-prefixed environment variables,
//! then validated once. The resulting [`ConnectionConfig`] is handed to the
//! adapter at construction and never changes afterwards.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/hgm.toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment could not read or deserialize a source.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    /// A value was read but is not usable.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HgmConfig {
    /// Application settings
    pub application: ApplicationConfig,
    /// The gaussmeter connection
    pub instrument: InstrumentConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "hgm-daq".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    Pretty,
    /// One JSON object per event
    Json,
}

/// Which command vocabulary the instrument speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentFamily {
    /// HGM09s SCPI-style commands (field, unit, range, mode)
    Hgm,
    /// Field-only serial probe
    SerialProbe,
}

impl fmt::Display for InstrumentFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InstrumentFamily::Hgm => "hgm",
            InstrumentFamily::SerialProbe => "serial_probe",
        })
    }
}

impl FromStr for InstrumentFamily {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hgm" => Ok(InstrumentFamily::Hgm),
            "serial_probe" | "serial-probe" => Ok(InstrumentFamily::SerialProbe),
            other => Err(ConfigError::ValidationError(format!(
                "Invalid instrument family '{}'. Must be one of: hgm, serial_probe",
                other
            ))),
        }
    }
}

/// How the instrument is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// VISA resource string (e.g. `ASRL/dev/ttyUSB0::INSTR`)
    Visa,
    /// Raw serial port path (e.g. `/dev/ttyUSB0`, `COM3`)
    Serial,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Visa => "visa",
            TransportKind::Serial => "serial",
        })
    }
}

impl TransportKind {
    /// Whether this build carries the driver for the transport.
    pub fn is_available(self) -> bool {
        match self {
            TransportKind::Visa => cfg!(feature = "instrument_visa"),
            TransportKind::Serial => cfg!(feature = "instrument_serial"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "visa" => Ok(TransportKind::Visa),
            "serial" => Ok(TransportKind::Serial),
            other => Err(ConfigError::ValidationError(format!(
                "Invalid transport '{}'. Must be one of: visa, serial",
                other
            ))),
        }
    }
}

/// Instrument connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    /// Command vocabulary
    pub family: InstrumentFamily,
    /// Transport type
    pub transport: TransportKind,
    /// Port path or VISA resource; defaults depend on `transport`
    pub address: Option<String>,
    /// Baud rate (serial transport only)
    pub baud_rate: u32,
    /// Read timeout for one exchange
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            family: InstrumentFamily::Hgm,
            transport: TransportKind::Serial,
            address: None,
            baud_rate: default_baud_rate(),
            timeout: default_timeout(),
        }
    }
}

fn default_baud_rate() -> u32 {
    9600
}

fn default_timeout() -> Duration {
    Duration::from_secs(1)
}

impl InstrumentConfig {
    /// Default serial device of the probe installation.
    pub const DEFAULT_SERIAL_PORT: &'static str = "/dev/ttyGaussmeter";
    /// Default VISA resource of the HGM09s USB adapter.
    pub const DEFAULT_VISA_RESOURCE: &'static str = "ASRL/dev/ttyUSB0::INSTR";

    /// Configured address, or the default for the transport.
    pub fn address(&self) -> &str {
        match (&self.address, self.transport) {
            (Some(address), _) => address,
            (None, TransportKind::Serial) => Self::DEFAULT_SERIAL_PORT,
            (None, TransportKind::Visa) => Self::DEFAULT_VISA_RESOURCE,
        }
    }

    /// The immutable connection settings handed to the adapter.
    pub fn connection(&self) -> Result<ConnectionConfig, ConfigError> {
        ConnectionConfig::new(self.address(), self.baud_rate, self.timeout)
    }
}

/// Immutable connection settings.
///
/// Validated on construction; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    address: String,
    baud_rate: u32,
    timeout: Duration,
}

impl ConnectionConfig {
    /// Validate and build connection settings.
    pub fn new(
        address: impl Into<String>,
        baud_rate: u32,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let address = address.into();
        if address.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Instrument address cannot be empty".to_string(),
            ));
        }
        if baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "Baud rate must be positive".to_string(),
            ));
        }
        if timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "Timeout must be positive".to_string(),
            ));
        }
        Ok(Self {
            address,
            baud_rate,
            timeout,
        })
    }

    /// Port path or VISA resource string.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Baud rate (serial only).
    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    /// Read timeout for one exchange.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl HgmConfig {
    /// Load configuration from the default location
    ///
    /// A missing file is not an error; defaults and environment apply.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the configuration cannot be parsed or is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file (relative or absolute)
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file cannot be parsed or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(Serialized::defaults(HgmConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("HGM_").split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Connection settings are usable (non-empty address, positive baud rate and timeout)
    /// - The serial probe is only used over a raw serial transport
    ///
    /// # Errors
    ///
    /// Returns a ConfigError with a descriptive message for any validation failure.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        self.instrument.connection()?;

        if self.instrument.family == InstrumentFamily::SerialProbe
            && self.instrument.transport != TransportKind::Serial
        {
            return Err(ConfigError::ValidationError(format!(
                "Instrument family '{}' requires the serial transport, got '{}'",
                self.instrument.family, self.instrument.transport
            )));
        }

        Ok(())
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ValidationError(format!("Cannot render config: {}", e)))
    }
}
