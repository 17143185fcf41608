//! Configuration System
//!
//! Configuration management for the gaussmeter adapter using Figment.
//!
//! # Configuration Sources
//!
//! Configuration is loaded from (in order of precedence):
//! 1. Environment variables prefixed with `HGM_`
//! 2. TOML configuration file (default: `config/hgm.toml`)
//! 3. Built-in defaults matching the factory setup of the HGM09s
//!
//! # Example
//!
//! ```no_run
//! use hgm_daq::config::HgmConfig;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HgmConfig::load_from("config/hgm.toml")?;
//!     println!("Address: {}", config.instrument.address());
//!     println!("Timeout: {:?}", config.instrument.timeout);
//!     Ok(())
//! }
//! ```
//!
//! # Environment Variables
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! HGM_APPLICATION__LOG_LEVEL=debug
//! HGM_INSTRUMENT__ADDRESS=/dev/ttyUSB1
//! HGM_INSTRUMENT__BAUD_RATE=19200
//! HGM_INSTRUMENT__TIMEOUT=500ms
//! ```

pub mod hgm_config;

pub use hgm_config::{
    ApplicationConfig, ConfigError, ConnectionConfig, HgmConfig, InstrumentConfig,
    InstrumentFamily, LogFormat, TransportKind,
};
