//! Device adapter for the MAGSYS HGM09s gaussmeter.
//!
//! The adapter owns a serial or VISA connection to the instrument, issues
//! its SCPI-style queries and settings, decodes the replies into typed values
//! and reports failures through [`DaqError`]. A bare serial field probe that
//! only answers field queries is supported through the same surface.
//!
//! ```no_run
//! use hgm_daq::{config::HgmConfig, instrument::Gaussmeter};
//!
//! # async fn run() -> hgm_daq::AppResult<()> {
//! let config = HgmConfig::load()?;
//! let meter = Gaussmeter::from_config(&config.instrument)?;
//! meter.connect().await?;
//! println!("{}", meter.read_field().await?);
//! meter.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod instrument;
pub mod lifecycle;
pub mod logging;
pub mod protocol;

pub use crate::core::{MeasRange, Measurement, Mode, Unit};
pub use error::{AppResult, DaqError, ProtocolError};
pub use instrument::Gaussmeter;
pub use lifecycle::AdapterState;
