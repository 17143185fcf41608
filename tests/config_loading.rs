//! Configuration loading from file and environment.

use hgm_daq::config::{ConfigError, HgmConfig, InstrumentFamily, LogFormat, TransportKind};
use hgm_daq::Gaussmeter;
use serial_test::serial;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const ENV_KEYS: [&str; 4] = [
    "HGM_APPLICATION__LOG_LEVEL",
    "HGM_INSTRUMENT__ADDRESS",
    "HGM_INSTRUMENT__BAUD_RATE",
    "HGM_INSTRUMENT__TIMEOUT",
];

fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
#[serial]
fn loads_values_from_file() {
    clear_env();
    let file = write_config(
        r#"
[application]
log_level = "debug"
log_format = "json"

[instrument]
family = "serial_probe"
transport = "serial"
address = "/dev/ttyUSB3"
baud_rate = 19200
timeout = "250ms"
"#,
    );

    let config = HgmConfig::load_from(file.path()).unwrap();
    assert_eq!(config.application.log_level, "debug");
    assert_eq!(config.application.log_format, LogFormat::Json);
    assert_eq!(config.instrument.family, InstrumentFamily::SerialProbe);
    assert_eq!(config.instrument.transport, TransportKind::Serial);
    assert_eq!(config.instrument.address(), "/dev/ttyUSB3");
    assert_eq!(config.instrument.baud_rate, 19200);
    assert_eq!(config.instrument.timeout, Duration::from_millis(250));

    let connection = config.instrument.connection().unwrap();
    assert_eq!(connection.timeout(), Duration::from_millis(250));
}

#[test]
#[serial]
fn missing_file_falls_back_to_defaults() {
    clear_env();
    let config = HgmConfig::load_from("does/not/exist.toml").unwrap();
    assert_eq!(config, HgmConfig::default());
    assert_eq!(config.instrument.transport, TransportKind::Serial);
    assert_eq!(config.instrument.address(), "/dev/ttyGaussmeter");
}

#[cfg(feature = "instrument_serial")]
#[test]
#[serial]
fn default_and_sample_configs_use_a_built_in_transport() {
    clear_env();
    let defaults = HgmConfig::load_from("does/not/exist.toml").unwrap();
    assert!(defaults.instrument.transport.is_available());

    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/hgm.toml");
    let sample = HgmConfig::load_from(path).unwrap();
    assert!(sample.instrument.transport.is_available());

    let meter = Gaussmeter::from_config(&defaults.instrument).unwrap();
    assert_eq!(meter.connection().address(), "/dev/ttyGaussmeter");
}

#[test]
#[serial]
fn environment_overrides_file() {
    clear_env();
    let file = write_config(
        r#"
[instrument]
address = "ASRL/dev/ttyUSB0::INSTR"
timeout = "1s"
"#,
    );

    std::env::set_var("HGM_INSTRUMENT__ADDRESS", "ASRL/dev/ttyUSB7::INSTR");
    std::env::set_var("HGM_INSTRUMENT__TIMEOUT", "2s");
    let loaded = HgmConfig::load_from(file.path());
    clear_env();

    let config = loaded.unwrap();
    assert_eq!(config.instrument.address(), "ASRL/dev/ttyUSB7::INSTR");
    assert_eq!(config.instrument.timeout, Duration::from_secs(2));
}

#[test]
#[serial]
fn invalid_values_fail_validation() {
    clear_env();
    let file = write_config(
        r#"
[instrument]
family = "serial_probe"
transport = "visa"
"#,
    );
    assert!(matches!(
        HgmConfig::load_from(file.path()),
        Err(ConfigError::ValidationError(_))
    ));

    let file = write_config(
        r#"
[instrument]
baud_rate = 0
"#,
    );
    assert!(matches!(
        HgmConfig::load_from(file.path()),
        Err(ConfigError::ValidationError(_))
    ));
}

#[test]
#[serial]
fn malformed_file_is_load_error() {
    clear_env();
    let file = write_config(
        r#"
[instrument]
transport = "gpib"
"#,
    );
    assert!(matches!(
        HgmConfig::load_from(file.path()),
        Err(ConfigError::LoadError(_))
    ));
}

#[test]
#[serial]
fn shipped_sample_config_is_valid() {
    clear_env();
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/hgm.toml");
    let config = HgmConfig::load_from(path).unwrap();
    assert_eq!(config.instrument.family, InstrumentFamily::Hgm);

    let meter = Gaussmeter::from_config(&config.instrument).unwrap();
    assert_eq!(meter.interface().device_model, "MAGSYS HGM09s");
}
