//! `hgm` - command-line access to a MAGSYS HGM09s gaussmeter.
//!
//! Usage:
//!   hgm info
//!   hgm config
//!   hgm read field
//!   hgm --transport serial --address /dev/ttyUSB1 read range
//!   hgm set unit GAUS
//!   hgm poll --interval 500ms --count 20

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use hgm_daq::config::{hgm_config::DEFAULT_CONFIG_PATH, HgmConfig, InstrumentFamily, TransportKind};
use hgm_daq::{logging, Gaussmeter, Mode, Unit};
use tracing::{info, warn};

/// Command-line access to a MAGSYS HGM09s gaussmeter.
#[derive(Parser)]
#[command(name = "hgm", version, about)]
struct Cli {
    /// Configuration file (missing file means built-in defaults)
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the port path or VISA resource
    #[arg(long)]
    address: Option<String>,

    /// Override the instrument family: hgm, serial_probe
    #[arg(long)]
    family: Option<String>,

    /// Override the transport: visa, serial
    #[arg(long)]
    transport: Option<String>,

    /// Override the reply timeout (e.g. 500ms, 2s)
    #[arg(long, value_parser = parse_duration)]
    timeout: Option<Duration>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the attribute and command table as JSON
    Info,
    /// Print the effective configuration as TOML
    Config,
    /// Read one attribute
    Read {
        #[arg(value_enum)]
        attribute: ReadTarget,
    },
    /// Write and save one setting
    Set {
        #[arg(value_enum)]
        setting: SetTarget,
        /// Range code, or unit/mode name or ordinal
        value: String,
    },
    /// Read the field periodically
    Poll {
        #[arg(long, default_value = "1s", value_parser = parse_interval)]
        interval: Duration,
        /// Stop after this many readings (default: until Ctrl-C)
        #[arg(long)]
        count: Option<u64>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReadTarget {
    Field,
    Unit,
    Range,
    Mode,
    State,
}

impl ReadTarget {
    fn attribute(self) -> &'static str {
        match self {
            ReadTarget::Field => "field",
            ReadTarget::Unit => "unit",
            ReadTarget::Range => "measrange",
            ReadTarget::Mode => "mode",
            ReadTarget::State => "state",
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SetTarget {
    Range,
    Unit,
    Mode,
}

fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    humantime_serde::re::humantime::parse_duration(s).map_err(|e| format!("invalid duration: {e}"))
}

fn parse_interval(s: &str) -> std::result::Result<Duration, String> {
    let interval = parse_duration(s)?;
    if interval.is_zero() {
        return Err("interval must be positive".to_string());
    }
    Ok(interval)
}

fn load_config(cli: &Cli) -> Result<HgmConfig> {
    let mut config = HgmConfig::load_from(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if let Some(family) = &cli.family {
        config.instrument.family = family.parse::<InstrumentFamily>()?;
    }
    if let Some(transport) = &cli.transport {
        config.instrument.transport = transport.parse::<TransportKind>()?;
    }
    if let Some(address) = &cli.address {
        config.instrument.address = Some(address.clone());
    }
    if let Some(timeout) = cli.timeout {
        config.instrument.timeout = timeout;
    }

    config.validate().context("Invalid command-line override")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    logging::init(&config.application)?;

    let meter = Gaussmeter::from_config(&config.instrument)
        .context("Failed to build gaussmeter adapter")?;

    match &cli.command {
        Command::Config => {
            print!("{}", config.to_toml()?);
            return Ok(());
        }
        Command::Info => {
            println!("{}", serde_json::to_string_pretty(&meter.interface())?);
            return Ok(());
        }
        _ => {}
    }

    let transport = config.instrument.transport;
    if !transport.is_available() {
        anyhow::bail!(
            "Transport '{}' is not built in. Rebuild with --features instrument_{}",
            transport,
            transport
        );
    }

    meter.connect().await.with_context(|| {
        format!(
            "Cannot connect to gaussmeter at {}",
            meter.connection().address()
        )
    })?;

    let outcome = run(&meter, cli.command).await;
    meter.disconnect().await;
    outcome
}

async fn run(meter: &Gaussmeter, command: Command) -> Result<()> {
    match command {
        Command::Read { attribute } => {
            if let ReadTarget::Field = attribute {
                println!("{}", meter.read_field().await?);
            } else {
                println!("{}", meter.read_attribute(attribute.attribute()).await?);
            }
        }
        Command::Set { setting, value } => {
            match setting {
                SetTarget::Range => {
                    let code: i64 = value
                        .trim()
                        .parse()
                        .with_context(|| format!("Range must be an integer, got '{}'", value))?;
                    meter.set_range(code).await?;
                }
                SetTarget::Unit => meter.set_unit(value.parse::<Unit>()?).await?,
                SetTarget::Mode => meter.set_mode(value.parse::<Mode>()?).await?,
            }
            info!(value = value.as_str(), "Setting saved");
        }
        Command::Poll { interval, count } => poll(meter, interval, count).await?,
        Command::Info | Command::Config => {}
    }
    Ok(())
}

async fn poll(meter: &Gaussmeter, interval: Duration, count: Option<u64>) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    let mut taken = 0u64;

    loop {
        if count.is_some_and(|limit| taken >= limit) {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        match meter.read_field().await {
            Ok(measurement) => {
                println!("{}\t{}", measurement.timestamp.to_rfc3339(), measurement);
            }
            Err(err) => {
                warn!(error = %err, "Field read failed");
                if let Some(last) = meter.last_field().await {
                    println!("{}\t{}", last.timestamp.to_rfc3339(), last);
                }
            }
        }
        taken += 1;
    }

    Ok(())
}
