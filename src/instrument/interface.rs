//! Static description of the gaussmeter's remote-control surface.
//!
//! A control-system layer registers attributes and commands from the
//! [`InterfaceTable`] and forwards calls by name through
//! [`Gaussmeter::read_attribute`] and [`Gaussmeter::execute`]. The adapter has
//! no dependency on any such layer.

use super::Gaussmeter;
use crate::core::{Mode, Unit};
use crate::error::{AppResult, DaqError};
use crate::lifecycle::AdapterState;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Device model string published to the control system.
pub const DEVICE_MODEL: &str = "MAGSYS HGM09s";
/// Manufacturer string published to the control system.
pub const MANUFACTURER: &str = "MAGSYS Magnet Systeme GmbH";

/// Value type of an attribute or command argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// 64-bit float
    Double,
    /// 64-bit signed integer
    Long,
    /// Enumeration given by ordinal, labels listed in the descriptor
    Enum,
    /// Adapter state
    State,
    /// No argument
    Void,
}

/// Attribute access mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    /// Read only
    Read,
}

/// Operator display level.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayLevel {
    /// Shown to every operator
    Operator,
    /// Shown in expert views only
    Expert,
}

/// One read attribute.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttributeDescriptor {
    /// Registration name
    pub name: &'static str,
    /// Operator-facing label
    pub label: &'static str,
    /// Value type
    pub data_type: DataType,
    /// Access mode
    pub access: Access,
    /// Physical unit, empty when the value carries its own
    pub unit: &'static str,
    /// printf-style display format
    pub format: &'static str,
    /// Operator display level
    pub display_level: DisplayLevel,
    /// Labels by ordinal for `DataType::Enum`
    pub enum_labels: &'static [&'static str],
}

/// One command.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CommandDescriptor {
    /// Registration name
    pub name: &'static str,
    /// Argument type, `Void` for none
    pub argument_type: DataType,
    /// One-line help text
    pub description: &'static str,
    /// Operator display level
    pub display_level: DisplayLevel,
}

/// Everything a control system needs to register the adapter.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InterfaceTable {
    /// Device model string
    pub device_model: &'static str,
    /// Manufacturer string
    pub manufacturer: &'static str,
    /// Instrument family of this adapter instance
    pub family: &'static str,
    /// Read attributes
    pub attributes: Vec<AttributeDescriptor>,
    /// Commands
    pub commands: Vec<CommandDescriptor>,
}

impl InterfaceTable {
    /// Look up an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Look up a command by name.
    pub fn command(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|c| c.name == name)
    }
}

/// A value read through [`Gaussmeter::read_attribute`].
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttributeValue {
    /// Floating-point value
    Double(f64),
    /// Integer value
    Long(i64),
    /// Enumeration member
    Enum {
        /// Ordinal used by the instrument
        ordinal: u8,
        /// Protocol name
        name: String,
    },
    /// Adapter state
    State(AdapterState),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Double(value) => write!(f, "{:.5}", value),
            AttributeValue::Long(value) => write!(f, "{}", value),
            AttributeValue::Enum { ordinal, name } => write!(f, "{} ({})", name, ordinal),
            AttributeValue::State(state) => write!(f, "{}", state),
        }
    }
}

fn attribute(
    name: &'static str,
    label: &'static str,
    data_type: DataType,
    format: &'static str,
    display_level: DisplayLevel,
    enum_labels: &'static [&'static str],
) -> AttributeDescriptor {
    AttributeDescriptor {
        name,
        label,
        data_type,
        access: Access::Read,
        unit: "",
        format,
        display_level,
        enum_labels,
    }
}

fn command(
    name: &'static str,
    argument_type: DataType,
    description: &'static str,
) -> CommandDescriptor {
    CommandDescriptor {
        name,
        argument_type,
        description,
        display_level: DisplayLevel::Operator,
    }
}

impl Gaussmeter {
    /// Attributes and commands this adapter serves.
    ///
    /// The serial probe only measures field, so its table carries the field
    /// and state attributes and the connection commands.
    pub fn interface(&self) -> InterfaceTable {
        let codec = self.codec();
        let field_format = if codec.fixed_unit_label().is_some() {
            "%.5f"
        } else {
            "%8.5e"
        };

        let mut attributes = vec![attribute(
            "field",
            "Magnetic field",
            DataType::Double,
            field_format,
            DisplayLevel::Operator,
            &[],
        )];
        let mut commands = Vec::new();

        if codec.fixed_unit_label().is_some() {
            if let Some(field) = attributes.first_mut() {
                field.unit = crate::protocol::serial_probe::PROBE_UNIT;
            }
        } else {
            attributes.extend([
                attribute("unit", "Unit", DataType::Enum, "%s", DisplayLevel::Operator, &Unit::NAMES),
                attribute("measrange", "Measurement range", DataType::Long, "%d", DisplayLevel::Expert, &[]),
                attribute("mode", "AC/DC mode", DataType::Enum, "%s", DisplayLevel::Expert, &Mode::NAMES),
            ]);
            commands.extend([
                command("set_range", DataType::Long, "Write and save the measurement range (0-3)"),
                command("set_unit", DataType::Enum, "Write and save the unit (0=TESL, 1=APM, 2=GAUS, 3=OE)"),
                command("set_mode", DataType::Enum, "Write and save the mode (0=DC, 1=AC)"),
            ]);
        }

        attributes.push(attribute(
            "state",
            "State",
            DataType::State,
            "%s",
            DisplayLevel::Operator,
            &[],
        ));
        commands.extend([
            command("connect", DataType::Void, "Open the connection and check the instrument answers"),
            command("disconnect", DataType::Void, "Release the connection"),
        ]);

        InterfaceTable {
            device_model: DEVICE_MODEL,
            manufacturer: MANUFACTURER,
            family: codec.name(),
            attributes,
            commands,
        }
    }

    /// Read an attribute by name.
    ///
    /// # Errors
    /// `DaqError::UnknownAttribute` for names not in the table; otherwise the
    /// error of the underlying read.
    pub async fn read_attribute(&self, name: &str) -> AppResult<AttributeValue> {
        match name {
            "field" => Ok(AttributeValue::Double(self.read_field().await?.value)),
            "unit" => {
                let unit = self.read_unit().await?;
                Ok(AttributeValue::Enum {
                    ordinal: unit.ordinal(),
                    name: unit.name().to_string(),
                })
            }
            "measrange" => Ok(AttributeValue::Long(i64::from(self.read_range().await?))),
            "mode" => {
                let mode = self.read_mode().await?;
                Ok(AttributeValue::Enum {
                    ordinal: mode.ordinal(),
                    name: mode.name().to_string(),
                })
            }
            "state" => Ok(AttributeValue::State(self.state())),
            other => Err(DaqError::UnknownAttribute(other.to_string())),
        }
    }

    /// Execute a command by name.
    ///
    /// Enum arguments may be given as ordinal or as protocol name.
    ///
    /// # Errors
    /// `DaqError::UnknownCommand` for names not in the table,
    /// `DaqError::Validation` for an argument of the wrong shape.
    pub async fn execute(&self, name: &str, argument: Value) -> AppResult<()> {
        match name {
            "set_range" => {
                let code = match &argument {
                    Value::Number(n) => n.as_i64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }
                .ok_or_else(|| invalid_argument(name, &argument))?;
                self.set_range(code).await
            }
            "set_unit" => self.set_unit(enum_argument(name, &argument)?).await,
            "set_mode" => self.set_mode(enum_argument(name, &argument)?).await,
            "connect" => self.connect().await,
            "disconnect" => {
                self.disconnect().await;
                Ok(())
            }
            other => Err(DaqError::UnknownCommand(other.to_string())),
        }
    }
}

fn invalid_argument(command: &str, argument: &Value) -> DaqError {
    DaqError::Validation(format!("Invalid argument {} for {}", argument, command))
}

fn enum_argument<T>(command: &str, argument: &Value) -> AppResult<T>
where
    T: FromStr<Err = DaqError> + TryFrom<i64, Error = DaqError>,
{
    match argument {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| invalid_argument(command, argument))
            .and_then(<T as TryFrom<i64>>::try_from),
        Value::String(s) => s.parse(),
        _ => Err(invalid_argument(command, argument)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{Framing, MockAdapter};
    use crate::config::ConnectionConfig;
    use crate::protocol::{HgmCodec, SerialProbeCodec};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn meter(mock: &MockAdapter) -> Gaussmeter {
        let connection = ConnectionConfig::new("mock", 9600, Duration::from_millis(50)).unwrap();
        Gaussmeter::new(connection, Box::new(mock.clone()), Arc::new(HgmCodec))
    }

    #[test]
    fn test_hgm_interface_table() {
        let table = meter(&MockAdapter::new()).interface();
        assert_eq!(table.device_model, "MAGSYS HGM09s");
        assert_eq!(table.manufacturer, "MAGSYS Magnet Systeme GmbH");
        assert_eq!(table.attribute("field").unwrap().format, "%8.5e");
        assert_eq!(
            table.attribute("unit").unwrap().enum_labels,
            &["TESL", "APM", "GAUS", "OE"]
        );
        for name in ["set_range", "set_unit", "set_mode", "connect", "disconnect"] {
            assert!(table.command(name).is_some(), "missing command {}", name);
        }
    }

    #[test]
    fn test_probe_interface_table() {
        let connection = ConnectionConfig::new("/dev/ttyGaussmeter", 9600, Duration::from_secs(1)).unwrap();
        let mock = MockAdapter::new().with_framing(Framing::for_codec(&SerialProbeCodec));
        let meter = Gaussmeter::new(connection, Box::new(mock), Arc::new(SerialProbeCodec));
        let table = meter.interface();
        let field = table.attribute("field").unwrap();
        assert_eq!(field.unit, "mT");
        assert_eq!(field.format, "%.5f");
        assert!(table.attribute("mode").is_none());
        assert!(table.command("set_unit").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_by_name() {
        let mock = MockAdapter::new()
            .on("*IDN?", "HGM09s\n\r")
            .on(":RANG?", "3\n\r")
            .on(":MODE?", "AC\n\r");
        let meter = meter(&mock);

        meter.execute("connect", Value::Null).await.unwrap();
        assert_eq!(
            meter.read_attribute("state").await.unwrap(),
            AttributeValue::State(AdapterState::Ready)
        );
        assert_eq!(
            meter.read_attribute("measrange").await.unwrap(),
            AttributeValue::Long(3)
        );
        assert_eq!(
            meter.read_attribute("mode").await.unwrap().to_string(),
            "AC (1)"
        );

        meter.execute("set_unit", json!(2)).await.unwrap();
        meter.execute("set_mode", json!("dc")).await.unwrap();
        assert!(mock.frames().ends_with(&[
            ":PAR:UNIT GAUS".to_string(),
            ":PAR:SAVE".to_string(),
            ":PAR:ACDC DC".to_string(),
            ":PAR:SAVE".to_string(),
        ]));

        meter.execute("disconnect", Value::Null).await.unwrap();
        assert_eq!(meter.state(), AdapterState::Disconnected);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_unknown_names_and_bad_arguments() {
        let meter = meter(&MockAdapter::new());
        assert!(matches!(
            meter.read_attribute("temperature").await,
            Err(DaqError::UnknownAttribute(_))
        ));
        assert!(matches!(
            meter.execute("reset", Value::Null).await,
            Err(DaqError::UnknownCommand(_))
        ));
        assert!(matches!(
            meter.execute("set_range", json!([1])).await,
            Err(DaqError::Validation(_))
        ));
        assert!(matches!(
            meter.execute("set_unit", json!(9)).await,
            Err(DaqError::Validation(_))
        ));
    }
}
