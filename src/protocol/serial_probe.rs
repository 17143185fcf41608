//! Bare serial probe vocabulary.
//!
//! The probe is opened as a raw 8N1 serial line and only answers the field
//! query. Readings are always in millitesla; there is no unit, range or mode
//! setting to read or write. `connect()` uses the field query itself as the
//! liveness check.

use super::{parse_field, CommandCodec, FieldKind, Reading, Setting};
use crate::error::{DaqError, ProtocolError};

/// Unit label of every probe reading.
pub const PROBE_UNIT: &str = "mT";

/// Codec for the field-only serial probe.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialProbeCodec;

impl CommandCodec for SerialProbeCodec {
    fn name(&self) -> &'static str {
        "serial_probe"
    }

    fn write_terminator(&self) -> &'static str {
        "\r"
    }

    fn read_terminator(&self) -> &'static str {
        "\n"
    }

    fn handshake(&self) -> FieldKind {
        FieldKind::Field
    }

    fn fixed_unit_label(&self) -> Option<&'static str> {
        Some(PROBE_UNIT)
    }

    fn supports(&self, field: FieldKind) -> bool {
        field == FieldKind::Field
    }

    fn encode_query(&self, field: FieldKind) -> Result<String, DaqError> {
        match field {
            FieldKind::Field => Ok(":MEAS?".to_string()),
            other => Err(DaqError::Unsupported(format!(
                "serial probe has no {} query",
                other
            ))),
        }
    }

    fn encode_set(&self, setting: &Setting) -> Result<Vec<String>, DaqError> {
        Err(DaqError::Unsupported(format!(
            "serial probe cannot change {}",
            setting.field()
        )))
    }

    fn decode(&self, field: FieldKind, reply: &str) -> Result<Reading, ProtocolError> {
        match field {
            FieldKind::Field => Ok(Reading::Field(parse_field(reply)?)),
            other => Err(ProtocolError::Parse {
                field: other,
                reply: reply.to_string(),
            }),
        }
    }
}
