//! HGM09s SCPI-style vocabulary.
//!
//! Used when the gaussmeter is reached as a VISA resource (or a serial line
//! speaking the same commands). Queries:
//!
//! | Field    | Query    | Reply             |
//! |----------|----------|-------------------|
//! | field    | `:MEAS?` | decimal float     |
//! | unit     | `:UNIT?` | `TESL/APM/GAUS/OE`|
//! | range    | `:RANG?` | `0..=3`           |
//! | mode     | `:MODE?` | `DC/AC`           |
//! | identity | `*IDN?`  | free text         |
//!
//! Settings are written with `:PAR:RANG`, `:PAR:UNIT` and `:PAR:ACDC`, each
//! followed by `:PAR:SAVE` as its own frame. Replies end in LF+CR.

use super::{
    parse_field, parse_identity, parse_mode, parse_range, parse_unit, CommandCodec, FieldKind,
    Reading, Setting,
};
use crate::error::{DaqError, ProtocolError};

/// Frame that commits a parameter write to the instrument.
pub const SAVE_FRAME: &str = ":PAR:SAVE";

/// Codec for the HGM09s command set.
#[derive(Clone, Copy, Debug, Default)]
pub struct HgmCodec;

impl CommandCodec for HgmCodec {
    fn name(&self) -> &'static str {
        "hgm"
    }

    fn write_terminator(&self) -> &'static str {
        "\r"
    }

    fn read_terminator(&self) -> &'static str {
        "\n\r"
    }

    fn handshake(&self) -> FieldKind {
        FieldKind::Identity
    }

    fn supports(&self, _field: FieldKind) -> bool {
        true
    }

    fn encode_query(&self, field: FieldKind) -> Result<String, DaqError> {
        let query = match field {
            FieldKind::Field => ":MEAS?",
            FieldKind::Unit => ":UNIT?",
            FieldKind::Range => ":RANG?",
            FieldKind::Mode => ":MODE?",
            FieldKind::Identity => "*IDN?",
        };
        Ok(query.to_string())
    }

    fn encode_set(&self, setting: &Setting) -> Result<Vec<String>, DaqError> {
        let write = match setting {
            Setting::Range(range) => format!(":PAR:RANG {}", range.code()),
            Setting::Unit(unit) => format!(":PAR:UNIT {}", unit.name()),
            Setting::Mode(mode) => format!(":PAR:ACDC {}", mode.name()),
        };
        Ok(vec![write, SAVE_FRAME.to_string()])
    }

    fn decode(&self, field: FieldKind, reply: &str) -> Result<Reading, ProtocolError> {
        Ok(match field {
            FieldKind::Field => Reading::Field(parse_field(reply)?),
            FieldKind::Unit => Reading::Unit(parse_unit(reply)?),
            FieldKind::Range => Reading::Range(parse_range(reply)?),
            FieldKind::Mode => Reading::Mode(parse_mode(reply)?),
            FieldKind::Identity => Reading::Identity(parse_identity(reply)?),
        })
    }
}
