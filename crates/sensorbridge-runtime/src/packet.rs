//! Packet decoding and classification.
//!
//! A packet is one line from the sensor board.  [`classify`] checks the
//! markers below in order and stops at the first hit, so a line yields at
//! most one [`ParsedReading`]:
//!
//! | Marker | Value | Reading |
//! |---|---|---|
//! | `Current Temperature` | token after `": "`, up to the next space | [`ParsedReading::Temperature`] |
//! | `Simulated Temperature` | same | [`ParsedReading::SimulatedTemperature`] |
//! | `Ammonia Level (Analog)` | everything after `": "` | [`ParsedReading::AmmoniaLevel`] |
//! | `Critical Ammonia Level` | none | [`ParsedReading::CriticalAlert`] |

use sensorbridge_types::{PacketError, ParsedReading};

const CURRENT_TEMPERATURE: &str = "Current Temperature";
const SIMULATED_TEMPERATURE: &str = "Simulated Temperature";
const AMMONIA_LEVEL: &str = "Ammonia Level (Analog)";
const CRITICAL_AMMONIA: &str = "Critical Ammonia Level";

/// Separates a label from its value, e.g. `"Current Temperature: 23.5 C"`.
const FIELD_SEPARATOR: &str = ": ";

/// One decoded, trimmed line of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet(String);

impl Packet {
    /// Decode raw bytes as UTF-8 and trim surrounding whitespace, including
    /// the line terminator.
    pub fn decode(raw: &[u8]) -> Result<Self, PacketError> {
        let text = std::str::from_utf8(raw).map_err(|e| PacketError::Decode(e.to_string()))?;
        Ok(Self(text.trim().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Packet {
    fn from(text: &str) -> Self {
        Self(text.trim().to_string())
    }
}

impl std::fmt::Display for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Classify a packet by its marker and extract the numeric value.
///
/// Returns [`ParsedReading::Unrecognized`] when no marker matches.
///
/// # Errors
///
/// * [`PacketError::MissingField`] – a marker matched but there is no
///   `": "` separator.
/// * [`PacketError::InvalidNumber`] – the extracted token is not a number.
pub fn classify(packet: &Packet) -> Result<ParsedReading, PacketError> {
    let text = packet.as_str();

    if text.contains(CURRENT_TEMPERATURE) {
        temperature_value(text).map(ParsedReading::Temperature)
    } else if text.contains(SIMULATED_TEMPERATURE) {
        temperature_value(text).map(ParsedReading::SimulatedTemperature)
    } else if text.contains(AMMONIA_LEVEL) {
        let token = field(text)?.trim();
        parse_number(token).map(ParsedReading::AmmoniaLevel)
    } else if text.contains(CRITICAL_AMMONIA) {
        Ok(ParsedReading::CriticalAlert)
    } else {
        Ok(ParsedReading::Unrecognized)
    }
}

/// `"Current Temperature: 23.5 C"` → `23.5`; the unit is ignored.
fn temperature_value(text: &str) -> Result<f32, PacketError> {
    let token = field(text)?.split(' ').next().unwrap_or_default();
    parse_number(token)
}

/// The text between the first and second separator (or end of line).
fn field(text: &str) -> Result<&str, PacketError> {
    text.split(FIELD_SEPARATOR)
        .nth(1)
        .ok_or_else(|| PacketError::MissingField {
            packet: text.to_string(),
            separator: FIELD_SEPARATOR.to_string(),
        })
}

fn parse_number(token: &str) -> Result<f32, PacketError> {
    token.parse::<f32>().map_err(|e| PacketError::InvalidNumber {
        token: token.to_string(),
        reason: e.to_string(),
    })
}
