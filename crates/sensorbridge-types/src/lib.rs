use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Fixed alert text published on [`Channel::AmmoniaAlert`].
pub const AMMONIA_ALERT_MESSAGE: &str = "Critical Ammonia Level Detected";

/// Named publish destinations on the bus.
///
/// Each channel carries exactly one message type, mirroring the ROS
/// `std_msgs` types that downstream dashboards subscribe with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Current and simulated temperature readings (`std_msgs/Float32`).
    Temperature,
    /// Analog ammonia sensor level (`std_msgs/Float32`).
    AmmoniaLevel,
    /// Critical ammonia alert (`std_msgs/String`).
    AmmoniaAlert,
}

impl Channel {
    /// Every channel, in declaration order.
    pub const ALL: [Channel; 3] = [
        Channel::Temperature,
        Channel::AmmoniaLevel,
        Channel::AmmoniaAlert,
    ];

    /// Logical topic name, e.g. `"/temp"`.
    pub fn topic(&self) -> &'static str {
        match self {
            Channel::Temperature => "/temp",
            Channel::AmmoniaLevel => "/ammonia",
            Channel::AmmoniaAlert => "/ammonia_alert",
        }
    }

    /// ROS message type advertised for this channel.
    pub fn message_type(&self) -> &'static str {
        match self {
            Channel::Temperature | Channel::AmmoniaLevel => "std_msgs/Float32",
            Channel::AmmoniaAlert => "std_msgs/String",
        }
    }

    /// Look up a channel by its topic name.
    pub fn from_topic(topic: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.topic() == topic)
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.topic())
    }
}

/// Result of classifying one packet.
///
/// At most one reading is derived per packet.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedReading {
    Temperature(f32),
    SimulatedTemperature(f32),
    AmmoniaLevel(f32),
    CriticalAlert,
    /// The packet matched none of the known markers.
    Unrecognized,
}

impl ParsedReading {
    /// Destination channel, or `None` for [`ParsedReading::Unrecognized`].
    ///
    /// Simulated temperatures share the temperature channel with real ones.
    pub fn channel(&self) -> Option<Channel> {
        match self {
            ParsedReading::Temperature(_) | ParsedReading::SimulatedTemperature(_) => {
                Some(Channel::Temperature)
            }
            ParsedReading::AmmoniaLevel(_) => Some(Channel::AmmoniaLevel),
            ParsedReading::CriticalAlert => Some(Channel::AmmoniaAlert),
            ParsedReading::Unrecognized => None,
        }
    }

    /// Bus payload for this reading, or `None` when there is nothing to publish.
    pub fn to_payload(&self) -> Option<EventPayload> {
        match self {
            ParsedReading::Temperature(v) | ParsedReading::SimulatedTemperature(v) => {
                Some(EventPayload::Temperature(*v))
            }
            ParsedReading::AmmoniaLevel(v) => Some(EventPayload::AmmoniaLevel(*v)),
            ParsedReading::CriticalAlert => {
                Some(EventPayload::AmmoniaAlert(AMMONIA_ALERT_MESSAGE.to_string()))
            }
            ParsedReading::Unrecognized => None,
        }
    }

    /// Short label used as the event source suffix and in logs.
    pub fn label(&self) -> &'static str {
        match self {
            ParsedReading::Temperature(_) => "current_temperature",
            ParsedReading::SimulatedTemperature(_) => "simulated_temperature",
            ParsedReading::AmmoniaLevel(_) => "ammonia_level",
            ParsedReading::CriticalAlert => "critical_ammonia",
            ParsedReading::Unrecognized => "unrecognized",
        }
    }
}

/// Unified event wrapper for the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "sensorbridge::serial/current_temperature"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    /// Wrap `payload` in a fresh envelope stamped with the current time.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    Temperature(f32),
    AmmoniaLevel(f32),
    AmmoniaAlert(String),
}

/// Per-packet failures. Always recoverable: the line is dropped and the
/// polling loop moves on.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PacketError {
    #[error("Packet is not valid UTF-8: {0}")]
    Decode(String),

    #[error("Packet '{packet}' has no value after '{separator}'")]
    MissingField { packet: String, separator: String },

    #[error("Invalid numeric value '{token}': {reason}")]
    InvalidNumber { token: String, reason: String },
}

/// Global error type spanning serial I/O, packet parsing, and bus transport.
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum BridgeError {
    #[error("Failed to open serial port {port}: {details}")]
    SerialOpen { port: String, details: String },

    #[error("Serial I/O error on {port}: {details}")]
    SerialIo { port: String, details: String },

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error("Middleware Serialization Error: {0}")]
    Serialization(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
