//! In-memory simulated device for CI/CD testing without physical hardware.
//!
//! [`ScriptedSource`] replays a fixed list of lines, one per
//! [`read_packet`](PacketSource::read_packet) call.  Gaps can be scripted
//! with [`ScriptedSource::idle`] to exercise the adapter's sleep path.
//!
//! # Example
//!
//! ```rust
//! use sensorbridge_hal::{PacketSource, ScriptedSource};
//!
//! let mut source = ScriptedSource::new("sim0")
//!     .line("Current Temperature: 23.5 C")
//!     .idle()
//!     .line("Critical Ammonia Level");
//!
//! assert!(source.bytes_available().unwrap() > 0);
//! assert_eq!(source.read_packet().unwrap(), b"Current Temperature: 23.5 C\n");
//! assert_eq!(source.bytes_available().unwrap(), 0);
//! ```

use std::collections::VecDeque;

use sensorbridge_types::BridgeError;

use crate::source::PacketSource;

enum Step {
    Packet(Vec<u8>),
    Idle,
    Fault(String),
}

/// A simulated serial device driven by a script of packets, idle polls and
/// read faults.
pub struct ScriptedSource {
    name: String,
    steps: VecDeque<Step>,
}

impl ScriptedSource {
    /// Create an empty script.  An exhausted script always reports no data.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: VecDeque::new(),
        }
    }

    /// Append a text line; a trailing `\n` is added.
    pub fn line(self, text: &str) -> Self {
        let mut bytes = text.as_bytes().to_vec();
        bytes.push(b'\n');
        self.bytes(bytes)
    }

    /// Append a raw packet, sent exactly as given.
    pub fn bytes(mut self, raw: impl Into<Vec<u8>>) -> Self {
        self.steps.push_back(Step::Packet(raw.into()));
        self
    }

    /// Append one poll during which no data is available.
    pub fn idle(mut self) -> Self {
        self.steps.push_back(Step::Idle);
        self
    }

    /// Append a read that fails with a [`BridgeError::SerialIo`].
    pub fn fault(mut self, details: impl Into<String>) -> Self {
        self.steps.push_back(Step::Fault(details.into()));
        self
    }

    /// Number of scripted steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }

    /// `true` once every scripted step has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.steps.is_empty()
    }
}

impl PacketSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn bytes_available(&mut self) -> Result<usize, BridgeError> {
        match self.steps.front() {
            Some(Step::Packet(bytes)) => Ok(bytes.len().max(1)),
            Some(Step::Fault(_)) => Ok(1),
            Some(Step::Idle) => {
                self.steps.pop_front();
                Ok(0)
            }
            None => Ok(0),
        }
    }

    fn read_packet(&mut self) -> Result<Vec<u8>, BridgeError> {
        match self.steps.pop_front() {
            Some(Step::Packet(bytes)) => Ok(bytes),
            Some(Step::Fault(details)) => Err(BridgeError::SerialIo {
                port: self.name.clone(),
                details,
            }),
            Some(Step::Idle) | None => Err(BridgeError::SerialIo {
                port: self.name.clone(),
                details: "no data available".to_string(),
            }),
        }
    }
}
