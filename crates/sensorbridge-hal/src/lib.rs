//! `sensorbridge-hal` – Serial Hardware Abstraction
//!
//! Everything that touches the sensor device lives here so that the adapter
//! loop can be driven by a real serial port or by an in-memory script.
//!
//! # Modules
//!
//! - [`source`] – [`PacketSource`][source::PacketSource], the seam between
//!   the polling loop and a line-oriented byte stream.
//! - [`serial`] – [`SerialConnection`][serial::SerialConnection], the real
//!   device backed by the `serialport` crate, plus
//!   [`list_ports`][serial::list_ports] for the startup log.
//! - [`sim`] – [`ScriptedSource`][sim::ScriptedSource], a simulated device for
//!   tests and hardware-less runs.

pub mod serial;
pub mod sim;
pub mod source;

pub use serial::{list_ports, PortSummary, SerialConnection, SerialSettings};
pub use sim::ScriptedSource;
pub use source::{PacketSource, MAX_PACKET_BYTES};
