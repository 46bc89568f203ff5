//! `sensorbridge-runtime` – The Polling Engine
//!
//! Turns raw serial lines into bus events.
//!
//! # Modules
//!
//! - [`packet`] – [`Packet`][packet::Packet] decoding and the
//!   [`classify`][packet::classify] function that maps a line to a
//!   [`ParsedReading`][sensorbridge_types::ParsedReading].
//! - [`sensor_loop`] – [`SensorAdapter`][sensor_loop::SensorAdapter]: owns the
//!   [`PacketSource`][sensorbridge_hal::PacketSource] and runs the
//!   check / read / classify / publish cycle until shutdown.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.

pub mod packet;
pub mod sensor_loop;
pub mod telemetry;

pub use packet::{classify, Packet};
pub use sensor_loop::{AdapterConfig, AdapterStats, PollOutcome, SensorAdapter};
pub use telemetry::{init_tracing, TracerProviderGuard};
