//! `sensorbridge-middleware` – The Nervous System
//!
//! Routes sensor readings between the serial adapter and any consumers
//! without caring about the data's meaning.
//!
//! # Modules
//!
//! - [`bus`] – Headless, typed, channel-based publish/subscribe event bus
//!   built on Tokio broadcast channels.
//! - [`rosbridge`] – rosbridge-compatible WebSocket endpoint that forwards
//!   bus channels to web dashboards as JSON.

pub mod bus;
pub mod rosbridge;

pub use bus::{ChannelReceiver, EventBus};
pub use rosbridge::RosbridgeServer;
