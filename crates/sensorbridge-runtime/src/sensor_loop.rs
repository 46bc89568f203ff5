//! [`SensorAdapter`] – the serial polling loop.
//!
//! Each iteration of [`SensorAdapter::run`]:
//!
//! 1. **Check** – ask the [`PacketSource`] how many bytes are waiting.  When
//!    none are, sleep for the poll interval and check again.
//! 2. **Read** – pull one line off the device and decode it as UTF-8.
//! 3. **Classify** – map the line to a [`ParsedReading`] via
//!    [`classify`][crate::packet::classify].
//! 4. **Publish** – wrap the reading in an [`Event`] and publish it on its
//!    [`Channel`][sensorbridge_types::Channel].
//!
//! Every failure inside an iteration is logged and counted, then the loop
//! moves on to the next line.  The loop ends when the shared shutdown flag
//! is set; the flag is checked once per iteration.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::AtomicBool;
//! use sensorbridge_hal::ScriptedSource;
//! use sensorbridge_middleware::EventBus;
//! use sensorbridge_runtime::sensor_loop::{AdapterConfig, PollOutcome, SensorAdapter};
//!
//! let source = ScriptedSource::new("sim0").line("Ammonia Level (Analog): 142");
//! let bus = Arc::new(EventBus::default());
//! let mut adapter = SensorAdapter::new(source, bus, AdapterConfig::default());
//!
//! assert!(matches!(adapter.poll_once(), Ok(PollOutcome::Published { .. })));
//! assert!(matches!(adapter.poll_once(), Ok(PollOutcome::Idle)));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use sensorbridge_hal::PacketSource;
use sensorbridge_middleware::EventBus;
use sensorbridge_types::{BridgeError, Event, ParsedReading};
use tracing::{debug, error, info, instrument, warn};

use crate::packet::{classify, Packet};

/// Prefix of the `source` field on every event this adapter publishes.
pub const EVENT_SOURCE_PREFIX: &str = "sensorbridge::serial";

/// Floor applied to [`AdapterConfig::poll_interval`].
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration bundle for [`SensorAdapter`].
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Sleep between availability checks when the device is idle, and after
    /// a device error.  Clamped to at least [`MIN_POLL_INTERVAL`].
    pub poll_interval: Duration,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// What a single [`SensorAdapter::poll_once`] call did.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// No data was waiting on the device.
    Idle,
    /// A line matched no marker and was dropped.
    Unrecognized,
    /// A reading was published to `receivers` subscribers.
    Published {
        reading: ParsedReading,
        receivers: usize,
    },
}

/// Counters accumulated over the adapter's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterStats {
    pub packets_received: u64,
    pub readings_published: u64,
    pub unrecognized: u64,
    /// Decode and numeric-parse failures.
    pub packet_errors: u64,
    /// Device read failures.
    pub io_errors: u64,
    /// Failures publishing a reading to the bus.
    pub bus_errors: u64,
    pub idle_polls: u64,
}

/// Owns the packet source and a handle to the bus for the lifetime of the
/// polling loop.
pub struct SensorAdapter<S: PacketSource> {
    source: S,
    bus: Arc<EventBus>,
    config: AdapterConfig,
    stats: AdapterStats,
}

impl<S: PacketSource> SensorAdapter<S> {
    pub fn new(source: S, bus: Arc<EventBus>, mut config: AdapterConfig) -> Self {
        if config.poll_interval < MIN_POLL_INTERVAL {
            warn!(
                requested_ms = config.poll_interval.as_millis() as u64,
                "poll interval below minimum; clamping"
            );
            config.poll_interval = MIN_POLL_INTERVAL;
        }
        Self {
            source,
            bus,
            config,
            stats: AdapterStats::default(),
        }
    }

    /// Run until `shutdown` is set, then return the final counters.
    #[instrument(skip_all, fields(source = %self.source.name()))]
    pub fn run(&mut self, shutdown: &AtomicBool) -> AdapterStats {
        info!(poll_interval_ms = self.config.poll_interval.as_millis() as u64, "sensor adapter started");

        while !shutdown.load(Ordering::SeqCst) {
            match self.poll_once() {
                Ok(PollOutcome::Idle) => thread::sleep(self.config.poll_interval),
                Ok(_) => {}
                Err(e) => {
                    if self.record_error(&e) {
                        thread::sleep(self.config.poll_interval);
                    }
                }
            }
        }

        info!(stats = ?self.stats, "sensor adapter stopped");
        self.stats.clone()
    }

    /// Log and count a failed iteration.
    ///
    /// Returns `true` when the loop should back off before the next poll,
    /// which is only the case for device errors.
    pub fn record_error(&mut self, err: &BridgeError) -> bool {
        match err {
            BridgeError::Packet(e) => {
                self.stats.packet_errors += 1;
                warn!(error = %e, "error processing serial data");
                false
            }
            BridgeError::SerialIo { .. } | BridgeError::SerialOpen { .. } => {
                self.stats.io_errors += 1;
                error!(error = %err, "error reading serial data");
                true
            }
            _ => {
                self.stats.bus_errors += 1;
                error!(error = %err, "error publishing reading");
                false
            }
        }
    }

    /// Run one iteration of the loop without sleeping.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::Packet`] – the line could not be decoded or its value
    ///   could not be parsed.  Nothing was published.
    /// * [`BridgeError::SerialIo`] – the device could not be read.
    pub fn poll_once(&mut self) -> Result<PollOutcome, BridgeError> {
        if self.source.bytes_available()? == 0 {
            self.stats.idle_polls += 1;
            return Ok(PollOutcome::Idle);
        }

        let raw = self.source.read_packet()?;
        self.stats.packets_received += 1;

        let packet = Packet::decode(&raw)?;
        info!(packet = %packet, "received data");

        let reading = classify(&packet)?;
        if reading == ParsedReading::Unrecognized {
            self.stats.unrecognized += 1;
            debug!(packet = %packet, "no marker matched; dropping packet");
            return Ok(PollOutcome::Unrecognized);
        }

        let receivers = self.publish(&reading)?;
        Ok(PollOutcome::Published { reading, receivers })
    }

    /// Publish `reading` on its channel.
    ///
    /// Returns the number of subscribers reached; `0` for
    /// [`ParsedReading::Unrecognized`], which has no channel.
    pub fn publish(&mut self, reading: &ParsedReading) -> Result<usize, BridgeError> {
        let (Some(channel), Some(payload)) = (reading.channel(), reading.to_payload()) else {
            return Ok(0);
        };

        match reading {
            ParsedReading::Temperature(v) => info!(value = v, "publishing temperature"),
            ParsedReading::SimulatedTemperature(v) => {
                info!(value = v, "publishing simulated temperature")
            }
            ParsedReading::AmmoniaLevel(v) => info!(value = v, "publishing ammonia level"),
            ParsedReading::CriticalAlert => warn!("critical ammonia alert"),
            ParsedReading::Unrecognized => {}
        }

        let event = Event::new(
            format!("{EVENT_SOURCE_PREFIX}/{}", reading.label()),
            payload,
        );
        let receivers = self.bus.publish_to(channel, event)?;
        self.stats.readings_published += 1;
        debug!(channel = %channel, receivers, "reading published");
        Ok(receivers)
    }

    pub fn stats(&self) -> &AdapterStats {
        &self.stats
    }

    /// Consume the adapter and hand back its source.
    pub fn into_source(self) -> S {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorbridge_hal::ScriptedSource;
    use sensorbridge_types::{Channel, EventPayload, PacketError, AMMONIA_ALERT_MESSAGE};

    fn make_adapter(source: ScriptedSource) -> (Arc<EventBus>, SensorAdapter<ScriptedSource>) {
        let bus = Arc::new(EventBus::default());
        let config = AdapterConfig {
            poll_interval: Duration::from_millis(1),
        };
        let adapter = SensorAdapter::new(source, Arc::clone(&bus), config);
        (bus, adapter)
    }

    #[test]
    fn idle_source_reports_idle() {
        let (_bus, mut adapter) = make_adapter(ScriptedSource::new("sim0"));
        assert_eq!(adapter.poll_once().unwrap(), PollOutcome::Idle);
        assert_eq!(adapter.stats().idle_polls, 1);
    }

    #[test]
    fn temperature_line_is_published_with_source_tag() {
        let (bus, mut adapter) =
            make_adapter(ScriptedSource::new("sim0").line("Current Temperature: 23.5 C"));
        let mut temp = bus.subscribe_to(Channel::Temperature);

        let outcome = adapter.poll_once().unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Published {
                reading: ParsedReading::Temperature(23.5),
                receivers: 1
            }
        );

        let event = temp.try_recv().unwrap();
        assert_eq!(event.payload, EventPayload::Temperature(23.5));
        assert_eq!(event.source, "sensorbridge::serial/current_temperature");
    }

    #[test]
    fn simulated_temperature_shares_channel_but_not_source() {
        let (bus, mut adapter) =
            make_adapter(ScriptedSource::new("sim0").line("Simulated Temperature: 19.0 C"));
        let mut temp = bus.subscribe_to(Channel::Temperature);

        adapter.poll_once().unwrap();

        let event = temp.try_recv().unwrap();
        assert_eq!(event.payload, EventPayload::Temperature(19.0));
        assert_eq!(event.source, "sensorbridge::serial/simulated_temperature");
    }

    #[test]
    fn critical_alert_publishes_only_alert_text() {
        let (bus, mut adapter) =
            make_adapter(ScriptedSource::new("sim0").line("Critical Ammonia Level"));
        let mut alert = bus.subscribe_to(Channel::AmmoniaAlert);
        let mut ammonia = bus.subscribe_to(Channel::AmmoniaLevel);
        let mut temp = bus.subscribe_to(Channel::Temperature);

        adapter.poll_once().unwrap();

        let event = alert.try_recv().unwrap();
        assert_eq!(
            event.payload,
            EventPayload::AmmoniaAlert(AMMONIA_ALERT_MESSAGE.to_string())
        );
        assert!(ammonia.try_recv().is_err());
        assert!(temp.try_recv().is_err());
    }

    #[test]
    fn unrecognized_line_publishes_nothing() {
        let (bus, mut adapter) = make_adapter(ScriptedSource::new("sim0").line("Humidity: 40 %"));
        let mut tap = bus.subscribe_all();

        assert_eq!(adapter.poll_once().unwrap(), PollOutcome::Unrecognized);
        assert!(tap.try_recv().is_err());
        assert_eq!(adapter.stats().unrecognized, 1);
    }

    #[test]
    fn non_numeric_value_is_packet_error() {
        let (bus, mut adapter) =
            make_adapter(ScriptedSource::new("sim0").line("Current Temperature: abc"));
        let mut tap = bus.subscribe_all();

        let err = adapter.poll_once().unwrap_err();
        assert!(matches!(err, BridgeError::Packet(PacketError::InvalidNumber { .. })));
        assert!(tap.try_recv().is_err());
    }

    #[test]
    fn invalid_utf8_is_decode_error() {
        let (_bus, mut adapter) =
            make_adapter(ScriptedSource::new("sim0").bytes(vec![0xff, 0xfe, b'\n']));
        let err = adapter.poll_once().unwrap_err();
        assert!(matches!(err, BridgeError::Packet(PacketError::Decode(_))));
    }

    #[test]
    fn publishing_without_subscribers_still_counts() {
        let (_bus, mut adapter) =
            make_adapter(ScriptedSource::new("sim0").line("Ammonia Level (Analog): 142"));
        let outcome = adapter.poll_once().unwrap();
        assert_eq!(
            outcome,
            PollOutcome::Published {
                reading: ParsedReading::AmmoniaLevel(142.0),
                receivers: 0
            }
        );
        assert_eq!(adapter.stats().readings_published, 1);
    }

    #[test]
    fn publish_unrecognized_is_noop() {
        let (_bus, mut adapter) = make_adapter(ScriptedSource::new("sim0"));
        assert_eq!(adapter.publish(&ParsedReading::Unrecognized).unwrap(), 0);
        assert_eq!(adapter.stats().readings_published, 0);
    }

    #[test]
    fn record_error_counts_by_kind_and_backs_off_only_for_device() {
        let (_bus, mut adapter) = make_adapter(ScriptedSource::new("sim0"));

        let packet = BridgeError::Packet(PacketError::Decode("bad".to_string()));
        assert!(!adapter.record_error(&packet));

        let device = BridgeError::SerialIo {
            port: "sim0".to_string(),
            details: "unplugged".to_string(),
        };
        assert!(adapter.record_error(&device));

        let bus = BridgeError::Serialization("frame".to_string());
        assert!(!adapter.record_error(&bus));

        let stats = adapter.stats();
        assert_eq!(stats.packet_errors, 1);
        assert_eq!(stats.io_errors, 1);
        assert_eq!(stats.bus_errors, 1);
    }

    #[test]
    fn zero_poll_interval_is_clamped() {
        let bus = Arc::new(EventBus::default());
        let config = AdapterConfig {
            poll_interval: Duration::ZERO,
        };
        let adapter = SensorAdapter::new(ScriptedSource::new("sim0"), bus, config);
        assert_eq!(adapter.config.poll_interval, MIN_POLL_INTERVAL);
    }

    #[test]
    fn run_returns_immediately_when_already_shut_down() {
        let (_bus, mut adapter) = make_adapter(ScriptedSource::new("sim0").line("Critical Ammonia Level"));
        let shutdown = AtomicBool::new(true);
        let stats = adapter.run(&shutdown);
        assert_eq!(stats, AdapterStats::default());
        assert_eq!(adapter.into_source().remaining(), 1);
    }
}
