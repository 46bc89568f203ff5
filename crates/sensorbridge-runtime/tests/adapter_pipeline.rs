//! End-to-end run of the polling loop against a scripted device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use sensorbridge_hal::ScriptedSource;
use sensorbridge_middleware::{ChannelReceiver, EventBus};
use sensorbridge_runtime::{AdapterConfig, AdapterStats, SensorAdapter};
use sensorbridge_types::{Channel, EventPayload, AMMONIA_ALERT_MESSAGE};

fn drain(rx: &mut ChannelReceiver, into: &mut Vec<EventPayload>) {
    while let Ok(event) = rx.try_recv() {
        into.push(event.payload);
    }
}

#[test]
fn mixed_stream_publishes_each_reading_once_and_survives_errors() {
    let source = ScriptedSource::new("sim0")
        .line("Current Temperature: 23.5 C")
        .idle()
        .line("Current Temperature: abc")
        .line("Simulated Temperature: 18.25 C")
        .line("SYSTEM BOOT OK")
        .fault("overrun")
        .line("Ammonia Level (Analog): 142")
        .line("Critical Ammonia Level");

    let bus = Arc::new(EventBus::default());
    let mut temp_rx = bus.subscribe_to(Channel::Temperature);
    let mut ammonia_rx = bus.subscribe_to(Channel::AmmoniaLevel);
    let mut alert_rx = bus.subscribe_to(Channel::AmmoniaAlert);

    let shutdown = Arc::new(AtomicBool::new(false));
    let mut adapter = SensorAdapter::new(
        source,
        Arc::clone(&bus),
        AdapterConfig {
            poll_interval: Duration::from_millis(1),
        },
    );
    let worker = {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || adapter.run(&shutdown))
    };

    let mut temps = Vec::new();
    let mut ammonia = Vec::new();
    let mut alerts = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    while alerts.is_empty() && Instant::now() < deadline {
        drain(&mut temp_rx, &mut temps);
        drain(&mut ammonia_rx, &mut ammonia);
        drain(&mut alert_rx, &mut alerts);
        thread::sleep(Duration::from_millis(1));
    }

    shutdown.store(true, Ordering::SeqCst);
    let stats = worker.join().expect("adapter thread panicked");

    drain(&mut temp_rx, &mut temps);
    drain(&mut ammonia_rx, &mut ammonia);

    assert_eq!(
        temps,
        vec![EventPayload::Temperature(23.5), EventPayload::Temperature(18.25)]
    );
    assert_eq!(ammonia, vec![EventPayload::AmmoniaLevel(142.0)]);
    assert_eq!(
        alerts,
        vec![EventPayload::AmmoniaAlert(AMMONIA_ALERT_MESSAGE.to_string())]
    );

    assert_eq!(
        AdapterStats {
            idle_polls: 0,
            ..stats.clone()
        },
        AdapterStats {
            packets_received: 6,
            readings_published: 4,
            unrecognized: 1,
            packet_errors: 1,
            io_errors: 1,
            bus_errors: 0,
            idle_polls: 0,
        }
    );
    assert!(stats.idle_polls >= 1);
}

#[test]
fn shutdown_flag_stops_an_idle_adapter() {
    let bus = Arc::new(EventBus::default());
    let shutdown = Arc::new(AtomicBool::new(false));
    let mut adapter = SensorAdapter::new(
        ScriptedSource::new("sim0"),
        bus,
        AdapterConfig {
            poll_interval: Duration::from_millis(5),
        },
    );
    let worker = {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || adapter.run(&shutdown))
    };

    thread::sleep(Duration::from_millis(30));
    shutdown.store(true, Ordering::SeqCst);
    let stats = worker.join().expect("adapter thread panicked");

    assert_eq!(stats.packets_received, 0);
    assert!(stats.idle_polls > 0);
}
