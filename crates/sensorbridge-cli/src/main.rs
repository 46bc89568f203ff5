//! `sensorbridge` – serial sensor to pub/sub bridge.
//!
//! Startup sequence:
//!
//! 1. Initialise logging (and OTLP export when configured).
//! 2. Load `~/.sensorbridge/config.toml`, falling back to defaults.
//! 3. List the serial ports present on the host.
//! 4. Open the configured serial port.  Failure here is fatal.
//! 5. Start the rosbridge WebSocket endpoint, if enabled.
//! 6. Run the polling loop on the main thread until **Ctrl-C**.

mod config;

use colored::Colorize;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info, warn};

use sensorbridge_hal::{list_ports, SerialConnection};
use sensorbridge_middleware::{EventBus, RosbridgeServer};
use sensorbridge_runtime::{init_tracing, SensorAdapter};

fn main() -> ExitCode {
    let _telemetry = init_tracing("sensorbridge");

    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => config::from_env(),
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::from_env()
        }
    };
    info!(config = ?cfg, "configuration resolved");

    // ── Port listing ──────────────────────────────────────────────────────
    let ports = list_ports();
    info!(count = ports.len(), "available serial ports");
    if ports.is_empty() {
        println!("  Available ports: {}", "none".dimmed());
    } else {
        println!("  Available ports:");
        for port in &ports {
            println!("    • {}", port.to_string().bold());
        }
    }

    // ── Shutdown flag ─────────────────────────────────────────────────────
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_handler = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – stopping after the current poll …".yellow().bold());
        shutdown_handler.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // ── Serial port ───────────────────────────────────────────────────────
    let connection = match SerialConnection::open(&cfg.serial_settings()) {
        Ok(connection) => connection,
        Err(e) => {
            error!(error = %e, "cannot open serial port");
            println!("{}: {}", "Fatal".red().bold(), e);
            return ExitCode::FAILURE;
        }
    };
    println!(
        "  Listening on {} at {} baud",
        cfg.port.bold(),
        cfg.baud_rate
    );

    let bus = Arc::new(EventBus::default());

    // ── rosbridge endpoint ────────────────────────────────────────────────
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "cannot start async runtime");
            return ExitCode::FAILURE;
        }
    };

    if cfg.bridge_enabled {
        match cfg.bridge_addr() {
            Ok(addr) => {
                println!("  rosbridge endpoint on {}", format!("ws://{addr}").cyan());
                let server = RosbridgeServer::new(bus.clone());
                runtime.spawn(async move {
                    if let Err(e) = server.run(addr).await {
                        error!(error = %e, "rosbridge endpoint stopped");
                    }
                });
            }
            Err(e) => warn!(error = %e, "rosbridge endpoint disabled"),
        }
    }

    println!();

    // ── Polling loop ──────────────────────────────────────────────────────
    let mut adapter = SensorAdapter::new(connection, bus, cfg.adapter_config());
    let stats = adapter.run(&shutdown);
    drop(adapter);

    runtime.shutdown_timeout(Duration::from_secs(1));

    println!(
        "  {} {} packet(s), {} reading(s) published, {} error(s)",
        "✓".green().bold(),
        stats.packets_received,
        stats.readings_published,
        stats.packet_errors + stats.io_errors + stats.bus_errors
    );
    ExitCode::SUCCESS
}

fn print_banner() {
    println!();
    println!("  {} {}",
        "SensorBridge".bold().cyan(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Serial sensor → pub/sub bridge");
    println!();
}
