//! Caster interface firmware entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  ExpanderPair      LogEventSink   NvsAdapter   GpioInputLine   │
//! │  (RegisterBus)     (EventSink)    (ConfigPort) (InputLine)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │        HandshakeController (pure logic)                │    │
//! │  │        waits on CycleSensor ◀── edge ISR               │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Console feed: one code per line on the serial console         │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::io::{BufRead, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{error, info, warn};

use caster_interface::adapters::log_sink::LogEventSink;
use caster_interface::adapters::nvs::NvsAdapter;
use caster_interface::app::code::OutputCode;
use caster_interface::app::handshake::HandshakeController;
use caster_interface::app::ports::{ConfigPort, InputLine};
use caster_interface::config::InterfaceConfig;
use caster_interface::drivers::hw_init::{self, GpioInputLine};
use caster_interface::drivers::mcp23017::ExpanderPair;
use caster_interface::error::Error;
use caster_interface::sensors::cycle::{CycleSensor, InputState};

/// Back-off while the console has no pending input.
const CONSOLE_IDLE: Duration = Duration::from_millis(20);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Caster Interface v{}             ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = match NvsAdapter::new() {
        Ok(n) => Some(n),
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            None
        }
    };
    let config = match nvs.as_ref().map(ConfigPort::load) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            warn!("NVS config load failed ({}), using defaults", e);
            InterfaceConfig::default()
        }
        None => InterfaceConfig::default(),
    };
    match serde_json::to_string(&config) {
        Ok(json) => info!("Config: {}", json),
        Err(e) => warn!("Config not printable: {}", e),
    }

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = esp_idf_hal::peripherals::Peripherals::take()?;
    let i2c = hw_init::init_i2c(peripherals.i2c0, config.i2c_baudrate_hz).map_err(Error::from)?;
    let mut expanders = ExpanderPair::new(i2c, config.mcp0_address, config.mcp1_address);

    // ── 4. Cycle input: filter, ISR, boot-time level ──────────
    let sensor = Arc::new(CycleSensor::new(config.debounce()));
    hw_init::init_cycle_input(&sensor).map_err(Error::from)?;

    let line = GpioInputLine::new();
    let level = line.read_input_line() == config.input_active_high;
    sensor.resync(if level { InputState::On } else { InputState::Off });
    info!("Cycle input on GPIO{} reads {:?}", line.pin(), sensor.state());

    // ── 5. Controller ─────────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut controller = HandshakeController::new(Arc::clone(&sensor), &config);
    controller.initialise(&mut expanders, &mut sink)?;

    info!("System ready. Send one code per line, e.g. `0x11 0x35 0x64 0xAA`.");
    info!("A JSON object line, e.g. `{{\"debounce_ms\": 15}}`, stores a new config for the next boot.");

    // ── 6. Console feed ───────────────────────────────────────
    let stdin = std::io::stdin();
    let mut line_buf = String::new();

    loop {
        // A non-blocking console may hand back a line in pieces; keep
        // accumulating until the newline arrives.
        match stdin.lock().read_line(&mut line_buf) {
            Ok(_) if line_buf.ends_with('\n') => {}
            Ok(_) => {
                std::thread::sleep(CONSOLE_IDLE);
                continue;
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                std::thread::sleep(CONSOLE_IDLE);
                continue;
            }
            Err(e) => {
                error!("Console read failed: {}", e);
                line_buf.clear();
                std::thread::sleep(CONSOLE_IDLE);
                continue;
            }
        }

        let text = line_buf.trim().to_owned();
        line_buf.clear();
        if text.is_empty() {
            continue;
        }
        if text.starts_with('{') {
            store_config(&text, nvs.as_ref());
            continue;
        }

        let code: OutputCode = match text.parse() {
            Ok(code) => code,
            Err(e) => {
                warn!("Skipping '{}': {}", text, e);
                continue;
            }
        };

        if let Err(e) = controller.transmit(code, &mut expanders, &mut sink) {
            error!("Transmit {} failed: {}", code, e);
            if let Err(e) = controller.all_off(&mut expanders) {
                error!("Recovery all-off failed: {}", e);
            }
        }
        info!("Stats: {}", controller.stats());
    }
}

/// Validate and persist a console-supplied config. Applied on next boot.
fn store_config(text: &str, nvs: Option<&NvsAdapter>) {
    let Some(nvs) = nvs else {
        warn!("Config ignored: NVS unavailable");
        return;
    };
    match InterfaceConfig::from_json(text).and_then(|cfg| nvs.save(&cfg)) {
        Ok(()) => info!("Config stored; reboot to apply"),
        Err(e) => warn!("Config rejected: {}", e),
    }
}
