//! Desktop simulator for the skid telemetry engine.
//!
//! A mock controller thread emits skid and unit reports into the receive
//! queue, the engine's ingestion loop runs on a second thread, and the main
//! thread plays the telemetry publisher: it polls both status snapshots,
//! threads the previous sequence state through, and toggles the skid lock
//! every few polls so the acknowledgement path is exercised too.
//!
//! ```text
//! RUST_LOG=info cargo run -p skid-simulator              # command-framed link
//! RUST_LOG=info cargo run -p skid-simulator -- --legacy  # fixed-length link
//! ```

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Duration;

use embassy_futures::block_on;
use log::{info, warn};

use skid_telemetry::link::{CommandSink, LinkError, RxQueue};
use skid_telemetry::protocol::commands::COMMAND_PACKET_LEN;
use skid_telemetry::protocol::crc::crc8;
use skid_telemetry::protocol::{Command, encode_frame};
use skid_telemetry::{
    EngineConfig, Ingestor, SampleStore, SequenceState, WireVariant, get_skid_status,
    get_unit_status, send_lock_status, send_unlock_status,
};

// ---------------------------------------------------------------------------
// Timing constants
// ---------------------------------------------------------------------------

/// Interval between reports from the mock controller.
const REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// Interval between status polls by the publisher.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Publisher polls between lock toggles.
const LOCK_TOGGLE_POLLS: u32 = 12;

/// Reports spent in each sequence state before advancing.
const REPORTS_PER_STATE: u32 = 16;

const RX_CAPACITY: usize = 1024;

static RX: RxQueue<RX_CAPACITY> = RxQueue::new();

// ---------------------------------------------------------------------------
// Mock controller
// ---------------------------------------------------------------------------

const CYCLE: [SequenceState; 6] = [
    SequenceState::Init,
    SequenceState::Adsorb,
    SequenceState::Evacuation,
    SequenceState::DesorbSetup,
    SequenceState::Desorb,
    SequenceState::VacuumRelease,
];

/// Generates controller reports that vary over time.
struct MockController {
    config: EngineConfig,
    commands: Receiver<[u8; COMMAND_PACKET_LEN]>,
    reports: u32,
    locked: bool,
}

fn q16(value: f64) -> [u8; 4] {
    ((value * 65536.0).round() as i32).to_be_bytes()
}

impl MockController {
    fn new(config: EngineConfig, commands: Receiver<[u8; COMMAND_PACKET_LEN]>) -> Self {
        Self {
            config,
            commands,
            reports: 0,
            locked: false,
        }
    }

    fn state(&self) -> SequenceState {
        if self.locked {
            return SequenceState::Lock;
        }
        let cycle = self.reports / REPORTS_PER_STATE;
        // Every fourth cycle ends in Safe
        if cycle % 4 == 3 {
            SequenceState::Safe
        } else {
            CYCLE[cycle as usize % CYCLE.len()]
        }
    }

    fn handle_commands(&mut self) {
        while let Ok(packet) = self.commands.try_recv() {
            if crc8(&packet[..COMMAND_PACKET_LEN - 1]) != packet[COMMAND_PACKET_LEN - 1] {
                warn!("Mock controller: corrupt command {:02x?}", packet);
                continue;
            }
            let (locked, ack) = match packet[4] {
                b'L' => (true, Command::LockAck),
                _ => (false, Command::UnlockAck),
            };
            self.locked = locked;
            // Legacy boards never acknowledge
            if self.config.wire == WireVariant::CommandFramed {
                self.emit_frame(ack, &[]);
            }
        }
    }

    fn emit_frame(&self, command: Command, payload: &[u8]) {
        match encode_frame(self.config.sync, command, self.config.protocol_version, payload) {
            Ok(frame) => {
                RX.push_slice(&frame);
            }
            Err(e) => warn!("Mock controller: {}", e),
        }
    }

    fn emit_legacy(&self, tag: u8, body: &[u8]) {
        let mut packet = vec![b'D', 0, tag, 0];
        packet.extend_from_slice(body);
        packet.push(crc8(&packet));
        RX.push_slice(&packet);
    }

    fn emit_skid(&self, t: f64) {
        let state = self.state().code();
        let outputs: u16 = if self.locked { 0x0000 } else { 0x00C5 };
        let o2 = 20.5 + 0.4 * (t / 7.0).sin();
        let mass_flow = 12.0 + 4.0 * (t / 11.0).sin();
        let co2 = 0.04 + 0.01 * (t / 13.0).cos();
        let tank = 3.0 + 1.5 * (t / 17.0).sin();
        let valve = 1.2 + 0.3 * (t / 5.0).cos();
        let temperature = 24.0 + 2.0 * (t / 19.0).sin();
        // Occasional out-of-range spike to exercise filtering
        let humidity = if self.reports % 29 == 0 {
            140.0
        } else {
            45.0 + 5.0 * (t / 23.0).cos()
        };

        let mut body = Vec::with_capacity(40);
        match self.config.wire {
            WireVariant::CommandFramed => {
                body.extend_from_slice(&[b'S', 1, state]);
                body.extend_from_slice(&0u16.to_be_bytes());
                body.extend_from_slice(&0u16.to_be_bytes());
                body.extend_from_slice(&outputs.to_be_bytes());
                body.extend_from_slice(&0u16.to_be_bytes());
                for value in [o2, mass_flow, co2, tank, valve, temperature, humidity] {
                    body.extend_from_slice(&q16(value));
                }
                self.emit_frame(Command::Telemetry, &body);
            }
            WireVariant::LegacyFixed => {
                body.extend_from_slice(&[0, state]);
                body.extend_from_slice(&outputs.to_be_bytes());
                for value in [o2, mass_flow, co2, tank, valve, temperature, humidity] {
                    body.extend_from_slice(&q16(value));
                }
                body.extend_from_slice(&0u32.to_be_bytes());
                self.emit_legacy(b'S', &body);
            }
        }
    }

    fn emit_unit(&self, t: f64) {
        let state = self.state().code();
        let heaters: Vec<f64> = (0..9)
            .map(|zone| 110.0 + 15.0 * ((t + zone as f64 * 3.0) / 31.0).sin())
            .collect();
        let heater_status: u16 = 0x01FF & !(1 << (self.reports % 9));
        let vacuum = 0.6 + 0.3 * (t / 9.0).sin();
        let ambient_temperature = 18.0 + 3.0 * (t / 41.0).sin();
        let ambient_humidity = 55.0 + 10.0 * (t / 37.0).cos();

        let mut body = Vec::with_capacity(64);
        match self.config.wire {
            WireVariant::CommandFramed => {
                body.extend_from_slice(&[b'U', 2, state]);
                body.extend_from_slice(&0u16.to_be_bytes());
                body.extend_from_slice(&0u16.to_be_bytes());
                body.extend_from_slice(&0x0001u16.to_be_bytes());
                body.extend_from_slice(&0u16.to_be_bytes());
                body.extend_from_slice(&q16(vacuum));
                body.extend_from_slice(&q16(ambient_temperature));
                body.extend_from_slice(&q16(ambient_humidity));
                body.push(heaters.len() as u8);
                body.extend_from_slice(&heater_status.to_be_bytes());
                for value in &heaters {
                    body.extend_from_slice(&q16(*value));
                }
                self.emit_frame(Command::Telemetry, &body);
            }
            WireVariant::LegacyFixed => {
                body.extend_from_slice(&[0, state]);
                body.extend_from_slice(&heater_status.to_be_bytes());
                for value in &heaters {
                    body.extend_from_slice(&q16(*value));
                }
                body.push(0x01);
                body.extend_from_slice(&q16(vacuum));
                body.extend_from_slice(&q16(ambient_humidity));
                body.extend_from_slice(&q16(ambient_temperature));
                body.extend_from_slice(&0u32.to_be_bytes());
                self.emit_legacy(b'U', &body);
            }
        }
    }

    fn run(mut self) {
        loop {
            self.handle_commands();
            let t = self.reports as f64 * REPORT_INTERVAL.as_secs_f64();
            self.emit_skid(t);
            // Units report at half the skid rate
            if self.reports % 2 == 0 {
                self.emit_unit(t);
            }
            self.reports += 1;
            thread::sleep(REPORT_INTERVAL);
        }
    }
}

// ---------------------------------------------------------------------------
// Outgoing link
// ---------------------------------------------------------------------------

/// Transmit side of the simulated UART.
struct ControllerLink(Sender<[u8; COMMAND_PACKET_LEN]>);

impl CommandSink for ControllerLink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let packet: [u8; COMMAND_PACKET_LEN] = bytes
            .try_into()
            .map_err(|_| LinkError::ShortWrite(0, bytes.len()))?;
        self.0.send(packet).map_err(|_| LinkError::Busy)
    }
}

// ---------------------------------------------------------------------------
// Ingestion
// ---------------------------------------------------------------------------

fn ingest(config: EngineConfig, store: Arc<SampleStore>) {
    let mut ingestor = Ingestor::new(&config);
    block_on(ingestor.run(RX.reader(), &store))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    env_logger::init();

    let config = if std::env::args().any(|arg| arg == "--legacy") {
        EngineConfig::legacy()
    } else {
        EngineConfig::default()
    };
    info!("Starting skid telemetry simulator ({:?})", config.wire);

    let store = Arc::new(SampleStore::new(&config));
    let (tx, rx) = channel();
    let mut link = ControllerLink(tx);

    thread::spawn(move || MockController::new(config, rx).run());

    let ingest_store = Arc::clone(&store);
    thread::spawn(move || ingest(config, ingest_store));

    let mut last_skid = SequenceState::default();
    let mut last_unit = SequenceState::default();
    let mut locked = false;

    for poll in 1u32.. {
        thread::sleep(POLL_INTERVAL);

        match block_on(get_skid_status(&store, last_skid)) {
            Ok(status) => {
                info!(
                    "skid {} o2 {:.2}/{:.2} mass flow {:.2} humidity {:.1} (n={}) errors {}",
                    status.state.label(),
                    status.o2.avg,
                    status.o2.median,
                    status.mass_flow.avg,
                    status.humidity.avg,
                    status.humidity.valid_count,
                    status.errors
                );
                if status.send_alert {
                    warn!("ALERT: skid entered {}", status.state.label());
                }
                last_skid = status.state;
            }
            Err(e) => warn!("Skid status unavailable: {}", e),
        }

        match block_on(get_unit_status(&store, last_unit)) {
            Ok(status) => {
                let on = status.heaters.iter().filter(|h| h.on).count();
                let hottest = status
                    .heaters
                    .iter()
                    .filter(|h| h.stats.valid)
                    .map(|h| h.stats.max)
                    .fold(f64::NEG_INFINITY, f64::max);
                info!(
                    "unit {} vacuum {:.2} heaters {}/{} on, hottest {:.1}{}",
                    status.state.label(),
                    status.vacuum.avg,
                    on,
                    status.heaters.len(),
                    hottest,
                    if status.warming_up { " (warming up)" } else { "" }
                );
                if status.send_alert {
                    warn!("ALERT: unit entered {}", status.state.label());
                }
                last_unit = status.state;
            }
            Err(e) => warn!("Unit status unavailable: {}", e),
        }

        if poll % LOCK_TOGGLE_POLLS == 0 {
            locked = !locked;
            let sent = if locked {
                send_lock_status(&mut link)
            } else {
                send_unlock_status(&mut link)
            };
            if let Err(e) = sent {
                warn!("Lock request not sent: {}", e);
            }
        }

        if RX.overruns() > 0 {
            warn!("Receive queue overruns: {}", RX.overruns());
        }
    }
}
