//! Status snapshots handed to the telemetry publisher
//!
//! A snapshot combines the discrete fields of the newest sample with window
//! statistics for every analog channel of the source. Assembly works on a
//! copied [`SampleWindow`], never on the live one.

use heapless::Vec;
use serde::Serialize;

use crate::stats::{SensorId, SensorStats, compute_stats};
use crate::storage::SampleWindow;
use crate::telemetry::{
    ErrorCode, MAX_HEATERS, SequenceState, SkidOutputs, SkidSample, StatusFlags, UnitSample,
    UnitValves,
};

/// `true` when `current` is a notable state that was just entered.
///
/// Lock and Safe raise an alert once on entry, not on every poll spent in
/// them.
pub fn is_notable_transition(current: SequenceState, previous: SequenceState) -> bool {
    matches!(current, SequenceState::Lock | SequenceState::Safe) && current != previous
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SkidStatus {
    pub flags: StatusFlags,
    pub state: SequenceState,
    pub previous_state: SequenceState,
    pub outputs: SkidOutputs,
    pub o2: SensorStats,
    pub mass_flow: SensorStats,
    pub co2: SensorStats,
    pub proportional_valve_pressure: SensorStats,
    pub temperature: SensorStats,
    pub humidity: SensorStats,
    pub tank_pressure: SensorStats,
    pub send_alert: bool,
    pub errors: ErrorCode,
    /// Per-sensor health bits of the newest report, zero on legacy boards.
    pub sensor_status: u16,
    pub samples_seen: u32,
    /// Fewer samples than the window holds; statistics cover what exists.
    pub warming_up: bool,
}

impl SkidStatus {
    pub fn assemble<const N: usize>(
        window: &SampleWindow<SkidSample, N>,
        previous_state: SequenceState,
    ) -> Self {
        let latest = window.latest().copied().unwrap_or_default();
        let stats = |sensor| compute_stats(window, sensor);

        Self {
            flags: latest.flags,
            state: latest.state,
            previous_state,
            outputs: latest.outputs,
            o2: stats(SensorId::SkidO2),
            mass_flow: stats(SensorId::SkidMassFlow),
            co2: stats(SensorId::SkidCo2),
            proportional_valve_pressure: stats(SensorId::SkidProportionalValve),
            temperature: stats(SensorId::SkidTemperature),
            humidity: stats(SensorId::SkidHumidity),
            tank_pressure: stats(SensorId::TankPressure),
            send_alert: is_notable_transition(latest.state, previous_state),
            errors: ErrorCode(latest.errors),
            sensor_status: latest.sensor_status,
            samples_seen: window.samples_seen(),
            warming_up: window.warming_up(),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct HeaterInfo {
    pub on: bool,
    pub stats: SensorStats,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UnitStatus {
    pub flags: StatusFlags,
    pub state: SequenceState,
    pub previous_state: SequenceState,
    pub valves: UnitValves,
    /// One entry per zone in the newest report.
    pub heaters: Vec<HeaterInfo, MAX_HEATERS>,
    pub vacuum: SensorStats,
    pub ambient_humidity: SensorStats,
    pub ambient_temperature: SensorStats,
    pub send_alert: bool,
    pub errors: ErrorCode,
    pub sensor_status: u16,
    pub samples_seen: u32,
    pub warming_up: bool,
}

impl UnitStatus {
    pub fn assemble<const N: usize>(
        window: &SampleWindow<UnitSample, N>,
        previous_state: SequenceState,
    ) -> Self {
        let latest = window.latest().copied().unwrap_or_default();
        let stats = |sensor| compute_stats(window, sensor);

        let heaters = (0..latest.heater_count.min(MAX_HEATERS as u8))
            .map(|zone| HeaterInfo {
                on: latest.heater_on(zone as usize),
                stats: stats(SensorId::UnitHeater(zone)),
            })
            .collect();

        Self {
            flags: latest.flags,
            state: latest.state,
            previous_state,
            valves: latest.valves,
            heaters,
            vacuum: stats(SensorId::UnitVacuum),
            ambient_humidity: stats(SensorId::UnitAmbientHumidity),
            ambient_temperature: stats(SensorId::UnitAmbientTemperature),
            send_alert: is_notable_transition(latest.state, previous_state),
            errors: ErrorCode(latest.errors),
            sensor_status: latest.sensor_status,
            samples_seen: window.samples_seen(),
            warming_up: window.warming_up(),
        }
    }
}
