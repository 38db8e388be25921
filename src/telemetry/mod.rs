//! Typed telemetry records
//!
//! One record type per controller class. Records are plain `Copy` data so
//! a whole sample window can be snapshotted under a lock with a memcpy.

mod decode;
mod error_code;

pub use decode::{DecodeError, Decoder, SkidDecoder, UnitDecoder};
pub use error_code::ErrorCode;

use serde::{Deserialize, Serialize};

/// Heater zones a unit report can describe.
pub const MAX_HEATERS: usize = 16;

/// Heater zones in a legacy unit report.
pub const LEGACY_HEATERS: usize = 9;

/// Controller sequence state.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceState {
    #[default]
    ErrorHandling,
    Init,
    Adsorb,
    Evacuation,
    Desorb,
    VacuumRelease,
    Lock,
    DesorbSetup,
    Safe,
    Unlock,
    Unknown(u8),
}

impl SequenceState {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::ErrorHandling,
            1 => Self::Init,
            2 => Self::Adsorb,
            3 => Self::Evacuation,
            4 => Self::Desorb,
            5 => Self::VacuumRelease,
            6 => Self::Lock,
            7 => Self::DesorbSetup,
            8 => Self::Safe,
            9 => Self::Unlock,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Self::ErrorHandling => 0,
            Self::Init => 1,
            Self::Adsorb => 2,
            Self::Evacuation => 3,
            Self::Desorb => 4,
            Self::VacuumRelease => 5,
            Self::Lock => 6,
            Self::DesorbSetup => 7,
            Self::Safe => 8,
            Self::Unlock => 9,
            Self::Unknown(code) => code,
        }
    }

    /// Label used by the cloud telemetry schema.
    pub fn label(self) -> &'static str {
        match self {
            Self::ErrorHandling => "Error_Handling",
            Self::Init => "Init_State",
            Self::Adsorb => "Adsorb_State",
            Self::Evacuation => "Evacuation_State",
            Self::Desorb => "Desorb_State",
            Self::VacuumRelease => "Vacuum_Release_State",
            Self::Lock => "Lock_State",
            Self::DesorbSetup => "Desorb_Setup_State",
            Self::Safe => "Safe_State",
            Self::Unlock => "Unlock_State",
            Self::Unknown(_) => "Unknown_State",
        }
    }
}

/// Controller working flags.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusFlags {
    pub error: bool,
    pub halt: bool,
    pub reset: bool,
    pub just_started: bool,
    pub setup_synching: bool,
}

impl StatusFlags {
    pub fn from_bits(bits: u16) -> Self {
        Self {
            error: bits & 0x01 != 0,
            halt: bits & 0x02 != 0,
            reset: bits & 0x04 != 0,
            just_started: bits & 0x08 != 0,
            setup_synching: bits & 0x10 != 0,
        }
    }
}

/// Skid actuator outputs, `true` = open/on.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SkidOutputs {
    pub gas_valve_before_water_trap: bool,
    pub gas_valve_in_water_trap: bool,
    pub gas_valve_after_water_trap: bool,
    pub vacuum_release_valve_in_water_trap: bool,
    pub three_way_vacuum_release_valve_before_condenser: bool,
    /// `true` = to air, `false` = to tank.
    pub three_way_valve_after_vacuum_pump: bool,
    pub compressor: bool,
    pub vacuum_pump: bool,
    pub condenser: bool,
}

impl SkidOutputs {
    pub fn from_bits(bits: u16) -> Self {
        let bit = |n: u16| bits & (1 << n) != 0;
        Self {
            gas_valve_before_water_trap: bit(0),
            gas_valve_in_water_trap: bit(1),
            gas_valve_after_water_trap: bit(2),
            vacuum_release_valve_in_water_trap: bit(3),
            three_way_vacuum_release_valve_before_condenser: bit(4),
            three_way_valve_after_vacuum_pump: bit(5),
            compressor: bit(6),
            vacuum_pump: bit(7),
            condenser: bit(8),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UnitValves {
    pub fan: bool,
    pub butterfly_valve_1: bool,
    pub butterfly_valve_2: bool,
}

impl UnitValves {
    pub fn from_bits(bits: u8) -> Self {
        Self {
            fan: bits & 0x01 != 0,
            butterfly_valve_1: bits & 0x02 != 0,
            butterfly_valve_2: bits & 0x04 != 0,
        }
    }
}

/// One aggregator (CCU) report.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct SkidSample {
    pub flags: StatusFlags,
    pub state: SequenceState,
    pub outputs: SkidOutputs,
    /// Per-sensor health bits as reported; zero on legacy boards.
    pub sensor_status: u16,
    pub o2: f64,
    pub mass_flow: f64,
    pub co2: f64,
    pub tank_pressure: f64,
    pub proportional_valve_pressure: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub errors: u32,
}

/// One zone unit (CMU) report.
#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct UnitSample {
    pub flags: StatusFlags,
    pub state: SequenceState,
    pub valves: UnitValves,
    pub sensor_status: u16,
    /// Bit `i` set = heater `i` on.
    pub heater_status: u16,
    pub heater_count: u8,
    /// Only the first `heater_count` entries are meaningful.
    pub heater_temperatures: [f64; MAX_HEATERS],
    pub vacuum: f64,
    pub ambient_humidity: f64,
    pub ambient_temperature: f64,
    pub errors: u32,
}

impl Default for UnitSample {
    fn default() -> Self {
        Self {
            flags: StatusFlags::default(),
            state: SequenceState::default(),
            valves: UnitValves::default(),
            sensor_status: 0,
            heater_status: 0,
            heater_count: 0,
            heater_temperatures: [0.0; MAX_HEATERS],
            vacuum: 0.0,
            ambient_humidity: 0.0,
            ambient_temperature: 0.0,
            errors: 0,
        }
    }
}

impl UnitSample {
    pub fn heaters(&self) -> &[f64] {
        &self.heater_temperatures[..self.heater_count as usize]
    }

    pub fn heater_on(&self, zone: usize) -> bool {
        zone < 16 && self.heater_status & (1 << zone) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_state_codes() {
        for code in 0..=9u8 {
            assert_eq!(SequenceState::from_code(code).code(), code);
        }
        assert_eq!(SequenceState::from_code(6), SequenceState::Lock);
        assert_eq!(SequenceState::from_code(8), SequenceState::Safe);
        assert_eq!(SequenceState::from_code(42), SequenceState::Unknown(42));
        assert_eq!(SequenceState::Unknown(42).code(), 42);
    }

    #[test]
    fn test_sequence_state_labels() {
        assert_eq!(SequenceState::ErrorHandling.label(), "Error_Handling");
        assert_eq!(SequenceState::VacuumRelease.label(), "Vacuum_Release_State");
    }

    #[test]
    fn test_flag_bits() {
        let flags = StatusFlags::from_bits(0b1_0101);
        assert!(flags.error);
        assert!(!flags.halt);
        assert!(flags.reset);
        assert!(!flags.just_started);
        assert!(flags.setup_synching);
    }

    #[test]
    fn test_output_bits() {
        let outputs = SkidOutputs::from_bits(0x0101);
        assert!(outputs.gas_valve_before_water_trap);
        assert!(outputs.condenser);
        assert!(!outputs.compressor);

        let valves = UnitValves::from_bits(0x06);
        assert!(!valves.fan);
        assert!(valves.butterfly_valve_1);
        assert!(valves.butterfly_valve_2);
    }

    #[test]
    fn test_heater_slice_follows_count() {
        let mut sample = UnitSample::default();
        sample.heater_count = 3;
        sample.heater_status = 0b100;
        assert_eq!(sample.heaters().len(), 3);
        assert!(sample.heater_on(2));
        assert!(!sample.heater_on(0));
        assert!(!sample.heater_on(20));
    }
}
