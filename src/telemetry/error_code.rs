use core::fmt;

use serde::{Deserialize, Serialize};

/// Accumulated controller error code.
///
/// Codes outside the catalogue are kept verbatim.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    pub const NO_ERROR: Self = Self(0);
    pub const VACUUM_SENSOR_FAULT: Self = Self(90);
    pub const TANK_PRESSURE_SENSOR_FAULT: Self = Self(100);
    pub const TANK_PRESSURE_SENSOR_OUT_OF_BOUNDARY: Self = Self(101);
    pub const TANK_PRESSURE_FAULT: Self = Self(102);
    pub const PROPORTIONAL_VALVE_PRESSURE_SENSOR_FAULT: Self = Self(106);
    pub const PROPORTIONAL_VALVE_PRESSURE_OUT_OF_BOUNDARY: Self = Self(107);
    pub const PROPORTIONAL_VALVE_PRESSURE_CRITICAL_STATE_1: Self = Self(108);
    pub const PROPORTIONAL_VALVE_PRESSURE_CRITICAL_STATE_2: Self = Self(109);
    pub const VACUUM_CHAMBER_SENSOR_TIMEOUT_ERROR: Self = Self(111);
    pub const WARNING_MASS_FLOW_SENSOR_FAULT: Self = Self(10001);
    pub const WARNING_O2_SENSOR_FAULT: Self = Self(10002);
    pub const WARNING_CO2_SENSOR_FAULT: Self = Self(10003);

    pub fn label(self) -> Option<&'static str> {
        let label = match self {
            Self::NO_ERROR => "NO_ERROR",
            Self::VACUUM_SENSOR_FAULT => "VACUUM_SENSOR_FAULT",
            Self::TANK_PRESSURE_SENSOR_FAULT => "TANK_PRESSURE_SENSOR_FAULT",
            Self::TANK_PRESSURE_SENSOR_OUT_OF_BOUNDARY => "TANK_PRESSURE_SENSOR_OUT_OF_BOUNDARY",
            Self::TANK_PRESSURE_FAULT => "TANK_PRESSURE_FAULT",
            Self::PROPORTIONAL_VALVE_PRESSURE_SENSOR_FAULT => {
                "PROPORTIONAL_VALVE_PRESSURE_SENSOR_FAULT"
            }
            Self::PROPORTIONAL_VALVE_PRESSURE_OUT_OF_BOUNDARY => {
                "PROPORTIONAL_VALVE_PRESSURE_OUT_OF_BOUNDARY"
            }
            Self::PROPORTIONAL_VALVE_PRESSURE_CRITICAL_STATE_1 => {
                "PROPORTIONAL_VALVE_PRESSURE_CRITICAL_STATE_1"
            }
            Self::PROPORTIONAL_VALVE_PRESSURE_CRITICAL_STATE_2 => {
                "PROPORTIONAL_VALVE_PRESSURE_CRITICAL_STATE_2"
            }
            Self::VACUUM_CHAMBER_SENSOR_TIMEOUT_ERROR => "VACUUM_CHAMBER_SENSOR_TIMEOUT_ERROR",
            Self::WARNING_MASS_FLOW_SENSOR_FAULT => "WARNING_MASS_FLOW_SENSOR_FAULT",
            Self::WARNING_O2_SENSOR_FAULT => "WARNING_O2_SENSOR_FAULT",
            Self::WARNING_CO2_SENSOR_FAULT => "WARNING_CO2_SENSOR_FAULT",
            _ => return None,
        };
        Some(label)
    }

    pub fn is_warning(self) -> bool {
        self.0 > 10000
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.write_str(label),
            None => write!(f, "UNKNOWN_CODE: {}", self.0),
        }
    }
}

impl From<u32> for ErrorCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}
