//! Per-sensor window statistics
//!
//! Readings outside a sensor's physical range are treated as sensor faults
//! and excluded from every aggregate; they are never clamped.

use core::ops::RangeInclusive;

use heapless::Vec;
use serde::Serialize;

use crate::storage::SampleWindow;
use crate::telemetry::{SkidSample, UnitSample};

/// Every tracked analog channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorId {
    SkidO2,
    SkidMassFlow,
    SkidCo2,
    SkidProportionalValve,
    SkidTemperature,
    SkidHumidity,
    TankPressure,
    UnitVacuum,
    UnitAmbientHumidity,
    UnitAmbientTemperature,
    /// Heater zone, zero based.
    UnitHeater(u8),
}

impl SensorId {
    pub const SKID: [SensorId; 7] = [
        Self::SkidO2,
        Self::SkidMassFlow,
        Self::SkidCo2,
        Self::SkidProportionalValve,
        Self::SkidTemperature,
        Self::SkidHumidity,
        Self::TankPressure,
    ];

    pub const UNIT: [SensorId; 3] = [
        Self::UnitVacuum,
        Self::UnitAmbientHumidity,
        Self::UnitAmbientTemperature,
    ];

    /// Inclusive range of physically plausible readings.
    pub fn valid_range(self) -> RangeInclusive<f64> {
        match self {
            Self::SkidO2 => 0.0..=23.0,
            Self::SkidMassFlow => f64::NEG_INFINITY..=60.0,
            Self::SkidCo2 => 0.0..=1.0,
            Self::SkidProportionalValve => 0.0..=3.0,
            Self::SkidTemperature => -20.0..=120.0,
            Self::SkidHumidity => 0.0..=100.0,
            Self::TankPressure => 0.0..=6.0,
            Self::UnitVacuum => 0.0..=1.2,
            Self::UnitAmbientHumidity => 0.0..=100.0,
            Self::UnitAmbientTemperature => -20.0..=120.0,
            Self::UnitHeater(_) => 0.0..=150.0,
        }
    }
}

/// Samples that expose analog readings by [`SensorId`].
pub trait Readings {
    /// `None` if the sensor does not belong to this source, or the heater
    /// zone is not reported.
    fn reading(&self, sensor: SensorId) -> Option<f64>;
}

impl Readings for SkidSample {
    fn reading(&self, sensor: SensorId) -> Option<f64> {
        match sensor {
            SensorId::SkidO2 => Some(self.o2),
            SensorId::SkidMassFlow => Some(self.mass_flow),
            SensorId::SkidCo2 => Some(self.co2),
            SensorId::SkidProportionalValve => Some(self.proportional_valve_pressure),
            SensorId::SkidTemperature => Some(self.temperature),
            SensorId::SkidHumidity => Some(self.humidity),
            SensorId::TankPressure => Some(self.tank_pressure),
            SensorId::UnitVacuum
            | SensorId::UnitAmbientHumidity
            | SensorId::UnitAmbientTemperature
            | SensorId::UnitHeater(_) => None,
        }
    }
}

impl Readings for UnitSample {
    fn reading(&self, sensor: SensorId) -> Option<f64> {
        match sensor {
            SensorId::UnitVacuum => Some(self.vacuum),
            SensorId::UnitAmbientHumidity => Some(self.ambient_humidity),
            SensorId::UnitAmbientTemperature => Some(self.ambient_temperature),
            SensorId::UnitHeater(zone) => self.heaters().get(zone as usize).copied(),
            SensorId::SkidO2
            | SensorId::SkidMassFlow
            | SensorId::SkidCo2
            | SensorId::SkidProportionalValve
            | SensorId::SkidTemperature
            | SensorId::SkidHumidity
            | SensorId::TankPressure => None,
        }
    }
}

/// Summary of one sensor over a sample window.
///
/// When no reading is valid, `valid` is `false` and every aggregate is zero.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Default)]
pub struct SensorStats {
    pub avg: f64,
    pub max: f64,
    pub min: f64,
    pub median: f64,
    pub valid_count: u16,
    pub valid: bool,
}

/// Compute statistics for `sensor` over the written slots of `window`.
pub fn compute_stats<T, const N: usize>(window: &SampleWindow<T, N>, sensor: SensorId) -> SensorStats
where
    T: Readings + Copy + Default,
{
    let range = sensor.valid_range();
    let mut values: Vec<f64, N> = Vec::new();
    let mut sum = 0.0;
    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;

    for value in window
        .filled()
        .iter()
        .filter_map(|s| s.reading(sensor))
        .filter(|v| range.contains(v))
    {
        sum += value;
        max = max.max(value);
        min = min.min(value);
        // Never more values than slots
        let _ = values.push(value);
    }

    if values.is_empty() {
        return SensorStats::default();
    }

    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };

    SensorStats {
        avg: sum / values.len() as f64,
        max,
        min,
        median,
        valid_count: values.len() as u16,
        valid: true,
    }
}
