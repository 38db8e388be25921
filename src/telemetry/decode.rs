//! Report body decoders
//!
//! Multi-byte fields are big-endian. Analog readings are Q16.16 fixed point
//! (`raw / 65536.0`), signed for quantities that can go negative.

use thiserror_no_std::Error;

use super::{
    LEGACY_HEATERS, MAX_HEATERS, SequenceState, SkidOutputs, SkidSample, StatusFlags, UnitSample,
    UnitValves,
};
use crate::config::WireVariant;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Report truncated: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
    #[error("Unit reports {0} heaters, at most 16 supported")]
    TooManyHeaters(u8),
}

/// Turns a verified report body into a typed sample.
pub trait Decoder {
    type Sample;

    fn decode(&self, body: &[u8]) -> Result<Self::Sample, DecodeError>;
}

/// Sequential big-endian field reader.
struct Fields<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Fields<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take<const L: usize>(&mut self) -> Result<[u8; L], DecodeError> {
        let end = self.pos + L;
        let bytes = self.buf.get(self.pos..end).ok_or(DecodeError::Truncated {
            needed: end,
            available: self.buf.len(),
        })?;
        self.pos = end;
        let mut out = [0u8; L];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.take()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.take()?))
    }

    fn uq16(&mut self) -> Result<f64, DecodeError> {
        Ok(self.u32()? as f64 / 65536.0)
    }

    fn sq16(&mut self) -> Result<f64, DecodeError> {
        Ok(i32::from_be_bytes(self.take()?) as f64 / 65536.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SkidDecoder {
    wire: WireVariant,
}

impl SkidDecoder {
    pub const fn new(wire: WireVariant) -> Self {
        Self { wire }
    }
}

impl Decoder for SkidDecoder {
    type Sample = SkidSample;

    fn decode(&self, body: &[u8]) -> Result<SkidSample, DecodeError> {
        let mut f = Fields::new(body);
        match self.wire {
            WireVariant::CommandFramed => {
                let _id = f.u8()?;
                let state = SequenceState::from_code(f.u8()?);
                let errors = f.u16()? as u32;
                let flags = StatusFlags::from_bits(f.u16()?);
                let outputs = SkidOutputs::from_bits(f.u16()?);
                let sensor_status = f.u16()?;
                Ok(SkidSample {
                    flags,
                    state,
                    outputs,
                    sensor_status,
                    o2: f.uq16()?,
                    mass_flow: f.sq16()?,
                    co2: f.uq16()?,
                    tank_pressure: f.uq16()?,
                    proportional_valve_pressure: f.uq16()?,
                    temperature: f.sq16()?,
                    humidity: f.sq16()?,
                    errors,
                })
            }
            WireVariant::LegacyFixed => {
                let flags = StatusFlags::from_bits(f.u8()? as u16);
                let state = SequenceState::from_code(f.u8()?);
                let outputs = SkidOutputs::from_bits(f.u16()?);
                Ok(SkidSample {
                    flags,
                    state,
                    outputs,
                    sensor_status: 0,
                    o2: f.uq16()?,
                    mass_flow: f.sq16()?,
                    co2: f.sq16()?,
                    tank_pressure: f.uq16()?,
                    proportional_valve_pressure: f.sq16()?,
                    temperature: f.sq16()?,
                    humidity: f.uq16()?,
                    errors: f.u32()?,
                })
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UnitDecoder {
    wire: WireVariant,
}

impl UnitDecoder {
    pub const fn new(wire: WireVariant) -> Self {
        Self { wire }
    }
}

impl Decoder for UnitDecoder {
    type Sample = UnitSample;

    fn decode(&self, body: &[u8]) -> Result<UnitSample, DecodeError> {
        let mut f = Fields::new(body);
        let mut sample = UnitSample::default();

        match self.wire {
            WireVariant::CommandFramed => {
                let _id = f.u8()?;
                sample.state = SequenceState::from_code(f.u8()?);
                sample.errors = f.u16()? as u32;
                sample.flags = StatusFlags::from_bits(f.u16()?);
                // Outputs word; valves live in the low byte
                sample.valves = UnitValves::from_bits(f.u16()? as u8);
                sample.sensor_status = f.u16()?;
                sample.vacuum = f.uq16()?;
                sample.ambient_temperature = f.sq16()?;
                sample.ambient_humidity = f.uq16()?;

                let count = f.u8()?;
                if count as usize > MAX_HEATERS {
                    return Err(DecodeError::TooManyHeaters(count));
                }
                sample.heater_count = count;
                sample.heater_status = f.u16()?;
                for slot in &mut sample.heater_temperatures[..count as usize] {
                    *slot = f.uq16()?;
                }
            }
            WireVariant::LegacyFixed => {
                sample.flags = StatusFlags::from_bits(f.u8()? as u16);
                sample.state = SequenceState::from_code(f.u8()?);
                sample.heater_status = f.u16()?;
                sample.heater_count = LEGACY_HEATERS as u8;
                for slot in &mut sample.heater_temperatures[..LEGACY_HEATERS] {
                    *slot = f.uq16()?;
                }
                sample.valves = UnitValves::from_bits(f.u8()?);
                sample.vacuum = f.sq16()?;
                sample.ambient_humidity = f.uq16()?;
                sample.ambient_temperature = f.sq16()?;
                sample.errors = f.u32()?;
            }
        }

        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn q16(value: f64) -> [u8; 4] {
        ((value * 65536.0).round() as i32).to_be_bytes()
    }

    #[test]
    fn test_q16_conversion() {
        let body = [0x00, 0x01, 0x80, 0x00, 0xFF, 0xFF, 0x80, 0x00];
        let mut f = Fields::new(&body);
        assert_eq!(f.uq16().unwrap(), 1.5);
        assert_eq!(f.sq16().unwrap(), -0.5);
    }

    #[test]
    fn test_unsigned_q16_keeps_high_bit() {
        let body = [0x80, 0x00, 0x00, 0x00];
        assert_eq!(Fields::new(&body).uq16().unwrap(), 32768.0);
    }

    #[test]
    fn test_decode_framed_skid() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x01, 6]); // id, Lock
        body.extend_from_slice(&102u16.to_be_bytes());
        body.extend_from_slice(&0x0003u16.to_be_bytes());
        body.extend_from_slice(&0x0180u16.to_be_bytes());
        body.extend_from_slice(&0x0000u16.to_be_bytes());
        for value in [20.5, -3.25, 0.04, 4.0, 1.5, 22.75, 45.0] {
            body.extend_from_slice(&q16(value));
        }
        assert_eq!(body.len(), 38);

        let sample = SkidDecoder::new(WireVariant::CommandFramed)
            .decode(&body)
            .unwrap();
        assert_eq!(sample.state, SequenceState::Lock);
        assert_eq!(sample.errors, 102);
        assert!(sample.flags.error && sample.flags.halt);
        assert!(sample.outputs.vacuum_pump && sample.outputs.condenser);
        assert_eq!(sample.o2, 20.5);
        assert_eq!(sample.mass_flow, -3.25);
        assert!((sample.co2 - 0.04).abs() <= 1.0 / 65536.0);
        assert_eq!(sample.humidity, 45.0);
    }

    #[test]
    fn test_decode_framed_unit_heaters() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x02, 2, 0, 0, 0, 0x08, 0, 0x05, 0, 0]);
        body.extend_from_slice(&q16(0.8));
        body.extend_from_slice(&q16(-5.0));
        body.extend_from_slice(&q16(55.0));
        body.push(3);
        body.extend_from_slice(&0b101u16.to_be_bytes());
        for value in [100.0, 110.5, 121.0] {
            body.extend_from_slice(&q16(value));
        }

        let sample = UnitDecoder::new(WireVariant::CommandFramed)
            .decode(&body)
            .unwrap();
        assert_eq!(sample.state, SequenceState::Adsorb);
        assert!(sample.flags.just_started);
        assert!(sample.valves.fan && sample.valves.butterfly_valve_2);
        assert_eq!(sample.ambient_temperature, -5.0);
        assert_eq!(sample.heaters(), &[100.0, 110.5, 121.0]);
        assert!(sample.heater_on(0) && !sample.heater_on(1) && sample.heater_on(2));
    }

    #[test]
    fn test_decode_legacy_skid() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x04, 8, 0x00, 0x40]);
        for value in [21.0, 12.0, 0.5, 3.0, -0.25, 30.0, 60.0] {
            body.extend_from_slice(&q16(value));
        }
        body.extend_from_slice(&10002u32.to_be_bytes());
        assert_eq!(body.len(), 36);

        let sample = SkidDecoder::new(WireVariant::LegacyFixed)
            .decode(&body)
            .unwrap();
        assert!(sample.flags.reset);
        assert_eq!(sample.state, SequenceState::Safe);
        assert!(sample.outputs.compressor);
        assert_eq!(sample.proportional_valve_pressure, -0.25);
        assert_eq!(sample.errors, 10002);
    }

    #[test]
    fn test_decode_legacy_unit() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x00, 1]);
        body.extend_from_slice(&0x01FFu16.to_be_bytes());
        for zone in 0..9 {
            body.extend_from_slice(&q16(90.0 + zone as f64));
        }
        body.push(0x01);
        body.extend_from_slice(&q16(0.6));
        body.extend_from_slice(&q16(40.0));
        body.extend_from_slice(&q16(21.5));
        body.extend_from_slice(&0u32.to_be_bytes());
        assert_eq!(body.len(), 57);

        let sample = UnitDecoder::new(WireVariant::LegacyFixed)
            .decode(&body)
            .unwrap();
        assert_eq!(sample.heater_count, 9);
        assert_eq!(sample.heaters()[8], 98.0);
        assert!(sample.heater_on(8));
        assert!(sample.valves.fan);
        assert_eq!(sample.ambient_humidity, 40.0);
        assert_eq!(sample.ambient_temperature, 21.5);
    }

    #[test]
    fn test_truncated_body() {
        let result = SkidDecoder::new(WireVariant::LegacyFixed).decode(&[0u8; 20]);
        assert_eq!(
            result,
            Err(DecodeError::Truncated {
                needed: 24,
                available: 20
            })
        );
    }

    #[test]
    fn test_heater_count_is_bounded() {
        let mut body = Vec::from([0u8; 22]);
        body.push(17);
        let result = UnitDecoder::new(WireVariant::CommandFramed).decode(&body);
        assert_eq!(result, Err(DecodeError::TooManyHeaters(17)));
    }
}
