//! Controller wire protocol
//!
//! Two framings exist in the field. Newer controller firmware sends
//! variable-length command frames protected by a CRC16
//! ([`frame_reader::CommandFrameReader`]); older boards send fixed-length
//! telemetry packets protected by a CRC8 ([`legacy::LegacyFrameReader`]).
//! Exactly one is active per link, selected by [`WireVariant`].

pub mod commands;
pub mod crc;
pub mod frame_reader;
pub mod legacy;

use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::config::{EngineConfig, WireVariant};
use crate::link::ByteSource;

pub use frame_reader::CommandFrameReader;
pub use legacy::LegacyFrameReader;

/// Header + command + version + length bytes of a command frame.
pub const FRAME_PREFIX_LEN: usize = 5;
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize;
pub const MAX_FRAME_LEN: usize = FRAME_PREFIX_LEN + MAX_PAYLOAD_LEN + 2;

/// Command codes carried in byte 2 of a command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Telemetry = 0x01,
    BootupStatus = 0x02,
    ErrorReport = 0x03,
    LockAck = 0x04,
    UnlockAck = 0x05,
}

impl Command {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Self::Telemetry),
            0x02 => Some(Self::BootupStatus),
            0x03 => Some(Self::ErrorReport),
            0x04 => Some(Self::LockAck),
            0x05 => Some(Self::UnlockAck),
            _ => None,
        }
    }
}

/// Which controller produced a telemetry report.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Aggregator (CCU): shared skid sensors and valves.
    Skid,
    /// Zone unit (CMU): heaters, vacuum and ambient sensors.
    Unit,
}

impl Source {
    pub const fn tag(self) -> u8 {
        match self {
            Self::Skid => b'S',
            Self::Unit => b'U',
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'S' => Some(Self::Skid),
            b'U' => Some(Self::Unit),
            _ => None,
        }
    }
}

/// A checksum-verified frame, borrowed from the reader's scratch buffer.
///
/// Valid until the next call to `poll`.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame<'a> {
    Telemetry { source: Source, body: &'a [u8] },
    BootupStatus(&'a [u8]),
    ErrorReport(&'a [u8]),
    LockAck,
    UnlockAck,
}

/// Running diagnostics of a frame reader.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderStats {
    pub frames_ok: u32,
    pub crc_failures: u32,
    pub version_mismatches: u32,
    pub unknown_sources: u32,
    pub unknown_commands: u32,
    /// Bytes discarded while hunting for a frame start.
    pub resyncs: u32,
    /// Frames whose remainder can never fit in the byte source.
    pub oversized: u32,
    pub bootup_reports: u32,
    pub error_reports: u32,
    pub lock_acks: u32,
    pub unlock_acks: u32,
}

/// Reader for whichever wire variant the link is configured for.
pub enum FrameReader {
    CommandFramed(CommandFrameReader),
    Legacy(LegacyFrameReader),
}

impl FrameReader {
    pub fn new(config: &EngineConfig) -> Self {
        match config.wire {
            WireVariant::CommandFramed => Self::CommandFramed(CommandFrameReader::new(
                config.sync,
                config.protocol_version,
            )),
            WireVariant::LegacyFixed => Self::Legacy(LegacyFrameReader::new()),
        }
    }

    pub fn variant(&self) -> WireVariant {
        match self {
            Self::CommandFramed(_) => WireVariant::CommandFramed,
            Self::Legacy(_) => WireVariant::LegacyFixed,
        }
    }

    /// Advance the state machine as far as the buffered bytes allow.
    ///
    /// Returns a frame once one has been fully received and verified.
    pub fn poll<S: ByteSource>(&mut self, src: &mut S) -> Option<Frame<'_>> {
        match self {
            Self::CommandFramed(reader) => reader.poll(src),
            Self::Legacy(reader) => reader.poll(src),
        }
    }

    pub fn stats(&self) -> ReaderStats {
        match self {
            Self::CommandFramed(reader) => reader.stats(),
            Self::Legacy(reader) => reader.stats(),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Payload of {0} bytes does not fit in one frame")]
    PayloadTooLong(usize),
}

/// Build a command frame, as the controller firmware does.
pub fn encode_frame(
    sync: [u8; 2],
    command: Command,
    version: u8,
    payload: &[u8],
) -> Result<Vec<u8, MAX_FRAME_LEN>, EncodeError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EncodeError::PayloadTooLong(payload.len()));
    }

    let mut frame: Vec<u8, MAX_FRAME_LEN> = Vec::new();
    let prefix = [sync[0], sync[1], command as u8, version, payload.len() as u8];
    // Capacity is sized for the largest payload, checked above
    let _ = frame.extend_from_slice(&prefix);
    let _ = frame.extend_from_slice(payload);
    let crc = crc::crc16(&frame);
    let _ = frame.extend_from_slice(&crc.to_le_bytes());

    Ok(frame)
}
