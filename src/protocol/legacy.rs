//! Fixed-length reader for older controller boards.
//!
//! `'D' _ 'S'|'U' _ [body][crc8]`, 41 bytes for the skid report and 62 for
//! the unit report. Only telemetry is ever sent in this format.

use log::warn;

use super::crc::crc8;
use super::{Frame, ReaderStats, Source};
use crate::link::ByteSource;

pub const LEGACY_PREFIX_LEN: usize = 4;
pub const LEGACY_SKID_LEN: usize = 41;
pub const LEGACY_UNIT_LEN: usize = 62;

const MARKER: u8 = b'D';

pub const fn legacy_len(source: Source) -> usize {
    match source {
        Source::Skid => LEGACY_SKID_LEN,
        Source::Unit => LEGACY_UNIT_LEN,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitMarker,
    AwaitSource,
    AwaitBody(Source),
}

pub struct LegacyFrameReader {
    state: State,
    buf: [u8; LEGACY_UNIT_LEN],
    stats: ReaderStats,
}

impl Default for LegacyFrameReader {
    fn default() -> Self {
        Self::new()
    }
}

impl LegacyFrameReader {
    pub fn new() -> Self {
        Self {
            state: State::AwaitMarker,
            buf: [0; LEGACY_UNIT_LEN],
            stats: ReaderStats::default(),
        }
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn poll<S: ByteSource>(&mut self, src: &mut S) -> Option<Frame<'_>> {
        let source = loop {
            match self.step(src) {
                Ok(Some(source)) => break source,
                Ok(None) => {}
                Err(Pending) => return None,
            }
        };

        let len = legacy_len(source);
        Some(Frame::Telemetry {
            source,
            body: &self.buf[LEGACY_PREFIX_LEN..len - 1],
        })
    }

    fn step<S: ByteSource>(&mut self, src: &mut S) -> Result<Option<Source>, Pending> {
        match self.state {
            State::AwaitMarker => {
                if !src.receive_exact(&mut self.buf[..1]) {
                    return Err(Pending);
                }
                if self.buf[0] == MARKER {
                    self.state = State::AwaitSource;
                } else {
                    self.stats.resyncs += 1;
                }
                Ok(None)
            }
            State::AwaitSource => {
                if !src.receive_exact(&mut self.buf[1..LEGACY_PREFIX_LEN]) {
                    return Err(Pending);
                }
                match Source::from_tag(self.buf[2]) {
                    Some(source)
                        if src
                            .capacity()
                            .is_some_and(|cap| legacy_len(source) - LEGACY_PREFIX_LEN > cap) =>
                    {
                        self.stats.oversized += 1;
                        self.stats.resyncs += 1;
                        warn!("Dropping {:?} report: body cannot fit the receive buffer", source);
                        self.state = State::AwaitMarker;
                    }
                    Some(source) => self.state = State::AwaitBody(source),
                    None => {
                        self.stats.unknown_sources += 1;
                        self.state = State::AwaitMarker;
                    }
                }
                Ok(None)
            }
            State::AwaitBody(source) => {
                let len = legacy_len(source);
                if !src.receive_exact(&mut self.buf[LEGACY_PREFIX_LEN..len]) {
                    return Err(Pending);
                }
                self.state = State::AwaitMarker;

                let actual = crc8(&self.buf[..len - 1]);
                if actual != self.buf[len - 1] {
                    self.stats.crc_failures += 1;
                    warn!(
                        "Dropping {:?} report: CRC {:#04x} != {:#04x}",
                        source,
                        actual,
                        self.buf[len - 1]
                    );
                    return Ok(None);
                }

                self.stats.frames_ok += 1;
                Ok(Some(source))
            }
        }
    }
}

/// Not enough bytes buffered for the current field.
struct Pending;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::RxQueue;

    fn packet(source: Source, fill: u8) -> [u8; LEGACY_UNIT_LEN] {
        let len = legacy_len(source);
        let mut raw = [0u8; LEGACY_UNIT_LEN];
        raw[0] = b'D';
        raw[2] = source.tag();
        for b in &mut raw[LEGACY_PREFIX_LEN..len - 1] {
            *b = fill;
        }
        raw[len - 1] = crc8(&raw[..len - 1]);
        raw
    }

    #[test]
    fn test_skid_and_unit_packets() {
        let queue: RxQueue<256> = RxQueue::new();
        queue.push_slice(&packet(Source::Skid, 0x11)[..LEGACY_SKID_LEN]);
        queue.push_slice(&packet(Source::Unit, 0x22)[..LEGACY_UNIT_LEN]);

        let mut reader = LegacyFrameReader::new();
        let mut src = queue.reader();

        match reader.poll(&mut src) {
            Some(Frame::Telemetry { source, body }) => {
                assert_eq!(source, Source::Skid);
                assert_eq!(body.len(), 36);
                assert!(body.iter().all(|b| *b == 0x11));
            }
            other => panic!("Expected skid telemetry, got {:?}", other),
        }
        match reader.poll(&mut src) {
            Some(Frame::Telemetry { source, body }) => {
                assert_eq!(source, Source::Unit);
                assert_eq!(body.len(), 57);
            }
            other => panic!("Expected unit telemetry, got {:?}", other),
        }
        assert_eq!(reader.stats().frames_ok, 2);
    }

    #[test]
    fn test_bad_crc_is_dropped() {
        let mut raw = packet(Source::Skid, 0x01);
        raw[10] ^= 0x01;

        let queue: RxQueue<128> = RxQueue::new();
        queue.push_slice(&raw[..LEGACY_SKID_LEN]);

        let mut reader = LegacyFrameReader::new();
        assert!(reader.poll(&mut queue.reader()).is_none());
        assert_eq!(reader.stats().crc_failures, 1);
        assert!(queue.is_empty(), "Corrupt packet must be fully consumed");
    }

    #[test]
    fn test_unknown_source_letter_resets() {
        let queue: RxQueue<128> = RxQueue::new();
        queue.push_slice(&[b'x', b'D', 0, b'Q', 0]);
        queue.push_slice(&packet(Source::Skid, 0)[..LEGACY_SKID_LEN]);

        let mut reader = LegacyFrameReader::new();
        assert!(reader.poll(&mut queue.reader()).is_some());
        let stats = reader.stats();
        assert_eq!(stats.resyncs, 1);
        assert_eq!(stats.unknown_sources, 1);
    }

    #[test]
    fn test_partial_body_waits() {
        let raw = packet(Source::Unit, 0x05);
        let queue: RxQueue<128> = RxQueue::new();
        queue.push_slice(&raw[..30]);

        let mut reader = LegacyFrameReader::new();
        let mut src = queue.reader();
        assert!(reader.poll(&mut src).is_none());
        queue.push_slice(&raw[30..LEGACY_UNIT_LEN]);
        assert!(reader.poll(&mut src).is_some());
    }

    #[test]
    fn test_unit_report_larger_than_queue_is_skipped() {
        // Holds a skid body (37 bytes) but not a unit body (58 bytes)
        let queue: RxQueue<48> = RxQueue::new();
        let mut src = queue.reader();
        let mut reader = LegacyFrameReader::new();

        let unit = packet(Source::Unit, 0x05);
        let skid = packet(Source::Skid, 0x07);
        let mut seen = 0;
        for chunk in unit.chunks(8).chain(skid[..LEGACY_SKID_LEN].chunks(8)) {
            queue.push_slice(chunk);
            while let Some(frame) = reader.poll(&mut src) {
                assert!(matches!(
                    frame,
                    Frame::Telemetry {
                        source: Source::Skid,
                        ..
                    }
                ));
                seen += 1;
            }
        }

        assert_eq!(seen, 1, "Skid report after the oversized unit report must arrive");
        assert_eq!(reader.stats().oversized, 1);
        assert_eq!(queue.overruns(), 0);
    }
}
