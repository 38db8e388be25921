//! Command-framed reader
//!
//! `[sync:2][command][version][length][payload:length][crc16:2]`
//!
//! Every call to [`CommandFrameReader::poll`] resumes from the field it
//! stopped at. A field is consumed only once all of its bytes are buffered,
//! so the reader never blocks and never loses its place.

use log::{debug, warn};

use super::crc::crc16;
use super::{Command, FRAME_PREFIX_LEN, Frame, MAX_FRAME_LEN, ReaderStats, Source};
use crate::link::ByteSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// `matched` sync bytes seen so far.
    AwaitHeader { matched: usize },
    AwaitCommand,
    AwaitVersion,
    AwaitPayloadLength,
    /// Payload plus the trailing CRC.
    AwaitPayload { len: usize },
}

enum Step {
    Pending,
    Progress,
    Ready(Ready),
}

#[derive(Clone, Copy)]
enum Ready {
    Telemetry(Source),
    BootupStatus,
    ErrorReport,
    LockAck,
    UnlockAck,
}

pub struct CommandFrameReader {
    sync: [u8; 2],
    version: u8,
    state: State,
    buf: [u8; MAX_FRAME_LEN],
    stats: ReaderStats,
}

impl CommandFrameReader {
    pub fn new(sync: [u8; 2], version: u8) -> Self {
        Self {
            sync,
            version,
            state: State::AwaitHeader { matched: 0 },
            buf: [0; MAX_FRAME_LEN],
            stats: ReaderStats::default(),
        }
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn reset(&mut self) {
        self.state = State::AwaitHeader { matched: 0 };
    }

    pub fn poll<S: ByteSource>(&mut self, src: &mut S) -> Option<Frame<'_>> {
        let ready = loop {
            match self.step(src) {
                Step::Pending => return None,
                Step::Progress => {}
                Step::Ready(ready) => break ready,
            }
        };

        let len = self.buf[4] as usize;
        let payload = &self.buf[FRAME_PREFIX_LEN..FRAME_PREFIX_LEN + len];
        Some(match ready {
            Ready::Telemetry(source) => Frame::Telemetry {
                source,
                body: &payload[1..],
            },
            Ready::BootupStatus => Frame::BootupStatus(payload),
            Ready::ErrorReport => Frame::ErrorReport(payload),
            Ready::LockAck => Frame::LockAck,
            Ready::UnlockAck => Frame::UnlockAck,
        })
    }

    fn step<S: ByteSource>(&mut self, src: &mut S) -> Step {
        match self.state {
            State::AwaitHeader { matched } => {
                let mut byte = [0u8; 1];
                if !src.receive_exact(&mut byte) {
                    return Step::Pending;
                }
                let byte = byte[0];

                if byte == self.sync[matched] {
                    if matched + 1 == self.sync.len() {
                        self.buf[..2].copy_from_slice(&self.sync);
                        self.state = State::AwaitCommand;
                    } else {
                        self.state = State::AwaitHeader {
                            matched: matched + 1,
                        };
                    }
                } else {
                    self.stats.resyncs += 1;
                    // A stray first sync byte may still open a frame
                    let matched = usize::from(byte == self.sync[0]);
                    self.state = State::AwaitHeader { matched };
                }
                Step::Progress
            }
            State::AwaitCommand => {
                if !src.receive_exact(&mut self.buf[2..3]) {
                    return Step::Pending;
                }
                self.state = State::AwaitVersion;
                Step::Progress
            }
            State::AwaitVersion => {
                if !src.receive_exact(&mut self.buf[3..4]) {
                    return Step::Pending;
                }
                if self.buf[3] != self.version {
                    self.stats.version_mismatches += 1;
                    debug!(
                        "Controller protocol version {} (expected {}), decoding anyway",
                        self.buf[3], self.version
                    );
                }
                self.state = State::AwaitPayloadLength;
                Step::Progress
            }
            State::AwaitPayloadLength => {
                if !src.receive_exact(&mut self.buf[4..5]) {
                    return Step::Pending;
                }
                let len = self.buf[4] as usize;
                if src.capacity().is_some_and(|cap| len + 2 > cap) {
                    self.stats.oversized += 1;
                    self.stats.resyncs += 1;
                    warn!(
                        "Dropping frame header: {} byte payload cannot fit the receive buffer",
                        len
                    );
                    self.reset();
                    return Step::Progress;
                }
                self.state = State::AwaitPayload { len };
                Step::Progress
            }
            State::AwaitPayload { len } => {
                let end = FRAME_PREFIX_LEN + len;
                if !src.receive_exact(&mut self.buf[FRAME_PREFIX_LEN..end + 2]) {
                    return Step::Pending;
                }
                self.reset();

                let expected = u16::from_le_bytes([self.buf[end], self.buf[end + 1]]);
                let actual = crc16(&self.buf[..end]);
                if expected != actual {
                    self.stats.crc_failures += 1;
                    warn!(
                        "Dropping frame: CRC {:#06x} != {:#06x} ({} byte payload)",
                        actual, expected, len
                    );
                    return Step::Progress;
                }

                match self.dispatch(len) {
                    Some(ready) => {
                        self.stats.frames_ok += 1;
                        Step::Ready(ready)
                    }
                    None => Step::Progress,
                }
            }
        }
    }

    fn dispatch(&mut self, len: usize) -> Option<Ready> {
        let code = self.buf[2];
        let Some(command) = Command::from_code(code) else {
            self.stats.unknown_commands += 1;
            warn!("Ignoring unknown controller command {:#04x}", code);
            return None;
        };

        match command {
            Command::Telemetry => {
                let tag = if len > 0 {
                    self.buf[FRAME_PREFIX_LEN]
                } else {
                    0
                };
                match Source::from_tag(tag) {
                    Some(source) => {
                        debug!("Telemetry frame from {:?}, {} bytes", source, len);
                        Some(Ready::Telemetry(source))
                    }
                    None => {
                        self.stats.unknown_sources += 1;
                        warn!("Ignoring telemetry with unknown source tag {:#04x}", tag);
                        None
                    }
                }
            }
            Command::BootupStatus => {
                self.stats.bootup_reports += 1;
                Some(Ready::BootupStatus)
            }
            Command::ErrorReport => {
                self.stats.error_reports += 1;
                Some(Ready::ErrorReport)
            }
            Command::LockAck => {
                self.stats.lock_acks += 1;
                Some(Ready::LockAck)
            }
            Command::UnlockAck => {
                self.stats.unlock_acks += 1;
                Some(Ready::UnlockAck)
            }
        }
    }
}
