//! Ingestion task and the operations exposed to the telemetry publisher.

use embassy_futures::yield_now;
use embassy_time::{Duration, Timer};
use log::{debug, info, warn};

use crate::config::EngineConfig;
use crate::link::{ByteSource, CommandSink, LinkError};
use crate::protocol::commands::LockRequest;
use crate::protocol::{Frame, FrameReader, ReaderStats, Source};
use crate::status::{SkidStatus, UnitStatus};
use crate::storage::{SampleStore, StoreError, Tracked};
use crate::telemetry::{
    DecodeError, Decoder, SequenceState, SkidDecoder, SkidSample, UnitDecoder, UnitSample,
};

/// Outcome of one ingestion pass that completed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    Stored(Source),
    /// Verified but not stored: undecodable body or lock timeout.
    Dropped(Source),
    BootupStatus,
    ErrorReport,
    LockAck,
    UnlockAck,
}

enum Decoded {
    Skid(Result<SkidSample, DecodeError>),
    Unit(Result<UnitSample, DecodeError>),
}

/// Byte source → frame reader → decoder → sample store.
pub struct Ingestor {
    reader: FrameReader,
    skid: SkidDecoder,
    unit: UnitDecoder,
    idle_poll: Duration,
    decode_failures: u32,
    dropped_writes: u32,
}

impl Ingestor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            reader: FrameReader::new(config),
            skid: SkidDecoder::new(config.wire),
            unit: UnitDecoder::new(config.wire),
            idle_poll: config.idle_poll(),
            decode_failures: 0,
            dropped_writes: 0,
        }
    }

    pub fn reader_stats(&self) -> ReaderStats {
        self.reader.stats()
    }

    pub fn decode_failures(&self) -> u32 {
        self.decode_failures
    }

    pub fn dropped_writes(&self) -> u32 {
        self.dropped_writes
    }

    /// Consume whatever is buffered, stopping after the first complete frame.
    ///
    /// Returns `None` when the source ran dry before a frame completed.
    pub async fn poll_once<S: ByteSource>(
        &mut self,
        src: &mut S,
        store: &SampleStore,
    ) -> Option<Ingested> {
        let decoded = match self.reader.poll(src)? {
            Frame::Telemetry {
                source: Source::Skid,
                body,
            } => Decoded::Skid(self.skid.decode(body)),
            Frame::Telemetry {
                source: Source::Unit,
                body,
            } => Decoded::Unit(self.unit.decode(body)),
            Frame::BootupStatus(payload) => {
                info!("Controller boot status: {:?}", payload);
                return Some(Ingested::BootupStatus);
            }
            Frame::ErrorReport(payload) => {
                warn!("Controller error report: {:?}", payload);
                return Some(Ingested::ErrorReport);
            }
            Frame::LockAck => {
                info!("Controller acknowledged lock");
                return Some(Ingested::LockAck);
            }
            Frame::UnlockAck => {
                info!("Controller acknowledged unlock");
                return Some(Ingested::UnlockAck);
            }
        };

        Some(match decoded {
            Decoded::Skid(sample) => self.store(sample, store).await,
            Decoded::Unit(sample) => self.store(sample, store).await,
        })
    }

    async fn store<T: Tracked>(
        &mut self,
        sample: Result<T, DecodeError>,
        store: &SampleStore,
    ) -> Ingested {
        let sample = match sample {
            Ok(sample) => sample,
            Err(e) => {
                self.decode_failures += 1;
                warn!("Dropping {:?} report: {}", T::SOURCE, e);
                return Ingested::Dropped(T::SOURCE);
            }
        };

        match store.write(sample).await {
            Ok(()) => {
                debug!("Stored {:?} sample", T::SOURCE);
                Ingested::Stored(T::SOURCE)
            }
            Err(_) => {
                self.dropped_writes += 1;
                Ingested::Dropped(T::SOURCE)
            }
        }
    }

    /// Ingestion loop, runs for the lifetime of the device.
    pub async fn run<S: ByteSource>(&mut self, mut src: S, store: &SampleStore) -> ! {
        info!("Controller ingestion started ({:?})", self.reader.variant());
        loop {
            match self.poll_once(&mut src, store).await {
                Some(_) => yield_now().await,
                None => Timer::after(self.idle_poll).await,
            }
        }
    }
}

/// Status of the aggregator, with `send_alert` set on entry into Lock or Safe.
///
/// The caller keeps `last_skid_state` between calls.
pub async fn get_skid_status(
    store: &SampleStore,
    last_skid_state: SequenceState,
) -> Result<SkidStatus, StoreError> {
    let window = store.snapshot::<SkidSample>().await?;
    Ok(SkidStatus::assemble(&window, last_skid_state))
}

/// Status of the zone unit, see [`get_skid_status`].
pub async fn get_unit_status(
    store: &SampleStore,
    last_unit_state: SequenceState,
) -> Result<UnitStatus, StoreError> {
    let window = store.snapshot::<UnitSample>().await?;
    Ok(UnitStatus::assemble(&window, last_unit_state))
}

pub fn send_lock_status<K: CommandSink>(sink: &mut K) -> Result<(), LinkError> {
    send_request(sink, LockRequest::Lock)
}

pub fn send_unlock_status<K: CommandSink>(sink: &mut K) -> Result<(), LinkError> {
    send_request(sink, LockRequest::Unlock)
}

fn send_request<K: CommandSink>(sink: &mut K, request: LockRequest) -> Result<(), LinkError> {
    sink.send(&request.packet()).inspect_err(|e| {
        warn!("Failed to send {:?} request: {}", request, e);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::RxQueue;
    use crate::protocol::{Command, encode_frame};
    use alloc::vec::Vec;
    use embassy_futures::block_on;

    const SYNC: [u8; 2] = [0xA5, 0x5A];

    struct RecordingSink {
        sent: Vec<Vec<u8>>,
        fail: bool,
    }

    impl CommandSink for RecordingSink {
        fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
            if self.fail {
                return Err(LinkError::Busy);
            }
            self.sent.push(bytes.to_vec());
            Ok(())
        }
    }

    fn skid_payload(state: u8, o2: f64) -> Vec<u8> {
        let mut payload = Vec::from([b'S', 1, state, 0, 0, 0, 0, 0, 0, 0, 0]);
        for value in [o2, 1.0, 0.5, 2.0, 1.0, 25.0, 40.0] {
            payload.extend_from_slice(&((value * 65536.0) as i32).to_be_bytes());
        }
        payload
    }

    #[test]
    fn test_frames_flow_into_store() {
        let store = SampleStore::new(&EngineConfig::default());
        let queue: RxQueue<512> = RxQueue::new();
        let mut src = queue.reader();
        let mut ingestor = Ingestor::new(&EngineConfig::default());

        queue.push_slice(&encode_frame(SYNC, Command::Telemetry, 16, &skid_payload(6, 20.0)).unwrap());
        queue.push_slice(&encode_frame(SYNC, Command::UnlockAck, 16, &[]).unwrap());

        block_on(async {
            assert_eq!(
                ingestor.poll_once(&mut src, &store).await,
                Some(Ingested::Stored(Source::Skid))
            );
            assert_eq!(
                ingestor.poll_once(&mut src, &store).await,
                Some(Ingested::UnlockAck)
            );
            assert_eq!(ingestor.poll_once(&mut src, &store).await, None);

            let status = get_skid_status(&store, SequenceState::Adsorb).await.unwrap();
            assert_eq!(status.state, SequenceState::Lock);
            assert!(status.send_alert);
            assert_eq!(status.o2.avg, 20.0);
        });
        assert_eq!(ingestor.reader_stats().unlock_acks, 1);
    }

    #[test]
    fn test_short_body_is_dropped() {
        let store = SampleStore::new(&EngineConfig::default());
        let queue: RxQueue<64> = RxQueue::new();
        let mut ingestor = Ingestor::new(&EngineConfig::default());
        queue.push_slice(&encode_frame(SYNC, Command::Telemetry, 16, &[b'U', 1, 2]).unwrap());

        block_on(async {
            assert_eq!(
                ingestor.poll_once(&mut queue.reader(), &store).await,
                Some(Ingested::Dropped(Source::Unit))
            );
            let status = get_unit_status(&store, SequenceState::Init).await.unwrap();
            assert_eq!(status.samples_seen, 0);
        });
        assert_eq!(ingestor.decode_failures(), 1);
    }

    #[test]
    fn test_lock_and_unlock_packets_are_sent() {
        let mut sink = RecordingSink {
            sent: Vec::new(),
            fail: false,
        };
        send_lock_status(&mut sink).unwrap();
        send_unlock_status(&mut sink).unwrap();
        assert_eq!(sink.sent[0], [b'C', 0, b'L', 0, b'L', 0x88]);
        assert_eq!(sink.sent[1], [b'C', 0, b'L', 0, b'U', 0x34]);
    }

    #[test]
    fn test_send_failure_is_reported() {
        let mut sink = RecordingSink {
            sent: Vec::new(),
            fail: true,
        };
        assert_eq!(send_lock_status(&mut sink), Err(LinkError::Busy));
    }
}
