mod window;

pub use window::SampleWindow;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embassy_time::{Duration, with_timeout};
use log::warn;
use thiserror_no_std::Error;

use crate::config::EngineConfig;
use crate::protocol::Source;
use crate::telemetry::{SkidSample, UnitSample};

/// Samples retained per source (statistical population of a snapshot)
pub const WINDOW_LEN: usize = 30;

type Window<T> = Mutex<CriticalSectionRawMutex, SampleWindow<T, WINDOW_LEN>>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("Timed out after {waited_ms} ms waiting for the {origin:?} window")]
    LockTimeout { origin: Source, waited_ms: u64 },
}

/// A sample type with its own window in the [`SampleStore`].
pub trait Tracked: Copy + Default + Send + 'static {
    const SOURCE: Source;

    fn window(store: &SampleStore) -> &Window<Self>;
}

impl Tracked for SkidSample {
    const SOURCE: Source = Source::Skid;

    fn window(store: &SampleStore) -> &Window<Self> {
        &store.skid
    }
}

impl Tracked for UnitSample {
    const SOURCE: Source = Source::Unit;

    fn window(store: &SampleStore) -> &Window<Self> {
        &store.unit
    }
}

/// Rolling sample windows, one per controller source
///
/// The ingestion task is the only writer and the status assembler the only
/// reader. Each window has its own lock and no operation ever holds both, so
/// the two sources never contend with each other.
///
/// Every lock acquisition is bounded by the configured timeout. A write that
/// cannot get its window in time is dropped rather than stalling ingestion.
///
/// ## Usage
///
/// ```rust,ignore
/// let store = SampleStore::new(&EngineConfig::default());
///
/// // Ingestion task
/// store.write(sample).await?;
///
/// // Status task
/// let window = store.snapshot::<SkidSample>().await?;
/// let latest = window.latest();
/// ```
pub struct SampleStore {
    skid: Window<SkidSample>,
    unit: Window<UnitSample>,
    lock_timeout: Duration,
}

impl SampleStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self::with_lock_timeout(config.lock_timeout())
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            skid: Mutex::new(SampleWindow::new()),
            unit: Mutex::new(SampleWindow::new()),
            lock_timeout,
        }
    }

    async fn lock<T: Tracked>(
        &self,
    ) -> Result<MutexGuard<'_, CriticalSectionRawMutex, SampleWindow<T, WINDOW_LEN>>, StoreError>
    {
        with_timeout(self.lock_timeout, T::window(self).lock())
            .await
            .map_err(|_| StoreError::LockTimeout {
                origin: T::SOURCE,
                waited_ms: self.lock_timeout.as_millis(),
            })
    }

    /// Store a sample at the cursor slot and advance the cursor.
    pub async fn write<T: Tracked>(&self, sample: T) -> Result<(), StoreError> {
        match self.lock::<T>().await {
            Ok(mut window) => {
                window.push(sample);
                Ok(())
            }
            Err(e) => {
                warn!("Dropping {:?} sample: {}", T::SOURCE, e);
                Err(e)
            }
        }
    }

    /// Copy a source's window out from under its lock.
    ///
    /// The copy carries the latest index, so the caller can read the newest
    /// sample and run statistics without holding the lock.
    pub async fn snapshot<T: Tracked>(&self) -> Result<SampleWindow<T, WINDOW_LEN>, StoreError> {
        let window = self.lock::<T>().await?;
        Ok(window.clone())
    }

    pub async fn samples_seen<T: Tracked>(&self) -> Result<u32, StoreError> {
        Ok(self.lock::<T>().await?.samples_seen())
    }
}
