//! Controller telemetry ingestion and aggregation engine
//!
//! This crate contains the platform-agnostic core of the skid IoT bridge:
//! it reconstructs framed binary reports arriving over the controller's
//! serial link, validates their checksums, decodes them into typed
//! engineering records, keeps a rolling window of samples per data source
//! and assembles statistically summarised, alert-annotated status
//! snapshots for the telemetry publisher.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on the
//! microcontroller target and on desktop hosts (for the simulator and tests).

#![no_std]

extern crate alloc;

pub mod config;
pub mod engine;
pub mod link;
pub mod protocol;
pub mod stats;
pub mod status;
pub mod storage;
pub mod telemetry;

pub use config::{EngineConfig, WireVariant};
pub use engine::{Ingestor, get_skid_status, get_unit_status, send_lock_status, send_unlock_status};
pub use status::{SkidStatus, UnitStatus};
pub use storage::SampleStore;
pub use telemetry::{SequenceState, SkidSample, UnitSample};
