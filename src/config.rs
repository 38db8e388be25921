//! Engine configuration
//!
//! Board variants differ only in wire format and timing; both are captured
//! here as data. The config is stored as a postcard blob alongside the rest
//! of the device settings.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Protocol version spoken by the controller firmware (1.0).
pub const WORKING_PROTOCOL_VERSION: u8 = 16;

/// Default sync header of command-framed packets.
pub const DEFAULT_SYNC: [u8; 2] = [0xA5, 0x5A];

/// Max time a task waits for a sample window lock.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 1000;

/// Pause between ingestion passes when the link has nothing buffered.
pub const DEFAULT_IDLE_POLL_MS: u64 = 2;

/// Which of the two controller wire formats is spoken on the link.
///
/// Only one is active on a given link.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireVariant {
    /// `[sync][command][version][length][payload][crc16]`
    #[default]
    CommandFramed,
    /// `'D' _ 'S'|'U' _ [fixed body][crc8]`
    LegacyFixed,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub wire: WireVariant,
    pub sync: [u8; 2],
    pub protocol_version: u8,
    pub lock_timeout_ms: u64,
    pub idle_poll_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wire: WireVariant::default(),
            sync: DEFAULT_SYNC,
            protocol_version: WORKING_PROTOCOL_VERSION,
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            idle_poll_ms: DEFAULT_IDLE_POLL_MS,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config encoding failed")]
    Encode,
    #[error("Config blob is corrupt or truncated")]
    Decode,
    #[error("Lock timeout must be non-zero")]
    ZeroLockTimeout,
    #[error("Idle poll interval must be non-zero")]
    ZeroIdlePoll,
}

impl EngineConfig {
    /// Legacy boards: fixed-length packets with an 8-bit CRC.
    pub fn legacy() -> Self {
        Self {
            wire: WireVariant::LegacyFixed,
            ..Self::default()
        }
    }

    pub fn lock_timeout(&self) -> embassy_time::Duration {
        embassy_time::Duration::from_millis(self.lock_timeout_ms)
    }

    pub fn idle_poll(&self) -> embassy_time::Duration {
        embassy_time::Duration::from_millis(self.idle_poll_ms)
    }

    /// Serialize for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ConfigError> {
        postcard::to_allocvec(self).map_err(|e| {
            log::error!("Failed to encode engine config: {:?}", e);
            ConfigError::Encode
        })
    }

    /// Load a persisted config, rejecting blobs that would stall ingestion.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = postcard::from_bytes(bytes).map_err(|e| {
            log::warn!("Discarding unreadable engine config: {:?}", e);
            ConfigError::Decode
        })?;

        if config.lock_timeout_ms == 0 {
            return Err(ConfigError::ZeroLockTimeout);
        }
        if config.idle_poll_ms == 0 {
            return Err(ConfigError::ZeroIdlePoll);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_controller_firmware() {
        let config = EngineConfig::default();
        assert_eq!(config.wire, WireVariant::CommandFramed);
        assert_eq!(config.protocol_version, 16);
        assert_eq!(config.lock_timeout_ms, 1000);
    }

    #[test]
    fn test_persisted_config_is_restored() {
        let mut config = EngineConfig::legacy();
        config.sync = [0x01, 0x02];
        config.lock_timeout_ms = 250;

        let bytes = config.to_bytes().unwrap();
        let restored = EngineConfig::from_bytes(&bytes).unwrap();

        assert_eq!(restored, config, "Persisted config should load unchanged");
    }

    #[test]
    fn test_truncated_blob_is_rejected() {
        let bytes = EngineConfig::default().to_bytes().unwrap();
        let result = EngineConfig::from_bytes(&bytes[..bytes.len() - 1]);
        assert!(matches!(result, Err(ConfigError::Decode)));
    }

    #[test]
    fn test_zero_lock_timeout_is_rejected() {
        let mut config = EngineConfig::default();
        config.lock_timeout_ms = 0;
        let bytes = config.to_bytes().unwrap();
        assert!(matches!(
            EngineConfig::from_bytes(&bytes),
            Err(ConfigError::ZeroLockTimeout)
        ));
    }

    #[test]
    fn test_zero_idle_poll_is_rejected() {
        let mut config = EngineConfig::default();
        config.idle_poll_ms = 0;
        let bytes = config.to_bytes().unwrap();
        assert!(
            matches!(
                EngineConfig::from_bytes(&bytes),
                Err(ConfigError::ZeroIdlePoll)
            ),
            "An idle link must not spin the ingestion loop"
        );
    }
}
