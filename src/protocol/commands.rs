//! Outgoing lock/unlock requests.
//!
//! `'C' 0 'L' 0 <arg> crc8`, where `<arg>` is `'L'` to lock and `'U'` to
//! unlock. The controller answers with a lock/unlock acknowledgement frame.

use super::crc::crc8;

pub const COMMAND_PACKET_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockRequest {
    Lock,
    Unlock,
}

impl LockRequest {
    pub fn packet(self) -> [u8; COMMAND_PACKET_LEN] {
        let arg = match self {
            Self::Lock => b'L',
            Self::Unlock => b'U',
        };
        let mut packet = [b'C', 0, b'L', 0, arg, 0];
        packet[5] = crc8(&packet[..5]);
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_packet() {
        assert_eq!(LockRequest::Lock.packet(), [b'C', 0, b'L', 0, b'L', 0x88]);
    }

    #[test]
    fn test_unlock_packet() {
        assert_eq!(LockRequest::Unlock.packet(), [b'C', 0, b'L', 0, b'U', 0x34]);
    }
}
