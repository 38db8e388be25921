//! Controller link plumbing
//!
//! The UART driver lives with the board bring-up code. The engine only sees
//! it through [`ByteSource`] (bytes in) and [`CommandSink`] (bytes out), so
//! the same ingestion path runs on hardware, in the simulator and in tests.

use core::cell::RefCell;
use core::sync::atomic::{AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Deque;
use thiserror_no_std::Error;

/// Inbound side of the controller link.
pub trait ByteSource {
    /// Fill `buf` completely or not at all.
    ///
    /// Returns `false` when fewer than `buf.len()` bytes are available right
    /// now; nothing is consumed in that case, so a framing state machine can
    /// retry the same step on its next pass.
    fn receive_exact(&mut self, buf: &mut [u8]) -> bool;

    /// Largest read that can ever succeed, if the source is bounded.
    fn capacity(&self) -> Option<usize> {
        None
    }
}

/// Outbound side of the controller link.
pub trait CommandSink {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    #[error("Transmit path is busy")]
    Busy,
    #[error("Short write: {0} of {1} bytes sent")]
    ShortWrite(usize, usize),
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn receive_exact(&mut self, buf: &mut [u8]) -> bool {
        (**self).receive_exact(buf)
    }

    fn capacity(&self) -> Option<usize> {
        (**self).capacity()
    }
}

impl<T: CommandSink + ?Sized> CommandSink for &mut T {
    fn send(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        (**self).send(bytes)
    }
}

/// Bounded receive buffer shared between the UART interrupt and the
/// ingestion task.
///
/// Bytes that do not fit are dropped and counted; the framing layer
/// resynchronises on the next header.
pub struct RxQueue<const N: usize> {
    bytes: Mutex<CriticalSectionRawMutex, RefCell<Deque<u8, N>>>,
    overruns: AtomicU32,
}

impl<const N: usize> Default for RxQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RxQueue<N> {
    pub const fn new() -> Self {
        Self {
            bytes: Mutex::new(RefCell::new(Deque::new())),
            overruns: AtomicU32::new(0),
        }
    }

    /// Returns `false` if the byte was dropped.
    pub fn push(&self, byte: u8) -> bool {
        let stored = self
            .bytes
            .lock(|q| q.borrow_mut().push_back(byte).is_ok());
        if !stored {
            self.overruns.fetch_add(1, Ordering::Relaxed);
        }
        stored
    }

    /// Push a received chunk, returning how many bytes were stored.
    pub fn push_slice(&self, chunk: &[u8]) -> usize {
        let stored = self.bytes.lock(|q| {
            let mut q = q.borrow_mut();
            chunk.iter().take_while(|b| q.push_back(**b).is_ok()).count()
        });
        let dropped = chunk.len() - stored;
        if dropped > 0 {
            self.overruns.fetch_add(dropped as u32, Ordering::Relaxed);
            log::warn!("Rx queue full, dropped {} bytes", dropped);
        }
        stored
    }

    pub fn len(&self) -> usize {
        self.bytes.lock(|q| q.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    pub fn clear(&self) {
        self.bytes.lock(|q| q.borrow_mut().clear());
    }

    /// Consumer handle for the ingestion task.
    pub fn reader(&self) -> RxReader<'_, N> {
        RxReader { queue: self }
    }
}

pub struct RxReader<'a, const N: usize> {
    queue: &'a RxQueue<N>,
}

impl<const N: usize> ByteSource for RxReader<'_, N> {
    fn receive_exact(&mut self, buf: &mut [u8]) -> bool {
        self.queue.bytes.lock(|q| {
            let mut q = q.borrow_mut();
            if q.len() < buf.len() {
                return false;
            }
            for slot in buf.iter_mut() {
                // Length checked above
                *slot = q.pop_front().unwrap_or_default();
            }
            true
        })
    }

    fn capacity(&self) -> Option<usize> {
        Some(N)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_read_consumes_nothing() {
        let queue: RxQueue<8> = RxQueue::new();
        queue.push_slice(&[1, 2, 3]);

        let mut reader = queue.reader();
        let mut buf = [0u8; 4];
        assert!(!reader.receive_exact(&mut buf));
        assert_eq!(queue.len(), 3, "Short read must leave bytes in place");

        queue.push(4);
        assert!(reader.receive_exact(&mut buf));
        assert_eq!(buf, [1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overrun_is_counted() {
        let queue: RxQueue<4> = RxQueue::new();
        let stored = queue.push_slice(&[0; 6]);
        assert_eq!(stored, 4);
        assert_eq!(queue.overruns(), 2);
        assert!(!queue.push(0));
        assert_eq!(queue.overruns(), 3);
    }

    #[test]
    fn test_reader_reports_queue_capacity() {
        let queue: RxQueue<16> = RxQueue::new();
        let mut reader = queue.reader();
        assert_eq!(reader.capacity(), Some(16));
        assert_eq!((&mut reader).capacity(), Some(16));
    }

    #[test]
    fn test_zero_length_read_succeeds() {
        let queue: RxQueue<4> = RxQueue::new();
        let mut reader = queue.reader();
        assert!(reader.receive_exact(&mut []));
    }
}
