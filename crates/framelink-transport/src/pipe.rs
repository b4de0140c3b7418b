use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::Transport;

/// Default buffered capacity of a [`pipe`], in bytes.
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

struct Shared {
    buf: Mutex<VecDeque<u8>>,
    capacity: usize,
    receiver_alive: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, VecDeque<u8>> {
        self.buf.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Create an in-process byte pipe with a bounded buffer.
///
/// The sender side appends bytes; the receiver side implements
/// [`Transport`] and is handed to a router. Useful for tests and for the
/// demo CLI, where a feeder thread plays the role of the external device.
pub fn pipe(capacity: usize) -> (PipeSender, PipeReceiver) {
    let capacity = capacity.max(1);
    let shared = Arc::new(Shared {
        buf: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_PIPE_CAPACITY))),
        capacity,
        receiver_alive: AtomicBool::new(true),
    });
    (
        PipeSender {
            shared: Arc::clone(&shared),
        },
        PipeReceiver { shared },
    )
}

/// Feeding end of a [`pipe`].
pub struct PipeSender {
    shared: Arc<Shared>,
}

impl PipeSender {
    /// Append as many of `data`'s bytes as currently fit; returns the count accepted.
    ///
    /// Errors once the receiving end has been dropped.
    pub fn send(&self, data: &[u8]) -> Result<usize> {
        if !self.shared.receiver_alive.load(Ordering::Acquire) {
            return Err(TransportError::Disconnected);
        }
        let mut buf = self.shared.lock();
        let room = self.shared.capacity.saturating_sub(buf.len());
        let n = room.min(data.len());
        buf.extend(&data[..n]);
        Ok(n)
    }

    /// Append all of `data`, spinning briefly whenever the pipe is full.
    pub fn send_all(&self, data: &[u8]) -> Result<()> {
        let mut offset = 0;
        while offset < data.len() {
            let n = self.send(&data[offset..])?;
            offset += n;
            if n == 0 {
                std::thread::sleep(std::time::Duration::from_micros(200));
            }
        }
        Ok(())
    }

    /// Bytes currently buffered and not yet drained by the receiver.
    pub fn pending(&self) -> usize {
        self.shared.lock().len()
    }
}

impl std::fmt::Debug for PipeSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeSender")
            .field("pending", &self.pending())
            .finish()
    }
}

/// Draining end of a [`pipe`]; implements [`Transport`].
pub struct PipeReceiver {
    shared: Arc<Shared>,
}

impl Transport for PipeReceiver {
    fn available(&mut self) -> usize {
        self.shared.lock().len()
    }

    fn read(&mut self, dst: &mut [u8]) -> usize {
        let mut buf = self.shared.lock();
        let n = buf.len().min(dst.len());
        for (slot, byte) in dst[..n].iter_mut().zip(buf.drain(..n)) {
            *slot = byte;
        }
        n
    }
}

impl Drop for PipeReceiver {
    fn drop(&mut self) {
        self.shared.receiver_alive.store(false, Ordering::Release);
        debug!("pipe receiver dropped");
    }
}

impl std::fmt::Debug for PipeReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipeReceiver")
            .field("buffered", &self.shared.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_then_read_preserves_bytes() {
        let (tx, mut rx) = pipe(64);
        tx.send(b"hello pipe").unwrap();

        assert_eq!(rx.available(), 10);
        let mut dst = [0u8; 16];
        let n = rx.read(&mut dst);
        assert_eq!(&dst[..n], b"hello pipe");
        assert_eq!(rx.available(), 0);
    }

    #[test]
    fn read_is_bounded_by_destination() {
        let (tx, mut rx) = pipe(64);
        tx.send(b"abcdef").unwrap();

        let mut dst = [0u8; 4];
        assert_eq!(rx.read(&mut dst), 4);
        assert_eq!(&dst, b"abcd");
        assert_eq!(rx.read(&mut dst), 2);
        assert_eq!(&dst[..2], b"ef");
        assert_eq!(rx.read(&mut dst), 0);
    }

    #[test]
    fn send_respects_capacity() {
        let (tx, mut rx) = pipe(4);
        assert_eq!(tx.send(b"abcdef").unwrap(), 4);
        assert_eq!(tx.send(b"xy").unwrap(), 0);

        let mut dst = [0u8; 2];
        rx.read(&mut dst);
        assert_eq!(tx.send(b"xy").unwrap(), 2);
    }

    #[test]
    fn send_after_receiver_drop_errors() {
        let (tx, rx) = pipe(16);
        drop(rx);
        assert!(matches!(tx.send(b"x"), Err(TransportError::Disconnected)));
    }

    #[test]
    fn send_all_spins_until_drained() {
        let (tx, mut rx) = pipe(8);
        let payload: Vec<u8> = (0u8..64).collect();

        let drained = std::thread::spawn(move || {
            let mut out = Vec::new();
            let mut dst = [0u8; 8];
            while out.len() < 64 {
                let n = rx.read(&mut dst);
                out.extend_from_slice(&dst[..n]);
                if n == 0 {
                    std::thread::sleep(std::time::Duration::from_micros(100));
                }
            }
            out
        });

        tx.send_all(&payload).unwrap();
        assert_eq!(drained.join().unwrap(), payload);
    }

    #[test]
    fn cross_thread_byte_order_is_preserved() {
        let (tx, mut rx) = pipe(1024);
        let writer = std::thread::spawn(move || {
            for chunk in (0u8..=255).collect::<Vec<_>>().chunks(7) {
                tx.send_all(chunk).unwrap();
            }
        });

        let mut out = Vec::new();
        let mut dst = [0u8; 11];
        while out.len() < 256 {
            let n = rx.read(&mut dst);
            out.extend_from_slice(&dst[..n]);
        }
        writer.join().unwrap();

        assert_eq!(out, (0u8..=255).collect::<Vec<_>>());
    }
}
