use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use framelink_router::{DropReason, Lease, Receiver};
use framelink_wire::{magic, FrameHeader};
use tracing::debug;

use crate::error::{Result, SinkError};

const MIN_MSG_BYTES: usize = 16;
const MIN_QUEUE_DEPTH: usize = 2;

/// Message sink configuration.
#[derive(Debug, Clone)]
pub struct MessageConfig {
    /// Magic this sink registers under.
    pub magic: u32,
    /// Capacity of each pool slot.
    pub max_msg_bytes: usize,
    /// Slot count and FIFO depth.
    pub queue_depth: usize,
    /// Demand a matching, non-zero CRC-32 on every frame.
    pub require_checksum: bool,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            magic: magic::MESSAGE,
            max_msg_bytes: 1024,
            queue_depth: 8,
            require_checksum: false,
        }
    }
}

/// Per-sink counters, same split as the image sink: `frames_drop` is the
/// sink's own policy refusals, `frames_bad` is router-invoked rejects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageStats {
    /// Messages queued for the consumer.
    pub frames_ok: u32,
    /// Frames refused because the pool was exhausted.
    pub frames_drop: u32,
    /// Frames the router rejected after matching this sink.
    pub frames_bad: u32,
}

struct Queued {
    buf: Box<[u8]>,
    len: usize,
    seq: u32,
}

struct Inner {
    /// Slot buffers not currently leased or queued.
    free: Vec<Box<[u8]>>,
    queue: VecDeque<Queued>,
    stats: MessageStats,
}

/// Pooled-slot FIFO receiver for small, high-rate payloads.
///
/// `queue_depth` fixed-size buffers cycle between a free pool, a lease to
/// the router, and the ready queue. A slot returns to the pool only when
/// its message is popped or its frame rejected, so a queued message can
/// never be overwritten by a producer burst — the burst is refused at
/// `acquire` instead (drop-new; messages have no drop-old mode).
pub struct MessageSink {
    config: MessageConfig,
    inner: Mutex<Inner>,
}

impl MessageSink {
    /// Allocate the whole slot pool up front.
    pub fn new(config: MessageConfig) -> Result<Self> {
        if config.max_msg_bytes < MIN_MSG_BYTES {
            return Err(SinkError::MessageSlotTooSmall {
                got: config.max_msg_bytes,
                min: MIN_MSG_BYTES,
            });
        }
        if config.queue_depth < MIN_QUEUE_DEPTH {
            return Err(SinkError::QueueTooShallow {
                got: config.queue_depth,
                min: MIN_QUEUE_DEPTH,
            });
        }

        let queue_depth = config.queue_depth;
        let free = (0..config.queue_depth)
            .map(|_| vec![0u8; config.max_msg_bytes].into_boxed_slice())
            .collect();
        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                free,
                queue: VecDeque::with_capacity(queue_depth),
                stats: MessageStats::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Dequeue the oldest message into `dst`, truncating to `dst`'s
    /// capacity. Non-blocking; `None` when the queue is empty or `dst`
    /// cannot hold a single byte. Returns (copied length, sequence).
    pub fn pop(&self, dst: &mut [u8]) -> Option<(usize, u32)> {
        if dst.is_empty() {
            return None;
        }
        let mut inner = self.lock();
        let msg = inner.queue.pop_front()?;
        let n = msg.len.min(dst.len());
        dst[..n].copy_from_slice(&msg.buf[..n]);
        inner.free.push(msg.buf);
        Some((n, msg.seq))
    }

    /// Messages currently queued.
    pub fn depth(&self) -> usize {
        self.lock().queue.len()
    }

    /// Counters snapshot.
    pub fn stats(&self) -> MessageStats {
        self.lock().stats
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        self.lock().stats = MessageStats::default();
    }
}

impl Receiver for MessageSink {
    fn magic(&self) -> u32 {
        self.config.magic
    }

    fn max_len(&self) -> usize {
        self.config.max_msg_bytes
    }

    fn require_checksum(&self) -> bool {
        self.config.require_checksum
    }

    fn acquire(&self, _header: &FrameHeader) -> Option<Lease> {
        let mut inner = self.lock();
        let Some(buf) = inner.free.pop() else {
            inner.stats.frames_drop += 1;
            return None;
        };
        Some(Lease::new(buf, 0))
    }

    fn commit(&self, header: &FrameHeader, lease: Lease, len: usize) {
        let mut inner = self.lock();
        if inner.queue.len() >= self.config.queue_depth {
            // Unreachable while pool size == queue depth, but a full queue
            // at commit time is a counted drop, not a silent accept.
            inner.stats.frames_drop += 1;
            inner.free.push(lease.into_buf());
            debug!(seq = header.seq, "message queue full at commit");
            return;
        }
        inner.queue.push_back(Queued {
            buf: lease.into_buf(),
            len,
            seq: header.seq,
        });
        inner.stats.frames_ok += 1;
    }

    fn reject(&self, header: &FrameHeader, lease: Option<Lease>, reason: DropReason) {
        let mut inner = self.lock();
        inner.stats.frames_bad += 1;
        debug!(seq = header.seq, ?reason, "message frame rejected");
        if let Some(lease) = lease {
            inner.free.push(lease.into_buf());
        }
    }
}

impl std::fmt::Debug for MessageSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MessageSink")
            .field("magic", &self.config.magic)
            .field("queued", &inner.queue.len())
            .field("free", &inner.free.len())
            .field("stats", &inner.stats)
            .finish()
    }
}
