use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use framelink_router::{DropReason, Lease, Receiver};
use framelink_wire::{magic, FrameHeader};
use tracing::debug;

use crate::error::{Result, SinkError};

const SLOT_COUNT: usize = 2;
const MIN_IMAGE_BYTES: usize = 1024;

/// What to do when a new frame arrives and both slots are occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropPolicy {
    /// Reject the incoming frame; keep what is already buffered.
    DropNew,
    /// Evict a ready-but-unread frame to make room for the newer one.
    DropOld,
}

/// Image sink configuration.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Magic this sink registers under.
    pub magic: u32,
    /// Capacity of each of the two slot buffers.
    pub max_image_bytes: usize,
    /// Demand a matching, non-zero CRC-32 on every frame.
    pub require_checksum: bool,
    /// Contention policy when both slots are occupied.
    pub drop_policy: DropPolicy,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            magic: magic::IMAGE,
            max_image_bytes: 128 * 1024,
            require_checksum: false,
            drop_policy: DropPolicy::DropOld,
        }
    }
}

/// Per-sink counters. `frames_drop` counts policy rejections decided
/// inside `acquire`; `frames_bad` counts router-invoked rejects. One
/// policy rejection shows up in both — they answer different questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageStats {
    /// Frames committed and made available to the consumer.
    pub frames_ok: u32,
    /// Frames refused (or evicted) by the drop policy.
    pub frames_drop: u32,
    /// Frames the router rejected after matching this sink.
    pub frames_bad: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Writing,
    Ready,
    Reading,
}

struct Slot {
    state: SlotState,
    /// Present in Free/Ready; out on loan while Writing (to the router)
    /// or Reading (to a consumer guard).
    buf: Option<Box<[u8]>>,
    len: usize,
    seq: u32,
}

impl Slot {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            state: SlotState::Free,
            buf: Some(vec![0u8; capacity].into_boxed_slice()),
            len: 0,
            seq: 0,
        }
    }
}

struct Inner {
    slots: [Slot; SLOT_COUNT],
    write_idx: usize,
    stats: ImageStats,
}

/// Zero-copy, latest-wins receiver for large, low-rate payloads.
///
/// Two fixed-size buffers alternate through Free → Writing → Ready →
/// Reading → Free. The router writes into at most one slot at a time; a
/// consumer pins at most one slot per outstanding [`ReadyImage`] guard.
/// Frames committed while the consumer is still reading are evicted or
/// refused per [`DropPolicy`] — stale data is never resurrected.
pub struct ImageSink {
    config: ImageConfig,
    inner: Mutex<Inner>,
}

impl ImageSink {
    /// Allocate both slot buffers up front.
    pub fn new(config: ImageConfig) -> Result<Self> {
        if config.max_image_bytes < MIN_IMAGE_BYTES {
            return Err(SinkError::ImageBufferTooSmall {
                got: config.max_image_bytes,
                min: MIN_IMAGE_BYTES,
            });
        }
        let capacity = config.max_image_bytes;
        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                slots: [Slot::with_capacity(capacity), Slot::with_capacity(capacity)],
                write_idx: 0,
                stats: ImageStats::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Borrow the most recent ready frame, pinning its slot until the
    /// returned guard is dropped or released. Non-blocking; `None` when
    /// nothing is ready.
    pub fn get_ready(self: &Arc<Self>) -> Option<ReadyImage> {
        let mut inner = self.lock();
        let idx = inner
            .slots
            .iter()
            .position(|slot| slot.state == SlotState::Ready)?;

        let slot = &mut inner.slots[idx];
        let Some(buf) = slot.buf.take() else {
            return None;
        };
        slot.state = SlotState::Reading;
        Some(ReadyImage {
            sink: Arc::clone(self),
            buf: Some(buf),
            len: slot.len,
            seq: slot.seq,
            token: idx,
        })
    }

    /// Counters snapshot.
    pub fn stats(&self) -> ImageStats {
        self.lock().stats
    }

    /// Zero the counters.
    pub fn reset_stats(&self) {
        self.lock().stats = ImageStats::default();
    }

    fn return_slot(&self, token: usize, buf: Box<[u8]>) {
        let mut inner = self.lock();
        let Some(slot) = inner.slots.get_mut(token) else {
            return;
        };
        slot.buf = Some(buf);
        slot.state = SlotState::Free;
        slot.len = 0;
    }
}

impl Receiver for ImageSink {
    fn magic(&self) -> u32 {
        self.config.magic
    }

    fn max_len(&self) -> usize {
        self.config.max_image_bytes
    }

    fn require_checksum(&self) -> bool {
        self.config.require_checksum
    }

    fn acquire(&self, _header: &FrameHeader) -> Option<Lease> {
        let mut inner = self.lock();

        let mut wi = inner.write_idx;
        if inner.slots[wi].state != SlotState::Free {
            let alt = wi ^ 1;
            if inner.slots[alt].state == SlotState::Free {
                wi = alt;
            }
        }

        if inner.slots[wi].state != SlotState::Free {
            match self.config.drop_policy {
                DropPolicy::DropOld => {
                    // Evict a ready slot, slot 0 preferred; a slot pinned
                    // Reading is untouchable.
                    let evict = inner
                        .slots
                        .iter()
                        .position(|slot| slot.state == SlotState::Ready);
                    match evict {
                        Some(idx) => {
                            let slot = &mut inner.slots[idx];
                            slot.state = SlotState::Free;
                            slot.len = 0;
                            inner.stats.frames_drop += 1;
                            debug!(slot = idx, "evicted unread image frame");
                            wi = idx;
                        }
                        None => {
                            inner.stats.frames_drop += 1;
                            return None;
                        }
                    }
                }
                DropPolicy::DropNew => {
                    inner.stats.frames_drop += 1;
                    return None;
                }
            }
        }

        inner.write_idx = wi;
        let slot = &mut inner.slots[wi];
        let buf = slot.buf.take()?;
        slot.state = SlotState::Writing;
        Some(Lease::new(buf, wi))
    }

    fn commit(&self, header: &FrameHeader, lease: Lease, len: usize) {
        let mut inner = self.lock();
        let token = lease.token();
        let Some(slot) = inner.slots.get_mut(token) else {
            return;
        };
        slot.buf = Some(lease.into_buf());
        slot.state = SlotState::Ready;
        slot.len = len;
        slot.seq = header.seq;
        inner.stats.frames_ok += 1;
        inner.write_idx = token ^ 1;
    }

    fn reject(&self, header: &FrameHeader, lease: Option<Lease>, reason: DropReason) {
        let mut inner = self.lock();
        inner.stats.frames_bad += 1;
        debug!(seq = header.seq, ?reason, "image frame rejected");
        if let Some(lease) = lease {
            let token = lease.token();
            if let Some(slot) = inner.slots.get_mut(token) {
                slot.buf = Some(lease.into_buf());
                slot.state = SlotState::Free;
                slot.len = 0;
            }
        }
    }
}

impl std::fmt::Debug for ImageSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ImageSink")
            .field("magic", &self.config.magic)
            .field("write_idx", &inner.write_idx)
            .field("stats", &inner.stats)
            .finish()
    }
}

/// Exclusive read access to one committed image frame.
///
/// The guard owns the slot's buffer while the slot is in Reading; dropping
/// it (or calling [`release`](ReadyImage::release)) hands the buffer back
/// and frees the slot. Holding the guard pins exactly one slot, so a
/// second `get_ready` call can only surface the other slot or nothing.
pub struct ReadyImage {
    sink: Arc<ImageSink>,
    buf: Option<Box<[u8]>>,
    len: usize,
    seq: u32,
    token: usize,
}

impl ReadyImage {
    /// The frame's payload bytes.
    pub fn payload(&self) -> &[u8] {
        match &self.buf {
            Some(buf) => &buf[..self.len],
            None => &[],
        }
    }

    /// Sender-assigned sequence number of this frame.
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Index of the slot this guard pins.
    pub fn token(&self) -> usize {
        self.token
    }

    /// Return the buffer and free the slot.
    pub fn release(self) {}
}

impl std::ops::Deref for ReadyImage {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.payload()
    }
}

impl Drop for ReadyImage {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.sink.return_slot(self.token, buf);
        }
    }
}

impl std::fmt::Debug for ReadyImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadyImage")
            .field("len", &self.len)
            .field("seq", &self.seq)
            .field("token", &self.token)
            .finish()
    }
}
