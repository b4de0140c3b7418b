use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Router-level counters, shared between the receive thread and observers.
///
/// All counters are monotonic until [`reset`](RouterStats::reset) and use
/// relaxed ordering — they are diagnostics, not synchronization.
#[derive(Debug, Default)]
pub struct RouterStats {
    bytes_rx: AtomicU64,
    frames_ok: AtomicU32,
    frames_dropped: AtomicU32,
    resync_count: AtomicU32,
}

impl RouterStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_bytes(&self, n: usize) {
        self.bytes_rx.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_ok(&self) {
        self.frames_ok.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resync(&self) {
        self.resync_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Consistent-enough point-in-time copy of all counters.
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        RouterStatsSnapshot {
            bytes_rx: self.bytes_rx.load(Ordering::Relaxed),
            frames_ok: self.frames_ok.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            resync_count: self.resync_count.load(Ordering::Relaxed),
        }
    }

    /// Zero all counters.
    pub fn reset(&self) {
        self.bytes_rx.store(0, Ordering::Relaxed);
        self.frames_ok.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.resync_count.store(0, Ordering::Relaxed);
    }
}

/// Plain copy of the router counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouterStatsSnapshot {
    /// Total bytes read off the transport.
    pub bytes_rx: u64,
    /// Frames fully received, validated, and committed.
    pub frames_ok: u32,
    /// Frames rejected on any path.
    pub frames_dropped: u32,
    /// Times the parser (re-)entered header interpretation from `Sync`.
    pub resync_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_and_reset() {
        let stats = RouterStats::new();
        stats.record_bytes(100);
        stats.record_bytes(28);
        stats.record_ok();
        stats.record_dropped();
        stats.record_dropped();
        stats.record_resync();

        assert_eq!(
            stats.snapshot(),
            RouterStatsSnapshot {
                bytes_rx: 128,
                frames_ok: 1,
                frames_dropped: 2,
                resync_count: 1,
            }
        );

        stats.reset();
        assert_eq!(stats.snapshot(), RouterStatsSnapshot::default());
    }
}
