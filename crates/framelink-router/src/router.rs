use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use framelink_transport::Transport;
use framelink_wire::magic::magic_name;
use framelink_wire::{crc, FrameHeader, HEADER_SIZE};
use tracing::{debug, trace};

use crate::error::Result;
use crate::receiver::{DropReason, Lease, Receiver};
use crate::registry::Registry;
use crate::stats::{RouterStats, RouterStatsSnapshot};

/// Smallest scratch read the router will configure.
pub const MIN_READ_CHUNK: usize = 512;
/// Largest scratch read the router will configure.
pub const MAX_READ_CHUNK: usize = 16 * 1024;

/// Router tuning knobs.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Bytes read from the transport per iteration, clamped to
    /// [`MIN_READ_CHUNK`]..=[`MAX_READ_CHUNK`].
    pub read_chunk: usize,
    /// Fixed capacity of the receiver registry.
    pub max_receivers: usize,
    /// Sleep between polls when the transport has nothing available.
    pub poll_interval: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            read_chunk: 8 * 1024,
            max_receivers: 4,
            poll_interval: Duration::from_millis(1),
        }
    }
}

enum ParseState {
    /// No partial frame in progress; the next byte starts a header.
    Sync,
    /// Header bytes accumulating.
    Header { raw: [u8; HEADER_SIZE], got: usize },
    /// Payload bytes accumulating into the receiver's leased buffer.
    Payload {
        header: FrameHeader,
        receiver: Arc<dyn Receiver>,
        lease: Lease,
        got: usize,
    },
}

/// The frame router: owns one transport, parses its byte stream into
/// frames, and dispatches validated payloads to registered receivers.
///
/// Parser state survives arbitrary read fragmentation — a header or
/// payload split across any number of reads produces the same outcome as
/// one bulk read. All failures are absorbed into counters and receiver
/// `reject` callbacks; the router itself never errors once built.
pub struct Router<T> {
    transport: T,
    registry: Registry,
    stats: Arc<RouterStats>,
    scratch: Box<[u8]>,
    state: ParseState,
    poll_interval: Duration,
    on_activity: Option<Box<dyn FnMut(usize) + Send>>,
}

impl<T: Transport> Router<T> {
    /// Build a router over `transport`. The registry starts empty.
    pub fn new(transport: T, config: RouterConfig) -> Self {
        let chunk = config.read_chunk.clamp(MIN_READ_CHUNK, MAX_READ_CHUNK);
        Self {
            transport,
            registry: Registry::new(config.max_receivers),
            stats: Arc::new(RouterStats::new()),
            scratch: vec![0u8; chunk].into_boxed_slice(),
            state: ParseState::Sync,
            poll_interval: config.poll_interval,
            on_activity: None,
        }
    }

    /// Register a receiver under its magic; fails once the registry is full.
    pub fn register(&mut self, receiver: Arc<dyn Receiver>) -> Result<()> {
        self.registry.register(receiver)
    }

    /// Install or clear the fallback receiver for unmatched magics.
    pub fn set_default(&mut self, receiver: Option<Arc<dyn Receiver>>) {
        self.registry.set_default(receiver);
    }

    /// Hook fired with the byte count after every successful transport
    /// read, for idle-detection or power management by external code.
    pub fn set_activity_hook(&mut self, hook: impl FnMut(usize) + Send + 'static) {
        self.on_activity = Some(Box::new(hook));
    }

    /// Shared handle to the router counters.
    pub fn stats(&self) -> Arc<RouterStats> {
        Arc::clone(&self.stats)
    }

    /// Point-in-time copy of the router counters.
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// One poll iteration: read up to one chunk and advance the parser.
    ///
    /// Returns the number of bytes consumed; zero means the transport had
    /// nothing and the caller should yield before retrying.
    pub fn service(&mut self) -> usize {
        let avail = self.transport.available();
        if avail == 0 {
            return 0;
        }

        let mut scratch = std::mem::take(&mut self.scratch);
        let want = avail.min(scratch.len());
        let n = self.transport.read(&mut scratch[..want]);
        if n > 0 {
            self.stats.record_bytes(n);
            if let Some(hook) = self.on_activity.as_mut() {
                hook(n);
            }
            self.feed(&scratch[..n]);
        }
        self.scratch = scratch;
        n
    }

    /// Poll the transport until `running` clears, yielding briefly
    /// whenever no bytes are available.
    pub fn run(&mut self, running: &AtomicBool) {
        while running.load(Ordering::SeqCst) {
            if self.service() == 0 {
                std::thread::sleep(self.poll_interval);
            }
        }
    }

    /// Move the router onto a dedicated receive thread.
    ///
    /// The returned handle shares the router's counters; dropping it (or
    /// calling [`RouterHandle::shutdown`]) stops the loop and joins.
    pub fn spawn(self) -> Result<RouterHandle>
    where
        T: 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::clone(&self.stats);
        let flag = Arc::clone(&running);
        let thread = std::thread::Builder::new()
            .name("framelink-rx".into())
            .spawn(move || {
                let mut router = self;
                router.run(&flag);
            })?;
        Ok(RouterHandle {
            running,
            stats,
            thread: Some(thread),
        })
    }

    /// Walk one read chunk through the parser states.
    fn feed(&mut self, chunk: &[u8]) {
        let mut off = 0;
        while off < chunk.len() {
            // Entering Sync with bytes pending immediately starts a header
            // at the current stream offset; there is no magic scan.
            if matches!(self.state, ParseState::Sync) {
                self.stats.record_resync();
                self.state = ParseState::Header {
                    raw: [0u8; HEADER_SIZE],
                    got: 0,
                };
            }

            match std::mem::replace(&mut self.state, ParseState::Sync) {
                ParseState::Sync => {}
                ParseState::Header { mut raw, mut got } => {
                    let take = (HEADER_SIZE - got).min(chunk.len() - off);
                    raw[got..got + take].copy_from_slice(&chunk[off..off + take]);
                    got += take;
                    off += take;
                    self.state = if got == HEADER_SIZE {
                        self.begin_payload(FrameHeader::parse(&raw))
                    } else {
                        ParseState::Header { raw, got }
                    };
                }
                ParseState::Payload {
                    header,
                    receiver,
                    mut lease,
                    mut got,
                } => {
                    let len = header.len as usize;
                    let take = (len - got).min(chunk.len() - off);
                    lease.as_mut_slice()[got..got + take]
                        .copy_from_slice(&chunk[off..off + take]);
                    got += take;
                    off += take;
                    if got == len {
                        self.finish_frame(&header, receiver, lease);
                    } else {
                        self.state = ParseState::Payload {
                            header,
                            receiver,
                            lease,
                            got,
                        };
                    }
                }
            }
        }
    }

    /// Validate a completed header, bind its receiver, and acquire a buffer.
    fn begin_payload(&mut self, header: FrameHeader) -> ParseState {
        let receiver = match self.registry.lookup(header.magic) {
            Some(receiver) => Arc::clone(receiver),
            None => {
                self.stats.record_dropped();
                debug!(
                    magic = magic_name(header.magic),
                    seq = header.seq,
                    "frame dropped: no receiver"
                );
                return ParseState::Sync;
            }
        };

        let len = header.len as usize;
        if len == 0 || len > receiver.max_len() {
            self.stats.record_dropped();
            debug!(
                magic = magic_name(header.magic),
                len,
                max = receiver.max_len(),
                "frame dropped: bad length"
            );
            receiver.reject(&header, None, DropReason::BadLength);
            return ParseState::Sync;
        }

        match receiver.acquire(&header) {
            Some(lease) if lease.capacity() >= len => ParseState::Payload {
                header,
                receiver,
                lease,
                got: 0,
            },
            Some(lease) => {
                self.stats.record_dropped();
                debug!(
                    magic = magic_name(header.magic),
                    len,
                    capacity = lease.capacity(),
                    "frame dropped: leased buffer too small"
                );
                receiver.reject(&header, Some(lease), DropReason::NoBuffer);
                ParseState::Sync
            }
            None => {
                self.stats.record_dropped();
                debug!(
                    magic = magic_name(header.magic),
                    seq = header.seq,
                    "frame dropped: no buffer"
                );
                receiver.reject(&header, None, DropReason::NoBuffer);
                ParseState::Sync
            }
        }
    }

    /// Checksum-validate a fully copied payload and commit or reject it.
    fn finish_frame(&mut self, header: &FrameHeader, receiver: Arc<dyn Receiver>, lease: Lease) {
        let len = header.len as usize;

        if receiver.require_checksum() {
            // A zero checksum field is always invalid when validation is
            // required, even if the payload's true CRC happens to be zero.
            if header.checksum == 0 {
                self.stats.record_dropped();
                debug!(
                    magic = magic_name(header.magic),
                    seq = header.seq,
                    "frame dropped: checksum required but zero"
                );
                receiver.reject(header, Some(lease), DropReason::BadChecksum);
                return;
            }
            let computed = crc::checksum(&lease.as_slice()[..len]);
            if computed != header.checksum {
                self.stats.record_dropped();
                debug!(
                    magic = magic_name(header.magic),
                    expected = header.checksum,
                    computed,
                    "frame dropped: checksum mismatch"
                );
                receiver.reject(header, Some(lease), DropReason::BadChecksum);
                return;
            }
        }

        receiver.commit(header, lease, len);
        self.stats.record_ok();
        trace!(
            magic = magic_name(header.magic),
            len,
            seq = header.seq,
            "frame committed"
        );
    }
}

/// Handle to a router running on its dedicated thread.
pub struct RouterHandle {
    running: Arc<AtomicBool>,
    stats: Arc<RouterStats>,
    thread: Option<JoinHandle<()>>,
}

impl RouterHandle {
    /// The running router's counters.
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }

    /// Point-in-time copy of the running router's counters.
    pub fn snapshot(&self) -> RouterStatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop the receive loop and join the thread.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RouterHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

impl std::fmt::Debug for RouterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterHandle")
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Mutex, MutexGuard, PoisonError};

    use bytes::BytesMut;
    use framelink_wire::encode_frame;

    use super::*;

    /// Transport replaying a fixed byte script, at most `max_per_read`
    /// bytes per read, to exercise fragmentation.
    struct ScriptedLink {
        data: VecDeque<u8>,
        max_per_read: usize,
    }

    impl ScriptedLink {
        fn new(data: &[u8], max_per_read: usize) -> Self {
            Self {
                data: data.iter().copied().collect(),
                max_per_read,
            }
        }
    }

    impl Transport for ScriptedLink {
        fn available(&mut self) -> usize {
            self.data.len()
        }

        fn read(&mut self, dst: &mut [u8]) -> usize {
            let n = self.data.len().min(dst.len()).min(self.max_per_read);
            for slot in dst[..n].iter_mut() {
                *slot = self.data.pop_front().unwrap();
            }
            n
        }
    }

    #[derive(Default)]
    struct RecorderState {
        commits: Vec<(FrameHeader, Vec<u8>)>,
        rejects: Vec<(u32, DropReason, bool)>,
    }

    struct Recorder {
        magic: u32,
        max_len: usize,
        require_checksum: bool,
        buf_capacity: usize,
        decline_acquire: bool,
        state: Mutex<RecorderState>,
    }

    impl Recorder {
        fn new(magic: u32, max_len: usize) -> Self {
            Self {
                magic,
                max_len,
                require_checksum: false,
                buf_capacity: max_len,
                decline_acquire: false,
                state: Mutex::new(RecorderState::default()),
            }
        }

        fn with_checksum(mut self) -> Self {
            self.require_checksum = true;
            self
        }

        fn with_capacity(mut self, capacity: usize) -> Self {
            self.buf_capacity = capacity;
            self
        }

        fn declining(mut self) -> Self {
            self.decline_acquire = true;
            self
        }

        fn lock(&self) -> MutexGuard<'_, RecorderState> {
            self.state.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Receiver for Recorder {
        fn magic(&self) -> u32 {
            self.magic
        }

        fn max_len(&self) -> usize {
            self.max_len
        }

        fn require_checksum(&self) -> bool {
            self.require_checksum
        }

        fn acquire(&self, _header: &FrameHeader) -> Option<Lease> {
            if self.decline_acquire {
                return None;
            }
            Some(Lease::new(vec![0u8; self.buf_capacity].into_boxed_slice(), 0))
        }

        fn commit(&self, header: &FrameHeader, lease: Lease, len: usize) {
            self.lock()
                .commits
                .push((*header, lease.as_slice()[..len].to_vec()));
        }

        fn reject(&self, header: &FrameHeader, lease: Option<Lease>, reason: DropReason) {
            self.lock().rejects.push((header.seq, reason, lease.is_some()));
        }
    }

    fn wire_frame(magic: u32, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(&FrameHeader::new(magic, seq, payload), payload, &mut buf).unwrap();
        buf.to_vec()
    }

    fn wire_frame_checksummed(magic: u32, seq: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(
            &FrameHeader::checksummed(magic, seq, payload),
            payload,
            &mut buf,
        )
        .unwrap();
        buf.to_vec()
    }

    fn drain(router: &mut Router<ScriptedLink>) {
        while router.service() > 0 {}
    }

    fn router_with(
        data: &[u8],
        max_per_read: usize,
        receiver: &Arc<Recorder>,
    ) -> Router<ScriptedLink> {
        let mut router = Router::new(
            ScriptedLink::new(data, max_per_read),
            RouterConfig::default(),
        );
        router
            .register(Arc::clone(receiver) as Arc<dyn Receiver>)
            .unwrap();
        router
    }

    #[test]
    fn bulk_frame_commits_payload_and_sequence() {
        let receiver = Arc::new(Recorder::new(0x1234_5678, 16));
        let wire = wire_frame(0x1234_5678, 7, &[0x01, 0x02, 0x03, 0x04]);
        let mut router = router_with(&wire, usize::MAX, &receiver);

        drain(&mut router);

        let state = receiver.lock();
        assert_eq!(state.commits.len(), 1);
        let (header, payload) = &state.commits[0];
        assert_eq!(header.seq, 7);
        assert_eq!(payload, &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(router.snapshot().frames_ok, 1);
        assert_eq!(router.snapshot().frames_dropped, 0);
    }

    #[test]
    fn byte_at_a_time_delivery_matches_bulk() {
        let receiver = Arc::new(Recorder::new(0xAA55_AA55, 64));
        let payload: Vec<u8> = (0u8..48).collect();
        let wire = wire_frame(0xAA55_AA55, 3, &payload);
        let mut router = router_with(&wire, 1, &receiver);

        drain(&mut router);

        let state = receiver.lock();
        assert_eq!(state.commits.len(), 1);
        assert_eq!(state.commits[0].1, payload);
    }

    #[test]
    fn ragged_chunk_boundaries_do_not_affect_outcome() {
        for max_per_read in [1, 2, 3, 7, 19, 20, 21, 33] {
            let receiver = Arc::new(Recorder::new(0x0BAD_CAFE, 64));
            let mut wire = wire_frame(0x0BAD_CAFE, 1, b"first-frame");
            wire.extend(wire_frame(0x0BAD_CAFE, 2, b"second"));
            let mut router = router_with(&wire, max_per_read, &receiver);

            drain(&mut router);

            let state = receiver.lock();
            assert_eq!(state.commits.len(), 2, "max_per_read={max_per_read}");
            assert_eq!(state.commits[0].1, b"first-frame");
            assert_eq!(state.commits[1].1, b"second");
        }
    }

    #[test]
    fn zero_length_is_rejected_as_bad_length() {
        let receiver = Arc::new(Recorder::new(0x1111_2222, 16));
        let mut header = FrameHeader::new(0x1111_2222, 5, b"");
        header.len = 0;
        let mut raw = [0u8; HEADER_SIZE];
        header.encode_into(&mut raw);
        let mut router = router_with(&raw, usize::MAX, &receiver);

        drain(&mut router);

        let state = receiver.lock();
        assert_eq!(state.rejects, vec![(5, DropReason::BadLength, false)]);
        assert!(state.commits.is_empty());
        assert_eq!(router.snapshot().frames_dropped, 1);
    }

    #[test]
    fn oversized_length_is_rejected_as_bad_length() {
        let receiver = Arc::new(Recorder::new(0x1111_2222, 8));
        let wire = wire_frame(0x1111_2222, 9, &[0u8; 32]);
        let mut router = router_with(&wire, usize::MAX, &receiver);

        drain(&mut router);

        let state = receiver.lock();
        assert_eq!(state.rejects, vec![(9, DropReason::BadLength, false)]);
        // The payload bytes were reinterpreted as further headers.
        assert!(router.snapshot().resync_count > 1);
    }

    #[test]
    fn unmatched_magic_without_default_drops_silently() {
        let receiver = Arc::new(Recorder::new(0x1111_1111, 16));
        let wire = wire_frame(0x9999_9999, 1, b"zzzz");
        let mut router = router_with(&wire, usize::MAX, &receiver);

        drain(&mut router);

        let state = receiver.lock();
        assert!(state.commits.is_empty());
        assert!(state.rejects.is_empty());
        assert!(router.snapshot().frames_dropped >= 1);
    }

    #[test]
    fn default_receiver_catches_unmatched_magic() {
        let primary = Arc::new(Recorder::new(0x1111_1111, 16));
        let fallback = Arc::new(Recorder::new(0, 16));
        let wire = wire_frame(0x9999_9999, 4, b"stray");
        let mut router = router_with(&wire, usize::MAX, &primary);
        router.set_default(Some(Arc::clone(&fallback) as Arc<dyn Receiver>));

        drain(&mut router);

        assert_eq!(fallback.lock().commits.len(), 1);
        assert_eq!(fallback.lock().commits[0].1, b"stray");
        assert_eq!(router.snapshot().frames_ok, 1);
    }

    #[test]
    fn declined_acquire_is_rejected_as_no_buffer() {
        let receiver = Arc::new(Recorder::new(0x2222_2222, 16).declining());
        let wire = wire_frame(0x2222_2222, 6, b"data");
        let mut router = router_with(&wire, usize::MAX, &receiver);

        drain(&mut router);

        let state = receiver.lock();
        assert_eq!(state.rejects, vec![(6, DropReason::NoBuffer, false)]);
    }

    #[test]
    fn undersized_lease_is_returned_with_no_buffer() {
        let receiver = Arc::new(Recorder::new(0x2222_2222, 64).with_capacity(2));
        let wire = wire_frame(0x2222_2222, 8, b"too big for the lease");
        let mut router = router_with(&wire, usize::MAX, &receiver);

        drain(&mut router);

        let state = receiver.lock();
        assert_eq!(state.rejects, vec![(8, DropReason::NoBuffer, true)]);
    }

    #[test]
    fn required_checksum_zero_always_rejects() {
        let receiver = Arc::new(Recorder::new(0x3333_3333, 16).with_checksum());
        let wire = wire_frame(0x3333_3333, 2, &[1, 2, 3, 4]);
        let mut router = router_with(&wire, usize::MAX, &receiver);

        drain(&mut router);

        let state = receiver.lock();
        assert_eq!(state.rejects, vec![(2, DropReason::BadChecksum, true)]);
        assert_eq!(router.snapshot().frames_ok, 0);
    }

    #[test]
    fn checksum_mismatch_rejects_and_match_commits() {
        let receiver = Arc::new(Recorder::new(0x3333_3333, 16).with_checksum());

        let mut wire = wire_frame_checksummed(0x3333_3333, 1, &[9, 8, 7]);
        let mut bad = FrameHeader::checksummed(0x3333_3333, 2, &[9, 8, 7]);
        bad.checksum ^= 0xFFFF;
        let mut buf = BytesMut::new();
        encode_frame(&bad, &[9, 8, 7], &mut buf).unwrap();
        wire.extend_from_slice(&buf);

        let mut router = router_with(&wire, usize::MAX, &receiver);
        drain(&mut router);

        let state = receiver.lock();
        assert_eq!(state.commits.len(), 1);
        assert_eq!(state.commits[0].0.seq, 1);
        assert_eq!(state.rejects, vec![(2, DropReason::BadChecksum, true)]);
    }

    #[test]
    fn resync_counts_each_header_start() {
        let receiver = Arc::new(Recorder::new(0x4444_4444, 16));
        let mut wire = wire_frame(0x4444_4444, 1, b"a");
        wire.extend(wire_frame(0x4444_4444, 2, b"b"));
        wire.extend(wire_frame(0x4444_4444, 3, b"c"));
        let mut router = router_with(&wire, 5, &receiver);

        drain(&mut router);

        assert_eq!(router.snapshot().resync_count, 3);
        assert_eq!(router.snapshot().frames_ok, 3);
    }

    #[test]
    fn activity_hook_sees_every_read() {
        use std::sync::atomic::AtomicUsize;

        let receiver = Arc::new(Recorder::new(0x5555_5555, 16));
        let wire = wire_frame(0x5555_5555, 1, b"ping");
        let seen = Arc::new(AtomicUsize::new(0));
        let mut router = router_with(&wire, 7, &receiver);
        let hook_seen = Arc::clone(&seen);
        router.set_activity_hook(move |n| {
            hook_seen.fetch_add(n, Ordering::Relaxed);
        });

        drain(&mut router);

        assert_eq!(seen.load(Ordering::Relaxed) as u64, router.snapshot().bytes_rx);
        assert_eq!(router.snapshot().bytes_rx, wire.len() as u64);
    }

    #[test]
    fn stats_reset_zeroes_counters() {
        let receiver = Arc::new(Recorder::new(0x6666_6666, 16));
        let wire = wire_frame(0x6666_6666, 1, b"x");
        let mut router = router_with(&wire, usize::MAX, &receiver);
        drain(&mut router);

        assert_ne!(router.snapshot(), RouterStatsSnapshot::default());
        router.stats().reset();
        assert_eq!(router.snapshot(), RouterStatsSnapshot::default());
    }
}
