//! Dedicated-thread lifecycle: spawn a router over a live pipe, feed it
//! from the test thread, observe stats, and shut down cleanly.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use framelink_router::{DropReason, Lease, Receiver, Router, RouterConfig};
use framelink_transport::pipe;
use framelink_wire::{encode_frame, FrameHeader};

struct Collecting {
    magic: u32,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl Collecting {
    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.payloads.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Receiver for Collecting {
    fn magic(&self) -> u32 {
        self.magic
    }

    fn max_len(&self) -> usize {
        256
    }

    fn require_checksum(&self) -> bool {
        false
    }

    fn acquire(&self, _header: &FrameHeader) -> Option<Lease> {
        Some(Lease::new(vec![0u8; 256].into_boxed_slice(), 0))
    }

    fn commit(&self, _header: &FrameHeader, lease: Lease, len: usize) {
        self.lock().push(lease.as_slice()[..len].to_vec());
    }

    fn reject(&self, _header: &FrameHeader, _lease: Option<Lease>, _reason: DropReason) {}
}

fn wait_until(deadline: Duration, mut done: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    done()
}

#[test]
fn spawned_router_processes_frames_and_shuts_down() {
    let (tx, rx) = pipe(4096);
    let receiver = Arc::new(Collecting {
        magic: 0x00C0_FFEE,
        payloads: Mutex::new(Vec::new()),
    });

    let mut router = Router::new(rx, RouterConfig::default());
    router
        .register(Arc::clone(&receiver) as Arc<dyn Receiver>)
        .unwrap();
    let handle = router.spawn().unwrap();

    for seq in 0..32u32 {
        let payload = format!("frame-{seq}");
        let mut wire = BytesMut::new();
        encode_frame(
            &FrameHeader::new(0x00C0_FFEE, seq, payload.as_bytes()),
            payload.as_bytes(),
            &mut wire,
        )
        .unwrap();
        tx.send_all(&wire).unwrap();
    }

    assert!(
        wait_until(Duration::from_secs(5), || handle.snapshot().frames_ok == 32),
        "router did not commit all frames: {:?}",
        handle.snapshot()
    );

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.frames_ok, 32);
    assert_eq!(snapshot.frames_dropped, 0);

    handle.shutdown();

    let payloads = receiver.lock();
    assert_eq!(payloads.len(), 32);
    assert_eq!(payloads[0], b"frame-0");
    assert_eq!(payloads[31], b"frame-31");
}

#[test]
fn dropping_the_handle_stops_the_router() {
    let (_tx, rx) = pipe(64);
    let router = Router::new(rx, RouterConfig::default());
    let handle = router.spawn().unwrap();
    // Dropping joins; the test passes by not hanging.
    drop(handle);
}
