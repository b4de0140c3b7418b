use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use framelink_router::{Receiver, Router, RouterConfig};
use framelink_sinks::{DropPolicy, ImageConfig, ImageSink, MessageConfig, MessageSink};
use framelink_transport::{pipe, PipeSender};
use framelink_wire::{encode_frame, magic, FrameHeader};
use tracing::info;

use crate::cmd::{DemoArgs, DropPolicyArg};
use crate::exit::{router_error, sink_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_report, DemoReport, OutputFormat};

impl From<DropPolicyArg> for DropPolicy {
    fn from(arg: DropPolicyArg) -> Self {
        match arg {
            DropPolicyArg::Old => DropPolicy::DropOld,
            DropPolicyArg::New => DropPolicy::DropNew,
        }
    }
}

pub fn run(args: DemoArgs, format: OutputFormat) -> CliResult<i32> {
    let (tx, rx) = pipe(args.pipe_capacity);

    let image = Arc::new(
        ImageSink::new(ImageConfig {
            max_image_bytes: args.image_bytes,
            require_checksum: args.checksum,
            drop_policy: args.drop_policy.into(),
            ..ImageConfig::default()
        })
        .map_err(|err| sink_error("image sink", err))?,
    );
    let message = Arc::new(
        MessageSink::new(MessageConfig {
            queue_depth: args.queue_depth,
            require_checksum: args.checksum,
            ..MessageConfig::default()
        })
        .map_err(|err| sink_error("message sink", err))?,
    );

    let mut router = Router::new(rx, RouterConfig::default());
    router
        .register(Arc::clone(&image) as Arc<dyn Receiver>)
        .map_err(|err| router_error("register image sink", err))?;
    router
        .register(Arc::clone(&message) as Arc<dyn Receiver>)
        .map_err(|err| router_error("register message sink", err))?;
    let handle = router
        .spawn()
        .map_err(|err| router_error("start router", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(Arc::clone(&running))?;

    info!(
        messages = args.messages,
        images = args.images,
        checksum = args.checksum,
        "demo feed starting"
    );

    let consumer = spawn_consumer(Arc::clone(&image), Arc::clone(&message), Arc::clone(&running));

    feed(&tx, &args, &running)?;

    // Let the parser and consumer catch up with the tail of the feed.
    let deadline = Instant::now() + Duration::from_secs(10);
    while running.load(Ordering::SeqCst) && tx.pending() > 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    std::thread::sleep(Duration::from_millis(50));
    running.store(false, Ordering::SeqCst);

    let (messages_popped, images_rendered) = consumer.join().unwrap_or((0, 0));
    let router_stats = handle.snapshot();
    handle.shutdown();

    let report = DemoReport::new(
        router_stats,
        image.stats(),
        message.stats(),
        messages_popped,
        images_rendered,
    );
    print_report(&report, format);

    Ok(SUCCESS)
}

/// Feed interleaved message and image frames, the way the original host
/// sender does: a steady message stream with an image every few ticks.
fn feed(tx: &PipeSender, args: &DemoArgs, running: &AtomicBool) -> CliResult<()> {
    let interval = if args.images == 0 {
        u32::MAX
    } else {
        (args.messages / args.images).max(1)
    };

    let mut images_sent = 0u32;
    for seq in 0..args.messages {
        if !running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let corrupt = args.corrupt_every > 0 && (seq + 1) % args.corrupt_every == 0;
        let payload = telemetry_payload(seq);
        let wire = build_frame(magic::MESSAGE, seq, &payload, args.checksum, corrupt)?;
        tx.send_all(&wire)
            .map_err(|err| transport_error("send message frame", err))?;

        if seq % interval == interval - 1 && images_sent < args.images {
            let payload = image_payload(images_sent, args.image_bytes);
            let wire = build_frame(magic::IMAGE, images_sent, &payload, args.checksum, false)?;
            tx.send_all(&wire)
                .map_err(|err| transport_error("send image frame", err))?;
            images_sent += 1;
        }
    }

    while images_sent < args.images && running.load(Ordering::SeqCst) {
        let payload = image_payload(images_sent, args.image_bytes);
        let wire = build_frame(magic::IMAGE, images_sent, &payload, args.checksum, false)?;
        tx.send_all(&wire)
            .map_err(|err| transport_error("send image frame", err))?;
        images_sent += 1;
    }

    Ok(())
}

fn spawn_consumer(
    image: Arc<ImageSink>,
    message: Arc<MessageSink>,
    running: Arc<AtomicBool>,
) -> std::thread::JoinHandle<(u64, u64)> {
    std::thread::spawn(move || {
        let mut popped = 0u64;
        let mut rendered = 0u64;
        let mut dst = vec![0u8; 1024];

        while running.load(Ordering::SeqCst) {
            let mut idle = true;
            while message.pop(&mut dst).is_some() {
                popped += 1;
                idle = false;
            }
            if let Some(frame) = image.get_ready() {
                // Pretend rendering takes a moment; the slot stays pinned.
                std::thread::sleep(Duration::from_millis(2));
                rendered += 1;
                frame.release();
                idle = false;
            }
            if idle {
                std::thread::sleep(Duration::from_millis(1));
            }
        }

        // Final drain of whatever is still queued.
        while message.pop(&mut dst).is_some() {
            popped += 1;
        }
        while let Some(frame) = image.get_ready() {
            rendered += 1;
            frame.release();
        }
        (popped, rendered)
    })
}

fn build_frame(
    magic: u32,
    seq: u32,
    payload: &[u8],
    checksum: bool,
    corrupt: bool,
) -> CliResult<BytesMut> {
    let mut header = if checksum {
        FrameHeader::checksummed(magic, seq, payload)
    } else {
        FrameHeader::new(magic, seq, payload)
    };
    if corrupt {
        header.checksum = header.checksum.wrapping_add(1);
    }

    let mut wire = BytesMut::new();
    encode_frame(&header, payload, &mut wire)
        .map_err(|err| CliError::new(crate::exit::DATA_INVALID, format!("encode frame: {err}")))?;
    Ok(wire)
}

/// Telemetry snapshot in the sender's packed little-endian layout:
/// speed, rpm, odometer, trip odometer.
fn telemetry_payload(seq: u32) -> Vec<u8> {
    let mut payload = Vec::with_capacity(12);
    payload.extend_from_slice(&((seq % 240) as i16).to_le_bytes());
    payload.extend_from_slice(&((800 + (seq * 37) % 6200) as i16).to_le_bytes());
    payload.extend_from_slice(&seq.wrapping_mul(13).to_le_bytes());
    payload.extend_from_slice(&seq.to_le_bytes());
    payload
}

/// A PNG-shaped blob: real signature, patterned body.
fn image_payload(seq: u32, len: usize) -> Vec<u8> {
    let mut payload = vec![0u8; len];
    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let sig = PNG_SIGNATURE.len().min(len);
    payload[..sig].copy_from_slice(&PNG_SIGNATURE[..sig]);
    for (i, byte) in payload.iter_mut().enumerate().skip(sig) {
        *byte = (seq as usize + i) as u8;
    }
    payload
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
