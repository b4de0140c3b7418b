//! Stock receivers for the framelink router.
//!
//! Two buffer-lifecycle strategies for two traffic shapes:
//! - [`ImageSink`] — large, low-rate, latest-wins payloads in a two-slot
//!   zero-copy exchange. A consumer borrows the newest ready frame through
//!   a [`ReadyImage`] guard and returns it when done.
//! - [`MessageSink`] — small, high-rate payloads in a fixed slot pool
//!   behind a bounded FIFO, drained with a non-blocking [`pop`].
//!
//! Both implement [`framelink_router::Receiver`]; wrap them in `Arc` and
//! register them with a router.
//!
//! [`pop`]: MessageSink::pop

pub mod error;
pub mod image;
pub mod message;

pub use error::{Result, SinkError};
pub use image::{DropPolicy, ImageConfig, ImageSink, ImageStats, ReadyImage};
pub use message::{MessageConfig, MessageSink, MessageStats};
