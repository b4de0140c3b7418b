//! Bit-exact wire format shared by framelink senders and the router.
//!
//! Every frame is a 20-byte little-endian header immediately followed by
//! `len` raw payload bytes — no delimiters, no byte stuffing:
//! - A 4-byte magic selecting the consumer
//! - A subtype byte and a flags byte, opaque to the router
//! - A 4-byte payload length
//! - A 4-byte CRC-32 of the payload (zero when unchecked)
//! - A 4-byte sender sequence counter

pub mod crc;
pub mod error;
pub mod header;
pub mod magic;

pub use error::{Result, WireError};
pub use header::{encode_frame, FrameHeader, HEADER_SIZE};
