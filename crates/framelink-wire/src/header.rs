use bytes::{BufMut, BytesMut};

use crate::crc;
use crate::error::{Result, WireError};

/// Frame header: magic (4) + kind (1) + flags (1) + reserved (2) +
/// len (4) + checksum (4) + seq (4) = 20 bytes, little-endian.
pub const HEADER_SIZE: usize = 20;

/// Parsed frame header.
///
/// The reserved field is ignored on read and written as zero; it is not
/// carried here. `kind` and `flags` are opaque to the router and passed
/// through to the receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Selects which registered receiver consumes the payload.
    pub magic: u32,
    /// Consumer-defined subtype.
    pub kind: u8,
    /// Consumer-defined bits.
    pub flags: u8,
    /// Payload byte count.
    pub len: u32,
    /// CRC-32 of the payload; zero when the sender did not stamp one.
    pub checksum: u32,
    /// Sender-assigned sequence counter.
    pub seq: u32,
}

impl FrameHeader {
    /// Header for `payload` with no checksum stamped.
    pub fn new(magic: u32, seq: u32, payload: &[u8]) -> Self {
        Self {
            magic,
            kind: 0,
            flags: 0,
            len: payload.len() as u32,
            checksum: 0,
            seq,
        }
    }

    /// Header for `payload` with its CRC-32 stamped.
    pub fn checksummed(magic: u32, seq: u32, payload: &[u8]) -> Self {
        Self {
            checksum: crc::checksum(payload),
            ..Self::new(magic, seq, payload)
        }
    }

    /// Decode a header from its 20 wire bytes. Never fails: every bit
    /// pattern is a syntactically valid header — validation against the
    /// matched receiver happens downstream.
    pub fn parse(raw: &[u8; HEADER_SIZE]) -> Self {
        let u32_at = |off: usize| u32::from_le_bytes([raw[off], raw[off + 1], raw[off + 2], raw[off + 3]]);
        Self {
            magic: u32_at(0),
            kind: raw[4],
            flags: raw[5],
            // raw[6..8] reserved, ignored
            len: u32_at(8),
            checksum: u32_at(12),
            seq: u32_at(16),
        }
    }

    /// Encode this header into its 20 wire bytes.
    pub fn encode_into(&self, dst: &mut [u8; HEADER_SIZE]) {
        dst[0..4].copy_from_slice(&self.magic.to_le_bytes());
        dst[4] = self.kind;
        dst[5] = self.flags;
        dst[6..8].copy_from_slice(&0u16.to_le_bytes());
        dst[8..12].copy_from_slice(&self.len.to_le_bytes());
        dst[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        dst[16..20].copy_from_slice(&self.seq.to_le_bytes());
    }
}

/// Encode a complete frame (header + payload) into the wire format.
///
/// ```text
/// ┌────────────┬──────┬───────┬──────────┬──────────┬──────────┬──────────┬──────────────────┐
/// │ Magic (4B) │ Kind │ Flags │ Rsv (2B) │ Len (4B) │ CRC (4B) │ Seq (4B) │ Payload          │
/// │  LE u32    │ (1B) │ (1B)  │  zero    │  LE u32  │  LE u32  │  LE u32  │ (Len bytes)      │
/// └────────────┴──────┴───────┴──────────┴──────────┴──────────┴──────────┴──────────────────┘
/// ```
///
/// The header's `len` must match `payload.len()`; mismatches are how tests
/// forge malformed frames, so the check lives here rather than in the header.
pub fn encode_frame(header: &FrameHeader, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > u32::MAX as usize {
        return Err(WireError::PayloadTooLarge {
            size: payload.len(),
            max: u32::MAX as usize,
        });
    }
    if header.len as usize != payload.len() {
        return Err(WireError::LengthMismatch {
            header: header.len as usize,
            payload: payload.len(),
        });
    }

    let mut raw = [0u8; HEADER_SIZE];
    header.encode_into(&mut raw);
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&raw);
    dst.put_slice(payload);
    Ok(())
}
