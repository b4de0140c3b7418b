//! Payload checksum: CRC-32/ISO-HDLC (reflected 0xEDB88320, init all-ones,
//! final complement), computed over the payload bytes only.

/// CRC-32 of `data`.
pub fn checksum(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}
