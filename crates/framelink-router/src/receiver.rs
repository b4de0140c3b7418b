use framelink_wire::FrameHeader;

/// Why a frame was rejected before reaching `commit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// No registered receiver matched the magic and no default was set.
    /// Never delivered through [`Receiver::reject`] — there is nobody to
    /// tell — but observable in router statistics and diagnostics.
    NoReceiver,
    /// Declared payload length was zero or above the receiver's maximum.
    BadLength,
    /// Checksum required but zero, or mismatched the computed CRC-32.
    BadChecksum,
    /// The receiver declined to provide a buffer, or provided one too small.
    NoBuffer,
}

/// An owned payload buffer on loan from a receiver to the router.
///
/// `acquire` moves the buffer out of the receiver's slot storage and into
/// the lease; the router copies payload bytes into it without holding any
/// receiver lock, then hands it back through `commit` or `reject`. The
/// token is receiver-private bookkeeping (typically a slot index) carried
/// along so the receiver can reconcile the returned buffer.
#[derive(Debug)]
pub struct Lease {
    data: Box<[u8]>,
    token: usize,
}

impl Lease {
    /// Loan `data` out, tagged with a receiver-private slot token.
    pub fn new(data: Box<[u8]>, token: usize) -> Self {
        Self { data, token }
    }

    /// The receiver-private token this lease was issued under.
    pub fn token(&self) -> usize {
        self.token
    }

    /// Total writable capacity of the loaned buffer.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The loaned bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The loaned bytes, writable.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Unwrap the loaned buffer, ending the lease.
    pub fn into_buf(self) -> Box<[u8]> {
        self.data
    }
}

/// A payload consumer registered with the router.
///
/// The router calls these three operations from its receive thread only,
/// in a strict per-frame order: `acquire` once the header is validated,
/// then exactly one of `commit` (payload complete and valid) or `reject`
/// (anything went wrong after the receiver was matched). `reject` carries
/// the lease back whenever one was issued so the receiver can return the
/// slot to service; `None` means the failure happened before or during
/// `acquire` and no buffer is outstanding.
///
/// Implementations own their buffer storage outright; the router only
/// borrows it for the duration of one frame's payload copy.
pub trait Receiver: Send + Sync {
    /// The magic this receiver consumes.
    fn magic(&self) -> u32;

    /// Hard cap on accepted payload length.
    fn max_len(&self) -> usize;

    /// Whether frames must carry a matching, non-zero CRC-32.
    fn require_checksum(&self) -> bool;

    /// Provide a buffer for the frame described by `header`, or decline.
    fn acquire(&self, header: &FrameHeader) -> Option<Lease>;

    /// Accept a fully received, validated frame of `len` payload bytes.
    fn commit(&self, header: &FrameHeader, lease: Lease, len: usize);

    /// Be told the frame was rejected, reclaiming the lease if one was out.
    fn reject(&self, header: &FrameHeader, lease: Option<Lease>, reason: DropReason);
}
