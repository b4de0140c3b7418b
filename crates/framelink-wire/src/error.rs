/// Errors that can occur while encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The payload exceeds what the length field can represent.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The header's length field disagrees with the payload being encoded.
    #[error("header length {header} does not match payload length {payload}")]
    LengthMismatch { header: usize, payload: usize },
}

pub type Result<T> = std::result::Result<T, WireError>;
