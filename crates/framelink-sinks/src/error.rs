/// Errors that can occur while constructing a sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Image slot buffers below the useful minimum.
    #[error("image buffer too small ({got} bytes, minimum {min})")]
    ImageBufferTooSmall { got: usize, min: usize },

    /// Message slots below the useful minimum.
    #[error("message slot too small ({got} bytes, minimum {min})")]
    MessageSlotTooSmall { got: usize, min: usize },

    /// Message queue depth below the useful minimum.
    #[error("message queue too shallow (depth {got}, minimum {min})")]
    QueueTooShallow { got: usize, min: usize },
}

pub type Result<T> = std::result::Result<T, SinkError>;
