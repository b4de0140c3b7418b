/// Errors that can occur on the feeding side of a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The reading end of the link is gone; no further bytes can be delivered.
    #[error("transport disconnected (reader dropped)")]
    Disconnected,
}

pub type Result<T> = std::result::Result<T, TransportError>;
