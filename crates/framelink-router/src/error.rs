/// Errors that can occur while assembling or starting a router.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// The receiver registry is at its fixed capacity.
    #[error("receiver registry full (capacity {capacity})")]
    RegistryFull { capacity: usize },

    /// The dedicated receive thread could not be spawned.
    #[error("failed to spawn receive thread: {0}")]
    Spawn(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RouterError>;
