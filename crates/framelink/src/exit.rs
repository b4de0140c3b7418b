use std::fmt;

use framelink_router::RouterError;
use framelink_sinks::SinkError;
use framelink_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn router_error(context: &str, err: RouterError) -> CliError {
    match err {
        RouterError::RegistryFull { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        RouterError::Spawn(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn sink_error(context: &str, err: SinkError) -> CliError {
    CliError::new(USAGE, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Disconnected => CliError::new(FAILURE, format!("{context}: {err}")),
    }
}
