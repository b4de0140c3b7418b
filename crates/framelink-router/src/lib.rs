//! Frame router: turns one unreliable byte stream into validated, typed
//! frames and dispatches each payload to its registered receiver.
//!
//! This is the core value-add layer of framelink. The router owns the
//! transport, runs a `Sync` → `Header` → `Payload` parsing state machine
//! that survives arbitrary read fragmentation, validates length and
//! checksum against the matched receiver's contract, and hands buffer
//! ownership across the thread boundary without copying.
//!
//! Receivers implement [`Receiver`]; the two stock implementations live in
//! `framelink-sinks`.

pub mod error;
pub mod receiver;
pub mod registry;
pub mod router;
pub mod stats;

pub use error::{Result, RouterError};
pub use receiver::{DropReason, Lease, Receiver};
pub use registry::Registry;
pub use router::{Router, RouterConfig, RouterHandle};
pub use stats::{RouterStats, RouterStatsSnapshot};
