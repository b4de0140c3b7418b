//! Typed frame demultiplexing for serial-like byte streams.
//!
//! framelink turns one continuous, unreliable byte stream — a USB CDC
//! endpoint, a UART, anything that can report and hand over buffered
//! bytes — into discrete, validated frames, each routed to a registered
//! receiver with back-pressure semantics chosen per consumer.
//!
//! # Crate Structure
//!
//! - [`transport`] — Non-blocking byte-source contract plus a loopback pipe
//! - [`wire`] — Bit-exact frame header codec, CRC-32, well-known magics
//! - [`router`] — Parsing state machine, receiver registry, dispatch
//! - [`sinks`] — Stock receivers: latest-wins image buffers, pooled FIFOs

/// Re-export transport types.
pub mod transport {
    pub use framelink_transport::*;
}

/// Re-export wire-format types.
pub mod wire {
    pub use framelink_wire::*;
}

/// Re-export router types.
pub mod router {
    pub use framelink_router::*;
}

/// Re-export the stock sinks.
pub mod sinks {
    pub use framelink_sinks::*;
}
