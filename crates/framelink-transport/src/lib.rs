//! Non-blocking byte-source abstraction for the framelink stream router.
//!
//! A transport is anything that can answer "how many bytes are buffered?"
//! and "copy up to N of them into this slice" without blocking — a USB CDC
//! endpoint, a UART driver, or the in-process [`BytePipe`] this crate ships
//! for tests and demos.
//!
//! This is the lowest layer of framelink. The router polls a [`Transport`]
//! and never assumes blocking semantics.

pub mod error;
pub mod pipe;
pub mod traits;

pub use error::{Result, TransportError};
pub use pipe::{pipe, PipeReceiver, PipeSender};
pub use traits::Transport;
