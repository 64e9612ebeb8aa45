//! Single-client duplex transport for a debug adapter.
//!
//! A [`DebugTransport`] owns at most one attached client connection. While
//! attached, an input pump thread turns the NUL-delimited byte stream into
//! JSON messages for the [`SessionHandler`], and an output pump thread writes
//! messages queued with the `enqueue_*` methods in order.

pub mod error;
pub mod handler;
#[cfg(unix)]
mod input;
#[cfg(unix)]
mod output;
pub mod queue;
#[cfg(unix)]
pub mod transport;

pub use error::{Result, SessionError};
pub use handler::{DisconnectReason, SessionHandler};
pub use queue::OutgoingQueue;
#[cfg(unix)]
pub use transport::{DebugTransport, TransportConfig};
