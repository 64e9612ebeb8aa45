//! Byte-stream transport for a single debugger client.
//!
//! Provides a unified connection type over the local and network stream
//! sockets a debug adapter listens on:
//! - Unix domain sockets (Linux/macOS)
//! - TCP
//!
//! Also provides the [`ShutdownTrigger`]/[`ShutdownWatch`] pair used to wake
//! a thread blocked waiting for input on an [`IpcStream`] (the self-pipe
//! trick). This is the lowest layer of dbgwire.

pub mod endpoint;
pub mod error;
#[cfg(unix)]
pub mod signal;
pub mod tcp;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use endpoint::{Endpoint, EndpointListener};
pub use error::{Result, TransportError};
#[cfg(unix)]
pub use signal::{shutdown_signal, wait_for_input, Readiness, ShutdownTrigger, ShutdownWatch};
pub use tcp::TcpSocket;
pub use traits::IpcStream;

#[cfg(unix)]
pub use uds::UnixDomainSocket;
