//! Duplex message transport between a debugger backend and one debugger
//! client.
//!
//! Messages are UTF-8 JSON text, each followed by a single NUL byte. The
//! backend hands an accepted connection to a [`session::DebugTransport`],
//! which dispatches inbound messages to a [`session::SessionHandler`] and
//! writes queued outbound messages in order.
//!
//! # Crate Structure
//!
//! - [`transport`]: connections over Unix sockets or TCP, and the shutdown signal
//! - [`frame`]: envelope construction, NUL framing, and the receive buffer
//! - [`session`]: the attach/detach lifecycle and the input/output pumps

/// Re-export transport types.
pub mod transport {
    pub use dbgwire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dbgwire_frame::*;
}

/// Re-export session types.
pub mod session {
    pub use dbgwire_session::*;
}
