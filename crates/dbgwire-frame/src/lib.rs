//! NUL-delimited JSON framing for the debugger wire protocol.
//!
//! Every message on the wire is UTF-8 JSON text followed by exactly one NUL
//! byte. This crate builds outgoing envelopes (`type`, `event`, `body`),
//! frames them, and reassembles inbound frames from arbitrarily chunked reads
//! in a growable [`ReceiveBuffer`].

pub mod buffer;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod reader;
pub mod writer;

pub use buffer::{FrameStatus, ReceiveBuffer};
pub use codec::{
    as_event, as_user_message, encode_frame, wrap, Envelope, FrameConfig, DEFAULT_INITIAL_BUFFER,
    DEFAULT_MAX_BUFFER,
};
pub use error::{FrameError, Result};
pub use protocol::{
    CATEGORY_CONSOLE, CATEGORY_STDERR, CATEGORY_STDOUT, CATEGORY_TELEMETRY, EVENT_OUTPUT,
    FRAME_DELIMITER, MESSAGE_TYPE_EVENT, MESSAGE_TYPE_REQUEST, MESSAGE_TYPE_RESPONSE,
};
pub use reader::FrameReader;
pub use writer::{write_frame, FrameWriter};
