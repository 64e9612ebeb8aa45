//! Envelope discriminators and well-known values.

/// Byte terminating every message on the wire.
pub const FRAME_DELIMITER: u8 = 0;

/// `type` of asynchronous notifications sent to the client.
pub const MESSAGE_TYPE_EVENT: &str = "event";

/// `type` of replies to client requests.
pub const MESSAGE_TYPE_RESPONSE: &str = "response";

/// `type` of client commands.
pub const MESSAGE_TYPE_REQUEST: &str = "request";

/// Event carrying text for the client's output console.
pub const EVENT_OUTPUT: &str = "output";

/// Output categories (the `category` of an output event body).
pub const CATEGORY_CONSOLE: &str = "console";
pub const CATEGORY_STDOUT: &str = "stdout";
pub const CATEGORY_STDERR: &str = "stderr";
pub const CATEGORY_TELEMETRY: &str = "telemetry";
