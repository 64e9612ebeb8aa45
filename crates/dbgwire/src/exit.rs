use std::fmt;
use std::io;

use dbgwire_frame::FrameError;
use dbgwire_session::SessionError;
use dbgwire_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
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

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Setup(err) => transport_error(context, err),
        SessionError::AlreadyAttached => CliError::new(INTERNAL, format!("{context}: {err}")),
        SessionError::Spawn { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_io_kinds_to_codes() {
        let denied = io_error("bind", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.code, PERMISSION_DENIED);

        let timed_out = frame_error(
            "receive",
            FrameError::Io(io::Error::from(io::ErrorKind::WouldBlock)),
        );
        assert_eq!(timed_out.code, TIMEOUT);

        let refused = transport_error(
            "connect",
            TransportError::Connect {
                endpoint: "127.0.0.1:1".into(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            },
        );
        assert_eq!(refused.code, FAILURE);
        assert!(refused.message.starts_with("connect: "));
    }

    #[test]
    fn oversized_payload_is_data_invalid() {
        let err = frame_error(
            "receive",
            FrameError::PayloadTooLarge {
                size: 128,
                max: 64,
            },
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn session_setup_uses_transport_mapping() {
        let err = session_error(
            "attach",
            SessionError::Setup(TransportError::Signal(io::Error::other("pipe"))),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
