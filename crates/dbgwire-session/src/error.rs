/// Errors returned by session lifecycle operations.
///
/// Each variant means the transport cannot run a session; callers treat
/// them as fatal rather than retrying.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// `attach` was called while a client is attached.
    #[error("a client is already attached")]
    AlreadyAttached,

    /// The shutdown signal could not be created.
    #[error("transport setup failed: {0}")]
    Setup(#[from] dbgwire_transport::TransportError),

    /// A pump thread could not be started.
    #[error("failed to spawn {pump} pump: {source}")]
    Spawn {
        pump: &'static str,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SessionError>;
