/// Errors that can occur while framing or reassembling messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A single message grew past the configured buffer limit.
    #[error("message too large ({size} bytes buffered, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The receive buffer could not be grown.
    #[error("out of memory growing receive buffer to {requested} bytes")]
    OutOfMemory { requested: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
