use serde_json::Value;
use tracing::{error, trace};

use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};
use crate::protocol::FRAME_DELIMITER;

/// Result of looking for a complete frame in a [`ReceiveBuffer`].
#[derive(Debug, Clone, PartialEq)]
pub enum FrameStatus {
    /// No delimiter yet; more bytes are needed.
    Incomplete,
    /// A frame was consumed but its payload was not valid JSON.
    Malformed,
    /// A frame was consumed and parsed.
    Message(Value),
}

impl FrameStatus {
    /// Whether a frame was consumed from the buffer.
    pub fn made_progress(&self) -> bool {
        !matches!(self, Self::Incomplete)
    }
}

/// Growable, zero-filled receive region for one inbound stream.
///
/// Bytes `[0, position)` have been received and not yet framed; everything
/// from `position` to `size` is zero. Storage is allocated on the first call
/// to [`grow`](Self::grow) and doubles on each subsequent call.
#[derive(Debug)]
pub struct ReceiveBuffer {
    data: Vec<u8>,
    position: usize,
    config: FrameConfig,
}

impl ReceiveBuffer {
    /// Create an empty buffer; nothing is allocated yet.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            data: Vec::new(),
            position: 0,
            config,
        }
    }

    /// Write cursor: number of buffered, unframed bytes.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Current capacity.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// No room left past the write cursor (also true before first use).
    pub fn is_full(&self) -> bool {
        self.position == self.data.len()
    }

    /// Buffered bytes not yet consumed as frames.
    pub fn filled(&self) -> &[u8] {
        &self.data[..self.position]
    }

    /// Free region to receive into.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.position..]
    }

    /// Record `n` bytes written into [`spare_mut`](Self::spare_mut).
    pub fn advance(&mut self, n: usize) {
        assert!(
            n <= self.data.len() - self.position,
            "advance past end of receive buffer"
        );
        self.position += n;
    }

    /// Allocate the initial capacity, or double the current one.
    ///
    /// New capacity is zero-filled. Fails without modifying the buffer if the
    /// configured maximum is already reached or the allocation fails.
    pub fn grow(&mut self) -> Result<()> {
        let size = self.data.len();
        let max = self.config.max_buffer_capacity;
        if size >= max {
            return Err(FrameError::PayloadTooLarge {
                size: self.position,
                max,
            });
        }

        let target = if size == 0 {
            self.config.initial_buffer_capacity.max(1)
        } else {
            size.saturating_mul(2)
        }
        .min(max);

        self.data
            .try_reserve_exact(target - size)
            .map_err(|_| FrameError::OutOfMemory { requested: target })?;
        self.data.resize(target, 0);
        trace!(from = size, to = target, "grew receive buffer");
        Ok(())
    }

    /// Consume the first complete frame, if any.
    ///
    /// Scans `[0, position)` for the delimiter. When one is found the bytes
    /// before it are parsed, the remainder is moved to the front, the vacated
    /// tail is zeroed, and the cursor is set to the remainder's length. A
    /// payload that fails to parse is logged and reported as
    /// [`FrameStatus::Malformed`]; it is still consumed.
    pub fn try_extract_frame(&mut self) -> FrameStatus {
        let Some(end) = self.filled().iter().position(|&b| b == FRAME_DELIMITER) else {
            return FrameStatus::Incomplete;
        };

        let status = match serde_json::from_slice::<Value>(&self.data[..end]) {
            Ok(value) => FrameStatus::Message(value),
            Err(err) => {
                // No request id can be recovered from a frame that does not
                // parse, so nothing can be sent back to the client.
                error!(
                    error = %err,
                    raw = %String::from_utf8_lossy(&self.data[..end]),
                    "failed to parse client message"
                );
                FrameStatus::Malformed
            }
        };

        let remaining = self.position - (end + 1);
        self.data.copy_within(end + 1..self.position, 0);
        self.data[remaining..self.position].fill(0);
        self.position = remaining;

        status
    }

    /// Drop the storage and reset the cursor.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.position = 0;
    }
}
