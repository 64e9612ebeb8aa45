use std::io::Write;
use std::sync::Arc;

use dbgwire_frame::write_frame;
use tracing::{error, info, trace};

use crate::handler::{DisconnectNotifier, DisconnectReason};
use crate::queue::OutgoingQueue;

/// Drains the outgoing queue onto the connection.
///
/// Each wake-up takes the whole queue under its lock and writes the batch
/// after releasing it, so a slow client never blocks producers. The first
/// failed write ends the session; the rest of the batch is dropped.
pub(crate) struct OutputPump<W> {
    pub(crate) sink: W,
    pub(crate) queue: Arc<OutgoingQueue>,
    pub(crate) notifier: Arc<DisconnectNotifier>,
}

impl<W: Write> OutputPump<W> {
    pub(crate) fn run(mut self) {
        info!("outgoing message pump started");

        while let Some(batch) = self.queue.next_batch() {
            for frame in batch {
                if let Err(err) = write_frame(&mut self.sink, &frame) {
                    let text = frame.strip_suffix(&[0]).unwrap_or(&frame[..]);
                    error!(
                        error = %err,
                        message = %String::from_utf8_lossy(text),
                        "sending message failed"
                    );
                    self.notifier.report(DisconnectReason::WriteFailed);
                    info!("outgoing message pump exiting");
                    return;
                }
                trace!(len = frame.len(), "sent message");
            }
        }

        info!("outgoing message pump exiting");
    }
}
