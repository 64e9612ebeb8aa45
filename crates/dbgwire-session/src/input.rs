use std::io::{ErrorKind, Read};
use std::sync::Arc;

use dbgwire_frame::{FrameConfig, FrameStatus, ReceiveBuffer};
use dbgwire_transport::{wait_for_input, IpcStream, Readiness, ShutdownWatch};
use tracing::{debug, error, info};

use crate::handler::{DisconnectNotifier, DisconnectReason, SessionHandler};

/// Reads the connection, frames inbound messages, and dispatches them.
///
/// Blocks in `poll` on the connection and the shutdown watch with no
/// timeout. Every exit path frees the buffer, closes the watch, and reports
/// the disconnect.
pub(crate) struct InputPump {
    pub(crate) stream: Arc<IpcStream>,
    pub(crate) watch: ShutdownWatch,
    pub(crate) handler: Arc<dyn SessionHandler>,
    pub(crate) notifier: Arc<DisconnectNotifier>,
    pub(crate) config: FrameConfig,
}

impl InputPump {
    pub(crate) fn run(self) {
        info!("incoming message pump started");

        let mut buffer = ReceiveBuffer::new(self.config.clone());
        let reason = self.pump(&mut buffer);

        buffer.release();
        let Self {
            watch, notifier, ..
        } = self;
        drop(watch);

        info!(?reason, "incoming message pump exiting");
        notifier.report(reason);
    }

    fn pump(&self, buffer: &mut ReceiveBuffer) -> DisconnectReason {
        loop {
            // Drain complete frames before blocking again.
            loop {
                match buffer.try_extract_frame() {
                    FrameStatus::Message(message) => self.handler.on_client_message(message),
                    FrameStatus::Malformed => {}
                    FrameStatus::Incomplete => break,
                }
            }

            if buffer.is_full() {
                if let Err(err) = buffer.grow() {
                    error!(error = %err, size = buffer.size(), "cannot grow receive buffer");
                    return DisconnectReason::BufferExhausted;
                }
            }

            match wait_for_input(self.stream.as_ref(), &self.watch) {
                Ok(Readiness::Readable) => {}
                Ok(Readiness::Shutdown) => {
                    info!("termination signal received");
                    return DisconnectReason::Shutdown;
                }
                Ok(Readiness::Hangup { revents }) => {
                    info!(revents = format_args!("{revents:#x}"), "client hung up");
                    return DisconnectReason::PeerClosed;
                }
                Err(err) => {
                    error!(error = %err, "polling inputs failed");
                    return DisconnectReason::ReadFailed;
                }
            }

            match (&*self.stream).read(buffer.spare_mut()) {
                Ok(0) => {
                    debug!("client closed the connection");
                    return DisconnectReason::PeerClosed;
                }
                Ok(n) => buffer.advance(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    error!(error = %err, "failed to read from client");
                    return DisconnectReason::ReadFailed;
                }
            }
        }
    }
}
