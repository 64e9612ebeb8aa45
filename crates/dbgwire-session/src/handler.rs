use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::info;

/// Callbacks into the debugger that owns the transport.
///
/// `on_client_connection_changed(true)` runs on the thread calling
/// [`attach`], while that transport holds its lifecycle lock: calling
/// [`detach`] from it ends the session before the pumps start, and calling
/// `attach` from it fails with `AlreadyAttached`.
///
/// The other callbacks run on the transport's pump threads:
/// `on_client_message` on the input pump, `on_client_connection_changed(false)`
/// on whichever pump sees the session end. Calling [`detach`] (or dropping
/// the last handle to the transport) from them ends the session without
/// joining the calling pump, which exits once the callback returns.
///
/// [`attach`]: crate::DebugTransport::attach
/// [`detach`]: crate::DebugTransport::detach
pub trait SessionHandler: Send + Sync {
    /// A well-formed message arrived from the client. Called in arrival order.
    fn on_client_message(&self, message: Value);

    /// The client connected (`true`, once per attach) or went away (`false`,
    /// at most once per attach).
    fn on_client_connection_changed(&self, connected: bool);
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `detach` fired the shutdown signal.
    Shutdown,
    /// The client closed the connection or hung up.
    PeerClosed,
    /// Waiting for or receiving input failed.
    ReadFailed,
    /// Sending a message failed.
    WriteFailed,
    /// The receive buffer could not grow.
    BufferExhausted,
    /// A pump could not be started.
    SetupFailed,
}

/// Per-session guard delivering the disconnect callback exactly once.
pub(crate) struct DisconnectNotifier {
    handler: Arc<dyn SessionHandler>,
    connected: Arc<AtomicBool>,
    reported: AtomicBool,
}

impl DisconnectNotifier {
    pub(crate) fn new(handler: Arc<dyn SessionHandler>, connected: Arc<AtomicBool>) -> Self {
        Self {
            handler,
            connected,
            reported: AtomicBool::new(false),
        }
    }

    /// Report the end of the session unless a pump already did.
    pub(crate) fn report(&self, reason: DisconnectReason) {
        if self.reported.swap(true, Ordering::AcqRel) {
            return;
        }
        self.connected.store(false, Ordering::SeqCst);
        info!(?reason, "client disconnected");
        self.handler.on_client_connection_changed(false);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Changes(Mutex<Vec<bool>>);

    impl SessionHandler for Changes {
        fn on_client_message(&self, _message: Value) {}

        fn on_client_connection_changed(&self, connected: bool) {
            self.0.lock().unwrap().push(connected);
        }
    }

    #[test]
    fn reports_only_once() {
        let changes = Arc::new(Changes::default());
        let connected = Arc::new(AtomicBool::new(true));
        let notifier = DisconnectNotifier::new(changes.clone(), connected.clone());

        notifier.report(DisconnectReason::WriteFailed);
        notifier.report(DisconnectReason::PeerClosed);
        notifier.report(DisconnectReason::Shutdown);

        assert_eq!(*changes.0.lock().unwrap(), vec![false]);
        assert!(!connected.load(Ordering::SeqCst));
    }

    #[test]
    fn concurrent_reports_deliver_one_callback() {
        let changes = Arc::new(Changes::default());
        let notifier = Arc::new(DisconnectNotifier::new(
            changes.clone(),
            Arc::new(AtomicBool::new(true)),
        ));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let notifier = Arc::clone(&notifier);
                std::thread::spawn(move || notifier.report(DisconnectReason::PeerClosed))
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        assert_eq!(changes.0.lock().unwrap().len(), 1);
    }
}
