use std::cell::Cell;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::thread::JoinHandle;

use dbgwire_frame::{as_event, as_user_message, encode_frame, wrap, Envelope, FrameConfig};
use dbgwire_transport::{shutdown_signal, IpcStream, ShutdownTrigger};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, SessionError};
use crate::handler::{DisconnectNotifier, DisconnectReason, SessionHandler};
use crate::input::InputPump;
use crate::output::OutputPump;
use crate::queue::{lock, OutgoingQueue};

const INPUT_THREAD_NAME: &str = "dbgwire-input";
const OUTPUT_THREAD_NAME: &str = "dbgwire-output";

static NEXT_TRANSPORT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Id of the transport whose pump runs on this thread; 0 elsewhere.
    static PUMP_OWNER: Cell<u64> = const { Cell::new(0) };
    /// Transport delivering its connect callback on this thread, and whether
    /// that callback asked to detach.
    static CONNECTING: Cell<Option<(u64, bool)>> = const { Cell::new(None) };
}

/// Transport behavior config.
#[derive(Debug, Clone, Default)]
pub struct TransportConfig {
    /// Receive buffer sizing for the input pump.
    pub frame: FrameConfig,
}

/// Duplex message transport for one debugger client at a time.
///
/// [`attach`](Self::attach) hands over a connected stream and starts an input
/// pump thread (reads, frames, and dispatches client messages to the
/// [`SessionHandler`]) and an output pump thread (writes queued messages).
/// [`detach`](Self::detach) stops both and closes the stream. Dropping the
/// transport detaches.
pub struct DebugTransport {
    id: u64,
    handler: Arc<dyn SessionHandler>,
    config: TransportConfig,
    queue: Arc<OutgoingQueue>,
    connected: Arc<AtomicBool>,
    /// Serializes `attach` and `detach`; held while pumps are joined.
    lifecycle: Mutex<()>,
    attachment: Mutex<Option<Attachment>>,
}

struct Attachment {
    stream: Arc<IpcStream>,
    peer: String,
    trigger: Option<ShutdownTrigger>,
    input: Option<JoinHandle<()>>,
    output: Option<JoinHandle<()>>,
}

impl DebugTransport {
    /// Create a transport reporting to `handler`, with default config.
    pub fn new(handler: Arc<dyn SessionHandler>) -> Self {
        Self::with_config(handler, TransportConfig::default())
    }

    /// Create a transport with explicit config.
    pub fn with_config(handler: Arc<dyn SessionHandler>, config: TransportConfig) -> Self {
        Self {
            id: NEXT_TRANSPORT_ID.fetch_add(1, Ordering::Relaxed),
            handler,
            config,
            queue: Arc::new(OutgoingQueue::new()),
            connected: Arc::new(AtomicBool::new(false)),
            lifecycle: Mutex::new(()),
            attachment: Mutex::new(None),
        }
    }

    /// Start a session on `stream`.
    ///
    /// Reports `on_client_connection_changed(true)` on the calling thread
    /// before the pumps start. A `detach` from inside that callback ends the
    /// session before any pump is started. Fails if a client is already
    /// attached (detach first), or if the shutdown signal or a pump thread
    /// cannot be created; without those the session could not be shut down
    /// in order.
    pub fn attach(&self, stream: IpcStream) -> Result<()> {
        if self.is_connecting_here() {
            error!("attach called from the connect callback");
            return Err(SessionError::AlreadyAttached);
        }
        let _lifecycle = lock(&self.lifecycle);
        if self.is_attached() {
            error!("attach called while a client is already attached");
            return Err(SessionError::AlreadyAttached);
        }

        let (trigger, watch) = shutdown_signal().inspect_err(|err| {
            error!(error = %err, "failed to open shutdown signal");
        })?;

        let stream = Arc::new(stream);
        let peer = stream.peer_label();
        let notifier = Arc::new(DisconnectNotifier::new(
            Arc::clone(&self.handler),
            Arc::clone(&self.connected),
        ));

        self.queue.reset();
        self.connected.store(true, Ordering::SeqCst);
        info!(%peer, "client attached");
        if ConnectScope::enter(self.id).notify(&*self.handler) {
            info!(%peer, "detach requested while connecting; ending session");
            notifier.report(DisconnectReason::Shutdown);
            self.queue.terminate();
            if let Err(err) = stream.shutdown() {
                debug!(error = %err, "stream shutdown failed");
            }
            return Ok(());
        }

        let input = InputPump {
            stream: Arc::clone(&stream),
            watch,
            handler: Arc::clone(&self.handler),
            notifier: Arc::clone(&notifier),
            config: self.config.frame.clone(),
        };
        let input = match spawn_pump(self.id, INPUT_THREAD_NAME, move || input.run()) {
            Ok(handle) => handle,
            Err(source) => {
                error!(error = %source, "failed to start incoming message pump");
                notifier.report(DisconnectReason::SetupFailed);
                return Err(SessionError::Spawn {
                    pump: "input",
                    source,
                });
            }
        };

        let output = OutputPump {
            sink: SharedStream(Arc::clone(&stream)),
            queue: Arc::clone(&self.queue),
            notifier,
        };
        let output = match spawn_pump(self.id, OUTPUT_THREAD_NAME, move || output.run()) {
            Ok(handle) => handle,
            Err(source) => {
                error!(error = %source, "failed to start outgoing message pump");
                // The input pump reports the disconnect on its way out.
                trigger.fire();
                join_pump(INPUT_THREAD_NAME, input);
                return Err(SessionError::Spawn {
                    pump: "output",
                    source,
                });
            }
        };

        *lock(&self.attachment) = Some(Attachment {
            stream,
            peer,
            trigger: Some(trigger),
            input: Some(input),
            output: Some(output),
        });
        Ok(())
    }

    /// End the current session.
    ///
    /// Fires the shutdown signal, terminates the outgoing queue (pending
    /// messages are dropped), joins the input pump and then the output pump,
    /// and closes the stream. Pumps that already exited because the client
    /// left are simply joined. Does nothing when no client is attached.
    ///
    /// Called from one of this transport's own callbacks (including dropping
    /// the last handle there), the session still ends and the stream is
    /// closed; only the calling pump is left to exit on its own once the
    /// callback returns.
    pub fn detach(&self) {
        if self.is_connecting_here() {
            CONNECTING.with(|slot| slot.set(Some((self.id, true))));
            debug!("detach requested from the connect callback");
            return;
        }

        let Some(_lifecycle) = self.lock_lifecycle_for_detach() else {
            debug!("session is being attached or detached elsewhere; ignoring detach");
            return;
        };
        let Some(mut attachment) = lock(&self.attachment).take() else {
            debug!("detach called with no client attached");
            return;
        };

        if let Some(trigger) = attachment.trigger.take() {
            trigger.fire();
        }

        self.connected.store(false, Ordering::SeqCst);
        self.queue.terminate();

        let current = std::thread::current().id();
        let mut own_pump = false;
        let pumps = [
            (INPUT_THREAD_NAME, attachment.input.take()),
            (OUTPUT_THREAD_NAME, attachment.output.take()),
        ];
        for (name, handle) in pumps {
            let Some(handle) = handle else { continue };
            if handle.thread().id() == current {
                // Dropping the handle lets this pump finish unjoined.
                debug!(thread = name, "detach from own pump; it exits after the callback");
                own_pump = true;
                continue;
            }
            join_pump(name, handle);
        }

        if let Err(err) = attachment.stream.shutdown() {
            debug!(error = %err, "stream shutdown failed");
        }
        if !own_pump && Arc::strong_count(&attachment.stream) != 1 {
            warn!("stream still referenced after pumps exited");
        }
        info!(peer = %attachment.peer, "client detached");
    }

    /// A pump of this transport never blocks on the lifecycle lock: the
    /// holder may be joining that very pump.
    fn lock_lifecycle_for_detach(&self) -> Option<MutexGuard<'_, ()>> {
        if PUMP_OWNER.with(Cell::get) != self.id {
            return Some(lock(&self.lifecycle));
        }
        match self.lifecycle.try_lock() {
            Ok(guard) => Some(guard),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    fn is_connecting_here(&self) -> bool {
        CONNECTING.with(Cell::get).is_some_and(|(owner, _)| owner == self.id)
    }

    /// Whether a stream is attached (pumps may already have exited).
    pub fn is_attached(&self) -> bool {
        lock(&self.attachment).is_some()
    }

    /// Whether outgoing messages are currently accepted: true from attach
    /// until the session ends or `detach` runs.
    pub fn is_client_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Messages queued and not yet picked up by the output pump.
    pub fn pending_messages(&self) -> usize {
        self.queue.len()
    }

    /// Wrap `envelope` as `message_type` and queue it for the client.
    ///
    /// Dropped silently when no client is connected.
    pub fn enqueue_for_client(&self, envelope: Envelope, message_type: &str) {
        self.enqueue_with(|| wrap(envelope, message_type));
    }

    /// Queue an event: `{"type":"event","event":<name>,"body":<body>}`.
    pub fn enqueue_event(&self, body: Value, event_name: &str) {
        self.enqueue_with(|| as_event(body, event_name));
    }

    /// Queue an `output` event that shows `text` in the client console.
    pub fn enqueue_user_message(&self, text: &str, severity: &str) {
        self.enqueue_with(|| as_user_message(text, severity));
    }

    fn enqueue_with(&self, build: impl FnOnce() -> String) {
        if !self.is_client_connected() {
            trace!("no client connected; dropping outgoing message");
            return;
        }

        let frame = encode_frame(&build());
        let len = frame.len();
        if self.queue.push(frame) {
            trace!(len, "queued outgoing message");
        } else {
            trace!(len, "transport terminating; dropping outgoing message");
        }
    }
}

impl Drop for DebugTransport {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for DebugTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebugTransport")
            .field("config", &self.config)
            .field("attached", &self.is_attached())
            .field("connected", &self.is_client_connected())
            .finish()
    }
}

/// Writer half handed to the output pump; reads stay with the input pump.
struct SharedStream(Arc<IpcStream>);

impl Write for SharedStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        (&*self.0).write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        (&*self.0).flush()
    }
}

/// Marks the calling thread as delivering `owner`'s connect callback.
struct ConnectScope {
    previous: Option<(u64, bool)>,
}

impl ConnectScope {
    fn enter(owner: u64) -> Self {
        let previous = CONNECTING.with(|slot| slot.replace(Some((owner, false))));
        Self { previous }
    }

    /// Deliver the connect callback; returns whether it asked to detach.
    fn notify(self, handler: &dyn SessionHandler) -> bool {
        handler.on_client_connection_changed(true);
        CONNECTING.with(Cell::get).is_some_and(|(_, detach)| detach)
    }
}

impl Drop for ConnectScope {
    fn drop(&mut self) {
        CONNECTING.with(|slot| slot.set(self.previous));
    }
}

fn spawn_pump(
    owner: u64,
    name: &'static str,
    body: impl FnOnce() + Send + 'static,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            PUMP_OWNER.with(|slot| slot.set(owner));
            body();
        })
}

fn join_pump(name: &str, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        error!(thread = name, "transport pump panicked");
    }
}
