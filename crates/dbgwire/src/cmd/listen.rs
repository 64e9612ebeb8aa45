use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, PoisonError};

use dbgwire_frame::{FrameConfig, CATEGORY_STDOUT};
use dbgwire_session::{DebugTransport, SessionHandler, TransportConfig};
use dbgwire_transport::Endpoint;
use serde_json::Value;
use tracing::{debug, info};

use crate::cmd::ListenArgs;
use crate::exit::{session_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

enum Inbound {
    Message(Value),
    Disconnected,
    Interrupted,
}

/// Forwards transport callbacks to the command loop.
struct Forward {
    tx: Mutex<Sender<Inbound>>,
}

impl Forward {
    fn send(&self, event: Inbound) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = tx.send(event);
    }
}

impl SessionHandler for Forward {
    fn on_client_message(&self, message: Value) {
        self.send(Inbound::Message(message));
    }

    fn on_client_connection_changed(&self, connected: bool) {
        if !connected {
            self.send(Inbound::Disconnected);
        }
    }
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let listener = Endpoint::parse(&args.endpoint)
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;
    let local = listener.local_endpoint();
    info!(endpoint = %local, transport = listener.transport_name(), "listening");

    let (tx, rx) = mpsc::channel();
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), tx.clone(), local)?;

    let config = TransportConfig {
        frame: FrameConfig {
            max_buffer_capacity: args.max_message_size,
            ..FrameConfig::default()
        },
    };
    let transport = DebugTransport::with_config(
        Arc::new(Forward { tx: Mutex::new(tx) }),
        config,
    );

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let stream = listener
            .accept()
            .map_err(|err| transport_error("accept failed", err))?;
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let peer = stream.peer_label();
        transport
            .attach(stream)
            .map_err(|err| session_error("attach failed", err))?;
        if let Some(greeting) = &args.greeting {
            transport.enqueue_user_message(greeting, CATEGORY_STDOUT);
        }

        loop {
            match rx.recv() {
                Ok(Inbound::Message(message)) => {
                    print_message(&message, &peer, format);
                    printed = printed.saturating_add(1);

                    if args.count.is_some_and(|count| printed >= count) {
                        transport.detach();
                        return Ok(SUCCESS);
                    }
                }
                Ok(Inbound::Disconnected) => break,
                Ok(Inbound::Interrupted) | Err(_) => {
                    transport.detach();
                    return Ok(SUCCESS);
                }
            }
        }

        transport.detach();
        debug!(%peer, "waiting for next client");
    }

    Ok(SUCCESS)
}

/// On Ctrl-C, stop the current session and wake a pending `accept` by
/// connecting to our own endpoint.
fn install_ctrlc_handler(
    running: Arc<AtomicBool>,
    tx: Sender<Inbound>,
    local: Endpoint,
) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        let _ = tx.send(Inbound::Interrupted);
        let _ = local.connect();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
