//! Minimal adapter: accepts one client and answers every request.
//!
//! Run with:
//!   cargo run --example echo-adapter -- 127.0.0.1:4711
//!
//! In another terminal:
//!   cargo run --features cli -- send 127.0.0.1:4711 \
//!     --type request --json '{"seq":1,"command":"threads"}' --wait

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};

use dbgwire::frame::{Envelope, CATEGORY_CONSOLE, MESSAGE_TYPE_RESPONSE};
use dbgwire::session::{DebugTransport, SessionHandler};
use dbgwire::transport::Endpoint;
use serde_json::Value;

enum Inbound {
    Message(Value),
    Closed,
}

struct Forward(Mutex<Sender<Inbound>>);

impl SessionHandler for Forward {
    fn on_client_message(&self, message: Value) {
        let _ = self.0.lock().map(|tx| tx.send(Inbound::Message(message)));
    }

    fn on_client_connection_changed(&self, connected: bool) {
        if !connected {
            let _ = self.0.lock().map(|tx| tx.send(Inbound::Closed));
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let endpoint = Endpoint::parse(
        &std::env::args()
            .nth(1)
            .unwrap_or_else(|| "127.0.0.1:4711".to_string()),
    );
    let listener = endpoint.bind()?;
    eprintln!("Listening on {}", listener.local_endpoint());

    let (tx, rx) = mpsc::channel();
    let transport = DebugTransport::new(Arc::new(Forward(Mutex::new(tx))));

    let stream = listener.accept()?;
    transport.attach(stream)?;
    transport.enqueue_user_message("echo adapter ready\n", CATEGORY_CONSOLE);

    // Callbacks must not call back into the transport, so answers are
    // produced here.
    while let Ok(Inbound::Message(request)) = rx.recv() {
        let mut response = Envelope::new();
        response.insert("request_seq".into(), request["seq"].clone());
        response.insert("success".into(), Value::Bool(true));
        response.insert("command".into(), request["command"].clone());
        response.insert("body".into(), request);
        transport.enqueue_for_client(response, MESSAGE_TYPE_RESPONSE);
    }

    transport.detach();
    eprintln!("Client disconnected");
    Ok(())
}
