use clap::{Args, Subcommand};
use std::path::PathBuf;

use dbgwire_frame::{DEFAULT_MAX_BUFFER, MESSAGE_TYPE_REQUEST};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept debugger clients and print the messages they send.
    Listen(ListenArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Listen(args) => listen::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Endpoint to bind: `HOST:PORT` for TCP, anything else is a socket path.
    pub endpoint: String,
    /// Show this text in each client's console when it connects.
    #[arg(long)]
    pub greeting: Option<String>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Largest inbound message to buffer, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_BUFFER)]
    pub max_message_size: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Endpoint to connect to: `HOST:PORT` for TCP, anything else is a socket path.
    pub endpoint: String,
    /// JSON object to send.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    pub json: Option<String>,
    /// Read the JSON object from a file.
    #[arg(long, conflicts_with = "json")]
    pub file: Option<PathBuf>,
    /// Message type written as the envelope's `type` field.
    #[arg(long = "type", value_name = "TYPE", default_value = MESSAGE_TYPE_REQUEST)]
    pub message_type: String,
    /// Wait for one inbound message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
