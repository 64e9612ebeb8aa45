use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    message_type: &'a str,
    name: &'a str,
    seq: Option<u64>,
    size: usize,
    peer: &'a str,
    message: &'a Value,
    timestamp: String,
}

/// Print one message received from the other side of the wire.
pub fn print_message(message: &Value, peer: &str, format: OutputFormat) {
    let text = message.to_string();
    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                message_type: message_type(message),
                name: message_name(message),
                seq: message.get("seq").and_then(Value::as_u64),
                size: text.len(),
                peer,
                message,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["TYPE", "NAME", "SEQ", "PEER", "MESSAGE"])
                .add_row(vec![
                    message_type(message).to_string(),
                    message_name(message).to_string(),
                    seq_label(message),
                    peer.to_string(),
                    text,
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "type={} name={} seq={} size={} peer={}",
                message_type(message),
                message_name(message),
                seq_label(message),
                text.len(),
                peer,
            );
            println!(
                "{}",
                serde_json::to_string_pretty(message).unwrap_or(text)
            );
        }
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = writeln!(out, "{text}");
            let _ = out.flush();
        }
    }
}

fn message_type(message: &Value) -> &str {
    message.get("type").and_then(Value::as_str).unwrap_or("-")
}

/// Request command or event name, whichever the message carries.
fn message_name(message: &Value) -> &str {
    message
        .get("command")
        .or_else(|| message.get("event"))
        .and_then(Value::as_str)
        .unwrap_or("-")
}

fn seq_label(message: &Value) -> String {
    message
        .get("seq")
        .and_then(Value::as_u64)
        .map_or_else(|| "-".to_string(), |seq| seq.to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
