use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use crate::protocol::{EVENT_OUTPUT, FRAME_DELIMITER, MESSAGE_TYPE_EVENT};

/// Structured message payload. Keys keep insertion order on the wire.
pub type Envelope = Map<String, Value>;

/// Initial receive buffer size: 1 KiB.
pub const DEFAULT_INITIAL_BUFFER: usize = 1024;

/// Default cap on a single buffered message: 16 MiB.
pub const DEFAULT_MAX_BUFFER: usize = 16 * 1024 * 1024;

/// Tag `payload` with `type = message_type` and serialize it.
///
/// `type` is emitted first; a `type` already present in `payload` is
/// replaced.
pub fn wrap(payload: Envelope, message_type: &str) -> String {
    let mut message = Envelope::with_capacity(payload.len() + 1);
    message.insert("type".to_string(), Value::from(message_type));
    for (key, value) in payload {
        if key != "type" {
            message.insert(key, value);
        }
    }
    Value::Object(message).to_string()
}

/// Build an event envelope: `{"type":"event","event":<name>,"body":<body>}`.
pub fn as_event(body: Value, event_name: &str) -> String {
    let mut event = Envelope::with_capacity(2);
    event.insert("event".to_string(), Value::from(event_name));
    event.insert("body".to_string(), body);
    wrap(event, MESSAGE_TYPE_EVENT)
}

/// Build an output event showing `text` in the client console under
/// `severity` (`stdout`, `stderr`, `console`, ...).
pub fn as_user_message(text: &str, severity: &str) -> String {
    let mut body = Envelope::with_capacity(2);
    body.insert("category".to_string(), Value::from(severity));
    body.insert("output".to_string(), Value::from(text));
    as_event(Value::Object(body), EVENT_OUTPUT)
}

/// Append the frame delimiter, producing the exact bytes for the wire.
pub fn encode_frame(text: &str) -> Bytes {
    let mut dst = BytesMut::with_capacity(text.len() + 1);
    dst.put_slice(text.as_bytes());
    dst.put_u8(FRAME_DELIMITER);
    dst.freeze()
}

/// Receive buffer sizing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Capacity allocated on first use. Default: 1 KiB.
    pub initial_buffer_capacity: usize,
    /// Largest capacity the buffer may grow to. Default: 16 MiB.
    pub max_buffer_capacity: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            initial_buffer_capacity: DEFAULT_INITIAL_BUFFER,
            max_buffer_capacity: DEFAULT_MAX_BUFFER,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::protocol::MESSAGE_TYPE_RESPONSE;

    fn object(value: Value) -> Envelope {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn wrap_puts_type_first() {
        let payload = object(json!({"request_seq": 3, "success": true}));
        let text = wrap(payload, MESSAGE_TYPE_RESPONSE);
        assert_eq!(
            text,
            r#"{"type":"response","request_seq":3,"success":true}"#
        );
    }

    #[test]
    fn wrap_replaces_existing_type() {
        let payload = object(json!({"type": "bogus", "seq": 1}));
        let text = wrap(payload, MESSAGE_TYPE_EVENT);
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed["type"], "event");
        assert_eq!(parsed["seq"], 1);
        assert_eq!(text.matches("\"type\"").count(), 1);
    }

    #[test]
    fn event_nests_body() {
        let text = as_event(json!({"reason": "breakpoint", "threadId": 1}), "stopped");
        assert_eq!(
            text,
            r#"{"type":"event","event":"stopped","body":{"reason":"breakpoint","threadId":1}}"#
        );
    }

    #[test]
    fn user_message_matches_wire_shape() {
        let text = as_user_message("Hello", "stdout");
        assert_eq!(
            text,
            r#"{"type":"event","event":"output","body":{"category":"stdout","output":"Hello"}}"#
        );
    }

    #[test]
    fn encode_frame_appends_single_nul() {
        let frame = encode_frame(r#"{"a":1}"#);
        assert_eq!(frame.as_ref(), b"{\"a\":1}\0");
    }

    #[test]
    fn embedded_nul_is_escaped() {
        let text = as_user_message("a\0b", "stderr");
        let frame = encode_frame(&text);
        assert_eq!(frame.iter().filter(|&&b| b == FRAME_DELIMITER).count(), 1);
        assert_eq!(frame.last(), Some(&FRAME_DELIMITER));
    }

    #[test]
    fn default_config() {
        let cfg = FrameConfig::default();
        assert_eq!(cfg.initial_buffer_capacity, 1024);
        assert_eq!(cfg.max_buffer_capacity, 16 * 1024 * 1024);
    }
}
