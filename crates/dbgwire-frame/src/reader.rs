use std::io::{ErrorKind, Read};

use serde_json::Value;

use crate::buffer::{FrameStatus, ReceiveBuffer};
use crate::codec::FrameConfig;
use crate::error::{FrameError, Result};

/// Reads complete messages from any `Read` stream (blocking).
///
/// This is the client-side counterpart of the session's input pump: it has
/// no shutdown signal, so it is meant for tools and tests that own the
/// stream outright. Malformed frames are logged and skipped.
pub struct FrameReader<T> {
    inner: T,
    buf: ReceiveBuffer,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: ReceiveBuffer::new(config),
        }
    }

    /// Read the next well-formed message.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached, even
    /// if a partial frame was buffered.
    pub fn read_message(&mut self) -> Result<Value> {
        loop {
            match self.buf.try_extract_frame() {
                FrameStatus::Message(value) => return Ok(value),
                FrameStatus::Malformed => continue,
                FrameStatus::Incomplete => {}
            }

            if self.buf.is_full() {
                self.buf.grow()?;
            }

            let read = match self.inner.read(self.buf.spare_mut()) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.advance(read);
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::codec::{as_event, encode_frame};

    fn wire(messages: &[&str]) -> Vec<u8> {
        messages
            .iter()
            .flat_map(|m| encode_frame(m).to_vec())
            .collect()
    }

    #[test]
    fn read_single_message() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[r#"{"seq":1}"#])));
        assert_eq!(reader.read_message().unwrap(), json!({"seq": 1}));
    }

    #[test]
    fn read_multiple_messages() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[
            r#"{"seq":1}"#,
            r#"{"seq":2}"#,
            r#"{"seq":3}"#,
        ])));

        for seq in 1..=3 {
            assert_eq!(reader.read_message().unwrap()["seq"], seq);
        }
    }

    #[test]
    fn byte_by_byte_reassembly() {
        let text = as_event(json!({"reason": "entry"}), "stopped");
        let byte_reader = ByteByByteReader {
            bytes: encode_frame(&text).to_vec(),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let message = reader.read_message().unwrap();
        assert_eq!(message["event"], "stopped");
        assert_eq!(message["body"]["reason"], "entry");
    }

    #[test]
    fn skips_malformed_frame() {
        let mut reader = FrameReader::new(Cursor::new(wire(&["{oops", r#"{"ok":true}"#])));
        assert_eq!(reader.read_message().unwrap(), json!({"ok": true}));
    }

    #[test]
    fn large_message_grows_buffer() {
        let text = json!({"blob": "z".repeat(64 * 1024)}).to_string();
        let cfg = FrameConfig {
            initial_buffer_capacity: 64,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire(&[&text])), cfg);
        let message = reader.read_message().unwrap();
        assert_eq!(message["blob"].as_str().map(str::len), Some(64 * 1024));
    }

    #[test]
    fn oversized_message_rejected() {
        let text = json!({"blob": "z".repeat(256)}).to_string();
        let cfg = FrameConfig {
            initial_buffer_capacity: 16,
            max_buffer_capacity: 64,
        };
        let mut reader = FrameReader::with_config(Cursor::new(wire(&[&text])), cfg);
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { max: 64, .. }));
    }

    #[test]
    fn connection_closed_cleanly() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut reader = FrameReader::new(Cursor::new(br#"{"seq":"#.to_vec()));
        let err = reader.read_message().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[r#"{"ok":1}"#])),
        };
        let mut framed = FrameReader::new(reader);
        assert_eq!(framed.read_message().unwrap(), json!({"ok": 1}));
    }

    #[test]
    fn read_error_propagates() {
        let mut framed = FrameReader::new(FailingReader);
        let err = framed.read_message().unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::ConnectionReset));
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(left);
        let mut reader = FrameReader::new(right);

        writer.send_text(r#"{"command":"threads"}"#).unwrap();
        assert_eq!(reader.read_message().unwrap()["command"], "threads");
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let _ = reader.get_ref();
        let _ = reader.get_mut();
        let _inner = reader.into_inner();
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::ConnectionReset))
        }
    }
}
