use std::io::{ErrorKind, Write};

use crate::codec::{encode_frame, wrap, Envelope};
use crate::error::{FrameError, Result};

/// Write one already-framed message (payload plus delimiter) in full.
///
/// Retries interrupted writes; any other failure, or a zero-length write,
/// is returned to the caller.
pub fn write_frame<W: Write + ?Sized>(dst: &mut W, frame: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < frame.len() {
        match dst.write(&frame[offset..]) {
            Ok(0) => return Err(FrameError::ConnectionClosed),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }

    loop {
        match dst.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
}

/// Writes complete messages to any `Write` stream (blocking).
pub struct FrameWriter<T> {
    inner: T,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// Frame and send serialized JSON text.
    pub fn send_text(&mut self, text: &str) -> Result<()> {
        write_frame(&mut self.inner, &encode_frame(text))
    }

    /// Wrap `payload` as `message_type`, frame it, and send it.
    pub fn send_envelope(&mut self, payload: Envelope, message_type: &str) -> Result<()> {
        self.send_text(&wrap(payload, message_type))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::protocol::MESSAGE_TYPE_REQUEST;

    #[test]
    fn send_text_appends_delimiter() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_text(r#"{"seq":1}"#).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"{\"seq\":1}\0");
    }

    #[test]
    fn send_envelope_wraps_payload() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let payload = match json!({"seq": 7, "command": "continue"}) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        writer.send_envelope(payload, MESSAGE_TYPE_REQUEST).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(
            wire,
            b"{\"type\":\"request\",\"seq\":7,\"command\":\"continue\"}\0"
        );
    }

    #[test]
    fn messages_are_written_in_order() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.send_text("1").unwrap();
        writer.send_text("2").unwrap();
        writer.send_text("3").unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"1\02\03\0");
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.send_text("{}").unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_short_writes() {
        let mut sink = ChoppyWriter {
            interrupted: false,
            data: Vec::new(),
        };
        write_frame(&mut sink, b"{\"long\":\"enough\"}\0").unwrap();
        assert_eq!(sink.data, b"{\"long\":\"enough\"}\0");
    }

    #[test]
    fn zero_length_write_is_connection_closed() {
        let err = write_frame(&mut ZeroWriter, b"x\0").unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    #[cfg(unix)]
    fn broken_pipe_propagates() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        drop(right);
        let mut writer = FrameWriter::new(left);

        let err = writer.send_text("{}").unwrap_err();
        assert!(matches!(err, FrameError::Io(_)));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Interrupts once, then accepts at most 4 bytes per call.
    struct ChoppyWriter {
        interrupted: bool,
        data: Vec<u8>,
    }

    impl Write for ChoppyWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = buf.len().min(4);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
