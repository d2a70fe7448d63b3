//! Byte-stream plumbing between the client and the editor process.
//!
//! Outgoing frames are queued to a single writer task that owns the
//! editor's input pipe, so a frame is always written whole even if the
//! caller that queued it goes away. Incoming bytes are pumped by
//! [`read_loop`] on a dedicated task, which buffers, decodes, and dispatches
//! frames strictly in arrival order.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::rpc::codec::{self, CodecError, FrameScanner, Message};

/// Size of each read from the editor's output pipe.
const READ_CHUNK: usize = 16 * 1024;

/// Maximum size of one incoming frame (100MB) to prevent OOM from a
/// corrupt length prefix.
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

type Ack = oneshot::Sender<io::Result<()>>;

enum Outbound {
    Frame(Vec<u8>, Ack),
    Shutdown(Ack),
}

/// Handle to the writer task over the editor's input pipe.
pub struct Transport {
    outbound: mpsc::UnboundedSender<Outbound>,
}

impl Transport {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let (outbound, queue) = mpsc::unbounded_channel();
        tokio::spawn(write_loop(writer, queue));
        Self { outbound }
    }

    /// Queue one complete frame and wait until it is flushed.
    ///
    /// Dropping the returned future does not cancel the write: a queued
    /// frame always reaches the pipe in full.
    pub async fn write(&self, frame: Vec<u8>) -> io::Result<()> {
        let (ack, done) = oneshot::channel();
        self.submit(Outbound::Frame(frame, ack), done).await
    }

    /// Shut down the write half (closes the editor's stdin).
    pub async fn shutdown(&self) -> io::Result<()> {
        let (ack, done) = oneshot::channel();
        self.submit(Outbound::Shutdown(ack), done).await
    }

    async fn submit(
        &self,
        item: Outbound,
        done: oneshot::Receiver<io::Result<()>>,
    ) -> io::Result<()> {
        self.outbound.send(item).map_err(|_| writer_stopped())?;
        done.await.unwrap_or_else(|_| Err(writer_stopped()))
    }
}

fn writer_stopped() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "writer task stopped")
}

/// Write queued frames in order until shutdown or the first write error.
async fn write_loop<W>(mut writer: W, mut queue: mpsc::UnboundedReceiver<Outbound>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(item) = queue.recv().await {
        match item {
            Outbound::Frame(frame, ack) => {
                let result = match writer.write_all(&frame).await {
                    Ok(()) => writer.flush().await,
                    Err(e) => Err(e),
                };
                let failed = result.is_err();
                if let Err(e) = &result {
                    debug!("Editor input write failed: {}", e);
                }
                // The caller may have stopped waiting.
                let _ = ack.send(result);
                if failed {
                    break;
                }
            }
            Outbound::Shutdown(ack) => {
                let _ = ack.send(writer.shutdown().await);
                break;
            }
        }
    }
}

/// Why the read loop stopped.
#[derive(Debug)]
pub enum CloseReason {
    /// The editor closed its output stream.
    EndOfStream,
    /// Reading the pipe failed.
    Io(io::Error),
    /// A frame could not be decoded; the stream is unusable.
    Codec(CodecError),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::EndOfStream => write!(f, "end of stream"),
            CloseReason::Io(e) => write!(f, "read failed: {}", e),
            CloseReason::Codec(e) => write!(f, "{}", e),
        }
    }
}

/// Pump `reader` until it ends, handing each decoded message to `dispatch`.
///
/// `dispatch` runs inline, so the next frame is not decoded until the
/// previous one has been fully handled.
pub async fn read_loop<R, F>(mut reader: R, mut dispatch: F) -> CloseReason
where
    R: AsyncRead + Unpin,
    F: FnMut(Message),
{
    let mut buf: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut scanner = FrameScanner::new(MAX_FRAME_SIZE);

    loop {
        let count = match reader.read(&mut chunk).await {
            Ok(0) => {
                if !buf.is_empty() {
                    debug!("Discarding {} bytes of unfinished frame at EOF", buf.len());
                }
                return CloseReason::EndOfStream;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return CloseReason::Io(e),
        };
        buf.extend_from_slice(&chunk[..count]);

        let mut start = 0;
        loop {
            // Only headers are walked until a frame is complete.
            let len = match scanner.scan(&buf[start..]) {
                Ok(len) => len,
                Err(e) if e.is_recoverable() => break,
                Err(e) => return CloseReason::Codec(e),
            };
            let frame = &buf[start..start + len];
            let message = match codec::decode_message(frame, 0) {
                Ok((message, used)) if used == len => message,
                Ok(_) | Err(CodecError::Incomplete) => {
                    return CloseReason::Codec(CodecError::Malformed(
                        "frame boundary mismatch".to_string(),
                    ))
                }
                Err(e) => return CloseReason::Codec(e),
            };
            start += len;
            dispatch(message);
        }

        // Keep the unconsumed tail for the next read.
        buf.drain(..start);
    }
}

/// Drain the editor's diagnostic stream on its own task.
///
/// Every line is logged; nothing on this stream affects the connection.
pub fn drain_diagnostics<R>(stream: R) -> JoinHandle<()>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        warn!(target: "nvim_stderr", "{}", line);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!("Diagnostic stream closed: {}", e);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmpv::Value;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Test timeout to prevent hanging tests.
    const TEST_TIMEOUT: Duration = Duration::from_secs(5);

    fn notification(method: &str) -> Vec<u8> {
        let mut buf = Vec::new();
        rmpv::encode::write_value(
            &mut buf,
            &Value::Array(vec![
                Value::from(2),
                Value::from(method),
                Value::Array(vec![]),
            ]),
        )
        .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_write_is_flushed_whole() {
        let (client, mut server) = tokio::io::duplex(64);
        let transport = Transport::new(client);

        let frame = codec::encode_request(1, "vim_command", vec![Value::from("set nu")]).unwrap();
        let expected = frame.clone();
        let writer = tokio::spawn(async move { transport.write(frame).await });

        let mut received = vec![0u8; expected.len()];
        timeout(TEST_TIMEOUT, server.read_exact(&mut received))
            .await
            .expect("Test timed out")
            .expect("Read failed");
        assert_eq!(received, expected);
        writer.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_read_loop_dispatches_in_order_across_splits() {
        let (mut engine, client) = tokio::io::duplex(8);

        let mut stream = Vec::new();
        for name in ["one", "two", "three"] {
            stream.extend(notification(name));
        }

        let feeder = tokio::spawn(async move {
            // Tiny writes force frames to straddle reads.
            for piece in stream.chunks(3) {
                engine.write_all(piece).await.unwrap();
            }
        });

        let mut seen = Vec::new();
        let reason = timeout(
            TEST_TIMEOUT,
            read_loop(client, |msg| {
                if let Message::Notification { method, .. } = msg {
                    seen.push(method);
                }
            }),
        )
        .await
        .expect("Test timed out");

        feeder.await.unwrap();
        assert!(matches!(reason, CloseReason::EndOfStream));
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_read_loop_stops_on_protocol_violation() {
        let (mut engine, client) = tokio::io::duplex(256);
        let mut bytes = Vec::new();
        rmpv::encode::write_value(&mut bytes, &Value::from("not an envelope")).unwrap();
        bytes.extend(notification("never-seen"));
        engine.write_all(&bytes).await.unwrap();

        let mut count = 0;
        let reason = timeout(TEST_TIMEOUT, read_loop(client, |_| count += 1))
            .await
            .expect("Test timed out");

        assert!(matches!(reason, CloseReason::Codec(CodecError::Protocol(_))));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_dropped_write_still_reaches_the_pipe_whole() {
        let (client, mut server) = tokio::io::duplex(16);
        let transport = Transport::new(client);

        let big = codec::encode_request(1, "vim_command", vec![Value::from("x".repeat(500))])
            .unwrap();
        let small = codec::encode_request(2, "vim_get_current_line", vec![]).unwrap();
        let mut expected = big.clone();
        expected.extend(&small);

        // Abandon the first write while the pipe is still full.
        let abandoned = timeout(Duration::from_millis(20), transport.write(big)).await;
        assert!(abandoned.is_err());

        let second = tokio::spawn(async move { transport.write(small).await });
        let mut received = vec![0u8; expected.len()];
        timeout(TEST_TIMEOUT, server.read_exact(&mut received))
            .await
            .expect("Test timed out")
            .expect("Read failed");
        assert_eq!(received, expected);
        second.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_write_after_shutdown_fails() {
        let (client, _server) = tokio::io::duplex(64);
        let transport = Transport::new(client);
        transport.shutdown().await.unwrap();

        let err = transport.write(notification("late")).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[tokio::test]
    async fn test_read_loop_rejects_oversized_frame_header() {
        let (mut engine, client) = tokio::io::duplex(64);
        // A notification whose method claims to be a 4GB string.
        engine
            .write_all(&[0x93, 0x02, 0xdb, 0xff, 0xff, 0xff, 0xff])
            .await
            .unwrap();

        let mut count = 0;
        let reason = timeout(TEST_TIMEOUT, read_loop(client, |_| count += 1))
            .await
            .expect("Test timed out");

        assert!(matches!(reason, CloseReason::Codec(CodecError::Malformed(_))));
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_drain_diagnostics_finishes_at_eof() {
        let (mut engine, client) = tokio::io::duplex(64);
        let handle = drain_diagnostics(client);
        engine.write_all(b"E5113: some startup error\n").await.unwrap();
        drop(engine);
        timeout(TEST_TIMEOUT, handle)
            .await
            .expect("Test timed out")
            .unwrap();
    }
}
