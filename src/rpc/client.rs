//! MessagePack-RPC client for an embedded editor process.
//!
//! `RpcClient` owns the write side of the connection and the correlation
//! table; a background reader task resolves responses and forwards redraw
//! notifications. The client is cheap to clone and every clone shares the
//! same connection, so any number of calls may be in flight at once.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use rmpv::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::redraw::{self, RedrawOp};
use crate::rpc::codec::{self, CodecError, Message};
use crate::rpc::pending::PendingTable;
use crate::rpc::transport::{self, CloseReason, Transport};

/// Notification method carrying screen updates.
pub const REDRAW_METHOD: &str = "redraw";

/// Request id used for sends that expect no reply.
const NO_REPLY_ID: u32 = 0;

/// RPC error types.
///
/// Connection-level failures reach every caller; the rest are local to the
/// call that produced them.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The connection is gone; pending and future calls all fail with this.
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// The editor answered with a non-nil error value.
    #[error("Editor error: {}", editor_message(.0))]
    EditorReported(Value),

    /// A typed wrapper could not narrow the result.
    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch {
        /// Shape the wrapper needed
        expected: &'static str,
        /// What actually arrived
        found: String,
    },

    /// Encoding the request failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Writing the request failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RpcError {
    pub fn type_mismatch(expected: &'static str, found: &Value) -> Self {
        RpcError::TypeMismatch {
            expected,
            found: found.to_string(),
        }
    }
}

/// Neovim reports errors as `[type, message]`; show just the message when
/// that shape is present.
fn editor_message(value: &Value) -> String {
    match value {
        Value::Array(items) if items.len() == 2 => match items[1].as_str() {
            Some(message) => message.to_string(),
            None => value.to_string(),
        },
        Value::String(s) => s.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
        _ => value.to_string(),
    }
}

/// Receiver of decoded redraw batches.
///
/// Called on the reader task: the next frame is not read until
/// `apply_batch` returns, so an implementation sees batches strictly in
/// order and one at a time.
pub trait RedrawHandler: Send + Sync + 'static {
    /// Apply one notification's worth of operations atomically.
    fn apply_batch(&self, ops: Vec<RedrawOp>);

    /// The connection has closed; no more batches will arrive.
    fn connection_closed(&self, _reason: &str) {}
}

/// Connection lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed(String),
}

struct Shared {
    transport: Transport,
    pending: PendingTable,
    next_id: AtomicU32,
    redraw_method: String,
    handler: Option<Arc<dyn RedrawHandler>>,
}

/// MessagePack-RPC client.
///
/// # Example
///
/// ```ignore
/// let (client, _reader) = RpcClient::spawn(stdout, stdin, None);
/// let count = client.call("buffer_line_count", vec![Value::from(1)]).await?;
/// ```
#[derive(Clone)]
pub struct RpcClient {
    shared: Arc<Shared>,
}

impl RpcClient {
    /// Start a client over the given pipes with the default redraw method.
    ///
    /// Returns the client and the reader task handle. Must be called inside
    /// a tokio runtime.
    pub fn spawn<R, W>(
        reader: R,
        writer: W,
        handler: Option<Arc<dyn RedrawHandler>>,
    ) -> (Self, JoinHandle<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::spawn_with_method(reader, writer, REDRAW_METHOD, handler)
    }

    /// Start a client that treats `redraw_method` as the screen-update
    /// channel.
    pub fn spawn_with_method<R, W>(
        reader: R,
        writer: W,
        redraw_method: &str,
        handler: Option<Arc<dyn RedrawHandler>>,
    ) -> (Self, JoinHandle<()>)
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let shared = Arc::new(Shared {
            transport: Transport::new(writer),
            pending: PendingTable::new(),
            next_id: AtomicU32::new(1),
            redraw_method: redraw_method.to_string(),
            handler,
        });

        let reader_shared = Arc::clone(&shared);
        let reader_task = tokio::spawn(async move {
            // Cancels pending calls even if a handler panics mid-batch.
            let mut guard = CloseGuard {
                shared: Arc::clone(&reader_shared),
                reason: None,
            };

            let reason = transport::read_loop(reader, |message| {
                Self::dispatch(&reader_shared, message)
            })
            .await;

            match &reason {
                CloseReason::EndOfStream => info!("Editor closed the connection"),
                other => error!("Editor connection failed: {}", other),
            }
            guard.reason = Some(reason.to_string());
        });

        (Self { shared }, reader_task)
    }

    /// Send `method(params)` and wait for its response.
    ///
    /// The returned future resolves when the matching response arrives or
    /// the connection closes, whichever comes first. There is no timeout.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id();
        let slot = self.shared.pending.register(id)?;
        // Forgets the slot on every early exit, including this future being
        // dropped mid-call.
        let mut guard = SlotGuard {
            pending: &self.shared.pending,
            id,
            armed: true,
        };

        let frame = codec::encode_request(id, method, params)?;
        debug!("-> {} (id {})", method, id);
        self.shared.transport.write(frame).await?;

        let outcome = slot.await;
        guard.armed = false;
        match outcome {
            Ok(outcome) => outcome?.into_result(),
            // Sender dropped without a value: only happens during teardown.
            Err(_) => Err(RpcError::ConnectionClosed(
                self.shared
                    .pending
                    .closed_reason()
                    .unwrap_or_else(|| "request abandoned".to_string()),
            )),
        }
    }

    /// Send `method(params)` without waiting for (or registering) a reply.
    pub async fn notify(&self, method: &str, params: Vec<Value>) -> Result<(), RpcError> {
        if let Some(reason) = self.shared.pending.closed_reason() {
            return Err(RpcError::ConnectionClosed(reason));
        }
        let frame = codec::encode_request(NO_REPLY_ID, method, params)?;
        debug!("-> {} (no reply)", method);
        self.shared.transport.write(frame).await?;
        Ok(())
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        match self.shared.pending.closed_reason() {
            Some(reason) => ConnectionState::Closed(reason),
            None => ConnectionState::Open,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.pending.closed_reason().is_some()
    }

    /// Number of calls awaiting a response.
    pub fn pending_calls(&self) -> usize {
        self.shared.pending.len()
    }

    /// Close the write half and fail every pending call.
    ///
    /// The reader task ends on its own once the editor exits.
    pub async fn close(&self, reason: &str) {
        self.shared.pending.cancel_all(reason);
        if let Err(e) = self.shared.transport.shutdown().await {
            debug!("Closing editor input failed: {}", e);
        }
    }

    /// Allocate the next request id, skipping the no-reply id on wrap.
    fn next_id(&self) -> u32 {
        loop {
            let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
            if id != NO_REPLY_ID {
                return id;
            }
        }
    }

    /// Route one decoded frame. Runs on the reader task.
    fn dispatch(shared: &Shared, message: Message) {
        match message {
            Message::Response { id, error, result } => {
                if id == NO_REPLY_ID {
                    debug!("Dropping reply to no-reply request");
                    return;
                }
                shared.pending.resolve(id, error, result);
            }
            Message::Notification { method, params } => {
                Self::notify_subscribers(shared, &method, params);
            }
        }
    }

    /// Forward the redraw channel to the handler; ignore everything else.
    fn notify_subscribers(shared: &Shared, method: &str, params: Vec<Value>) {
        if method != shared.redraw_method {
            debug!("Ignoring notification {}", method);
            return;
        }
        let Some(handler) = &shared.handler else {
            return;
        };
        let ops = redraw::decode_batch(params);
        handler.apply_batch(ops);
    }
}

/// Removes a call's pending slot unless the call saw its response.
struct SlotGuard<'a> {
    pending: &'a PendingTable,
    id: u32,
    armed: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.pending.forget(self.id);
        }
    }
}

/// Closes the connection when the reader task ends, including by panic.
struct CloseGuard {
    shared: Arc<Shared>,
    reason: Option<String>,
}

impl Drop for CloseGuard {
    fn drop(&mut self) {
        let reason = self
            .reason
            .take()
            .unwrap_or_else(|| "reader task panicked".to_string());
        self.shared.pending.cancel_all(&reason);
        if let Some(handler) = &self.shared.handler {
            handler.connection_closed(&reason);
        }
    }
}
