//! Correlation table for in-flight requests.
//!
//! Each outstanding request owns a oneshot slot keyed by its id. The reader
//! task resolves slots as responses arrive; callers await the receiving half.

use std::collections::HashMap;
use std::sync::Mutex;

use rmpv::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::rpc::client::RpcError;

/// The error/result pair carried by a response frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub error: Value,
    pub result: Value,
}

impl Response {
    /// Split into the call outcome: a non-nil error wins.
    pub fn into_result(self) -> Result<Value, RpcError> {
        if self.error.is_nil() {
            Ok(self.result)
        } else {
            Err(RpcError::EditorReported(self.error))
        }
    }
}

type Slot = oneshot::Sender<Result<Response, RpcError>>;

#[derive(Default)]
struct Inner {
    slots: HashMap<u32, Slot>,
    /// Set once by `cancel_all`; later registrations fail fast.
    closed: Option<String>,
}

/// Pending request slots, owned by one client instance.
#[derive(Default)]
pub struct PendingTable {
    inner: Mutex<Inner>,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a slot for `id`.
    ///
    /// Fails with `ConnectionClosed` once the table has been cancelled, so a
    /// call racing the reader's shutdown cannot wait forever.
    pub fn register(&self, id: u32) -> Result<oneshot::Receiver<Result<Response, RpcError>>, RpcError> {
        let mut inner = self.lock();
        if let Some(reason) = &inner.closed {
            return Err(RpcError::ConnectionClosed(reason.clone()));
        }

        let (tx, rx) = oneshot::channel();
        let previous = inner.slots.insert(id, tx);
        debug_assert!(previous.is_none(), "request id {} registered twice", id);
        Ok(rx)
    }

    /// Complete the slot for `id`. Returns false for a stray id.
    pub fn resolve(&self, id: u32, error: Value, result: Value) -> bool {
        let slot = self.lock().slots.remove(&id);
        match slot {
            Some(tx) => {
                // The caller may have given up (dropped future); that is fine.
                let _ = tx.send(Ok(Response { error, result }));
                true
            }
            None => {
                warn!("Stray response for request {} (no pending call)", id);
                false
            }
        }
    }

    /// Drop the slot for `id` without completing it.
    pub fn forget(&self, id: u32) {
        self.lock().slots.remove(&id);
    }

    /// Fail every pending slot with `ConnectionClosed(reason)` and refuse new
    /// registrations. Idempotent: only the first reason is kept.
    pub fn cancel_all(&self, reason: &str) {
        let drained: Vec<Slot> = {
            let mut inner = self.lock();
            if inner.closed.is_none() {
                inner.closed = Some(reason.to_string());
            }
            inner.slots.drain().map(|(_, tx)| tx).collect()
        };

        if !drained.is_empty() {
            debug!("Cancelling {} pending request(s): {}", drained.len(), reason);
        }
        for tx in drained {
            let _ = tx.send(Err(RpcError::ConnectionClosed(reason.to_string())));
        }
    }

    /// The close reason, if the table has been cancelled.
    pub fn closed_reason(&self) -> Option<String> {
        self.lock().closed.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Slots are only touched under short, non-panicking critical sections,
    // so a poisoned lock still holds a consistent map.
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
