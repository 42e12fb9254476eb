//! Acknowledgement id correlation for one connection

use std::collections::HashMap;
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::{Result, SocketIoError};

/// Hands out ack ids and tracks the acks still awaited by local callers
pub struct AckCorrelator {
    next_id: Mutex<i64>,
    pending: Mutex<HashMap<i64, oneshot::Sender<Vec<Value>>>>,
}

impl AckCorrelator {
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a correlator whose first reserved id is `first_id`
    pub fn starting_at(first_id: i64) -> Self {
        Self {
            next_id: Mutex::new(first_id.max(0)),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve the next id, wrapping back to zero once the id space is exhausted
    pub fn reserve(&self) -> Result<i64> {
        let mut next = self.next_id.lock()?;
        let id = *next;
        *next = next.wrapping_add(1);
        if *next < 0 {
            *next = 0;
        }
        Ok(id)
    }

    /// Start waiting for the ack with the given id
    pub fn register(&self, id: i64) -> Result<PendingAck> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock()?.insert(id, tx);
        Ok(PendingAck { id, receiver: rx })
    }

    /// Complete the waiter for `id`. Returns false when nobody was waiting.
    pub fn resolve(&self, id: i64, data: Vec<Value>) -> Result<bool> {
        let waiter = self.pending.lock()?.remove(&id);
        match waiter {
            Some(tx) => {
                // The receiver may already be gone; the ack is still consumed
                let _ = tx.send(data);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stop waiting for `id` without completing it
    pub fn forget(&self, id: i64) -> Result<()> {
        self.pending.lock()?.remove(&id);
        Ok(())
    }

    /// Drop every waiter; their `PendingAck`s resolve to `AckCancelled`
    pub fn cancel_all(&self) -> Result<usize> {
        let mut pending = self.pending.lock()?;
        let count = pending.len();
        pending.clear();
        Ok(count)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or_default()
    }
}

impl Default for AckCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

/// An outstanding acknowledgement for an event sent with `emit_with_ack`
#[derive(Debug)]
pub struct PendingAck {
    id: i64,
    receiver: oneshot::Receiver<Vec<Value>>,
}

impl PendingAck {
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Wait for the peer's ACK data
    pub async fn recv(self) -> Result<Vec<Value>> {
        let id = self.id;
        self.receiver
            .await
            .map_err(|_| SocketIoError::AckCancelled(id))
    }
}
