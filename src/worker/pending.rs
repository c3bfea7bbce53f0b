//! Table of requests awaiting a response, keyed by correlation id.

use std::collections::HashMap;

use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use super::error::{WorkerError, WorkerResult};
use super::protocol::WorkerResponse;

/// Completion handle for one outstanding request.
pub type Completion = oneshot::Sender<WorkerResult<WorkerResponse>>;

/// Receiving side handed back to the caller of [`PendingTable::register`].
pub type PendingReceiver = oneshot::Receiver<WorkerResult<WorkerResponse>>;

/// Pending-request table.
///
/// Every id inserted is removed exactly once: by a matching response
/// ([`take`](Self::take)), by the caller giving up ([`remove`](Self::remove)),
/// or by teardown ([`close_with`](Self::close_with)). Once closed, the table
/// refuses new registrations so nothing can be left waiting on a dead
/// connection.
#[derive(Debug, Default)]
pub struct PendingTable {
    inner: Mutex<PendingInner>,
}

#[derive(Debug, Default)]
struct PendingInner {
    entries: HashMap<Uuid, Completion>,
    closed: bool,
}

impl PendingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh random correlation id and register it.
    pub async fn register(&self) -> WorkerResult<(Uuid, PendingReceiver)> {
        self.register_with(Uuid::new_v4).await
    }

    /// Register an id drawn from `next_id`, drawing again while the id is
    /// already pending.
    pub(crate) async fn register_with(
        &self,
        mut next_id: impl FnMut() -> Uuid,
    ) -> WorkerResult<(Uuid, PendingReceiver)> {
        let mut inner = self.inner.lock().await;
        if inner.closed {
            return Err(WorkerError::NotConnected);
        }

        let mut id = next_id();
        while inner.entries.contains_key(&id) {
            tracing::warn!(correlation_id = %id, "correlation id collision, drawing a new one");
            id = next_id();
        }

        let (tx, rx) = oneshot::channel();
        inner.entries.insert(id, tx);
        Ok((id, rx))
    }

    /// Remove and return the completion handle for `id`.
    pub async fn take(&self, id: &Uuid) -> Option<Completion> {
        self.inner.lock().await.entries.remove(id)
    }

    /// Drop the entry for `id` without settling it.
    pub async fn remove(&self, id: &Uuid) -> bool {
        self.inner.lock().await.entries.remove(id).is_some()
    }

    /// Close the table and reject every outstanding entry with the error
    /// produced by `reason`. Returns how many entries were rejected.
    pub async fn close_with(&self, reason: impl Fn() -> WorkerError) -> usize {
        let drained: Vec<Completion> = {
            let mut inner = self.inner.lock().await;
            inner.closed = true;
            inner.entries.drain().map(|(_, tx)| tx).collect()
        };

        let count = drained.len();
        for tx in drained {
            let _ = tx.send(Err(reason()));
        }
        count
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }
}
