use crate::error::{MpiError, Result};
use crate::world::status::Status;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::task::JoinHandle;

/// Handle to an outstanding non-blocking operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u32);

impl RequestId {
    /// Value written to guest memory.
    pub fn as_raw(self) -> i32 {
        self.0 as i32
    }

    pub fn from_raw(raw: i32) -> Self {
        Self(raw as u32)
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a finished request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A send was handed off. The status reports this rank as source and the
    /// number of bytes sent.
    Sent { status: Status },
    /// A receive matched; `data` is already truncated to the posted capacity.
    Received { status: Status, data: Vec<u8> },
}

impl Completion {
    pub fn status(&self) -> Status {
        match self {
            Completion::Sent { status } | Completion::Received { status, .. } => *status,
        }
    }
}

/// Pending requests of one world, keyed by a monotonically increasing id.
///
/// Each request is consumed by exactly one wait.
pub(crate) struct RequestArena {
    next_id: AtomicU32,
    pending: Mutex<HashMap<RequestId, JoinHandle<Result<Completion>>>>,
}

impl RequestArena {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU32::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, task: JoinHandle<Result<Completion>>) -> RequestId {
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, task);
        id
    }

    pub fn take(&self, id: RequestId) -> Result<JoinHandle<Result<Completion>>> {
        self.lock()
            .remove(&id)
            .ok_or(MpiError::UnknownRequest { id: id.0 })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Abort and forget every pending request.
    pub fn abort_all(&self) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        for (_, task) in &drained {
            task.abort();
        }
        drained.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, JoinHandle<Result<Completion>>>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for RequestArena {
    fn drop(&mut self) {
        self.abort_all();
    }
}

/// Await a request task, mapping a panic or abort to a transport error.
pub(crate) async fn join_request(
    id: RequestId,
    task: JoinHandle<Result<Completion>>,
) -> Result<Completion> {
    task.await
        .map_err(|e| MpiError::transport(format!("request {id} did not complete: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(bytes: usize) -> Result<Completion> {
        Ok(Completion::Sent {
            status: Status::new(0, 0, bytes),
        })
    }

    #[tokio::test]
    async fn test_ids_are_monotonic_and_single_use() {
        let arena = RequestArena::new();
        let a = arena.insert(tokio::spawn(async { sent(1) }));
        let b = arena.insert(tokio::spawn(async { sent(2) }));
        assert!(b > a);
        assert_eq!(arena.len(), 2);

        let task = arena.take(b).unwrap();
        let done = join_request(b, task).await.unwrap();
        assert_eq!(done.status().bytes, 2);

        assert!(matches!(
            arena.take(b),
            Err(MpiError::UnknownRequest { .. })
        ));
        assert_eq!(arena.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_all() {
        let arena = RequestArena::new();
        let id = arena.insert(tokio::spawn(async {
            std::future::pending::<()>().await;
            sent(0)
        }));
        assert_eq!(arena.abort_all(), 1);
        assert!(arena.take(id).is_err());
    }

    #[tokio::test]
    async fn test_aborted_task_reports_error() {
        let arena = RequestArena::new();
        let id = arena.insert(tokio::spawn(async {
            std::future::pending::<()>().await;
            sent(0)
        }));
        let task = arena.take(id).unwrap();
        task.abort();
        assert!(join_request(id, task).await.is_err());
    }

    #[test]
    fn test_raw_round_trip() {
        let id = RequestId::from_raw(17);
        assert_eq!(id.as_raw(), 17);
        assert_eq!(id.to_string(), "17");
    }
}
