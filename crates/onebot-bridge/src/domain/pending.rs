//! Pending Call Table - maps correlation IDs to callers awaiting a response.
//!
//! Flow:
//! 1. `BridgeHandle::call` generates a CorrelationId and calls `register()`
//! 2. The request goes out with the id in its `echo` field
//! 3. The inbound router sees a response with that echo and calls `resolve()`
//!    or `reject()`
//! 4. When the link drops, `reject_all()` fails whatever is left
//!
//! Every entry is settled exactly once: whichever of these removes it first
//! wins, later attempts find nothing.

use crate::domain::correlation::CorrelationId;
use crate::domain::error::BridgeError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;

/// What a caller eventually receives.
pub type CallOutcome = Result<Value, BridgeError>;

/// Receiving half handed to the caller on registration.
pub type PendingReceiver = oneshot::Receiver<CallOutcome>;

struct PendingCall {
    sender: oneshot::Sender<CallOutcome>,
    /// Action name (for logging)
    action: String,
    registered_at: Instant,
}

/// Statistics for the pending call table
#[derive(Debug, Default)]
pub struct PendingStats {
    pub total_registered: AtomicU64,
    pub total_resolved: AtomicU64,
    pub total_rejected: AtomicU64,
    /// Settled after the caller had already stopped waiting.
    pub total_abandoned: AtomicU64,
}

#[derive(Default)]
pub struct PendingCallTable {
    pending: DashMap<CorrelationId, PendingCall>,
    stats: PendingStats,
}

impl PendingCallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a call under `id`.
    ///
    /// Returns `None` if the id is already pending; the existing entry is
    /// left untouched.
    pub fn register(&self, id: CorrelationId, action: &str) -> Option<PendingReceiver> {
        match self.pending.entry(id) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.insert(PendingCall {
                    sender: tx,
                    action: action.to_string(),
                    registered_at: Instant::now(),
                });
                self.stats.total_registered.fetch_add(1, Ordering::Relaxed);
                debug!(correlation_id = %id, action, "Registered pending call");
                Some(rx)
            }
        }
    }

    /// Fulfil a pending call. Returns `false` if `id` was not pending.
    pub fn resolve(&self, id: CorrelationId, payload: Value) -> bool {
        self.settle(id, Ok(payload))
    }

    /// Fail a pending call. Returns `false` if `id` was not pending.
    pub fn reject(&self, id: CorrelationId, error: BridgeError) -> bool {
        self.settle(id, Err(error))
    }

    /// Fail every pending call with `error` and empty the table.
    ///
    /// Returns how many calls were rejected.
    pub fn reject_all(&self, error: BridgeError) -> usize {
        let ids: Vec<CorrelationId> = self.pending.iter().map(|entry| *entry.key()).collect();
        ids.into_iter()
            .filter(|id| self.settle(*id, Err(error.clone())))
            .count()
    }

    /// Drop a registration without notifying the caller.
    pub fn cancel(&self, id: &CorrelationId) -> bool {
        self.pending.remove(id).is_some()
    }

    pub fn contains(&self, id: &CorrelationId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn stats(&self) -> &PendingStats {
        &self.stats
    }

    fn settle(&self, id: CorrelationId, outcome: CallOutcome) -> bool {
        let Some((_, call)) = self.pending.remove(&id) else {
            debug!(correlation_id = %id, "No pending call for correlation ID");
            return false;
        };

        let succeeded = outcome.is_ok();
        let elapsed_ms = call.registered_at.elapsed().as_millis();
        if call.sender.send(outcome).is_err() {
            self.stats.total_abandoned.fetch_add(1, Ordering::Relaxed);
            debug!(correlation_id = %id, action = call.action, "Caller stopped waiting");
            return true;
        }

        if succeeded {
            self.stats.total_resolved.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.total_rejected.fetch_add(1, Ordering::Relaxed);
        }
        debug!(
            correlation_id = %id,
            action = call.action,
            succeeded,
            elapsed_ms,
            "Settled pending call"
        );
        true
    }
}

impl std::fmt::Debug for PendingCallTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCallTable")
            .field("pending", &self.pending.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_register_and_resolve() {
        let table = PendingCallTable::new();
        let id = CorrelationId::new();
        let rx = table.register(id, "get_login_info").unwrap();

        assert!(table.contains(&id));
        assert!(table.resolve(id, json!({"user_id": 1})));
        assert!(!table.contains(&id));

        assert_eq!(rx.await.unwrap(), Ok(json!({"user_id": 1})));
        assert_eq!(table.stats().total_resolved.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_reject_delivers_error() {
        let table = PendingCallTable::new();
        let id = CorrelationId::new();
        let rx = table.register(id, "delete_msg").unwrap();

        assert!(table.reject(id, BridgeError::RemoteFailed("no such id".into())));
        assert_eq!(
            rx.await.unwrap(),
            Err(BridgeError::RemoteFailed("no such id".into()))
        );
    }

    #[test]
    fn test_waiter_stays_pending_until_settled() {
        let table = PendingCallTable::new();
        let id = CorrelationId::new();
        let mut waiter = tokio_test::task::spawn(table.register(id, "get_login_info").unwrap());

        tokio_test::assert_pending!(waiter.poll());

        assert!(table.resolve(id, json!(null)));
        assert!(waiter.is_woken());
        tokio_test::assert_ready_eq!(waiter.poll(), Ok(Ok(json!(null))));
    }

    #[test]
    fn test_duplicate_registration_refused() {
        let table = PendingCallTable::new();
        let id = CorrelationId::new();
        let _rx = table.register(id, "a").unwrap();

        assert!(table.register(id, "b").is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_settle_unknown_id_is_noop() {
        let table = PendingCallTable::new();
        assert!(!table.resolve(CorrelationId::new(), json!(null)));
        assert!(!table.reject(CorrelationId::new(), BridgeError::ConnectionLost));
    }

    #[tokio::test]
    async fn test_settles_only_once() {
        let table = PendingCallTable::new();
        let id = CorrelationId::new();
        let rx = table.register(id, "a").unwrap();

        assert!(table.resolve(id, json!(1)));
        assert!(!table.resolve(id, json!(2)));
        assert!(!table.reject(id, BridgeError::ConnectionLost));
        assert_eq!(rx.await.unwrap(), Ok(json!(1)));
    }

    #[tokio::test]
    async fn test_reject_all_empties_table() {
        let table = PendingCallTable::new();
        let receivers: Vec<_> = (0..5)
            .map(|_| table.register(CorrelationId::new(), "send_group_msg").unwrap())
            .collect();

        assert_eq!(table.reject_all(BridgeError::ConnectionLost), 5);
        assert!(table.is_empty());

        for rx in receivers {
            assert_eq!(rx.await.unwrap(), Err(BridgeError::ConnectionLost));
        }
        assert_eq!(table.reject_all(BridgeError::ConnectionLost), 0);
    }

    #[test]
    fn test_abandoned_caller_still_removes_entry() {
        let table = PendingCallTable::new();
        let id = CorrelationId::new();
        drop(table.register(id, "a").unwrap());

        assert!(table.resolve(id, json!(null)));
        assert!(table.is_empty());
        assert_eq!(table.stats().total_abandoned.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_cancel() {
        let table = PendingCallTable::new();
        let id = CorrelationId::new();
        let _rx = table.register(id, "a").unwrap();

        assert!(table.cancel(&id));
        assert!(!table.cancel(&id));
        assert!(table.is_empty());
    }
}
