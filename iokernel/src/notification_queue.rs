//! Notification Queue
//!
//! Wakes tasks that wait for a pipe to change. A writer calls `notify` after
//! appending data or closing; a reader that found nothing to read waits.
//!
//! The reader's check and its registration as a waiter must be atomic,
//! otherwise a notification sent between the two is lost and the reader
//! sleeps forever. Take the lock first, check again, then wait:
//!
//! ```ignore
//! let lock = queue.get_lock();
//! if should_wait() {
//!     queue.wait_async(pipe_id, "reader", lock).await;
//!     // the lock is consumed and released before awaiting
//! }
//! ```

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use crate::idgen::HandleId;

/// Value passed along with a notification: a byte count, or a negative errno
pub type Signal = i64;

struct WaitingClient {
    sender: tokio::sync::oneshot::Sender<Signal>,
    debug_hint: String,
}

pub struct InnerState {
    whitelist: HashMap<HandleId, String>,
    waiting_clients: HashMap<HandleId, Vec<WaitingClient>>,
}

impl InnerState {
    fn new() -> Self {
        Self {
            whitelist: HashMap::new(),
            waiting_clients: HashMap::new(),
        }
    }
}

/// Thread-safe queue of pipe notifications
#[derive(Clone)]
pub struct NotificationQueueArc {
    inner: Arc<Mutex<InnerState>>,
}

impl NotificationQueueArc {
    #[must_use]
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(InnerState::new())),
        }
    }

    /// Get the lock for atomic condition-check + register operations
    pub fn get_lock(&self) -> parking_lot::MutexGuard<'_, InnerState> {
        self.inner.lock()
    }

    /// Allow waiting on `id`
    pub fn whitelist(&self, id: HandleId, debug_hint: &str) {
        let mut state = self.inner.lock();
        if let Some(old_hint) = state.whitelist.insert(id, debug_hint.to_string()) {
            log::warn!("queue.whitelist: {id:?} already in whitelist (was: '{old_hint}')");
        }
    }

    /// Forbid waiting on `id` and wake everyone waiting on it with `-1`
    pub fn unlist(&self, id: HandleId) {
        let mut state = self.inner.lock();
        if state.whitelist.remove(&id).is_none() {
            log::warn!("queue.unlist: {id:?} not in whitelist");
        }
        drop(state);
        self.notify(id, -1);
    }

    /// Wake all tasks waiting on `id`
    pub fn notify(&self, id: HandleId, arg: Signal) {
        let waiters = self
            .inner
            .lock()
            .waiting_clients
            .remove(&id)
            .unwrap_or_default();

        log::debug!("queue.notify: {id:?}, arg={arg}, waiters: {}", waiters.len());
        for waiter in waiters {
            if waiter.sender.send(arg).is_err() {
                log::debug!(
                    "queue.notify: waiter for {id:?} is gone (hint: {})",
                    waiter.debug_hint
                );
            }
        }
    }

    /// Wait for the next notification on `id`
    ///
    /// Precondition: the caller holds the lock from `get_lock`.
    /// Post-condition: the lock is released when this returns.
    ///
    /// Resolves immediately if `id` is not whitelisted.
    pub fn wait_async(
        &self,
        id: HandleId,
        debug_hint: &str,
        mut lock: parking_lot::MutexGuard<'_, InnerState>,
    ) -> impl std::future::Future<Output = Signal> + Send {
        let (tx, rx) = tokio::sync::oneshot::channel();

        if lock.whitelist.contains_key(&id) {
            lock.waiting_clients
                .entry(id)
                .or_default()
                .push(WaitingClient {
                    sender: tx,
                    debug_hint: debug_hint.to_string(),
                });
            drop(lock);
        } else {
            drop(lock);
            let _ = tx.send(-1);
        }

        // The sender is only dropped unsent if the whole queue is dropped
        async move { rx.await.unwrap_or(-1) }
    }
}
