//! Write completions and asynchronous I/O errors

use std::fmt;
use std::io::ErrorKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::trace;

use crate::error_mapping::{
    errno_name, errno_to_error_kind, error_kind_to_str, io_error_to_errno, EBADF, ECANCELED,
};
use crate::event_loop::{ActiveGuard, LoopHandle};
use crate::handle::PassedHandle;
use crate::idgen::HandleId;

/// Failure reported to a completion or read handler
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IoError {
    /// The handle was closed before the bytes were transmitted
    #[error("handle is closed")]
    Closed,
    /// The operation was abandoned while in flight
    #[error("operation cancelled")]
    Cancelled,
    #[error("{}: {message}", transport_code(.errno))]
    Transport {
        kind: ErrorKind,
        errno: i32,
        message: String,
    },
}

impl IoError {
    #[must_use]
    pub fn from_errno(errno: i32) -> Self {
        let kind = errno_to_error_kind(errno);
        Self::Transport {
            kind,
            errno,
            message: error_kind_to_str(kind).to_string(),
        }
    }

    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Closed => EBADF,
            Self::Cancelled => ECANCELED,
            Self::Transport { errno, .. } => *errno,
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        errno_name(self.errno())
    }
}

impl From<std::io::Error> for IoError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport {
            kind: err.kind(),
            errno: io_error_to_errno(&err),
            message: err.to_string(),
        }
    }
}

fn transport_code(errno: &i32) -> &'static str {
    errno_name(*errno)
}

/// A failed write; a handle passed along with the bytes comes back here
#[derive(thiserror::Error)]
#[error("{error}")]
pub struct WriteError {
    pub error: IoError,
    pub passed: Option<PassedHandle>,
}

impl WriteError {
    #[must_use]
    pub fn new(error: IoError) -> Self {
        Self {
            error,
            passed: None,
        }
    }
}

impl fmt::Debug for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteError")
            .field("error", &self.error)
            .field("passed", &self.passed.as_ref().map(|h| h.id()))
            .finish()
    }
}

/// Handler of one write: the number of bytes written, or why not
pub type WriteCallback = Box<dyn FnOnce(Result<usize, WriteError>) + Send>;

/// One unit of a handle's writes-outstanding counter
///
/// Created when a write is accepted, released exactly once when its
/// completion runs or is dropped.
pub(crate) struct Outstanding {
    counter: Arc<AtomicUsize>,
}

impl Outstanding {
    pub(crate) fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for Outstanding {
    fn drop(&mut self) {
        let _ = self
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    }
}

struct Pending {
    handle: HandleId,
    callback: WriteCallback,
    outstanding: Outstanding,
    active: ActiveGuard,
    loop_handle: LoopHandle,
}

/// Single-use guard for the completion of one write
///
/// `complete` posts the callback to the loop. Dropping the guard without
/// completing it posts `IoError::Cancelled`, so the callback fires exactly
/// once either way.
pub struct WriteCompletion {
    pending: Option<Pending>,
}

impl WriteCompletion {
    /// Accept a write: counts it as outstanding and keeps the loop busy
    pub(crate) fn new(
        handle: HandleId,
        loop_handle: &LoopHandle,
        counter: &Arc<AtomicUsize>,
        callback: WriteCallback,
    ) -> Self {
        Self {
            pending: Some(Pending {
                handle,
                callback,
                outstanding: Outstanding::acquire(counter),
                active: loop_handle.active_guard(),
                loop_handle: loop_handle.clone(),
            }),
        }
    }

    pub fn complete(mut self, result: Result<usize, WriteError>) {
        if let Some(pending) = self.pending.take() {
            Self::fire(pending, result);
        }
    }

    fn fire(pending: Pending, result: Result<usize, WriteError>) {
        let Pending {
            handle,
            callback,
            outstanding,
            active,
            loop_handle,
        } = pending;
        trace!(handle = ?handle, ok = result.is_ok(), "write completion posted");
        // If the loop is gone the task is dropped, which still releases the counter
        loop_handle.dispatch(Box::new(move || {
            drop(outstanding);
            callback(result);
            drop(active);
        }));
    }
}

impl Drop for WriteCompletion {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            Self::fire(pending, Err(WriteError::new(IoError::Cancelled)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_loop::EventLoop;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_counter_drops_before_callback() {
        let mut event_loop = EventLoop::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(None));

        let counter_clone = Arc::clone(&counter);
        let seen_clone = Arc::clone(&seen);
        let completion = WriteCompletion::new(
            HandleId::new(1),
            &event_loop.handle(),
            &counter,
            Box::new(move |result| {
                *seen_clone.lock() = Some((counter_clone.load(Ordering::SeqCst), result.is_ok()));
            }),
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        completion.complete(Ok(3));
        event_loop.run_until_idle().await;
        assert_eq!(*seen.lock(), Some((0, true)));
    }

    #[tokio::test]
    async fn test_drop_cancels() {
        let mut event_loop = EventLoop::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(None));

        let seen_clone = Arc::clone(&seen);
        drop(WriteCompletion::new(
            HandleId::new(1),
            &event_loop.handle(),
            &counter,
            Box::new(move |result| {
                *seen_clone.lock() = result.err().map(|e| e.error);
            }),
        ));
        event_loop.run_until_idle().await;
        assert_eq!(*seen.lock(), Some(IoError::Cancelled));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_io_error_codes() {
        assert_eq!(IoError::Closed.code(), "EBADF");
        let err = IoError::from(std::io::Error::new(ErrorKind::BrokenPipe, "peer left"));
        assert_eq!(err.code(), "EPIPE");
        assert_eq!(err.to_string(), "EPIPE: peer left");
    }
}
