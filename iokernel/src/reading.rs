//! Read subscriptions shared by the concrete handles
//!
//! Workers push chunks into a stash and post a drain task; the drain runs on
//! the loop and feeds the stash to the armed handler. A stopped subscription
//! keeps its stash, so nothing read before `stop_reading` is lost.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::trace;

use crate::completion::IoError;
use crate::event_loop::{ActiveGuard, LoopHandle};
use crate::handle::PassedHandle;
use crate::idgen::HandleId;

/// Data delivered to a read handler
///
/// An empty chunk without a passed handle is end-of-stream.
#[derive(Default)]
pub struct ReadChunk {
    pub data: Vec<u8>,
    pub passed: Option<PassedHandle>,
}

impl ReadChunk {
    #[must_use]
    pub fn data(data: Vec<u8>) -> Self {
        Self { data, passed: None }
    }

    #[must_use]
    pub fn eof() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_eof(&self) -> bool {
        self.data.is_empty() && self.passed.is_none()
    }
}

impl fmt::Debug for ReadChunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadChunk")
            .field("len", &self.data.len())
            .field("passed", &self.passed.as_ref().map(|h| h.id()))
            .finish()
    }
}

pub type ReadCallback = Box<dyn FnMut(Result<ReadChunk, IoError>) + Send>;

struct ReadInner {
    generation: u64,
    handler: Option<ReadCallback>,
    stash: VecDeque<Result<ReadChunk, IoError>>,
    reading: bool,
    /// EOF or an error was delivered; the stream has nothing more
    ended: bool,
    closed: bool,
    active: Option<ActiveGuard>,
}

#[derive(Clone)]
pub(crate) struct ReadState {
    handle: HandleId,
    inner: Arc<Mutex<ReadInner>>,
    loop_handle: LoopHandle,
    /// Tells the worker whether to read
    armed: Arc<watch::Sender<bool>>,
}

impl ReadState {
    pub(crate) fn new(handle: HandleId, loop_handle: LoopHandle) -> Self {
        let (armed, _) = watch::channel(false);
        Self {
            handle,
            inner: Arc::new(Mutex::new(ReadInner {
                generation: 0,
                handler: None,
                stash: VecDeque::new(),
                reading: false,
                ended: false,
                closed: false,
                active: None,
            })),
            loop_handle,
            armed: Arc::new(armed),
        }
    }

    pub(crate) fn armed(&self) -> watch::Receiver<bool> {
        self.armed.subscribe()
    }

    pub(crate) fn is_reading(&self) -> bool {
        self.inner.lock().reading
    }

    /// Install (or replace) the handler and resume delivery
    pub(crate) fn arm(&self, handler: ReadCallback) {
        let drain = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.generation += 1;
            inner.handler = Some(handler);
            inner.reading = true;
            let open = !inner.ended || !inner.stash.is_empty();
            if inner.active.is_none() && open {
                inner.active = Some(self.loop_handle.active_guard());
            }
            !inner.stash.is_empty()
        };
        trace!(handle = ?self.handle, "read armed");
        self.armed.send_replace(true);
        if drain {
            self.post_drain();
        }
    }

    /// Stop delivery; stashed chunks wait for the next `arm`
    pub(crate) fn disarm(&self) {
        let (handler, active) = {
            let mut inner = self.inner.lock();
            if !inner.reading {
                return;
            }
            inner.generation += 1;
            inner.reading = false;
            (inner.handler.take(), inner.active.take())
        };
        self.armed.send_replace(false);
        trace!(handle = ?self.handle, "read disarmed");
        drop(handler);
        drop(active);
    }

    /// Stop for good and drop everything not yet delivered
    pub(crate) fn close(&self) {
        let (handler, stash, active) = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.generation += 1;
            inner.reading = false;
            (
                inner.handler.take(),
                std::mem::take(&mut inner.stash),
                inner.active.take(),
            )
        };
        self.armed.send_replace(false);
        drop(handler);
        drop(stash);
        drop(active);
    }

    /// Called by workers for each chunk, in arrival order
    pub(crate) fn push(&self, item: Result<ReadChunk, IoError>) {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.stash.push_back(item);
        }
        self.post_drain();
    }

    fn post_drain(&self) {
        let state = self.clone();
        self.loop_handle.dispatch(Box::new(move || state.drain()));
    }

    /// Runs on the loop
    fn drain(&self) {
        loop {
            let (mut handler, item, generation) = {
                let mut inner = self.inner.lock();
                if !inner.reading {
                    return;
                }
                // taken by a drain further up the stack
                let Some(handler) = inner.handler.take() else {
                    return;
                };
                let Some(item) = inner.stash.pop_front() else {
                    inner.handler = Some(handler);
                    return;
                };
                (handler, item, inner.generation)
            };

            let terminal = match &item {
                Ok(chunk) => chunk.is_eof(),
                Err(_) => true,
            };
            handler(item);

            let released = {
                let mut inner = self.inner.lock();
                if terminal {
                    inner.ended = true;
                }
                if inner.generation == generation {
                    inner.handler = Some(handler);
                    if terminal {
                        inner.active.take()
                    } else {
                        None
                    }
                } else {
                    // re-armed or stopped from inside the handler
                    drop(handler);
                    if terminal && inner.stash.is_empty() {
                        inner.active.take()
                    } else {
                        None
                    }
                }
            };
            drop(released);
        }
    }
}

/// Wait until the subscription is armed; `false` when the handle closed
pub(crate) async fn wait_armed(
    armed: &mut watch::Receiver<bool>,
    closed: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        biased;
        _ = closed.wait_for(|c| *c) => false,
        res = armed.wait_for(|a| *a) => res.is_ok(),
    }
}
