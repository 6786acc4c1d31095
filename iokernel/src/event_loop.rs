//! Completion dispatch
//!
//! Worker tasks never call user handlers. They post a task into the loop's
//! run queue and the loop runs it, so every handler runs on the task that
//! drives the loop, in posting order.
//!
//! The loop also counts active operations (accepted writes whose completion
//! has not run, armed read subscriptions that have not ended) so that
//! `run_until_idle` knows when nothing more can happen.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Work posted to the loop
pub type Task = Box<dyn FnOnce() + Send>;

enum LoopEvent {
    Dispatch(Task),
    /// An operation ended; re-check idleness
    Wake,
    Stop,
}

/// Cloneable sender side of the loop
#[derive(Clone)]
pub struct LoopHandle {
    tx: mpsc::UnboundedSender<LoopEvent>,
    active: Arc<AtomicUsize>,
}

impl LoopHandle {
    /// Post a task; returns `false` if the loop is gone and the task was dropped
    pub fn dispatch(&self, task: Task) -> bool {
        if self.tx.send(LoopEvent::Dispatch(task)).is_err() {
            debug!("event loop is gone, dropping task");
            return false;
        }
        true
    }

    /// Ask `run` to return after the events already queued
    pub fn stop(&self) {
        let _ = self.tx.send(LoopEvent::Stop);
    }

    #[must_use]
    pub fn active_operations(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Mark an operation as active until the guard is dropped
    #[must_use]
    pub fn active_guard(&self) -> ActiveGuard {
        self.active.fetch_add(1, Ordering::SeqCst);
        ActiveGuard {
            handle: self.clone(),
        }
    }
}

/// Keeps the loop non-idle while alive
pub struct ActiveGuard {
    handle: LoopHandle,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if self.handle.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            let _ = self.handle.tx.send(LoopEvent::Wake);
        }
    }
}

/// The run queue and the code that drains it
pub struct EventLoop {
    rx: mpsc::UnboundedReceiver<LoopEvent>,
    handle: LoopHandle,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    #[must_use]
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            rx,
            handle: LoopHandle {
                tx,
                active: Arc::new(AtomicUsize::new(0)),
            },
        }
    }

    #[must_use]
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Returns `false` on `Stop`
    fn process(event: LoopEvent) -> bool {
        match event {
            LoopEvent::Dispatch(task) => {
                trace!("running task");
                task();
                true
            }
            LoopEvent::Wake => true,
            LoopEvent::Stop => false,
        }
    }

    /// Run until `LoopHandle::stop` or until every handle is gone
    pub async fn run(self) {
        let Self { mut rx, handle } = self;
        // Drop our copy of the sender so the queue closes when all users finish
        drop(handle);

        while let Some(event) = rx.recv().await {
            if !Self::process(event) {
                debug!("event loop stopped");
                return;
            }
        }
        debug!("no more senders, event loop exits");
    }

    /// Run until no operation is active and the queue is empty
    ///
    /// Also returns on `LoopHandle::stop`.
    pub async fn run_until_idle(&mut self) {
        loop {
            while let Ok(event) = self.rx.try_recv() {
                if !Self::process(event) {
                    return;
                }
            }
            if self.handle.active_operations() == 0 {
                trace!("event loop idle");
                return;
            }
            match self.rx.recv().await {
                Some(event) => {
                    if !Self::process(event) {
                        return;
                    }
                }
                None => return,
            }
        }
    }

    /// Run the tasks already queued, without waiting; returns how many ran
    pub fn run_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.rx.try_recv() {
            let is_task = matches!(event, LoopEvent::Dispatch(_));
            if !Self::process(event) {
                break;
            }
            if is_task {
                count += 1;
            }
        }
        count
    }
}
