//! In-memory pipe with async coordination via notification queue
//!
//! One writer appends segments, one reader consumes them in order. A segment
//! is a run of bytes with an optional attachment (for handle passing); the
//! attachment travels with the first byte of its segment.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use crate::error_mapping::{EBADF, ENOSPC, EPIPE};
use crate::idgen::HandleId;
use crate::notification_queue::NotificationQueueArc;

struct Segment<A> {
    data: Vec<u8>,
    attachment: Option<A>,
}

struct SharedState<A> {
    segments: VecDeque<Segment<A>>,
    buffered: usize,
    capacity: usize,
    closed: bool,
    reader_gone: bool,
}

/// A write the pipe did not take; the attachment is handed back
pub struct Rejected<A> {
    pub errno: i32,
    pub attachment: Option<A>,
}

impl<A> fmt::Debug for Rejected<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("errno", &self.errno)
            .field("attachment", &self.attachment.is_some())
            .finish()
    }
}

/// Outcome of one read
#[derive(Debug)]
pub enum PipeRead<A> {
    Data { data: Vec<u8>, attachment: Option<A> },
    Eof,
}

/// Writer side of the memory pipe
///
/// Writes append to the shared queue and notify the waiting reader. The
/// notification is sent after the lock is released.
pub struct Writer<A> {
    shared: Arc<Mutex<SharedState<A>>>,
    id: HandleId,
    queue: NotificationQueueArc,
    debug_hint: String,
}

impl<A> Writer<A> {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Append `data` with an optional attachment
    ///
    /// An empty write without attachment returns `Ok(0)` and wakes nobody.
    ///
    /// # Errors
    ///
    /// - `EBADF` if the writer is closed
    /// - `EPIPE` if the reader is gone
    /// - `ENOSPC` if the pipe is full
    pub fn write(&self, data: Vec<u8>, attachment: Option<A>) -> Result<usize, Rejected<A>> {
        let len = data.len();
        {
            let mut shared = self.shared.lock();
            let errno = if shared.closed {
                EBADF
            } else if shared.reader_gone {
                EPIPE
            } else if shared.buffered.saturating_add(len) > shared.capacity {
                ENOSPC
            } else {
                0
            };
            if errno != 0 {
                return Err(Rejected { errno, attachment });
            }
            if len == 0 && attachment.is_none() {
                return Ok(0);
            }
            shared.buffered += len;
            shared.segments.push_back(Segment { data, attachment });
        }

        #[allow(clippy::cast_possible_wrap)]
        self.queue.notify(self.id, len as i64);
        Ok(len)
    }

    /// Close the writer; the reader gets EOF after the buffered data
    pub fn close(&self) {
        {
            let mut shared = self.shared.lock();
            if shared.closed {
                log::debug!("Writer::close() called on already closed writer: {self:?}");
                return;
            }
            shared.closed = true;
        }
        // wakes the reader with -1
        self.queue.unlist(self.id);
    }
}

impl<A> fmt::Debug for Writer<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared.lock();
        write!(
            f,
            "Pipe.Writer(id={:?}, closed={}, buffered={}, hint={})",
            self.id, shared.closed, shared.buffered, self.debug_hint
        )
    }
}

impl<A> Drop for Writer<A> {
    fn drop(&mut self) {
        if !self.is_closed() {
            self.close();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitAction {
    Wait,
    DontWait,
    Closed,
}

/// Reader side of the memory pipe
///
/// `read` takes `&mut self`, so one task reads at a time.
pub struct Reader<A> {
    shared: Arc<Mutex<SharedState<A>>>,
    writer_id: HandleId,
    queue: NotificationQueueArc,
}

impl<A> Reader<A> {
    /// Buffered data is delivered before EOF
    fn should_wait_for_writer(&self) -> WaitAction {
        let shared = self.shared.lock();
        if !shared.segments.is_empty() {
            WaitAction::DontWait
        } else if shared.closed {
            WaitAction::Closed
        } else {
            WaitAction::Wait
        }
    }

    /// See `crate::notification_queue` for the check - lock - check again workflow
    async fn wait_for_writer(&self) {
        let queue_lock = self.queue.get_lock();
        match self.should_wait_for_writer() {
            WaitAction::Wait => {
                self.queue
                    .wait_async(self.writer_id, "reader", queue_lock)
                    .await;
            }
            WaitAction::Closed | WaitAction::DontWait => {
                drop(queue_lock);
            }
        }
    }

    /// Take at most `max` bytes of the next segment, waiting if there is none
    ///
    /// Bytes of one segment are never merged with the next one, so an
    /// attachment always arrives with the bytes written alongside it.
    pub async fn read(&mut self, max: usize) -> PipeRead<A> {
        loop {
            match self.should_wait_for_writer() {
                WaitAction::Wait => {
                    self.wait_for_writer().await;
                    continue;
                }
                WaitAction::Closed => return PipeRead::Eof,
                WaitAction::DontWait => {}
            }

            let mut shared = self.shared.lock();
            let Some(mut segment) = shared.segments.pop_front() else {
                continue;
            };
            if segment.data.len() > max.max(1) {
                let rest = segment.data.split_off(max.max(1));
                shared.segments.push_front(Segment {
                    data: rest,
                    attachment: None,
                });
            }
            shared.buffered -= segment.data.len();
            return PipeRead::Data {
                data: segment.data,
                attachment: segment.attachment,
            };
        }
    }
}

impl<A> fmt::Debug for Reader<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipe.Reader(writer_id={:?})", self.writer_id)
    }
}

impl<A> Drop for Reader<A> {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        shared.reader_gone = true;
        // unread attachments are released here
        shared.segments.clear();
        shared.buffered = 0;
    }
}

/// Create a pipe holding at most `capacity` unread bytes
#[must_use]
pub fn pipe<A>(
    id: HandleId,
    queue: NotificationQueueArc,
    hint: &str,
    capacity: usize,
) -> (Writer<A>, Reader<A>) {
    queue.whitelist(id, &format!("memPipe.writer {hint}"));
    let shared = Arc::new(Mutex::new(SharedState {
        segments: VecDeque::new(),
        buffered: 0,
        capacity,
        closed: false,
        reader_gone: false,
    }));
    let writer = Writer {
        shared: Arc::clone(&shared),
        id,
        queue: queue.clone(),
        debug_hint: hint.to_string(),
    };
    let reader = Reader {
        shared,
        writer_id: id,
        queue,
    };
    (writer, reader)
}
