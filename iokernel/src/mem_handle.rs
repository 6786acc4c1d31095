//! In-process duplex handles over a pair of memory pipes
//!
//! What one end writes, the other end reads. Writes complete synchronously,
//! and handles passed along with the bytes arrive with them.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use charsets::{Charsets, ConvertOptions};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use crate::completion::{IoError, WriteCallback, WriteCompletion, WriteError};
use crate::handle::{Handle, HandleContext, HandleError, PassedHandle, ResourceKind, WriteStatus};
use crate::idgen::HandleId;
use crate::notification_queue::NotificationQueueArc;
use crate::pipe::{self, PipeRead, Rejected};
use crate::reading::{wait_armed, ReadCallback, ReadChunk, ReadState};

pub struct MemPipeHandle {
    id: HandleId,
    ctx: HandleContext,
    outstanding: Arc<AtomicUsize>,
    closed: AtomicBool,
    outgoing: pipe::Writer<PassedHandle>,
    incoming: Mutex<Option<pipe::Reader<PassedHandle>>>,
    read_state: ReadState,
    close_tx: watch::Sender<bool>,
}

/// Two connected handles
#[must_use]
pub fn mem_pipe_pair(ctx: &HandleContext) -> (MemPipeHandle, MemPipeHandle) {
    let queue = NotificationQueueArc::new();
    let a_id = ctx.ids.get_next();
    let b_id = ctx.ids.get_next();
    let (a_writer, b_reader) = pipe::pipe(
        ctx.ids.get_next(),
        queue.clone(),
        &format!("{a_id}->{b_id}"),
        ctx.pipe_capacity,
    );
    let (b_writer, a_reader) = pipe::pipe(
        ctx.ids.get_next(),
        queue,
        &format!("{b_id}->{a_id}"),
        ctx.pipe_capacity,
    );
    debug!(a = ?a_id, b = ?b_id, "memory pipe pair opened");
    (
        MemPipeHandle::new(a_id, ctx, a_writer, a_reader),
        MemPipeHandle::new(b_id, ctx, b_writer, b_reader),
    )
}

impl MemPipeHandle {
    fn new(
        id: HandleId,
        ctx: &HandleContext,
        outgoing: pipe::Writer<PassedHandle>,
        incoming: pipe::Reader<PassedHandle>,
    ) -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            id,
            ctx: ctx.clone(),
            outstanding: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            outgoing,
            incoming: Mutex::new(Some(incoming)),
            read_state: ReadState::new(id, ctx.loop_handle.clone()),
            close_tx,
        }
    }

    fn send(
        &self,
        data: Vec<u8>,
        passed: Option<PassedHandle>,
        callback: WriteCallback,
    ) -> Result<WriteStatus, HandleError> {
        if self.is_closed() {
            return Err(HandleError::Closed);
        }
        let completion =
            WriteCompletion::new(self.id, &self.ctx.loop_handle, &self.outstanding, callback);
        match self.outgoing.write(data, passed) {
            Ok(n) => {
                trace!(handle = ?self.id, n, "memory write");
                completion.complete(Ok(n));
                Ok(WriteStatus::Completed(n))
            }
            Err(Rejected { errno, attachment }) => {
                debug!(handle = ?self.id, errno, "memory write rejected");
                completion.complete(Err(WriteError {
                    error: IoError::from_errno(errno),
                    passed: attachment,
                }));
                Ok(WriteStatus::Queued)
            }
        }
    }
}

impl Handle for MemPipeHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn kind(&self) -> ResourceKind {
        ResourceKind::Memory
    }

    fn charsets(&self) -> &Charsets {
        &self.ctx.charsets
    }

    fn convert_options(&self) -> ConvertOptions {
        self.ctx.convert_options
    }

    fn write(&self, data: Vec<u8>, callback: WriteCallback) -> Result<WriteStatus, HandleError> {
        self.send(data, None, callback)
    }

    fn write_handle(
        &self,
        data: Vec<u8>,
        passed: PassedHandle,
        callback: WriteCallback,
    ) -> Result<WriteStatus, HandleError> {
        self.send(data, Some(passed), callback)
    }

    fn writes_outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn start_reading(&self, callback: ReadCallback) -> Result<(), HandleError> {
        if self.is_closed() {
            return Err(HandleError::Closed);
        }
        self.read_state.arm(callback);
        if let Some(reader) = self.incoming.lock().take() {
            tokio::spawn(pump(
                self.id,
                reader,
                self.read_state.clone(),
                self.close_tx.subscribe(),
                self.ctx.read_chunk_size,
            ));
        }
        Ok(())
    }

    fn stop_reading(&self) {
        self.read_state.disarm();
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(handle = ?self.id, "closing memory handle");
        self.read_state.close();
        self.close_tx.send_replace(true);
        self.outgoing.close();
        drop(self.incoming.lock().take());
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_reading(&self) -> bool {
        self.read_state.is_reading()
    }

    fn supports_handle_passing(&self) -> bool {
        true
    }
}

impl Drop for MemPipeHandle {
    fn drop(&mut self) {
        self.close();
    }
}

async fn pump(
    id: HandleId,
    mut reader: pipe::Reader<PassedHandle>,
    state: ReadState,
    mut closed: watch::Receiver<bool>,
    chunk_size: usize,
) {
    let mut armed = state.armed();
    loop {
        if !wait_armed(&mut armed, &mut closed).await {
            break;
        }
        let next = tokio::select! {
            biased;
            _ = closed.wait_for(|c| *c) => break,
            next = reader.read(chunk_size) => next,
        };
        match next {
            PipeRead::Data { data, attachment } => state.push(Ok(ReadChunk {
                data,
                passed: attachment,
            })),
            PipeRead::Eof => {
                state.push(Ok(ReadChunk::eof()));
                break;
            }
        }
    }
    trace!(handle = ?id, "memory pump finished");
}
