//! Handles over tokio byte streams: sockets, files, stdio
//!
//! Each handle owns two worker tasks. The write worker takes requests in
//! submission order and completes them one by one; the read worker idles
//! until the first `start_reading` and pauses whenever reading is stopped.
//! Constructors spawn the workers, so they must be called inside a tokio
//! runtime.

use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use charsets::{Charsets, ConvertOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use crate::completion::{IoError, WriteCallback, WriteCompletion, WriteError};
use crate::handle::{Handle, HandleContext, HandleError, ResourceKind, WriteStatus};
use crate::idgen::HandleId;
use crate::reading::{wait_armed, ReadCallback, ReadChunk, ReadState};

struct WriteRequest {
    data: Vec<u8>,
    completion: WriteCompletion,
}

pub struct StreamHandle {
    id: HandleId,
    kind: ResourceKind,
    ctx: HandleContext,
    outstanding: Arc<AtomicUsize>,
    closed: AtomicBool,
    write_tx: Option<mpsc::UnboundedSender<WriteRequest>>,
    readable: bool,
    read_state: ReadState,
    close_tx: watch::Sender<bool>,
}

impl StreamHandle {
    /// Wrap already-open halves; a missing half makes the handle one-way
    pub fn from_parts<R, W>(
        ctx: &HandleContext,
        kind: ResourceKind,
        reader: Option<R>,
        writer: Option<W>,
    ) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = ctx.ids.get_next();
        let (close_tx, _) = watch::channel(false);
        let read_state = ReadState::new(id, ctx.loop_handle.clone());

        let write_tx = writer.map(|writer| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(write_worker(id, writer, rx, close_tx.subscribe()));
            tx
        });
        let readable = reader.is_some();
        if let Some(reader) = reader {
            tokio::spawn(read_worker(
                id,
                reader,
                read_state.clone(),
                close_tx.subscribe(),
                ctx.read_chunk_size,
            ));
        }
        debug!(
            handle = ?id,
            ?kind,
            readable,
            writable = write_tx.is_some(),
            "stream handle opened"
        );

        Self {
            id,
            kind,
            ctx: ctx.clone(),
            outstanding: Arc::new(AtomicUsize::new(0)),
            closed: AtomicBool::new(false),
            write_tx,
            readable,
            read_state,
            close_tx,
        }
    }

    pub fn from_tcp(ctx: &HandleContext, stream: tokio::net::TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::from_parts(ctx, ResourceKind::Socket, Some(reader), Some(writer))
    }

    #[cfg(unix)]
    pub fn from_unix(ctx: &HandleContext, stream: tokio::net::UnixStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self::from_parts(ctx, ResourceKind::Socket, Some(reader), Some(writer))
    }

    pub fn from_file(ctx: &HandleContext, file: tokio::fs::File) -> Self {
        let (reader, writer) = tokio::io::split(file);
        Self::from_parts(ctx, ResourceKind::File, Some(reader), Some(writer))
    }

    pub fn stdin(ctx: &HandleContext) -> Self {
        let kind = if std::io::stdin().is_terminal() {
            ResourceKind::Tty
        } else {
            ResourceKind::Pipe
        };
        Self::from_parts(ctx, kind, Some(tokio::io::stdin()), None::<tokio::io::Sink>)
    }

    pub fn stdout(ctx: &HandleContext) -> Self {
        let kind = if std::io::stdout().is_terminal() {
            ResourceKind::Tty
        } else {
            ResourceKind::Pipe
        };
        Self::from_parts(ctx, kind, None::<tokio::io::Empty>, Some(tokio::io::stdout()))
    }
}

impl Handle for StreamHandle {
    fn id(&self) -> HandleId {
        self.id
    }

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn charsets(&self) -> &Charsets {
        &self.ctx.charsets
    }

    fn convert_options(&self) -> ConvertOptions {
        self.ctx.convert_options
    }

    fn write(&self, data: Vec<u8>, callback: WriteCallback) -> Result<WriteStatus, HandleError> {
        if self.is_closed() {
            return Err(HandleError::Closed);
        }
        let Some(tx) = self.write_tx.as_ref() else {
            return Err(HandleError::Unsupported("write on a read-only handle"));
        };
        let completion =
            WriteCompletion::new(self.id, &self.ctx.loop_handle, &self.outstanding, callback);
        trace!(handle = ?self.id, len = data.len(), "write queued");
        if let Err(mpsc::error::SendError(request)) = tx.send(WriteRequest { data, completion }) {
            // the worker has already shut down
            request
                .completion
                .complete(Err(WriteError::new(IoError::Closed)));
        }
        Ok(WriteStatus::Queued)
    }

    fn writes_outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    fn start_reading(&self, callback: ReadCallback) -> Result<(), HandleError> {
        if self.is_closed() {
            return Err(HandleError::Closed);
        }
        if !self.readable {
            return Err(HandleError::Unsupported("read on a write-only handle"));
        }
        self.read_state.arm(callback);
        Ok(())
    }

    fn stop_reading(&self) {
        self.read_state.disarm();
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(handle = ?self.id, outstanding = self.writes_outstanding(), "closing stream handle");
        self.read_state.close();
        self.close_tx.send_replace(true);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn is_reading(&self) -> bool {
        self.read_state.is_reading()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

async fn write_worker<W>(
    id: HandleId,
    mut writer: W,
    mut rx: mpsc::UnboundedReceiver<WriteRequest>,
    mut closed: watch::Receiver<bool>,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    loop {
        let request = tokio::select! {
            biased;
            _ = closed.wait_for(|c| *c) => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let WriteRequest { data, completion } = request;
        let result = tokio::select! {
            biased;
            _ = closed.wait_for(|c| *c) => {
                completion.complete(Err(WriteError::new(IoError::Cancelled)));
                break;
            }
            result = async {
                writer.write_all(&data).await?;
                writer.flush().await?;
                Ok::<(), std::io::Error>(())
            } => result,
        };
        match result {
            Ok(()) => completion.complete(Ok(data.len())),
            Err(err) => {
                warn!(handle = ?id, error = %err, "write failed");
                completion.complete(Err(WriteError::new(IoError::from(err))));
            }
        }
    }

    rx.close();
    let mut dropped = 0usize;
    while let Ok(request) = rx.try_recv() {
        request
            .completion
            .complete(Err(WriteError::new(IoError::Closed)));
        dropped += 1;
    }
    if let Err(err) = writer.shutdown().await {
        debug!(handle = ?id, error = %err, "shutdown failed");
    }
    debug!(handle = ?id, dropped, "write worker finished");
}

async fn read_worker<R>(
    id: HandleId,
    mut reader: R,
    state: ReadState,
    mut closed: watch::Receiver<bool>,
    chunk_size: usize,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut armed = state.armed();
    let mut buf = vec![0u8; chunk_size.max(1)];
    loop {
        if !wait_armed(&mut armed, &mut closed).await {
            break;
        }
        let result = tokio::select! {
            biased;
            _ = closed.wait_for(|c| *c) => break,
            result = reader.read(&mut buf) => result,
        };
        match result {
            Ok(0) => {
                trace!(handle = ?id, "end of stream");
                state.push(Ok(ReadChunk::eof()));
                break;
            }
            Ok(n) => state.push(Ok(ReadChunk::data(buf[..n].to_vec()))),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(handle = ?id, error = %err, "read failed");
                state.push(Err(IoError::from(err)));
                break;
            }
        }
    }
    debug!(handle = ?id, "read worker finished");
}
