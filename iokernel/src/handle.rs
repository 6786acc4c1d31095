//! The handle contract
//!
//! A handle is an open, non-blocking endpoint. Every method returns at once:
//! misuse (closed handle, unknown encoding) fails synchronously, while the
//! outcome of the I/O itself arrives later through the handler, on the loop.
//!
//! ```text
//! Open(not reading) --start_reading--> Open(reading)
//! Open(reading)     --stop_reading---> Open(not reading)
//! any open state    --close----------> Closed (terminal)
//! ```

use std::sync::Arc;

use charsets::{CharsetError, Charsets, ConvertOptions};

use crate::completion::WriteCallback;
use crate::error_mapping::{errno_name, EBADF, EINVAL, ENOTSUP};
use crate::event_loop::LoopHandle;
use crate::idgen::{HandleId, IdGen};
use crate::reading::ReadCallback;

/// A handle travelling along with written bytes
pub type PassedHandle = Arc<dyn Handle>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    File,
    Socket,
    Pipe,
    Tty,
    Memory,
}

/// What `write` knew when it returned
///
/// The callback fires later in both cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStatus {
    /// All bytes were accepted synchronously
    Completed(usize),
    /// The outcome is only known from the callback
    Queued,
}

/// Synchronous failure of a handle operation; nothing was queued
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    #[error("handle is closed")]
    Closed,
    #[error("not supported: {0}")]
    Unsupported(&'static str),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{0}")]
    Charset(#[from] CharsetError),
}

impl HandleError {
    #[must_use]
    pub fn errno(&self) -> i32 {
        match self {
            Self::Closed => EBADF,
            Self::Unsupported(_) => ENOTSUP,
            Self::InvalidArgument(_) => EINVAL,
            Self::Charset(err) => err.errno().errno(),
        }
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Charset(err) => err.code(),
            other => errno_name(other.errno()),
        }
    }
}

/// Everything a handle needs from its surroundings
#[derive(Clone)]
pub struct HandleContext {
    pub loop_handle: LoopHandle,
    pub charsets: Arc<Charsets>,
    pub ids: Arc<IdGen>,
    pub read_chunk_size: usize,
    pub pipe_capacity: usize,
    /// Policy of the text writes
    pub convert_options: ConvertOptions,
}

impl HandleContext {
    #[must_use]
    pub fn new(loop_handle: LoopHandle, charsets: Arc<Charsets>) -> Self {
        Self {
            loop_handle,
            charsets,
            ids: Arc::new(IdGen::new()),
            read_chunk_size: 64 * 1024,
            pipe_capacity: 16 * 1024 * 1024,
            convert_options: ConvertOptions::default(),
        }
    }
}

pub trait Handle: Send + Sync {
    fn id(&self) -> HandleId;

    fn kind(&self) -> ResourceKind;

    /// Registry used by the text writes
    fn charsets(&self) -> &Charsets;

    /// Whether text writes replace or report what the encoding cannot take
    fn convert_options(&self) -> ConvertOptions;

    /// Queue `data`; the callback gets the byte count or the failure
    ///
    /// # Errors
    ///
    /// `Closed` after `close`, `Unsupported` for a read-only handle. Nothing
    /// is queued and the counter is untouched in both cases.
    fn write(&self, data: Vec<u8>, callback: WriteCallback) -> Result<WriteStatus, HandleError>;

    /// Encode `text` (absent encoding means the registry default), then `write`
    ///
    /// # Errors
    ///
    /// As `write`, plus `Charset` for an unknown encoding or a text the
    /// encoding rejects.
    fn write_text(
        &self,
        text: &str,
        encoding: Option<&str>,
        callback: WriteCallback,
    ) -> Result<WriteStatus, HandleError> {
        if self.is_closed() {
            return Err(HandleError::Closed);
        }
        let data = encode_text(self, text, encoding)?;
        self.write(data, callback)
    }

    /// Write and transfer `passed` to the peer
    ///
    /// If the write fails, `passed` comes back in `WriteError::passed`.
    ///
    /// # Errors
    ///
    /// As `write`; `Unsupported` when the handle cannot carry handles.
    fn write_handle(
        &self,
        data: Vec<u8>,
        passed: PassedHandle,
        callback: WriteCallback,
    ) -> Result<WriteStatus, HandleError> {
        let _ = (data, passed, callback);
        if self.is_closed() {
            return Err(HandleError::Closed);
        }
        Err(HandleError::Unsupported("handle passing"))
    }

    /// # Errors
    ///
    /// As `write_text` and `write_handle`.
    fn write_text_handle(
        &self,
        text: &str,
        encoding: Option<&str>,
        passed: PassedHandle,
        callback: WriteCallback,
    ) -> Result<WriteStatus, HandleError> {
        if self.is_closed() {
            return Err(HandleError::Closed);
        }
        if !self.supports_handle_passing() {
            return Err(HandleError::Unsupported("handle passing"));
        }
        let data = encode_text(self, text, encoding)?;
        self.write_handle(data, passed, callback)
    }

    /// Accepted writes whose callback has not run yet
    fn writes_outstanding(&self) -> usize;

    /// Arm `callback` for incoming chunks, replacing any previous handler
    ///
    /// # Errors
    ///
    /// `Closed` after `close`, `Unsupported` for a write-only handle.
    fn start_reading(&self, callback: ReadCallback) -> Result<(), HandleError>;

    /// No handler runs after this returns, until the next `start_reading`
    fn stop_reading(&self);

    /// Release the resource; pending writes complete with an error
    fn close(&self);

    fn is_closed(&self) -> bool;

    fn is_reading(&self) -> bool;

    fn supports_handle_passing(&self) -> bool {
        false
    }
}

fn encode_text<H: Handle + ?Sized>(
    handle: &H,
    text: &str,
    encoding: Option<&str>,
) -> Result<Vec<u8>, HandleError> {
    let name = encoding.unwrap_or("");
    Ok(handle
        .charsets()
        .encode_string_with(text, name, handle.convert_options())?)
}

/// The caller should hold off writing until completions catch up
#[must_use]
pub fn is_congested(handle: &dyn Handle, high_water_mark: usize) -> bool {
    handle.writes_outstanding() >= high_water_mark
}
