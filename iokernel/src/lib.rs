//! Non-blocking handles with completion dispatch onto a single event loop

pub mod completion;
pub mod config;
pub mod error_mapping;
pub mod event_loop;
pub mod handle;
pub mod idgen;
pub mod mem_handle;
pub mod notification_queue;
pub mod pipe;
pub mod reading;
pub mod stream_handle;

pub use completion::{IoError, WriteCallback, WriteCompletion, WriteError};
pub use config::{ConfigError, KernelConfig};
pub use event_loop::{EventLoop, LoopHandle, Task};
pub use handle::{
    is_congested, Handle, HandleContext, HandleError, PassedHandle, ResourceKind, WriteStatus,
};
pub use idgen::{HandleId, IdGen};
pub use mem_handle::{mem_pipe_pair, MemPipeHandle};
pub use reading::{ReadCallback, ReadChunk};
pub use stream_handle::StreamHandle;
