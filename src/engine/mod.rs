/// ### English
/// Engine modules: buffers and their allocator, fences, the ownership-tracking queue, and its
/// collaborators (reports, listeners, IPC packing, configuration).
///
/// ### 中文
/// 引擎模块：缓冲区及其分配器、fence、跟踪所有权的队列，以及其协作者
/// （报告、监听器、IPC 打包、配置）。
pub mod buffer;
pub mod config;
mod error;
pub mod fence;
pub mod flags;
pub mod ipc;
pub mod queue;
pub mod registry;
pub mod report;

pub use buffer::{Buffer, BufferAllocator, BufferId, BufferProperties, HeapAllocator};
pub use config::{BufferConfig, QueueConfig};
pub use error::{AllocationError, ConfigError, FenceError, IpcError, QueueError, Result};
pub use fence::{Fence, FenceSync, SignaledFenceSync, SoftwareFenceSync};
pub use queue::{
    BufferHandle, BufferQueue, ClientPort, CompositorPort, LeaseToken, LedgerSnapshot, Policy,
    PolicySelector, SlotSnapshot, SlotState,
};
pub use report::{CompositorId, CompositorReport, LoggingCompositorReport, NullCompositorReport};
