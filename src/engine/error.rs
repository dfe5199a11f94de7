//! ### English
//! Error taxonomy for the buffer queue and its collaborators.
//!
//! "Nothing new to show" is not an error: compositor polling returns `Ok(None)`.
//!
//! ### 中文
//! 缓冲队列及其协作者的错误分类。
//!
//! “没有新帧可显示”不是错误：合成器轮询返回 `Ok(None)`。

use thiserror::Error;

use super::queue::SlotState;

/// ### English
/// Errors surfaced by the client-facing and compositor-facing ports.
///
/// ### 中文
/// 客户端端口与合成器端口返回的错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// ### English
    /// The queue was closed; every blocked and future operation fails fast with this.
    ///
    /// ### 中文
    /// 队列已关闭；所有阻塞中的及之后的操作都会立即以此失败。
    #[error("buffer queue is closed")]
    Closed,

    /// ### English
    /// Contract violation: the handle is not the current lease of the slot, or the slot is in
    /// the wrong state for the requested edge.
    ///
    /// ### 中文
    /// 契约违例：句柄不是该槽位当前的租约，或槽位状态不满足请求的状态迁移。
    #[error("slot {slot}: expected {expected:?}, found {found:?}")]
    InvalidState {
        slot: usize,
        expected: SlotState,
        found: Option<SlotState>,
    },

    /// ### English
    /// The handle was issued by a different queue.
    ///
    /// ### 中文
    /// 句柄由其它队列签发。
    #[error("handle belongs to queue {handle_queue}, not {queue}")]
    ForeignHandle { queue: u64, handle_queue: u64 },

    /// ### English
    /// The allocator could not produce a buffer while growing the queue.
    ///
    /// ### 中文
    /// 扩容时分配器无法创建缓冲区。
    #[error("buffer allocation failed: {0}")]
    AllocationFailure(#[from] AllocationError),

    /// ### English
    /// Requested capacity is outside `1..=MAX_CAPACITY`.
    ///
    /// ### 中文
    /// 请求的容量不在 `1..=MAX_CAPACITY` 范围内。
    #[error("invalid capacity {0}")]
    InvalidCapacity(usize),

    /// ### English
    /// Non-blocking acquire found no slot available.
    ///
    /// ### 中文
    /// 非阻塞 acquire 未找到可用槽位。
    #[error("no buffer available without blocking")]
    WouldBlock,

    /// ### English
    /// Bounded wait elapsed before a slot became available.
    ///
    /// ### 中文
    /// 在槽位可用之前有界等待已超时。
    #[error("timed out waiting for a free buffer")]
    Timeout,
}

/// ### English
/// Errors reported by a `BufferAllocator`.
///
/// ### 中文
/// `BufferAllocator` 报告的错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("invalid buffer size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error("allocator out of memory")]
    OutOfMemory,
    #[error("allocator backend error: {0}")]
    Backend(String),
}

/// ### English
/// Errors reported by a `FenceSync` collaborator. The queue never interprets them.
///
/// ### 中文
/// `FenceSync` 协作者报告的错误；队列本身从不解释它们。
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceError {
    #[error("fence wait timed out")]
    Timeout,
    #[error("unknown fence {0:#x}")]
    Invalid(u64),
}

/// ### English
/// Errors reported while unpacking an IPC buffer message.
///
/// ### 中文
/// 解包 IPC 缓冲区消息时报告的错误。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IpcError {
    #[error("message is empty")]
    EmptyMessage,
    #[error("message describes buffer {found}, expected {expected}")]
    BufferMismatch { expected: u64, found: u64 },
    #[error("malformed message: {0}")]
    Malformed(&'static str),
}

/// ### English
/// Errors reported while loading a `QueueConfig`.
///
/// ### 中文
/// 加载 `QueueConfig` 时报告的错误。
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid capacity {0}")]
    InvalidCapacity(usize),
    #[error("invalid buffer size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
}

/// ### English
/// Result alias for queue operations.
///
/// ### 中文
/// 队列操作的 Result 别名。
pub type Result<T> = std::result::Result<T, QueueError>;
