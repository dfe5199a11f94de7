/// ### English
/// `xian_buffer_queue` crate root.
/// Exposes the C ABI via `ffi`; the queue and its collaborators live under `engine`.
///
/// ### 中文
/// `xian_buffer_queue` 的 crate 根。
/// 通过 `ffi` 导出 C ABI；队列及其协作者位于 `engine` 模块。
pub mod engine;
mod ffi;

pub use engine::{
    Buffer, BufferHandle, BufferQueue, ClientPort, CompositorPort, Fence, Policy, PolicySelector,
    QueueConfig, QueueError,
};
