//! ### English
//! Bitflags controlling optional queue behaviors at creation time.
//!
//! These are passed through the C ABI as a `u32` bitmask.
//!
//! ### 中文
//! 在创建时控制队列可选行为的位标志（bitflags）。
//!
//! 通过 C ABI 以 `u32` 位掩码传入。

/// ### English
/// Start with the frame-dropping policy (swap interval 0) instead of queueing.
///
/// ### 中文
/// 以丢帧策略（交换间隔 0）而非排队策略启动。
pub const XIAN_BUFFER_QUEUE_FLAG_FRAME_DROPPING: u32 = 1 << 0;

/// ### English
/// Allocate every buffer at creation (and on every capacity increase) instead of lazily.
///
/// ### 中文
/// 在创建时（以及每次扩容时）分配全部缓冲区，而不是按需惰性分配。
pub const XIAN_BUFFER_QUEUE_FLAG_PREALLOCATE: u32 = 1 << 1;

/// ### English
/// Report compositor activity through `log` (`LoggingCompositorReport`).
///
/// ### 中文
/// 通过 `log` 报告合成器活动（`LoggingCompositorReport`）。
pub const XIAN_BUFFER_QUEUE_FLAG_LOG_REPORT: u32 = 1 << 2;

pub(crate) fn has(flags: u32, flag: u32) -> bool {
    flags & flag != 0
}
