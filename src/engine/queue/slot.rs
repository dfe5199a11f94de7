use crate::engine::buffer::Buffer;
use crate::engine::fence::Fence;

use super::SlotState;

/// ### English
/// Bookkeeping record for one live buffer.
///
/// ### 中文
/// 单个存活缓冲区的账目记录。
pub(super) struct BufferSlot {
    /// ### English
    /// Shared handle to the buffer; the slot is the canonical owner for bookkeeping.
    ///
    /// ### 中文
    /// 缓冲区的共享句柄；槽位是记账意义上的规范持有者。
    pub(super) buffer: Buffer,
    pub(super) state: SlotState,
    /// ### English
    /// Fence attached at submission; cleared when the compositor releases the slot.
    ///
    /// ### 中文
    /// 提交时附加的 fence；合成器释放槽位时清空。
    pub(super) pending_fence: Option<Fence>,
    /// ### English
    /// Submission sequence number of the frame currently held by this slot.
    ///
    /// ### 中文
    /// 该槽位当前所持帧的提交序号。
    pub(super) age: u64,
    /// ### English
    /// Sequence number of the current lease (0 while free or ready).
    ///
    /// ### 中文
    /// 当前租约的序号（空闲或 ready 时为 0）。
    pub(super) lease: u64,
}

impl BufferSlot {
    pub(super) fn new(buffer: Buffer) -> Self {
        Self {
            buffer,
            state: SlotState::Free,
            pending_fence: None,
            age: 0,
            lease: 0,
        }
    }
}
