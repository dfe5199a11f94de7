//! ### English
//! Producer-side slot selection for `acquire_for_render`.
//!
//! Strategy:
//! - Fast path: lowest-index FREE slot.
//! - Grow: allocate a new slot while live slots < capacity.
//! - Frame dropping: recycle the oldest READY slot (its frame is superseded).
//! - Otherwise: nothing available, the caller blocks (queueing) or reports `WouldBlock`.
//!
//! ### 中文
//! `acquire_for_render` 的生产者侧槽位选择。
//!
//! 策略：
//! - 快路径：索引最小的 FREE 槽位。
//! - 扩容：存活槽位数小于容量时分配新槽位。
//! - 丢帧：回收最旧的 READY 槽位（其帧已被取代）。
//! - 否则：无可用槽位，调用方阻塞（排队策略）或返回 `WouldBlock`。

use std::sync::Arc;

use crate::engine::buffer::BufferAllocator;
use crate::engine::error::Result;

use super::super::{Policy, SlotState};
use super::{Grant, OwnershipLedger};

impl OwnershipLedger {
    /// ### English
    /// Tries to hand a slot to a producer without blocking.
    ///
    /// Returns `Ok(None)` when the caller has to wait for a reclaim, a capacity increase or a
    /// policy change. Allocation failures are propagated unchanged.
    ///
    /// ### 中文
    /// 尝试在不阻塞的情况下把一个槽位交给生产者。
    ///
    /// 当调用方必须等待回收、扩容或策略变化时返回 `Ok(None)`；分配失败会原样向上传递。
    pub(in crate::engine::queue) fn try_acquire_for_render(
        &mut self,
        allocator: &Arc<dyn BufferAllocator>,
    ) -> Result<Option<Grant>> {
        self.ensure_open()?;

        loop {
            if let Some(slot) = self.first_free_slot() {
                self.transition(slot, SlotState::Free, SlotState::ClientOwned)?;
                self.debug_check_invariants();
                return Ok(self.grant(slot));
            }

            if let Some(slot) = self.create_slot(allocator)? {
                self.transition(slot, SlotState::Free, SlotState::ClientOwned)?;
                self.debug_check_invariants();
                return Ok(self.grant(slot));
            }

            if self.policy != Policy::FrameDropping || !self.recycle_oldest_ready()? {
                return Ok(None);
            }
        }
    }

    fn first_free_slot(&self) -> Option<usize> {
        self.slots.iter().enumerate().find_map(|(index, entry)| {
            entry
                .as_ref()
                .filter(|entry| entry.state == SlotState::Free)
                .map(|_| index)
        })
    }

    /// ### English
    /// Drops the oldest unconsumed frame back to FREE (or retires its slot).
    ///
    /// ### 中文
    /// 将最旧的未消费帧退回 FREE（或使其槽位退役）。
    fn recycle_oldest_ready(&mut self) -> Result<bool> {
        let Some(slot) = self.ready.pop_front() else {
            return Ok(false);
        };

        self.transition(slot, SlotState::Ready, SlotState::Free)?;
        log::debug!(
            "queue {}: dropped unconsumed frame in slot {slot} for producer",
            self.queue_id
        );
        self.settle_free(slot);
        Ok(true)
    }
}
