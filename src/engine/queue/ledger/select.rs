//! ### English
//! Consumer-side selection: READY → COMPOSITOR_OWNED.
//!
//! ### 中文
//! 消费者侧选择：READY → COMPOSITOR_OWNED。

use crate::engine::error::Result;

use super::super::{Policy, SlotState};
use super::{Grant, OwnershipLedger, Reclaimed};

/// ### English
/// Result of a successful selection.
///
/// ### 中文
/// 一次成功选择的结果。
pub(in crate::engine::queue) struct Selection {
    pub(in crate::engine::queue) grant: Grant,
    /// ### English
    /// Older READY frames recycled without being shown (frame dropping only).
    ///
    /// ### 中文
    /// 未被显示即被回收的旧 READY 帧数量（仅丢帧策略）。
    pub(in crate::engine::queue) dropped: usize,
    /// ### English
    /// How many of the dropped frames sat above capacity and had their slot destroyed.
    ///
    /// ### 中文
    /// 被丢弃的帧中位于容量之上、其槽位被销毁的数量。
    pub(in crate::engine::queue) retired: usize,
}

impl OwnershipLedger {
    /// ### English
    /// Picks the next frame for composition according to the active policy.
    ///
    /// - `Queueing`: the oldest READY slot (strict FIFO, nothing dropped).
    /// - `FrameDropping`: the newest READY slot; every older READY slot is recycled to FREE
    ///   and never becomes COMPOSITOR_OWNED.
    ///
    /// Returns `Ok(None)` when nothing new was submitted.
    ///
    /// ### 中文
    /// 按当前策略选出下一帧用于合成。
    ///
    /// - `Queueing`：最旧的 READY 槽位（严格 FIFO，不丢帧）。
    /// - `FrameDropping`：最新的 READY 槽位；所有更旧的 READY 槽位被回收为 FREE，
    ///   且永远不会进入 COMPOSITOR_OWNED。
    ///
    /// 没有新提交时返回 `Ok(None)`。
    pub(in crate::engine::queue) fn select_for_composition(&mut self) -> Result<Option<Selection>> {
        self.ensure_open()?;

        let chosen = match self.policy {
            Policy::Queueing => self.ready.pop_front(),
            Policy::FrameDropping => self.ready.pop_back(),
        };
        let Some(slot) = chosen else {
            return Ok(None);
        };

        let mut dropped = 0;
        let mut retired = 0;
        if self.policy == Policy::FrameDropping {
            while let Some(stale) = self.ready.pop_front() {
                self.transition(stale, SlotState::Ready, SlotState::Free)?;
                if self.settle_free(stale) == Reclaimed::Retired {
                    retired += 1;
                }
                dropped += 1;
            }
            if dropped > 0 {
                log::debug!(
                    "queue {}: dropped {dropped} stale frame(s) in favour of slot {slot} \
                     ({retired} retired)",
                    self.queue_id
                );
            }
        }

        self.transition(slot, SlotState::Ready, SlotState::CompositorOwned)?;
        self.debug_check_invariants();
        Ok(self.grant(slot).map(|grant| Selection {
            grant,
            dropped,
            retired,
        }))
    }
}
