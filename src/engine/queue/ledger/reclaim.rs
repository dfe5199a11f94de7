//! ### English
//! Consumer-side release: COMPOSITOR_OWNED → FREE (or retired).
//!
//! ### 中文
//! 消费者侧释放：COMPOSITOR_OWNED → FREE（或退役）。

use crate::engine::error::Result;

use super::super::{LeaseToken, SlotState};
use super::OwnershipLedger;

/// ### English
/// What happened to a slot that left compositor ownership.
///
/// ### 中文
/// 离开合成器所有权的槽位的去向。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(in crate::engine::queue) enum Reclaimed {
    /// ### English
    /// Back in the free pool for reuse.
    ///
    /// ### 中文
    /// 回到空闲池等待复用。
    Freed,
    /// ### English
    /// Above the current capacity; the slot was destroyed.
    ///
    /// ### 中文
    /// 位于当前容量之上；槽位已被销毁。
    Retired,
}

impl OwnershipLedger {
    /// ### English
    /// Returns a composited slot to the pool, clearing its fence.
    ///
    /// ### 中文
    /// 将已合成的槽位归还到池中，并清空其 fence。
    pub(in crate::engine::queue) fn reclaim(&mut self, token: LeaseToken) -> Result<Reclaimed> {
        self.ensure_open()?;
        self.check_lease(token, SlotState::CompositorOwned)?;
        self.transition(token.slot, SlotState::CompositorOwned, SlotState::Free)?;

        let outcome = self.settle_free(token.slot);
        self.debug_check_invariants();
        Ok(outcome)
    }
}
