//! ### English
//! Producer-side submission: CLIENT_OWNED → READY.
//!
//! ### 中文
//! 生产者侧提交：CLIENT_OWNED → READY。

use crate::engine::error::Result;
use crate::engine::fence::Fence;

use super::super::{LeaseToken, SlotState};
use super::OwnershipLedger;

impl OwnershipLedger {
    /// ### English
    /// Admits a rendered slot into the ready sequence and stamps its submission age.
    ///
    /// #### Parameters
    /// - `token`: Current client lease on the slot.
    /// - `fence`: Producer fence for pending GPU work, if any.
    ///
    /// ### 中文
    /// 将渲染完成的槽位加入 ready 序列，并写入其提交序号。
    ///
    /// #### 参数
    /// - `token`：该槽位当前的客户端租约。
    /// - `fence`：尚未完成的 GPU 工作对应的生产者 fence（可选）。
    pub(in crate::engine::queue) fn admit_ready(
        &mut self,
        token: LeaseToken,
        fence: Option<Fence>,
    ) -> Result<u64> {
        self.ensure_open()?;
        self.check_lease(token, SlotState::ClientOwned)?;
        self.transition(token.slot, SlotState::ClientOwned, SlotState::Ready)?;

        let age = self.next_age;
        self.next_age += 1;
        if let Some(entry) = self.slots.get_mut(token.slot).and_then(Option::as_mut) {
            entry.pending_fence = fence;
            entry.age = age;
        }
        self.ready.push_back(token.slot);

        log::trace!(
            "queue {}: slot {} ready (age {age}, {} queued)",
            self.queue_id,
            token.slot,
            self.ready.len()
        );
        self.debug_check_invariants();
        Ok(age)
    }
}
