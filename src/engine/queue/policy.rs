//! ### English
//! Selection policy and the runtime switch for policy and buffer count.
//!
//! ### 中文
//! 选择策略，以及策略与缓冲区数量的运行时开关。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::error::Result;

use super::shared::QueueShared;

/// ### English
/// How the compositor picks among READY frames.
///
/// ### 中文
/// 合成器如何在 READY 帧之间进行选择。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// ### English
    /// Strict FIFO: every submitted frame is composited, oldest first. Producers block when
    /// every slot is in use.
    ///
    /// ### 中文
    /// 严格 FIFO：每个提交的帧都会被合成，最旧的优先。所有槽位都被占用时生产者阻塞。
    #[default]
    Queueing,
    /// ### English
    /// Latest frame wins: the compositor takes the newest READY frame and superseded ones are
    /// recycled. Producers only block when nothing is FREE or READY.
    ///
    /// ### 中文
    /// 最新帧优先：合成器取最新的 READY 帧，被取代的帧会被回收。
    /// 仅当没有 FREE 或 READY 槽位时生产者才会阻塞。
    FrameDropping,
}

/// ### English
/// Control handle used by the surface owner (e.g. swap interval 0/1) to change the policy and
/// the buffer count while clients and compositors keep running.
///
/// ### 中文
/// 供 surface 所有者（如交换间隔 0/1）使用的控制句柄，
/// 可在客户端与合成器持续运行时修改策略与缓冲区数量。
#[derive(Clone)]
pub struct PolicySelector {
    shared: Arc<QueueShared>,
}

impl PolicySelector {
    pub(super) fn new(shared: Arc<QueueShared>) -> Self {
        Self { shared }
    }

    /// ### English
    /// Switches the selection policy. Frames already READY stay queued; the next selection
    /// follows the new policy. Blocked producers re-evaluate (frame dropping may free them).
    ///
    /// ### 中文
    /// 切换选择策略。已 READY 的帧保持排队；下一次选择遵循新策略。
    /// 被阻塞的生产者会重新评估（丢帧策略可能让它们继续）。
    pub fn set_policy(&self, policy: Policy) -> Result<()> {
        {
            let mut ledger = self.shared.lock();
            ledger.ensure_open()?;
            ledger.set_policy(policy);
        }
        self.shared.wake_producers();
        Ok(())
    }

    /// ### English
    /// Changes the target buffer count (`1..=MAX_CAPACITY`).
    ///
    /// Growing lets blocked producers proceed; shrinking never revokes an outstanding lease,
    /// surplus slots retire as they become free.
    ///
    /// ### 中文
    /// 修改目标缓冲区数量（`1..=MAX_CAPACITY`）。
    ///
    /// 扩容会让被阻塞的生产者继续；缩容从不撤销已发出的租约，多余槽位在变为空闲时退役。
    pub fn set_capacity(&self, capacity: usize) -> Result<()> {
        let result = self
            .shared
            .with_ledger(|ledger| ledger.resize(capacity, &self.shared.allocator));
        self.shared.wake_producers();
        result
    }

    pub fn policy(&self) -> Policy {
        self.shared.lock().policy()
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&Policy::FrameDropping).unwrap(),
            "\"frame_dropping\""
        );
        assert_eq!(
            serde_json::from_str::<Policy>("\"queueing\"").unwrap(),
            Policy::Queueing
        );
        assert_eq!(Policy::default(), Policy::Queueing);
    }
}
