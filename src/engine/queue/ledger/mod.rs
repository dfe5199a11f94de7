//! ### English
//! Ownership ledger: every slot, the ready sequence, capacity and policy.
//!
//! The ledger itself is single-threaded; `BufferQueue` serializes access through one mutex.
//!
//! ### 中文
//! 所有权账本：所有槽位、ready 序列、容量与策略。
//!
//! 账本本身是单线程的；`BufferQueue` 通过一把互斥锁串行化对它的访问。
mod acquire;
mod admit;
mod reclaim;
mod resize;
mod select;

use std::collections::VecDeque;
use std::sync::Arc;

use crate::engine::buffer::{Buffer, BufferAllocator, BufferId, BufferProperties};
use crate::engine::error::{QueueError, Result};
use crate::engine::fence::Fence;

use super::slot::BufferSlot;
use super::{LeaseToken, LedgerSnapshot, Policy, SlotSnapshot, SlotState};

pub(super) use reclaim::Reclaimed;
pub(super) use select::Selection;

/// ### English
/// A slot handed out under a fresh lease.
///
/// ### 中文
/// 以新租约分发出去的槽位。
pub(super) struct Grant {
    pub(super) slot: usize,
    pub(super) lease: u64,
    pub(super) buffer: Buffer,
    pub(super) fence: Option<Fence>,
    pub(super) age: u64,
}

pub(super) struct OwnershipLedger {
    queue_id: u64,
    /// ### English
    /// Slot storage indexed by slot number; `None` marks a destroyed / never-created slot.
    ///
    /// ### 中文
    /// 以槽位编号索引的槽位存储；`None` 表示已销毁或从未创建的槽位。
    slots: Vec<Option<BufferSlot>>,
    /// ### English
    /// Ready slots in submission order (front = oldest).
    ///
    /// ### 中文
    /// 按提交顺序排列的 ready 槽位（队首 = 最旧）。
    ready: VecDeque<usize>,
    capacity: usize,
    policy: Policy,
    closed: bool,
    /// ### English
    /// Allocate the missing buffers eagerly whenever capacity grows.
    ///
    /// ### 中文
    /// 容量增长时立即分配缺少的缓冲区。
    preallocate: bool,
    properties: BufferProperties,
    next_age: u64,
    next_lease: u64,
    /// ### English
    /// Buffers of destroyed slots, dropped by `QueueShared` once the lock is released so that
    /// `BufferAllocator::deallocate` never runs under it.
    ///
    /// ### 中文
    /// 已销毁槽位的缓冲区；由 `QueueShared` 在释放锁之后再 drop，
    /// 保证 `BufferAllocator::deallocate` 不会在锁内执行。
    retired: Vec<Buffer>,
}

impl OwnershipLedger {
    pub(super) fn new(
        queue_id: u64,
        capacity: usize,
        policy: Policy,
        properties: BufferProperties,
        preallocate: bool,
    ) -> Self {
        Self {
            queue_id,
            slots: Vec::with_capacity(capacity),
            ready: VecDeque::with_capacity(capacity),
            capacity,
            policy,
            closed: false,
            preallocate,
            properties,
            next_age: 1,
            next_lease: 1,
            retired: Vec::new(),
        }
    }

    pub(super) fn capacity(&self) -> usize {
        self.capacity
    }

    pub(super) fn policy(&self) -> Policy {
        self.policy
    }

    pub(super) fn set_policy(&mut self, policy: Policy) {
        if self.policy != policy {
            log::debug!("queue {}: policy {:?} -> {:?}", self.queue_id, self.policy, policy);
            self.policy = policy;
        }
    }

    pub(super) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(super) fn close(&mut self) -> bool {
        !std::mem::replace(&mut self.closed, true)
    }

    pub(super) fn has_ready(&self) -> bool {
        !self.ready.is_empty()
    }

    pub(super) fn live_slots(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub(super) fn live_buffer_ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.slots.iter().flatten().map(|slot| slot.buffer.id())
    }

    pub(super) fn take_retired(&mut self) -> Vec<Buffer> {
        std::mem::take(&mut self.retired)
    }

    pub(super) fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(QueueError::Closed);
        }
        Ok(())
    }

    /// ### English
    /// Validated state change for `slot`.
    ///
    /// Fails with `InvalidState` if the slot does not exist, is not in `from`, or `from → to`
    /// is not a legal edge.
    ///
    /// ### 中文
    /// 对 `slot` 进行带校验的状态迁移。
    ///
    /// 槽位不存在、当前状态不是 `from`、或 `from → to` 不是合法迁移时返回 `InvalidState`。
    pub(super) fn transition(&mut self, slot: usize, from: SlotState, to: SlotState) -> Result<()> {
        let invalid = |found| QueueError::InvalidState {
            slot,
            expected: from,
            found,
        };

        let entry = self
            .slots
            .get_mut(slot)
            .and_then(Option::as_mut)
            .ok_or_else(|| invalid(None))?;
        if entry.state != from || !from.can_transition_to(to) {
            return Err(invalid(Some(entry.state)));
        }

        log::trace!("queue {}: slot {slot} {from:?} -> {to:?}", self.queue_id);
        entry.state = to;
        entry.lease = match to {
            SlotState::ClientOwned | SlotState::CompositorOwned => {
                let lease = self.next_lease;
                self.next_lease += 1;
                lease
            }
            SlotState::Free | SlotState::Ready => 0,
        };
        Ok(())
    }

    /// ### English
    /// Checks that `token` is the current lease of a slot in state `expected`.
    ///
    /// ### 中文
    /// 检查 `token` 是否为处于 `expected` 状态的槽位的当前租约。
    pub(super) fn check_lease(&self, token: LeaseToken, expected: SlotState) -> Result<()> {
        if token.queue != self.queue_id {
            return Err(QueueError::ForeignHandle {
                queue: self.queue_id,
                handle_queue: token.queue,
            });
        }

        let invalid = |found| QueueError::InvalidState {
            slot: token.slot,
            expected,
            found,
        };
        let entry = self
            .slots
            .get(token.slot)
            .and_then(Option::as_ref)
            .ok_or_else(|| invalid(None))?;
        if entry.state != expected || entry.lease != token.lease {
            return Err(invalid(Some(entry.state)));
        }
        Ok(())
    }

    fn grant(&self, slot: usize) -> Option<Grant> {
        self.slots.get(slot).and_then(Option::as_ref).map(|entry| Grant {
            slot,
            lease: entry.lease,
            buffer: entry.buffer.clone(),
            fence: entry.pending_fence,
            age: entry.age,
        })
    }

    /// ### English
    /// Allocates a new free slot into the lowest empty index below capacity.
    ///
    /// ### 中文
    /// 在容量以下最小的空索引处分配一个新的空闲槽位。
    fn create_slot(&mut self, allocator: &Arc<dyn BufferAllocator>) -> Result<Option<usize>> {
        if self.live_slots() >= self.capacity {
            return Ok(None);
        }
        let Some(index) = (0..self.capacity).find(|&i| self.slots.get(i).is_none_or(Option::is_none))
        else {
            return Ok(None);
        };

        let buffer = Buffer::allocate(allocator, self.properties)?;
        if self.slots.len() <= index {
            self.slots.resize_with(index + 1, || None);
        }
        log::debug!(
            "queue {}: slot {index} created with {} ({} live, capacity {})",
            self.queue_id,
            buffer.id(),
            self.live_slots() + 1,
            self.capacity
        );
        self.slots[index] = Some(BufferSlot::new(buffer));
        Ok(Some(index))
    }

    /// ### English
    /// Removes the slot record and parks its buffer in `retired`; the buffer is deallocated once
    /// the last handle clone is gone.
    ///
    /// ### 中文
    /// 移除槽位记录，并将其缓冲区暂存到 `retired`；缓冲区在最后一个句柄克隆释放后才被回收。
    fn destroy_slot(&mut self, slot: usize) {
        if let Some(entry) = self.slots.get_mut(slot).and_then(Option::take) {
            debug_assert_eq!(entry.state, SlotState::Free);
            log::debug!(
                "queue {}: slot {slot} retired ({}), capacity {}",
                self.queue_id,
                entry.buffer.id(),
                self.capacity
            );
            self.retired.push(entry.buffer);
        }
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
    }

    /// ### English
    /// Puts a slot that just became free back in the pool, or destroys it if retiring.
    ///
    /// ### 中文
    /// 将刚变为空闲的槽位放回池中；若其正在退役则销毁。
    fn settle_free(&mut self, slot: usize) -> Reclaimed {
        if let Some(entry) = self.slots.get_mut(slot).and_then(Option::as_mut) {
            entry.pending_fence = None;
        }
        if slot >= self.capacity {
            self.destroy_slot(slot);
            Reclaimed::Retired
        } else {
            Reclaimed::Freed
        }
    }

    pub(super) fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            capacity: self.capacity,
            policy: self.policy,
            closed: self.closed,
            slots: self
                .slots
                .iter()
                .enumerate()
                .filter_map(|(index, entry)| {
                    entry.as_ref().map(|entry| SlotSnapshot {
                        index,
                        state: entry.state,
                        buffer: entry.buffer.id(),
                        age: entry.age,
                        has_fence: entry.pending_fence.is_some(),
                        retiring: index >= self.capacity,
                    })
                })
                .collect(),
            ready: self.ready.iter().copied().collect(),
        }
    }

    /// ### English
    /// `ready` holds exactly the Ready slots, in strictly increasing age.
    ///
    /// ### 中文
    /// `ready` 恰好包含所有 Ready 槽位，且 age 严格递增。
    fn debug_check_invariants(&self) {
        if !cfg!(debug_assertions) {
            return;
        }

        let ready_slots = self
            .slots
            .iter()
            .flatten()
            .filter(|entry| entry.state == SlotState::Ready)
            .count();
        debug_assert_eq!(ready_slots, self.ready.len());

        let mut last_age = 0;
        for &slot in &self.ready {
            let entry = self.slots.get(slot).and_then(Option::as_ref);
            debug_assert!(entry.is_some_and(|entry| entry.state == SlotState::Ready));
            let age = entry.map_or(0, |entry| entry.age);
            debug_assert!(age > last_age);
            last_age = age;
        }
    }
}
