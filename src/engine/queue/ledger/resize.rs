//! ### English
//! Runtime capacity changes.
//!
//! Shrinking never revokes a lease. Slots at index `>= capacity` retire: free ones are destroyed
//! immediately, leased or ready ones when they next become free. Highest indices therefore
//! retire first, under either policy.
//!
//! ### 中文
//! 运行时容量变更。
//!
//! 缩容从不撤销租约。索引 `>= capacity` 的槽位进入退役：空闲的立即销毁，
//! 已租出或 ready 的在下一次变为空闲时销毁。因此无论哪种策略，都是最高索引先退役。

use std::sync::Arc;

use crate::engine::buffer::BufferAllocator;
use crate::engine::error::{QueueError, Result};

use super::super::{MAX_CAPACITY, SlotState};
use super::OwnershipLedger;

impl OwnershipLedger {
    /// ### English
    /// Updates the target buffer count.
    ///
    /// With `preallocate`, missing buffers are allocated right away; an allocation failure is
    /// returned to the caller while the new capacity stays in effect (the remaining slots are
    /// then created lazily).
    ///
    /// ### 中文
    /// 更新目标缓冲区数量。
    ///
    /// 开启 `preallocate` 时会立即分配缺少的缓冲区；分配失败会返回给调用方，
    /// 但新容量仍然生效（剩余槽位随后按需惰性创建）。
    pub(in crate::engine::queue) fn resize(
        &mut self,
        new_capacity: usize,
        allocator: &Arc<dyn BufferAllocator>,
    ) -> Result<()> {
        self.ensure_open()?;
        if !(1..=MAX_CAPACITY).contains(&new_capacity) {
            return Err(QueueError::InvalidCapacity(new_capacity));
        }

        let old_capacity = std::mem::replace(&mut self.capacity, new_capacity);
        if old_capacity != new_capacity {
            log::debug!(
                "queue {}: capacity {old_capacity} -> {new_capacity}",
                self.queue_id
            );
        }

        let idle_above: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .skip(new_capacity)
            .filter(|(_, entry)| {
                entry
                    .as_ref()
                    .is_some_and(|entry| entry.state == SlotState::Free)
            })
            .map(|(index, _)| index)
            .collect();
        for slot in idle_above.into_iter().rev() {
            self.destroy_slot(slot);
        }

        if self.preallocate {
            self.fill_to_capacity(allocator)?;
        }
        self.debug_check_invariants();
        Ok(())
    }

    /// ### English
    /// Allocates free slots until live slots reach capacity.
    ///
    /// ### 中文
    /// 分配空闲槽位，直到存活槽位数达到容量。
    pub(in crate::engine::queue) fn fill_to_capacity(
        &mut self,
        allocator: &Arc<dyn BufferAllocator>,
    ) -> Result<()> {
        while self.create_slot(allocator)?.is_some() {}
        Ok(())
    }
}
