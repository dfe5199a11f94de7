//! ### English
//! Buffer queue shared between producer clients (render threads) and compositors.
//!
//! One mutex guards the ownership ledger; a condition variable wakes clients blocked on an
//! exhausted queue. Every slot is exclusively owned by exactly one of {free pool, client,
//! compositor} at any instant.
//!
//! ### 中文
//! 生产者客户端（渲染线程）与合成器之间共享的缓冲队列。
//!
//! 一把互斥锁保护所有权账本；条件变量用于唤醒因队列耗尽而阻塞的客户端。
//! 任意时刻每个槽位都只被 {空闲池、客户端、合成器} 之一独占。
mod client;
mod compositor;
mod ledger;
mod policy;
mod shared;
mod slot;

use std::fmt;

use super::buffer::{Buffer, BufferId};
use super::fence::Fence;

pub use client::ClientPort;
pub use compositor::CompositorPort;
pub use policy::{Policy, PolicySelector};
pub use shared::{BufferQueue, FrameListener};

/// ### English
/// Upper bound for the configurable buffer count.
///
/// ### 中文
/// 可配置缓冲区数量的上限。
pub const MAX_CAPACITY: usize = 16;

/// ### English
/// Default buffer count (triple buffering).
///
/// ### 中文
/// 默认缓冲区数量（三缓冲）。
pub const DEFAULT_CAPACITY: usize = 3;

/// ### English
/// Ownership state of one slot.
///
/// Legal edges: `Free → ClientOwned → Ready → CompositorOwned → Free`, plus `Ready → Free`
/// when frame dropping supersedes an unconsumed frame.
///
/// ### 中文
/// 单个槽位的所有权状态。
///
/// 合法迁移：`Free → ClientOwned → Ready → CompositorOwned → Free`；
/// 另外在丢帧策略淘汰未消费帧时允许 `Ready → Free`。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotState {
    Free,
    ClientOwned,
    Ready,
    CompositorOwned,
}

impl SlotState {
    pub fn can_transition_to(self, to: SlotState) -> bool {
        matches!(
            (self, to),
            (SlotState::Free, SlotState::ClientOwned)
                | (SlotState::ClientOwned, SlotState::Ready)
                | (SlotState::Ready, SlotState::CompositorOwned)
                | (SlotState::Ready, SlotState::Free)
                | (SlotState::CompositorOwned, SlotState::Free)
        )
    }
}

/// ### English
/// Identifies one exclusive lease: queue, slot index and the lease sequence number.
///
/// A token is only valid while the slot is still held under that exact lease; stale or forged
/// tokens are rejected with `InvalidState`.
///
/// ### 中文
/// 标识一次独占租约：队列、槽位索引与租约序号。
///
/// 仅当槽位仍处于该租约下时令牌才有效；过期或伪造的令牌会以 `InvalidState` 拒绝。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LeaseToken {
    pub queue: u64,
    pub slot: usize,
    pub lease: u64,
}

/// ### English
/// Exclusive lease on one buffer, handed to either a client (render) or a compositor.
///
/// Not `Clone`: returning it through `submit` / `release` consumes it.
///
/// ### 中文
/// 对单个缓冲区的独占租约，交给客户端（渲染）或合成器。
///
/// 不实现 `Clone`：通过 `submit` / `release` 归还时会被消耗。
#[must_use = "a leased buffer must be submitted or released, otherwise its slot stays leased"]
pub struct BufferHandle {
    token: LeaseToken,
    buffer: Buffer,
    fence: Option<Fence>,
    age: u64,
    overlay: bool,
}

impl BufferHandle {
    pub(crate) fn new(token: LeaseToken, buffer: Buffer, fence: Option<Fence>, age: u64) -> Self {
        Self {
            token,
            buffer,
            fence,
            age,
            overlay: false,
        }
    }

    pub fn token(&self) -> LeaseToken {
        self.token
    }

    pub fn slot(&self) -> usize {
        self.token.slot
    }

    pub fn buffer(&self) -> &Buffer {
        &self.buffer
    }

    pub fn buffer_id(&self) -> BufferId {
        self.buffer.id()
    }

    /// ### English
    /// Fence attached at submission. The compositor must wait on it before reading; the
    /// queue never waits internally.
    ///
    /// ### 中文
    /// 提交时附加的 fence。合成器在读取前必须等待它；队列内部从不等待。
    pub fn fence(&self) -> Option<Fence> {
        self.fence
    }

    /// ### English
    /// Submission sequence number (0 for a buffer that was never submitted).
    ///
    /// ### 中文
    /// 提交序号（从未提交过的缓冲区为 0）。
    pub fn age(&self) -> u64 {
        self.age
    }

    /// ### English
    /// Whether the lease was taken for direct display (overlay) rather than composition.
    ///
    /// ### 中文
    /// 该租约是否用于直接显示（overlay）而非合成。
    pub fn is_overlay(&self) -> bool {
        self.overlay
    }

    pub(crate) fn mark_overlay(&mut self) {
        self.overlay = true;
    }
}

impl fmt::Debug for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferHandle")
            .field("token", &self.token)
            .field("buffer", &self.buffer.id())
            .field("fence", &self.fence)
            .field("age", &self.age)
            .field("overlay", &self.overlay)
            .finish()
    }
}

/// ### English
/// Point-in-time view of one slot.
///
/// ### 中文
/// 单个槽位的时间点快照。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub index: usize,
    pub state: SlotState,
    pub buffer: BufferId,
    pub age: u64,
    pub has_fence: bool,
    /// ### English
    /// Slot index is at or above the current capacity; destroyed once it becomes free.
    ///
    /// ### 中文
    /// 槽位索引不小于当前容量；一旦变为空闲即被销毁。
    pub retiring: bool,
}

/// ### English
/// Point-in-time view of the whole ledger (diagnostics and tests).
///
/// ### 中文
/// 整个账本的时间点快照（用于诊断与测试）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub capacity: usize,
    pub policy: Policy,
    pub closed: bool,
    pub slots: Vec<SlotSnapshot>,
    /// ### English
    /// Slot indices in the ready sequence, oldest first.
    ///
    /// ### 中文
    /// ready 序列中的槽位索引，最旧的在前。
    pub ready: Vec<usize>,
}

impl LedgerSnapshot {
    pub fn live_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn count(&self, state: SlotState) -> usize {
        self.slots.iter().filter(|slot| slot.state == state).count()
    }

    pub fn state_of(&self, index: usize) -> Option<SlotState> {
        self.slots
            .iter()
            .find(|slot| slot.index == index)
            .map(|slot| slot.state)
    }

    /// ### English
    /// Number of slots not in the free pool.
    ///
    /// ### 中文
    /// 不在空闲池中的槽位数量。
    pub fn leased_or_ready(&self) -> usize {
        self.slots.len() - self.count(SlotState::Free)
    }
}
