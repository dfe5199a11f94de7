//! ### English
//! Producer-facing port used by render threads.
//!
//! ### 中文
//! 供渲染线程使用的生产者端口。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::engine::buffer::BufferId;
use crate::engine::error::Result;
use crate::engine::fence::Fence;
use crate::engine::ipc::{IpcDirection, IpcMsgType, IpcResource};

use super::ledger::Grant;
use super::shared::{QueueShared, Wait};
use super::{BufferHandle, LeaseToken};

/// ### English
/// Client (producer) side of a `BufferQueue`.
///
/// ### 中文
/// `BufferQueue` 的客户端（生产者）侧。
pub struct ClientPort {
    shared: Arc<QueueShared>,
    /// ### English
    /// Buffers already described in full to this client; later shipments only send the id.
    ///
    /// ### 中文
    /// 已向该客户端完整描述过的缓冲区；之后的发送只携带 id。
    shipped: Mutex<HashSet<BufferId>>,
}

impl ClientPort {
    pub(super) fn new(shared: Arc<QueueShared>) -> Self {
        Self {
            shared,
            shipped: Mutex::new(HashSet::new()),
        }
    }

    fn lease(&self, grant: Grant) -> BufferHandle {
        let token = LeaseToken {
            queue: self.shared.id,
            slot: grant.slot,
            lease: grant.lease,
        };
        BufferHandle::new(token, grant.buffer, None, grant.age)
    }

    /// ### English
    /// Obtains exclusive write access to a buffer, blocking while none is available.
    ///
    /// Under `Queueing` the call blocks until a compositor releases a slot, the capacity grows,
    /// the policy changes, or the queue closes (`Closed`). Under `FrameDropping` it only blocks
    /// when no slot is FREE or READY and the capacity is exhausted.
    ///
    /// ### 中文
    /// 获取对某个缓冲区的独占写权限；没有可用缓冲区时阻塞。
    ///
    /// `Queueing` 下会阻塞，直到合成器释放槽位、容量增加、策略变化或队列关闭（返回 `Closed`）。
    /// `FrameDropping` 下仅当没有 FREE 或 READY 槽位且容量已耗尽时才阻塞。
    pub fn acquire_for_render(&self) -> Result<BufferHandle> {
        self.shared.acquire_for_render(Wait::Forever).map(|grant| self.lease(grant))
    }

    /// ### English
    /// Non-blocking variant: `WouldBlock` instead of waiting.
    ///
    /// ### 中文
    /// 非阻塞版本：不等待，直接返回 `WouldBlock`。
    pub fn try_acquire_for_render(&self) -> Result<BufferHandle> {
        self.shared.acquire_for_render(Wait::Never).map(|grant| self.lease(grant))
    }

    /// ### English
    /// Bounded-wait variant: `Timeout` once `timeout` elapses without a slot.
    ///
    /// ### 中文
    /// 有界等待版本：超过 `timeout` 仍无槽位时返回 `Timeout`。
    pub fn acquire_for_render_timeout(&self, timeout: Duration) -> Result<BufferHandle> {
        let wait = Instant::now()
            .checked_add(timeout)
            .map_or(Wait::Forever, Wait::Until);
        self.shared.acquire_for_render(wait).map(|grant| self.lease(grant))
    }

    /// ### English
    /// Hands a rendered buffer to the queue. The slot joins the ready sequence with a fresh
    /// age; the fence travels with it to the compositor.
    ///
    /// Rejects handles that are not the current client lease of their slot (`InvalidState`) or
    /// come from another queue (`ForeignHandle`), without changing any state.
    ///
    /// #### Parameters
    /// - `handle`: Lease returned by `acquire_for_render`.
    /// - `fence`: Signals completion of GPU work on the buffer, if any.
    ///
    /// ### 中文
    /// 将渲染完成的缓冲区交给队列。槽位以新的 age 加入 ready 序列；fence 随之传给合成器。
    ///
    /// 若句柄不是其槽位当前的客户端租约（`InvalidState`）或来自其它队列（`ForeignHandle`），
    /// 则拒绝且不改变任何状态。
    ///
    /// #### 参数
    /// - `handle`：由 `acquire_for_render` 返回的租约。
    /// - `fence`：表示缓冲区上的 GPU 工作完成的 fence（可选）。
    pub fn submit(&self, handle: BufferHandle, fence: Option<Fence>) -> Result<()> {
        self.submit_token(handle.token(), fence)
    }

    pub(crate) fn submit_token(&self, token: LeaseToken, fence: Option<Fence>) -> Result<()> {
        self.shared.lock().admit_ready(token, fence)?;
        // frame dropping lets a blocked producer recycle the new READY frame
        self.shared.wake_producers();
        self.shared.notify_frame_listeners();
        Ok(())
    }

    /// ### English
    /// Describes a leased buffer for shipping to an out-of-process client: `Full` the first
    /// time this port ships the buffer, `Update` afterwards.
    ///
    /// ### 中文
    /// 为发送给进程外客户端而描述一个已租出的缓冲区：本端口首次发送该缓冲区时为 `Full`，
    /// 之后为 `Update`。
    pub fn ipc_resource(&self, handle: &BufferHandle, direction: IpcDirection) -> IpcResource {
        let live = self.shared.lock().live_buffer_ids().collect::<HashSet<_>>();

        let mut shipped = self.shipped.lock().unwrap_or_else(PoisonError::into_inner);
        shipped.retain(|id| live.contains(id));
        let msg_type = if shipped.insert(handle.buffer_id()) {
            IpcMsgType::Full
        } else {
            IpcMsgType::Update
        };

        IpcResource {
            buffer: handle.buffer().clone(),
            msg_type,
            direction,
        }
    }
}

impl std::fmt::Debug for ClientPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientPort")
            .field("queue", &self.shared.id)
            .finish_non_exhaustive()
    }
}
