//! ### English
//! Consumer-facing port used by compositor threads (one per display).
//!
//! ### 中文
//! 供合成器线程使用的消费者端口（每个显示器一个）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};

use crate::engine::buffer::ConsumerUsage;
use crate::engine::error::{QueueError, Result};
use crate::engine::registry::ListenerId;
use crate::engine::report::CompositorId;

use super::ledger::Reclaimed;
use super::shared::{FrameListener, QueueShared};
use super::{BufferHandle, LeaseToken};

/// ### English
/// Compositor (consumer) side of a `BufferQueue`.
///
/// Creating a port reports `started()`; dropping it reports `stopped()`.
///
/// ### 中文
/// `BufferQueue` 的合成器（消费者）侧。
///
/// 创建端口时报告 `started()`；drop 时报告 `stopped()`。
pub struct CompositorPort {
    shared: Arc<QueueShared>,
    id: CompositorId,
    /// ### English
    /// Doorbell rung by the queue whenever a frame becomes READY; coalesces to one pending
    /// ring.
    ///
    /// ### 中文
    /// 每当有帧变为 READY 时由队列敲响的门铃；多次敲响合并为一次待处理通知。
    doorbell: Receiver<()>,
    listener: ListenerId,
}

impl CompositorPort {
    pub(super) fn new(shared: Arc<QueueShared>) -> Self {
        let id = CompositorId::next();
        let (ring, doorbell) = bounded(1);
        let listener: Arc<FrameListener> = Arc::new(move || {
            let _ = ring.try_send(());
        });
        let listener = shared.add_frame_listener(id, listener);

        shared.report.started();
        log::debug!("queue {}: {id} attached", shared.id);

        Self {
            shared,
            id,
            doorbell,
            listener,
        }
    }

    pub fn id(&self) -> CompositorId {
        self.id
    }

    /// ### English
    /// Takes the next frame for composition. `Ok(None)` means nothing new was submitted since
    /// the last call; the compositor keeps showing its current frame.
    ///
    /// `Queueing` yields the oldest READY frame. `FrameDropping` yields the newest and
    /// recycles every older READY frame, which producers may then reuse.
    ///
    /// The caller must wait on `BufferHandle::fence` before reading the buffer.
    ///
    /// ### 中文
    /// 取出下一帧用于合成。`Ok(None)` 表示自上次调用以来没有新提交；合成器继续显示当前帧。
    ///
    /// `Queueing` 返回最旧的 READY 帧。`FrameDropping` 返回最新的帧，
    /// 并回收所有更旧的 READY 帧，生产者随后可以复用它们。
    ///
    /// 调用方在读取缓冲区前必须等待 `BufferHandle::fence`。
    pub fn acquire_for_composition(&self) -> Result<Option<BufferHandle>> {
        self.acquire(ConsumerUsage::Composition)
    }

    /// ### English
    /// Same as `acquire_for_composition`, but the buffer goes straight to a display plane.
    /// The allocator receives an overlay usage hint.
    ///
    /// ### 中文
    /// 与 `acquire_for_composition` 相同，但缓冲区直接送往显示平面。分配器会收到 overlay 用途提示。
    pub fn acquire_for_overlay(&self) -> Result<Option<BufferHandle>> {
        self.acquire(ConsumerUsage::Overlay)
    }

    fn acquire(&self, usage: ConsumerUsage) -> Result<Option<BufferHandle>> {
        let Some(selection) = self
            .shared
            .with_ledger(|ledger| ledger.select_for_composition())?
        else {
            return Ok(None);
        };
        if selection.dropped > 0 {
            self.shared.wake_producers();
        }
        if selection.retired > 0 {
            log::trace!(
                "queue {}: {} retired {} dropped slot(s)",
                self.shared.id,
                self.id,
                selection.retired
            );
        }

        let grant = selection.grant;
        self.shared.report.began_frame(self.id);
        grant.buffer.hint_usage(usage);

        let token = LeaseToken {
            queue: self.shared.id,
            slot: grant.slot,
            lease: grant.lease,
        };
        let mut handle = BufferHandle::new(token, grant.buffer, grant.fence, grant.age);
        if usage == ConsumerUsage::Overlay {
            handle.mark_overlay();
        }
        Ok(Some(handle))
    }

    /// ### English
    /// Returns a composited buffer to the free pool (or retires its slot after a shrink) and
    /// wakes blocked producers. The pending fence is discarded.
    ///
    /// ### 中文
    /// 将已合成的缓冲区归还空闲池（缩容后则使其槽位退役），并唤醒被阻塞的生产者。待处理的 fence 被丢弃。
    pub fn release(&self, handle: BufferHandle) -> Result<()> {
        self.release_token(handle.token())
    }

    pub(crate) fn release_token(&self, token: LeaseToken) -> Result<()> {
        let reclaimed = self.shared.with_ledger(|ledger| ledger.reclaim(token))?;
        self.shared.wake_producers();
        self.shared.report.finished_frame(self.id);

        if reclaimed == Reclaimed::Retired {
            log::trace!(
                "queue {}: {} released retiring slot {}",
                self.shared.id,
                self.id,
                token.slot
            );
        }
        Ok(())
    }

    /// ### English
    /// Doorbell receiver for integrating with an external event loop (e.g. `select!`).
    ///
    /// ### 中文
    /// 门铃接收端，用于接入外部事件循环（例如 `select!`）。
    pub fn frame_ready_receiver(&self) -> &Receiver<()> {
        &self.doorbell
    }

    /// ### English
    /// Waits until a READY frame exists or `timeout` elapses.
    ///
    /// Returns `Ok(true)` when a frame is ready, `Ok(false)` once `timeout` has elapsed and
    /// `Err(Closed)` once the queue is closed. Rings left over from frames that were already
    /// taken do not end the wait.
    ///
    /// ### 中文
    /// 等待直到存在 READY 帧或 `timeout` 到期。
    ///
    /// 有帧就绪时返回 `Ok(true)`；`timeout` 到期后返回 `Ok(false)`；
    /// 队列关闭后返回 `Err(Closed)`。已被取走的帧留下的门铃通知不会结束等待。
    pub fn wait_for_frame(&self, timeout: Duration) -> Result<bool> {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            {
                let ledger = self.shared.lock();
                ledger.ensure_open()?;
                // stale ring: a submit after this point rings again
                let _ = self.doorbell.try_recv();
                if ledger.has_ready() {
                    return Ok(true);
                }
            }

            let rung = match deadline {
                Some(deadline) => self.doorbell.recv_deadline(deadline),
                None => self
                    .doorbell
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected),
            };
            match rung {
                Ok(()) => continue,
                Err(RecvTimeoutError::Timeout) => return Ok(false),
                Err(RecvTimeoutError::Disconnected) => return Err(QueueError::Closed),
            }
        }
    }
}

impl Drop for CompositorPort {
    fn drop(&mut self) {
        self.shared.remove_frame_listener(self.id, self.listener);
        self.shared.report.stopped();
        log::debug!("queue {}: {} detached", self.shared.id, self.id);
    }
}

impl std::fmt::Debug for CompositorPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositorPort")
            .field("queue", &self.shared.id)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}
