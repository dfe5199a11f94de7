//! ### English
//! Synchronization fences attached to submitted buffers.
//!
//! The ledger only stores and hands fences through; waiting is the caller's job via a
//! `FenceSync` collaborator (GPU sync objects, sync-file fds, or the CPU timeline below).
//!
//! ### 中文
//! 附加在已提交缓冲区上的同步 fence。
//!
//! 账本只保存并传递 fence；等待由调用方通过 `FenceSync` 协作者完成
//! （GPU 同步对象、sync-file fd，或下面的 CPU 时间线）。

use std::collections::HashSet;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use super::FenceError;

/// ### English
/// Opaque fence token (e.g. a `GLsync` or sync-file fd cast to `u64`). Never zero.
///
/// ### 中文
/// 不透明的 fence 令牌（例如转为 `u64` 的 `GLsync` 或 sync-file fd），永不为 0。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Fence(NonZeroU64);

impl Fence {
    /// ### English
    /// Wraps a raw handle; `0` means "no fence" and yields `None`.
    ///
    /// ### 中文
    /// 包装原始句柄；`0` 表示“无 fence”，返回 `None`。
    pub fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn as_raw(self) -> u64 {
        self.0.get()
    }
}

/// ### English
/// Fence collaborator used by compositor-side callers.
///
/// ### 中文
/// 合成器侧调用方使用的 fence 协作者。
pub trait FenceSync: Send + Sync {
    fn is_signaled(&self, fence: Fence) -> bool;

    /// ### English
    /// Blocks until `fence` signals or `timeout` elapses (`None` = wait forever).
    ///
    /// ### 中文
    /// 阻塞直到 `fence` 被 signal 或 `timeout` 到期（`None` 表示无限等待）。
    fn wait(&self, fence: Fence, timeout: Option<Duration>) -> Result<(), FenceError>;
}

/// ### English
/// Treats every fence as already signaled (producers that finish work before submitting).
///
/// ### 中文
/// 将所有 fence 视为已 signal（生产者在提交前已完成工作的场景）。
#[derive(Clone, Copy, Debug, Default)]
pub struct SignaledFenceSync;

impl FenceSync for SignaledFenceSync {
    fn is_signaled(&self, _fence: Fence) -> bool {
        true
    }

    fn wait(&self, _fence: Fence, _timeout: Option<Duration>) -> Result<(), FenceError> {
        Ok(())
    }
}

/// ### English
/// CPU fence timeline for software renderers: `create_fence` on the producer, `signal` when
/// the CPU work completes.
///
/// ### 中文
/// 供软件渲染器使用的 CPU fence 时间线：生产者调用 `create_fence`，CPU 工作完成后调用 `signal`。
pub struct SoftwareFenceSync {
    next: AtomicU64,
    /// ### English
    /// Fences created but not yet signaled.
    ///
    /// ### 中文
    /// 已创建但尚未 signal 的 fence。
    pending: Mutex<HashSet<u64>>,
    signaled: Condvar,
}

impl SoftwareFenceSync {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
            pending: Mutex::new(HashSet::new()),
            signaled: Condvar::new(),
        }
    }

    pub fn create_fence(&self) -> Fence {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(raw);
        Fence(NonZeroU64::new(raw).unwrap_or(NonZeroU64::MIN))
    }

    /// ### English
    /// Signals `fence` and wakes every waiter.
    ///
    /// ### 中文
    /// signal `fence` 并唤醒所有等待者。
    pub fn signal(&self, fence: Fence) -> Result<(), FenceError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if !pending.remove(&fence.as_raw()) && fence.as_raw() >= self.next.load(Ordering::Relaxed)
        {
            return Err(FenceError::Invalid(fence.as_raw()));
        }
        drop(pending);
        self.signaled.notify_all();
        Ok(())
    }

    fn check_known(&self, fence: Fence) -> Result<(), FenceError> {
        if fence.as_raw() >= self.next.load(Ordering::Relaxed) {
            return Err(FenceError::Invalid(fence.as_raw()));
        }
        Ok(())
    }
}

impl Default for SoftwareFenceSync {
    fn default() -> Self {
        Self::new()
    }
}

impl FenceSync for SoftwareFenceSync {
    fn is_signaled(&self, fence: Fence) -> bool {
        self.check_known(fence).is_ok()
            && !self
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&fence.as_raw())
    }

    fn wait(&self, fence: Fence, timeout: Option<Duration>) -> Result<(), FenceError> {
        self.check_known(fence)?;
        let deadline = timeout.map(|timeout| Instant::now() + timeout);

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while pending.contains(&fence.as_raw()) {
            pending = match deadline {
                None => self
                    .signaled
                    .wait(pending)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(FenceError::Timeout);
                    }
                    self.signaled
                        .wait_timeout(pending, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
        Ok(())
    }
}
