//! ### English
//! `BufferQueue`: the lock-protected ledger plus its wakeup machinery and collaborators.
//!
//! ### 中文
//! `BufferQueue`：受锁保护的账本，以及其唤醒机制与协作者。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use crate::engine::buffer::{BufferAllocator, HeapAllocator};
use crate::engine::config::QueueConfig;
use crate::engine::error::{AllocationError, ConfigError, QueueError, Result};
use crate::engine::registry::{ListenerId, ListenerRegistry};
use crate::engine::report::{CompositorId, CompositorReport, NullCompositorReport};

use super::ledger::{Grant, OwnershipLedger};
use super::{ClientPort, CompositorPort, LedgerSnapshot, PolicySelector};

/// ### English
/// Callback fired (outside the lock) whenever a frame becomes READY or the queue closes.
///
/// ### 中文
/// 每当有帧变为 READY 或队列关闭时（在锁外）触发的回调。
pub type FrameListener = dyn Fn() + Send + Sync;

/// ### English
/// How long a producer is willing to wait for a slot.
///
/// ### 中文
/// 生产者愿意为槽位等待多久。
#[derive(Clone, Copy, Debug)]
pub(super) enum Wait {
    Never,
    Until(Instant),
    Forever,
}

pub(super) struct QueueShared {
    pub(super) id: u64,
    ledger: Mutex<OwnershipLedger>,
    /// ### English
    /// Signaled when a slot may have become available to producers (reclaim, frame-drop recycle,
    /// new READY frame under frame dropping, capacity/policy change) and on close.
    ///
    /// ### 中文
    /// 当槽位可能对生产者可用时（回收、丢帧回收、丢帧策略下新 READY 帧、容量/策略变化）
    /// 以及关闭时被通知。
    slot_available: Condvar,
    pub(super) allocator: Arc<dyn BufferAllocator>,
    pub(super) report: Arc<dyn CompositorReport>,
    frame_listeners: ListenerRegistry<CompositorId, FrameListener>,
}

impl QueueShared {
    pub(super) fn lock(&self) -> MutexGuard<'_, OwnershipLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn wake_producers(&self) {
        self.slot_available.notify_all();
    }

    /// ### English
    /// Runs `f` under the ledger lock. Buffers of slots destroyed meanwhile are dropped after the
    /// lock is released.
    ///
    /// ### 中文
    /// 在账本锁内执行 `f`；期间被销毁槽位的缓冲区在释放锁之后才被 drop。
    pub(super) fn with_ledger<R>(&self, f: impl FnOnce(&mut OwnershipLedger) -> R) -> R {
        let mut ledger = self.lock();
        let result = f(&mut ledger);
        self.unlock(ledger);
        result
    }

    fn unlock(&self, mut ledger: MutexGuard<'_, OwnershipLedger>) {
        let retired = ledger.take_retired();
        drop(ledger);
        if !retired.is_empty() {
            log::trace!("queue {}: dropping {} retired buffer(s)", self.id, retired.len());
            drop(retired);
        }
    }

    pub(super) fn notify_frame_listeners(&self) {
        self.frame_listeners.for_each(|_, listener| listener());
    }

    pub(super) fn add_frame_listener(
        &self,
        compositor: CompositorId,
        listener: Arc<FrameListener>,
    ) -> ListenerId {
        self.frame_listeners.add(compositor, listener)
    }

    pub(super) fn remove_frame_listener(&self, compositor: CompositorId, id: ListenerId) -> bool {
        self.frame_listeners.remove(compositor, id)
    }

    /// ### English
    /// Core of `acquire_for_render`: retry under the lock until a slot is granted, the wait
    /// budget runs out, or the queue closes.
    ///
    /// ### 中文
    /// `acquire_for_render` 的核心：在锁内反复尝试，直到获得槽位、等待预算耗尽或队列关闭。
    pub(super) fn acquire_for_render(&self, wait: Wait) -> Result<Grant> {
        let mut ledger = self.lock();
        let result = loop {
            match ledger.try_acquire_for_render(&self.allocator) {
                Ok(Some(grant)) => break Ok(grant),
                Ok(None) => {}
                Err(err) => break Err(err),
            }

            ledger = match wait {
                Wait::Never => break Err(QueueError::WouldBlock),
                Wait::Forever => {
                    log::trace!("queue {}: producer blocked, no free slot", self.id);
                    self.slot_available
                        .wait(ledger)
                        .unwrap_or_else(PoisonError::into_inner)
                }
                Wait::Until(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break Err(QueueError::Timeout);
                    }
                    self.slot_available
                        .wait_timeout(ledger, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        };
        self.unlock(ledger);
        result
    }
}

/// ### English
/// Per-surface buffer queue. Cheap to clone; all clones share one ledger.
///
/// ### 中文
/// 每个 surface 一个的缓冲队列。克隆开销很低，所有克隆共享同一个账本。
#[derive(Clone)]
pub struct BufferQueue {
    shared: Arc<QueueShared>,
}

impl BufferQueue {
    /// ### English
    /// Creates a queue from `config`, injecting the allocator and report collaborators.
    ///
    /// With `config.preallocate`, all `capacity` buffers are allocated before returning and an
    /// allocation failure is reported here.
    ///
    /// ### 中文
    /// 根据 `config` 创建队列，并注入分配器与报告协作者。
    ///
    /// 若开启 `config.preallocate`，返回前会分配全部 `capacity` 个缓冲区，分配失败在此返回。
    pub fn new(
        config: &QueueConfig,
        allocator: Arc<dyn BufferAllocator>,
        report: Arc<dyn CompositorReport>,
    ) -> Result<Self> {
        static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

        config.validate().map_err(|err| match err {
            ConfigError::InvalidSize { width, height } => {
                AllocationError::InvalidSize { width, height }.into()
            }
            _ => QueueError::InvalidCapacity(config.capacity),
        })?;

        let id = NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed);
        let mut ledger = OwnershipLedger::new(
            id,
            config.capacity,
            config.policy,
            config.buffer_properties(),
            config.preallocate,
        );
        if config.preallocate {
            ledger.fill_to_capacity(&allocator)?;
        }

        log::debug!(
            "queue {id}: created (capacity {}, {:?}, {}x{} {:?})",
            config.capacity,
            config.policy,
            config.buffer.width,
            config.buffer.height,
            config.buffer.format
        );

        Ok(Self {
            shared: Arc::new(QueueShared {
                id,
                ledger: Mutex::new(ledger),
                slot_available: Condvar::new(),
                allocator,
                report,
                frame_listeners: ListenerRegistry::new(),
            }),
        })
    }

    /// ### English
    /// Creates a queue backed by `HeapAllocator` and `NullCompositorReport`.
    ///
    /// ### 中文
    /// 创建一个使用 `HeapAllocator` 与 `NullCompositorReport` 的队列。
    pub fn with_heap_allocator(config: &QueueConfig) -> Result<Self> {
        Self::new(
            config,
            Arc::new(HeapAllocator::new()),
            Arc::new(NullCompositorReport),
        )
    }

    pub fn id(&self) -> u64 {
        self.shared.id
    }

    pub fn client_port(&self) -> ClientPort {
        ClientPort::new(Arc::clone(&self.shared))
    }

    /// ### English
    /// Creates a compositor port; each port gets its own `CompositorId` (one per display).
    ///
    /// ### 中文
    /// 创建一个合成器端口；每个端口拥有独立的 `CompositorId`（每个显示器一个）。
    pub fn compositor_port(&self) -> CompositorPort {
        CompositorPort::new(Arc::clone(&self.shared))
    }

    pub fn policy_selector(&self) -> PolicySelector {
        PolicySelector::new(Arc::clone(&self.shared))
    }

    /// ### English
    /// Shuts the queue down: marks it closed, wakes every blocked producer (they return
    /// `Closed`) and rings every frame listener. Idempotent.
    ///
    /// ### 中文
    /// 关闭队列：标记为已关闭，唤醒所有阻塞的生产者（它们将返回 `Closed`），
    /// 并通知所有帧监听器。幂等。
    pub fn close(&self) {
        let first = self.shared.lock().close();
        self.shared.wake_producers();
        if first {
            log::debug!("queue {}: closed", self.shared.id);
            self.shared.notify_frame_listeners();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().is_closed()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.shared.lock().snapshot()
    }

    /// ### English
    /// Registers a callback fired whenever a new frame is READY (and once on close).
    ///
    /// ### 中文
    /// 注册一个回调：每当有新帧 READY 时触发（关闭时也会触发一次）。
    pub fn add_frame_listener(
        &self,
        compositor: CompositorId,
        listener: Arc<FrameListener>,
    ) -> ListenerId {
        self.shared.add_frame_listener(compositor, listener)
    }

    pub fn remove_frame_listener(&self, compositor: CompositorId, id: ListenerId) -> bool {
        self.shared.remove_frame_listener(compositor, id)
    }
}

impl std::fmt::Debug for BufferQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferQueue")
            .field("id", &self.shared.id)
            .finish_non_exhaustive()
    }
}
