//! ### English
//! Compositor telemetry collaborator (`began_frame` / `finished_frame` / `started` / `stopped`).
//!
//! ### 中文
//! 合成器遥测协作者（`began_frame` / `finished_frame` / `started` / `stopped`）。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// ### English
/// Distinguishes compositor threads (one per display) in reports and listener registrations.
///
/// ### 中文
/// 在报告与监听注册中区分合成器线程（每个显示器一个）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositorId(pub u64);

impl CompositorId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CompositorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "compositor#{}", self.0)
    }
}

/// ### English
/// Receives notifications around each composition cycle.
///
/// ### 中文
/// 在每个合成周期前后接收通知。
pub trait CompositorReport: Send + Sync {
    fn began_frame(&self, id: CompositorId);
    fn finished_frame(&self, id: CompositorId);
    fn started(&self);
    fn stopped(&self);
}

/// ### English
/// Null object: ignores every notification.
///
/// ### 中文
/// 空对象：忽略所有通知。
#[derive(Clone, Copy, Debug, Default)]
pub struct NullCompositorReport;

impl CompositorReport for NullCompositorReport {
    fn began_frame(&self, _id: CompositorId) {}
    fn finished_frame(&self, _id: CompositorId) {}
    fn started(&self) {}
    fn stopped(&self) {}
}

/// ### English
/// Emits `log` records and keeps frame counters.
///
/// ### 中文
/// 输出 `log` 记录并维护帧计数。
#[derive(Debug, Default)]
pub struct LoggingCompositorReport {
    began: AtomicU64,
    finished: AtomicU64,
}

impl LoggingCompositorReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_began(&self) -> u64 {
        self.began.load(Ordering::Relaxed)
    }

    pub fn frames_finished(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }
}

impl CompositorReport for LoggingCompositorReport {
    fn began_frame(&self, id: CompositorId) {
        let n = self.began.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!("{id}: began frame {n}");
    }

    fn finished_frame(&self, id: CompositorId) {
        let n = self.finished.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!("{id}: finished frame {n}");
    }

    fn started(&self) {
        log::info!("compositor started");
    }

    fn stopped(&self) {
        log::info!(
            "compositor stopped after {} frames",
            self.finished.load(Ordering::Relaxed)
        );
    }
}
