//! ### English
//! Allocator collaborator contract and the in-process heap allocator.
//!
//! ### 中文
//! 分配器协作者契约以及进程内堆分配器。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use super::{Buffer, BufferProperties};
use crate::engine::AllocationError;

/// ### English
/// Allocator-defined storage backing one `Buffer`.
///
/// ### 中文
/// 由分配器定义、支撑单个 `Buffer` 的存储。
#[derive(Debug, PartialEq, Eq)]
pub struct NativeBuffer {
    /// ### English
    /// Opaque allocator handle (gralloc handle, dmabuf fd, heap key...).
    ///
    /// ### 中文
    /// 不透明的分配器句柄（gralloc 句柄、dmabuf fd、堆内存键等）。
    pub handle: u64,
    /// ### English
    /// Row stride in bytes.
    ///
    /// ### 中文
    /// 行跨度（字节）。
    pub stride: u32,
}

/// ### English
/// How the consumer intends to use an acquired buffer.
///
/// ### 中文
/// 消费者打算如何使用已获取的缓冲区。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsumerUsage {
    /// ### English
    /// Sampled by the compositor.
    ///
    /// ### 中文
    /// 由合成器采样。
    Composition,
    /// ### English
    /// Handed directly to display hardware (overlay / direct scanout).
    ///
    /// ### 中文
    /// 直接交给显示硬件（overlay / 直接扫描输出）。
    Overlay,
}

/// ### English
/// External allocator collaborator.
///
/// The queue calls `allocate` only while growing; `deallocate` is invoked by the final drop of
/// a `Buffer`, exactly once per successful allocation, and never while the queue's lock is
/// held, so it may call back into the queue. Retry policy belongs to the allocator.
///
/// ### 中文
/// 外部分配器协作者。
///
/// 队列只在扩容时调用 `allocate`；`deallocate` 由 `Buffer` 的最后一次 drop 触发，
/// 每次成功分配恰好调用一次，且从不在队列持锁期间调用，因此可以回调队列。重试策略由分配器自行负责。
pub trait BufferAllocator: Send + Sync {
    fn allocate(&self, properties: &BufferProperties) -> Result<NativeBuffer, AllocationError>;

    fn deallocate(&self, native: NativeBuffer);

    /// ### English
    /// Usage hint forwarded when the compositor acquires a buffer. Default: ignored.
    ///
    /// ### 中文
    /// 合成器获取缓冲区时转发的用途提示；默认忽略。
    fn usage_hint(&self, _buffer: &Buffer, _usage: ConsumerUsage) {}
}

/// ### English
/// Software allocator backed by heap memory (`stride = width * bytes_per_pixel`).
///
/// ### 中文
/// 基于堆内存的软件分配器（`stride = width * bytes_per_pixel`）。
pub struct HeapAllocator {
    storage: Mutex<HashMap<u64, Vec<u8>>>,
    next_handle: AtomicU64,
    /// ### English
    /// Maximum number of live allocations (`None` = unbounded).
    ///
    /// ### 中文
    /// 同时存活分配的上限（`None` 表示不限）。
    limit: Option<usize>,
    deallocations: AtomicUsize,
    overlay_hints: AtomicUsize,
}

impl HeapAllocator {
    pub fn new() -> Self {
        Self {
            storage: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
            limit: None,
            deallocations: AtomicUsize::new(0),
            overlay_hints: AtomicUsize::new(0),
        }
    }

    /// ### English
    /// Creates an allocator that fails with `OutOfMemory` once `limit` buffers are alive.
    ///
    /// ### 中文
    /// 创建一个分配器：当存活缓冲区达到 `limit` 时返回 `OutOfMemory`。
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::new()
        }
    }

    pub fn live_allocations(&self) -> usize {
        self.storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn total_deallocations(&self) -> usize {
        self.deallocations.load(Ordering::Relaxed)
    }

    pub fn overlay_hints(&self) -> usize {
        self.overlay_hints.load(Ordering::Relaxed)
    }

    /// ### English
    /// Runs `f` over the pixel bytes of a live allocation (software rendering path).
    ///
    /// ### 中文
    /// 对某个存活分配的像素字节执行 `f`（软件渲染路径）。
    pub fn with_pixels<R>(&self, buffer: &Buffer, f: impl FnOnce(&mut [u8]) -> R) -> Option<R> {
        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        storage
            .get_mut(&buffer.native_handle())
            .map(|pixels| f(pixels.as_mut_slice()))
    }
}

impl Default for HeapAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferAllocator for HeapAllocator {
    fn allocate(&self, properties: &BufferProperties) -> Result<NativeBuffer, AllocationError> {
        let size = properties.size;
        if size.width == 0 || size.height == 0 {
            return Err(AllocationError::InvalidSize {
                width: size.width,
                height: size.height,
            });
        }

        let stride = size
            .width
            .checked_mul(properties.format.bytes_per_pixel())
            .ok_or(AllocationError::OutOfMemory)?;
        let len = (stride as usize)
            .checked_mul(size.height as usize)
            .ok_or(AllocationError::OutOfMemory)?;

        let mut storage = self.storage.lock().unwrap_or_else(PoisonError::into_inner);
        if self.limit.is_some_and(|limit| storage.len() >= limit) {
            return Err(AllocationError::OutOfMemory);
        }

        let handle = self.next_handle.fetch_add(1, Ordering::Relaxed);
        storage.insert(handle, vec![0; len]);
        Ok(NativeBuffer { handle, stride })
    }

    fn deallocate(&self, native: NativeBuffer) {
        let removed = self
            .storage
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&native.handle);
        if removed.is_some() {
            self.deallocations.fetch_add(1, Ordering::Relaxed);
        } else {
            log::warn!("heap allocator: double free of handle {}", native.handle);
        }
    }

    fn usage_hint(&self, _buffer: &Buffer, usage: ConsumerUsage) {
        if usage == ConsumerUsage::Overlay {
            self.overlay_hints.fetch_add(1, Ordering::Relaxed);
        }
    }
}
