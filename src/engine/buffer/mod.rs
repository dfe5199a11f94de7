//! ### English
//! Opaque, reference-counted graphics buffers and the allocator contract behind them.
//!
//! The queue only cares about buffer identity; contents are never interpreted.
//!
//! ### 中文
//! 不透明、引用计数的图形缓冲区，以及其背后的分配器契约。
//!
//! 队列只关心缓冲区身份，从不解释其内容。
mod allocator;
mod format;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dpi::PhysicalSize;

pub use allocator::{BufferAllocator, ConsumerUsage, HeapAllocator, NativeBuffer};
pub use format::{BufferUsage, PixelFormat};

/// ### English
/// Process-wide unique buffer identifier.
///
/// ### 中文
/// 进程内唯一的缓冲区标识。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// ### English
/// Size, pixel format and usage requested from the allocator.
///
/// ### 中文
/// 向分配器请求的尺寸、像素格式与用途。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferProperties {
    pub size: PhysicalSize<u32>,
    pub format: PixelFormat,
    pub usage: BufferUsage,
}

impl BufferProperties {
    pub fn new(size: PhysicalSize<u32>, format: PixelFormat, usage: BufferUsage) -> Self {
        Self {
            size,
            format,
            usage,
        }
    }
}

struct BufferInner {
    id: BufferId,
    properties: BufferProperties,
    /// ### English
    /// Allocator-owned storage; taken exactly once on drop.
    ///
    /// ### 中文
    /// 分配器持有的存储；在 drop 时仅取出一次。
    native: Option<NativeBuffer>,
    allocator: Arc<dyn BufferAllocator>,
}

impl Drop for BufferInner {
    fn drop(&mut self) {
        if let Some(native) = self.native.take() {
            log::trace!("deallocating {}", self.id);
            self.allocator.deallocate(native);
        }
    }
}

/// ### English
/// Shared-ownership handle to an allocated buffer.
///
/// Cloning only bumps a reference count. When the last clone is dropped the allocator's
/// `deallocate` runs exactly once. Exclusive *leases* are tracked by the queue, not here.
///
/// ### 中文
/// 已分配缓冲区的共享所有权句柄。
///
/// 克隆只增加引用计数；最后一个克隆被 drop 时，分配器的 `deallocate` 恰好执行一次。
/// 独占“租约”由队列跟踪，而不是由本类型跟踪。
#[derive(Clone)]
pub struct Buffer {
    inner: Arc<BufferInner>,
}

impl Buffer {
    /// ### English
    /// Allocates a new buffer through `allocator`.
    ///
    /// #### Parameters
    /// - `allocator`: Allocator that owns the storage and frees it on final drop.
    /// - `properties`: Requested size / format / usage.
    ///
    /// ### 中文
    /// 通过 `allocator` 分配一个新缓冲区。
    ///
    /// #### 参数
    /// - `allocator`：持有存储并在最终 drop 时释放它的分配器。
    /// - `properties`：请求的尺寸 / 格式 / 用途。
    pub fn allocate(
        allocator: &Arc<dyn BufferAllocator>,
        properties: BufferProperties,
    ) -> Result<Self, crate::engine::AllocationError> {
        let native = allocator.allocate(&properties)?;
        let id = BufferId::next();
        log::debug!(
            "allocated {} {}x{} {:?} stride={}",
            id,
            properties.size.width,
            properties.size.height,
            properties.format,
            native.stride
        );
        Ok(Self {
            inner: Arc::new(BufferInner {
                id,
                properties,
                native: Some(native),
                allocator: Arc::clone(allocator),
            }),
        })
    }

    pub fn id(&self) -> BufferId {
        self.inner.id
    }

    pub fn properties(&self) -> BufferProperties {
        self.inner.properties
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.inner.properties.size
    }

    pub fn format(&self) -> PixelFormat {
        self.inner.properties.format
    }

    /// ### English
    /// Row stride in bytes as reported by the allocator.
    ///
    /// ### 中文
    /// 分配器报告的行跨度（字节）。
    pub fn stride(&self) -> u32 {
        self.inner.native.as_ref().map_or(0, |native| native.stride)
    }

    /// ### English
    /// Allocator-defined native handle (e.g. a gralloc handle or heap key).
    ///
    /// ### 中文
    /// 分配器定义的原生句柄（例如 gralloc 句柄或堆内存键）。
    pub fn native_handle(&self) -> u64 {
        self.inner.native.as_ref().map_or(0, |native| native.handle)
    }

    pub(crate) fn hint_usage(&self, usage: ConsumerUsage) {
        self.inner.allocator.usage_hint(self, usage);
    }
}

impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Buffer {}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("id", &self.inner.id)
            .field("properties", &self.inner.properties)
            .field("stride", &self.stride())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AllocationError;

    fn props(width: u32, height: u32) -> BufferProperties {
        BufferProperties::new(
            PhysicalSize::new(width, height),
            PixelFormat::Abgr8888,
            BufferUsage::Software,
        )
    }

    #[test]
    fn last_clone_deallocates_once() {
        let heap = Arc::new(HeapAllocator::new());
        let allocator: Arc<dyn BufferAllocator> = heap.clone();

        let buffer = Buffer::allocate(&allocator, props(4, 4)).unwrap();
        let clone = buffer.clone();
        assert_eq!(heap.live_allocations(), 1);

        drop(buffer);
        assert_eq!(heap.live_allocations(), 1);
        drop(clone);
        assert_eq!(heap.live_allocations(), 0);
        assert_eq!(heap.total_deallocations(), 1);
    }

    #[test]
    fn stride_follows_format() {
        let allocator: Arc<dyn BufferAllocator> = Arc::new(HeapAllocator::new());
        let buffer = Buffer::allocate(&allocator, props(10, 2)).unwrap();
        assert_eq!(buffer.stride(), 40);
        assert_eq!(buffer.size(), PhysicalSize::new(10, 2));
    }

    #[test]
    fn zero_area_is_rejected() {
        let allocator: Arc<dyn BufferAllocator> = Arc::new(HeapAllocator::new());
        let err = Buffer::allocate(&allocator, props(0, 8)).unwrap_err();
        assert_eq!(
            err,
            AllocationError::InvalidSize {
                width: 0,
                height: 8
            }
        );
    }

    #[test]
    fn ids_are_unique() {
        let allocator: Arc<dyn BufferAllocator> = Arc::new(HeapAllocator::new());
        let a = Buffer::allocate(&allocator, props(1, 1)).unwrap();
        let b = Buffer::allocate(&allocator, props(1, 1)).unwrap();
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }
}
