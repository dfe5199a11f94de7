//! ### English
//! C ABI bindings for queue lifecycle and control (create/destroy/close, policy, capacity).
//!
//! ### 中文
//! 队列生命周期与控制相关的 C ABI 绑定（create/destroy/close、策略、容量）。

use std::sync::Arc;

use super::{XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT, XianBufferQueue, queue_ref, status_of};
use crate::engine::buffer::{BufferAllocator, BufferUsage, HeapAllocator, PixelFormat};
use crate::engine::flags::{
    XIAN_BUFFER_QUEUE_FLAG_FRAME_DROPPING, XIAN_BUFFER_QUEUE_FLAG_LOG_REPORT,
    XIAN_BUFFER_QUEUE_FLAG_PREALLOCATE, has,
};
use crate::engine::{
    BufferConfig, BufferQueue, CompositorReport, LoggingCompositorReport, NullCompositorReport,
    Policy, QueueConfig,
};

#[unsafe(no_mangle)]
/// ### English
/// Creates a queue of `capacity` software buffers of `width`x`height` in pixel `format`
/// (`PixelFormat` raw code).
///
/// `flags` is a bitmask of `XIAN_BUFFER_QUEUE_FLAG_*`. Returns NULL on invalid arguments or
/// when preallocation fails.
///
/// ### 中文
/// 创建一个包含 `capacity` 个软件缓冲区的队列，尺寸 `width`x`height`，像素格式为 `format`
///（`PixelFormat` 原始编码）。
///
/// `flags` 为 `XIAN_BUFFER_QUEUE_FLAG_*` 位掩码。参数非法或预分配失败时返回 NULL。
pub extern "C" fn xian_buffer_queue_create(
    width: u32,
    height: u32,
    format: u32,
    capacity: u32,
    flags: u32,
) -> *mut XianBufferQueue {
    let Some(format) = PixelFormat::from_raw(format) else {
        log::warn!("xian_buffer_queue_create: unknown pixel format {format}");
        return std::ptr::null_mut();
    };

    let config = QueueConfig {
        capacity: capacity as usize,
        policy: if has(flags, XIAN_BUFFER_QUEUE_FLAG_FRAME_DROPPING) {
            Policy::FrameDropping
        } else {
            Policy::Queueing
        },
        buffer: BufferConfig {
            width,
            height,
            format,
            usage: BufferUsage::Software,
        },
        preallocate: has(flags, XIAN_BUFFER_QUEUE_FLAG_PREALLOCATE),
    };

    let allocator: Arc<dyn BufferAllocator> = Arc::new(HeapAllocator::new());
    let report: Arc<dyn CompositorReport> = if has(flags, XIAN_BUFFER_QUEUE_FLAG_LOG_REPORT) {
        Arc::new(LoggingCompositorReport::new())
    } else {
        Arc::new(NullCompositorReport)
    };

    let queue = match BufferQueue::new(&config, allocator, report) {
        Ok(queue) => queue,
        Err(err) => {
            log::warn!("xian_buffer_queue_create failed: {err}");
            return std::ptr::null_mut();
        }
    };

    let client = queue.client_port();
    let compositor = queue.compositor_port();
    Box::into_raw(Box::new(XianBufferQueue {
        queue,
        client,
        compositor,
    }))
}

#[unsafe(no_mangle)]
/// ### English
/// Closes and destroys a queue created by `xian_buffer_queue_create`.
///
/// Any thread still blocked in `acquire_for_render` must have returned before this call.
///
/// ### 中文
/// 关闭并销毁由 `xian_buffer_queue_create` 创建的队列。
///
/// 调用前，所有仍阻塞在 `acquire_for_render` 中的线程必须已经返回。
pub unsafe extern "C" fn xian_buffer_queue_destroy(queue: *mut XianBufferQueue) {
    if queue.is_null() {
        return;
    }
    let queue = unsafe { Box::from_raw(queue) };
    queue.queue.close();
}

#[unsafe(no_mangle)]
/// ### English
/// Closes the queue: blocked producers return `CLOSED`, later calls fail fast. Idempotent.
///
/// ### 中文
/// 关闭队列：阻塞中的生产者返回 `CLOSED`，之后的调用立即失败。幂等。
pub unsafe extern "C" fn xian_buffer_queue_close(queue: *const XianBufferQueue) {
    if let Some(queue) = unsafe { queue_ref(queue) } {
        queue.queue.close();
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Switches the selection policy: `0` = queueing, `1` = frame dropping.
///
/// ### 中文
/// 切换选择策略：`0` = 排队，`1` = 丢帧。
pub unsafe extern "C" fn xian_buffer_queue_set_policy(
    queue: *const XianBufferQueue,
    policy: u32,
) -> i32 {
    let Some(queue) = (unsafe { queue_ref(queue) }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };
    let policy = match policy {
        0 => Policy::Queueing,
        1 => Policy::FrameDropping,
        _ => return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT,
    };
    status_of(queue.queue.policy_selector().set_policy(policy))
}

#[unsafe(no_mangle)]
/// ### English
/// Changes the target buffer count. Outstanding leases are never revoked.
///
/// ### 中文
/// 修改目标缓冲区数量。已发出的租约永不撤销。
pub unsafe extern "C" fn xian_buffer_queue_set_capacity(
    queue: *const XianBufferQueue,
    capacity: u32,
) -> i32 {
    let Some(queue) = (unsafe { queue_ref(queue) }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };
    status_of(queue.queue.policy_selector().set_capacity(capacity as usize))
}
