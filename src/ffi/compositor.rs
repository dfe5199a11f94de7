//! ### English
//! C ABI bindings for the compositor side (acquire for composition / overlay, release).
//!
//! ### 中文
//! 合成器侧的 C ABI 绑定（acquire for composition / overlay、release）。

use super::{
    XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT, XIAN_BUFFER_QUEUE_STATUS_NOTHING_NEW,
    XIAN_BUFFER_QUEUE_STATUS_OK, XianBufferQueue, XianBufferQueueBuffer, queue_ref, status,
    status_of,
};
use crate::engine::{BufferHandle, Result};

/// ### English
/// Writes an acquired frame to `out`, or reports `NOTHING_NEW`.
///
/// # Safety
/// `out` must be valid for writes.
///
/// ### 中文
/// 将获取到的帧写入 `out`，或报告 `NOTHING_NEW`。
///
/// # Safety
/// `out` 必须可写。
unsafe fn write_frame(
    result: Result<Option<BufferHandle>>,
    out: *mut XianBufferQueueBuffer,
) -> i32 {
    match result {
        Ok(Some(handle)) => {
            unsafe { out.write(XianBufferQueueBuffer::from(&handle)) };
            XIAN_BUFFER_QUEUE_STATUS_OK
        }
        Ok(None) => XIAN_BUFFER_QUEUE_STATUS_NOTHING_NEW,
        Err(err) => status(&err),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Takes the next frame for composition according to the active policy.
///
/// Returns `NOTHING_NEW` (leaving `out` untouched) when no frame was submitted since the last
/// call; keep showing the current frame. Wait on `out.fence` before reading.
///
/// ### 中文
/// 按当前策略取出下一帧用于合成。
///
/// 自上次调用以来没有提交新帧时返回 `NOTHING_NEW`（不修改 `out`）；请继续显示当前帧。
/// 读取前请等待 `out.fence`。
pub unsafe extern "C" fn xian_buffer_queue_acquire_for_composition(
    queue: *const XianBufferQueue,
    out: *mut XianBufferQueueBuffer,
) -> i32 {
    let Some(queue) = (unsafe { queue_ref(queue) }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };
    if out.is_null() {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    }
    unsafe { write_frame(queue.compositor.acquire_for_composition(), out) }
}

#[unsafe(no_mangle)]
/// ### English
/// Same as `xian_buffer_queue_acquire_for_composition`, for direct display (overlay).
///
/// ### 中文
/// 与 `xian_buffer_queue_acquire_for_composition` 相同，用于直接显示（overlay）。
pub unsafe extern "C" fn xian_buffer_queue_acquire_for_overlay(
    queue: *const XianBufferQueue,
    out: *mut XianBufferQueueBuffer,
) -> i32 {
    let Some(queue) = (unsafe { queue_ref(queue) }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };
    if out.is_null() {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    }
    unsafe { write_frame(queue.compositor.acquire_for_overlay(), out) }
}

#[unsafe(no_mangle)]
/// ### English
/// Releases a composited buffer back to the queue, waking blocked producers.
///
/// ### 中文
/// 将已合成的缓冲区归还队列，并唤醒被阻塞的生产者。
pub unsafe extern "C" fn xian_buffer_queue_release(
    queue: *const XianBufferQueue,
    buffer: *const XianBufferQueueBuffer,
) -> i32 {
    let Some(queue) = (unsafe { queue_ref(queue) }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };
    let Some(buffer) = (unsafe { buffer.as_ref() }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };
    status_of(queue.compositor.release_token(buffer.token(&queue.queue)))
}
