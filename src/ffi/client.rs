//! ### English
//! C ABI bindings for the producer side (acquire for render / submit).
//!
//! ### 中文
//! 生产者侧的 C ABI 绑定（acquire for render / submit）。

use std::time::Duration;

use super::{
    XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT, XIAN_BUFFER_QUEUE_STATUS_OK, XianBufferQueue,
    XianBufferQueueBuffer, queue_ref, status, status_of,
};
use crate::engine::Fence;

/// ### English
/// `timeout_ms` value that blocks until a buffer is available or the queue closes.
///
/// ### 中文
/// 表示一直阻塞、直到有可用缓冲区或队列关闭的 `timeout_ms` 取值。
pub const XIAN_BUFFER_QUEUE_TIMEOUT_INFINITE: u32 = u32::MAX;

#[unsafe(no_mangle)]
/// ### English
/// Leases a buffer for rendering and writes it to `out`.
///
/// - `timeout_ms == 0`: never blocks, returns `WOULD_BLOCK` if nothing is available.
/// - `timeout_ms == XIAN_BUFFER_QUEUE_TIMEOUT_INFINITE`: blocks until available or closed.
/// - Otherwise: returns `TIMEOUT` after `timeout_ms` milliseconds.
///
/// ### 中文
/// 租用一个缓冲区用于渲染，并写入 `out`。
///
/// - `timeout_ms == 0`：从不阻塞，无可用缓冲区时返回 `WOULD_BLOCK`。
/// - `timeout_ms == XIAN_BUFFER_QUEUE_TIMEOUT_INFINITE`：阻塞直到可用或队列关闭。
/// - 其它值：`timeout_ms` 毫秒后返回 `TIMEOUT`。
pub unsafe extern "C" fn xian_buffer_queue_acquire_for_render(
    queue: *const XianBufferQueue,
    timeout_ms: u32,
    out: *mut XianBufferQueueBuffer,
) -> i32 {
    let Some(queue) = (unsafe { queue_ref(queue) }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };
    if out.is_null() {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    }

    let result = match timeout_ms {
        0 => queue.client.try_acquire_for_render(),
        XIAN_BUFFER_QUEUE_TIMEOUT_INFINITE => queue.client.acquire_for_render(),
        ms => queue
            .client
            .acquire_for_render_timeout(Duration::from_millis(u64::from(ms))),
    };

    match result {
        Ok(handle) => {
            unsafe { out.write(XianBufferQueueBuffer::from(&handle)) };
            XIAN_BUFFER_QUEUE_STATUS_OK
        }
        Err(err) => status(&err),
    }
}

#[unsafe(no_mangle)]
/// ### English
/// Submits a rendered buffer previously returned by `xian_buffer_queue_acquire_for_render`.
///
/// `fence` is the producer fence (0 = none); it is handed unchanged to the compositor.
///
/// ### 中文
/// 提交先前由 `xian_buffer_queue_acquire_for_render` 返回的已渲染缓冲区。
///
/// `fence` 为生产者 fence（0 表示无）；它会原样交给合成器。
pub unsafe extern "C" fn xian_buffer_queue_submit(
    queue: *const XianBufferQueue,
    buffer: *const XianBufferQueueBuffer,
    fence: u64,
) -> i32 {
    let Some(queue) = (unsafe { queue_ref(queue) }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };
    let Some(buffer) = (unsafe { buffer.as_ref() }) else {
        return XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT;
    };

    status_of(
        queue
            .client
            .submit_token(buffer.token(&queue.queue), Fence::from_raw(fence)),
    )
}
