//! ### English
//! C ABI surface for `xian_buffer_queue`.
//!
//! All exported symbols are `extern "C"` functions; structs are `#[repr(C)]`.
//! Every fallible call returns one of the `XIAN_BUFFER_QUEUE_STATUS_*` codes.
//!
//! ### 中文
//! `xian_buffer_queue` 的 C ABI 接口层。
//!
//! 所有导出符号均为 `extern "C"` 函数；结构体使用 `#[repr(C)]`。
//! 所有可能失败的调用都返回某个 `XIAN_BUFFER_QUEUE_STATUS_*` 状态码。
mod abi;
mod client;
mod compositor;
mod queue;

use crate::engine::{BufferHandle, BufferQueue, ClientPort, CompositorPort, LeaseToken, QueueError};

#[repr(C)]
/// ### English
/// Opaque queue handle bundling the queue with one client port and one compositor port.
///
/// ### 中文
/// 不透明队列句柄，打包了队列本身、一个客户端端口和一个合成器端口。
pub struct XianBufferQueue {
    queue: BufferQueue,
    client: ClientPort,
    compositor: CompositorPort,
}

#[repr(C)]
/// ### English
/// One leased buffer handed across the ABI. `slot` + `lease` identify the lease and must be
/// passed back unchanged to `submit` / `release`.
///
/// ### 中文
/// 跨 ABI 传递的单个已租出缓冲区。`slot` + `lease` 标识该租约，
/// 调用 `submit` / `release` 时必须原样传回。
#[derive(Clone, Copy, Debug, Default)]
pub struct XianBufferQueueBuffer {
    pub slot: u32,
    pub lease: u64,
    pub buffer_id: u64,
    pub width: u32,
    pub height: u32,
    /// ### English
    /// Row stride in bytes.
    ///
    /// ### 中文
    /// 行跨度（字节）。
    pub stride: u32,
    /// ### English
    /// `PixelFormat` raw code.
    ///
    /// ### 中文
    /// `PixelFormat` 的原始编码。
    pub format: u32,
    /// ### English
    /// Producer fence attached at submission, or 0 if none. Only set for compositor leases.
    ///
    /// ### 中文
    /// 提交时附加的生产者 fence，没有则为 0。仅对合成器租约设置。
    pub fence: u64,
}

pub const XIAN_BUFFER_QUEUE_STATUS_OK: i32 = 0;
/// ### English
/// Compositor poll found no new frame (not an error).
///
/// ### 中文
/// 合成器轮询没有发现新帧（不是错误）。
pub const XIAN_BUFFER_QUEUE_STATUS_NOTHING_NEW: i32 = 1;
pub const XIAN_BUFFER_QUEUE_STATUS_CLOSED: i32 = -1;
pub const XIAN_BUFFER_QUEUE_STATUS_INVALID_STATE: i32 = -2;
pub const XIAN_BUFFER_QUEUE_STATUS_ALLOCATION_FAILED: i32 = -3;
pub const XIAN_BUFFER_QUEUE_STATUS_TIMEOUT: i32 = -4;
pub const XIAN_BUFFER_QUEUE_STATUS_WOULD_BLOCK: i32 = -5;
pub const XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT: i32 = -6;

/// ### English
/// C ABI version for `xian_buffer_queue`.
///
/// ### 中文
/// `xian_buffer_queue` 的 C ABI 版本号。
const XIAN_BUFFER_QUEUE_ABI_VERSION: u32 = 1;

impl From<&BufferHandle> for XianBufferQueueBuffer {
    fn from(handle: &BufferHandle) -> Self {
        let buffer = handle.buffer();
        Self {
            slot: handle.slot() as u32,
            lease: handle.token().lease,
            buffer_id: buffer.id().as_u64(),
            width: buffer.size().width,
            height: buffer.size().height,
            stride: buffer.stride(),
            format: buffer.format().as_raw(),
            fence: handle.fence().map_or(0, |fence| fence.as_raw()),
        }
    }
}

impl XianBufferQueueBuffer {
    fn token(&self, queue: &BufferQueue) -> LeaseToken {
        LeaseToken {
            queue: queue.id(),
            slot: self.slot as usize,
            lease: self.lease,
        }
    }
}

/// ### English
/// Maps a queue error to its ABI status code.
///
/// ### 中文
/// 将队列错误映射为 ABI 状态码。
fn status(err: &QueueError) -> i32 {
    match err {
        QueueError::Closed => XIAN_BUFFER_QUEUE_STATUS_CLOSED,
        QueueError::InvalidState { .. } | QueueError::ForeignHandle { .. } => {
            XIAN_BUFFER_QUEUE_STATUS_INVALID_STATE
        }
        QueueError::AllocationFailure(_) => XIAN_BUFFER_QUEUE_STATUS_ALLOCATION_FAILED,
        QueueError::InvalidCapacity(_) => XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT,
        QueueError::WouldBlock => XIAN_BUFFER_QUEUE_STATUS_WOULD_BLOCK,
        QueueError::Timeout => XIAN_BUFFER_QUEUE_STATUS_TIMEOUT,
    }
}

fn status_of(result: crate::engine::Result<()>) -> i32 {
    match result {
        Ok(()) => XIAN_BUFFER_QUEUE_STATUS_OK,
        Err(err) => {
            log::debug!("buffer queue call failed: {err}");
            status(&err)
        }
    }
}

/// ### English
/// Borrows the queue behind a raw handle, or `None` for NULL.
///
/// # Safety
/// `queue` must be NULL or a live pointer returned by `xian_buffer_queue_create`.
///
/// ### 中文
/// 借用原始句柄背后的队列；NULL 时返回 `None`。
///
/// # Safety
/// `queue` 必须为 NULL，或是由 `xian_buffer_queue_create` 返回且仍存活的指针。
unsafe fn queue_ref<'a>(queue: *const XianBufferQueue) -> Option<&'a XianBufferQueue> {
    unsafe { queue.as_ref() }
}

#[cfg(test)]
mod tests {
    use std::ptr;

    use super::abi::*;
    use super::client::*;
    use super::compositor::*;
    use super::queue::*;
    use super::*;
    use crate::engine::flags::{
        XIAN_BUFFER_QUEUE_FLAG_FRAME_DROPPING, XIAN_BUFFER_QUEUE_FLAG_LOG_REPORT,
    };

    fn create(capacity: u32, flags: u32) -> *mut XianBufferQueue {
        let queue = xian_buffer_queue_create(4, 4, 4, capacity, flags);
        assert!(!queue.is_null());
        queue
    }

    #[test]
    fn abi_version_is_stable() {
        assert_eq!(xian_buffer_queue_abi_version(), XIAN_BUFFER_QUEUE_ABI_VERSION);
    }

    #[test]
    fn invalid_arguments_are_rejected() {
        assert!(xian_buffer_queue_create(0, 4, 4, 3, 0).is_null());
        assert!(xian_buffer_queue_create(4, 4, 99, 3, 0).is_null());
        assert!(xian_buffer_queue_create(4, 4, 4, 0, 0).is_null());

        let mut out = XianBufferQueueBuffer::default();
        unsafe {
            assert_eq!(
                xian_buffer_queue_acquire_for_render(ptr::null(), 0, &mut out),
                XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT
            );
            xian_buffer_queue_destroy(ptr::null_mut());
        }
    }

    #[test]
    fn frame_travels_from_client_to_compositor() {
        let queue = create(2, XIAN_BUFFER_QUEUE_FLAG_LOG_REPORT);
        let mut rendered = XianBufferQueueBuffer::default();
        let mut shown = XianBufferQueueBuffer::default();

        unsafe {
            assert_eq!(
                xian_buffer_queue_acquire_for_composition(queue, &mut shown),
                XIAN_BUFFER_QUEUE_STATUS_NOTHING_NEW
            );
            assert_eq!(
                xian_buffer_queue_acquire_for_render(queue, 0, &mut rendered),
                XIAN_BUFFER_QUEUE_STATUS_OK
            );
            assert_eq!(rendered.stride, 16);
            assert_eq!(
                xian_buffer_queue_submit(queue, &rendered, 7),
                XIAN_BUFFER_QUEUE_STATUS_OK
            );
            assert_eq!(
                xian_buffer_queue_submit(queue, &rendered, 0),
                XIAN_BUFFER_QUEUE_STATUS_INVALID_STATE
            );

            assert_eq!(
                xian_buffer_queue_acquire_for_composition(queue, &mut shown),
                XIAN_BUFFER_QUEUE_STATUS_OK
            );
            assert_eq!(shown.buffer_id, rendered.buffer_id);
            assert_eq!(shown.fence, 7);
            assert_eq!(xian_buffer_queue_release(queue, &shown), XIAN_BUFFER_QUEUE_STATUS_OK);

            xian_buffer_queue_destroy(queue);
        }
    }

    #[test]
    fn exhausted_queue_reports_would_block_and_closed() {
        let queue = create(1, 0);
        let mut first = XianBufferQueueBuffer::default();
        let mut second = XianBufferQueueBuffer::default();

        unsafe {
            assert_eq!(
                xian_buffer_queue_acquire_for_render(queue, 0, &mut first),
                XIAN_BUFFER_QUEUE_STATUS_OK
            );
            assert_eq!(
                xian_buffer_queue_acquire_for_render(queue, 0, &mut second),
                XIAN_BUFFER_QUEUE_STATUS_WOULD_BLOCK
            );
            assert_eq!(
                xian_buffer_queue_acquire_for_render(queue, 10, &mut second),
                XIAN_BUFFER_QUEUE_STATUS_TIMEOUT
            );
            assert_eq!(
                xian_buffer_queue_set_capacity(queue, 0),
                XIAN_BUFFER_QUEUE_STATUS_INVALID_ARGUMENT
            );

            xian_buffer_queue_close(queue);
            assert_eq!(
                xian_buffer_queue_acquire_for_render(queue, 0, &mut second),
                XIAN_BUFFER_QUEUE_STATUS_CLOSED
            );
            assert_eq!(
                xian_buffer_queue_set_policy(queue, 1),
                XIAN_BUFFER_QUEUE_STATUS_CLOSED
            );
            xian_buffer_queue_destroy(queue);
        }
    }

    #[test]
    fn frame_dropping_flag_selects_newest() {
        let queue = create(3, XIAN_BUFFER_QUEUE_FLAG_FRAME_DROPPING);
        let mut buffers = [XianBufferQueueBuffer::default(); 2];
        let mut shown = XianBufferQueueBuffer::default();

        unsafe {
            for buffer in &mut buffers {
                assert_eq!(
                    xian_buffer_queue_acquire_for_render(queue, 0, buffer),
                    XIAN_BUFFER_QUEUE_STATUS_OK
                );
                assert_eq!(
                    xian_buffer_queue_submit(queue, buffer, 0),
                    XIAN_BUFFER_QUEUE_STATUS_OK
                );
            }
            assert_eq!(
                xian_buffer_queue_acquire_for_overlay(queue, &mut shown),
                XIAN_BUFFER_QUEUE_STATUS_OK
            );
            assert_eq!(shown.buffer_id, buffers[1].buffer_id);
            assert_eq!(
                xian_buffer_queue_acquire_for_composition(queue, &mut shown),
                XIAN_BUFFER_QUEUE_STATUS_NOTHING_NEW
            );
            xian_buffer_queue_destroy(queue);
        }
    }
}
