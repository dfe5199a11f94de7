use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use test_log::test;
use xian_buffer_queue::engine::buffer::NativeBuffer;
use xian_buffer_queue::engine::ipc::{GenericIpcPacker, IpcDirection, IpcMsgType};
use xian_buffer_queue::engine::{
    AllocationError, BufferAllocator, BufferProperties, BufferQueue, CompositorId,
    CompositorReport, FenceSync, HeapAllocator, LoggingCompositorReport, NullCompositorReport,
    Policy, QueueConfig, SoftwareFenceSync,
};

#[derive(Default)]
struct RecordingReport {
    began: AtomicUsize,
    finished: AtomicUsize,
    started: AtomicUsize,
    stopped: AtomicUsize,
}

impl CompositorReport for RecordingReport {
    fn began_frame(&self, _id: CompositorId) {
        self.began.fetch_add(1, Ordering::SeqCst);
    }

    fn finished_frame(&self, _id: CompositorId) {
        self.finished.fetch_add(1, Ordering::SeqCst);
    }

    fn started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn stopped(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

fn config(capacity: usize) -> QueueConfig {
    QueueConfig {
        capacity,
        ..QueueConfig::default()
    }
}

#[test]
fn compositor_report_sees_full_lifecycle() {
    let report = Arc::new(RecordingReport::default());
    let queue = BufferQueue::new(
        &config(2),
        Arc::new(HeapAllocator::new()),
        report.clone(),
    )
    .unwrap();
    let client = queue.client_port();

    {
        let compositor = queue.compositor_port();
        assert_eq!(report.started.load(Ordering::SeqCst), 1);

        assert!(compositor.acquire_for_composition().unwrap().is_none());
        assert_eq!(report.began.load(Ordering::SeqCst), 0);

        let handle = client.acquire_for_render().unwrap();
        client.submit(handle, None).unwrap();
        let shown = compositor.acquire_for_composition().unwrap().unwrap();
        assert_eq!(report.began.load(Ordering::SeqCst), 1);
        compositor.release(shown).unwrap();
        assert_eq!(report.finished.load(Ordering::SeqCst), 1);
    }
    assert_eq!(report.stopped.load(Ordering::SeqCst), 1);
}

#[test]
fn logging_report_counts_frames() {
    let report = Arc::new(LoggingCompositorReport::new());
    let queue = BufferQueue::new(
        &config(1),
        Arc::new(HeapAllocator::new()),
        report.clone(),
    )
    .unwrap();
    let client = queue.client_port();
    let compositor = queue.compositor_port();

    for _ in 0..3 {
        let handle = client.acquire_for_render().unwrap();
        client.submit(handle, None).unwrap();
        let shown = compositor.acquire_for_overlay().unwrap().unwrap();
        assert!(shown.is_overlay());
        compositor.release(shown).unwrap();
    }
    assert_eq!(report.frames_began(), 3);
    assert_eq!(report.frames_finished(), 3);
}

#[test]
fn overlay_acquire_forwards_usage_hint() {
    let allocator = Arc::new(HeapAllocator::new());
    let queue = BufferQueue::new(
        &config(2),
        allocator.clone(),
        Arc::new(NullCompositorReport),
    )
    .unwrap();
    let client = queue.client_port();
    let compositor = queue.compositor_port();

    let handle = client.acquire_for_render().unwrap();
    client.submit(handle, None).unwrap();
    let shown = compositor.acquire_for_composition().unwrap().unwrap();
    assert!(!shown.is_overlay());
    compositor.release(shown).unwrap();
    assert_eq!(allocator.overlay_hints(), 0);

    let handle = client.acquire_for_render().unwrap();
    client.submit(handle, None).unwrap();
    let shown = compositor.acquire_for_overlay().unwrap().unwrap();
    compositor.release(shown).unwrap();
    assert_eq!(allocator.overlay_hints(), 1);
}

#[test]
fn frame_listeners_fire_on_submit_and_close() {
    let queue = BufferQueue::with_heap_allocator(&config(2)).unwrap();
    let rings = Arc::new(AtomicUsize::new(0));
    let display = CompositorId(99);
    let listener = {
        let rings = Arc::clone(&rings);
        queue.add_frame_listener(
            display,
            Arc::new(move || {
                rings.fetch_add(1, Ordering::SeqCst);
            }),
        )
    };

    let client = queue.client_port();
    let handle = client.acquire_for_render().unwrap();
    client.submit(handle, None).unwrap();
    assert_eq!(rings.load(Ordering::SeqCst), 1);

    queue.close();
    queue.close();
    assert_eq!(rings.load(Ordering::SeqCst), 2);
    assert!(queue.remove_frame_listener(display, listener));
}

#[test]
fn fence_travels_unchanged_to_the_compositor() {
    let sync = SoftwareFenceSync::new();
    let queue = BufferQueue::with_heap_allocator(&config(2)).unwrap();
    let client = queue.client_port();
    let compositor = queue.compositor_port();

    let fence = sync.create_fence();
    let handle = client.acquire_for_render().unwrap();
    let slot = handle.slot();
    client.submit(handle, Some(fence)).unwrap();
    assert!(queue.snapshot().slots.iter().any(|s| s.index == slot && s.has_fence));

    let shown = compositor.acquire_for_composition().unwrap().unwrap();
    assert_eq!(shown.fence(), Some(fence));
    assert!(!sync.is_signaled(fence));
    sync.signal(fence).unwrap();
    sync.wait(fence, Some(Duration::from_millis(10))).unwrap();

    compositor.release(shown).unwrap();
    assert!(queue.snapshot().slots.iter().all(|s| !s.has_fence));
}

#[test]
fn ipc_ships_full_description_once_per_client() {
    let queue = BufferQueue::with_heap_allocator(&QueueConfig {
        capacity: 1,
        policy: Policy::Queueing,
        ..QueueConfig::default()
    })
    .unwrap();
    let client = queue.client_port();
    let compositor = queue.compositor_port();

    let handle = client.acquire_for_render().unwrap();
    let first = client.ipc_resource(&handle, IpcDirection::ToClient);
    assert_eq!(first.msg_type, IpcMsgType::Full);
    let message = first.pack(&GenericIpcPacker);
    let descriptor = GenericIpcPacker::decode(&message).unwrap();
    assert_eq!(descriptor.buffer_id, handle.buffer_id().as_u64());
    assert_eq!(descriptor.properties, handle.buffer().properties());
    client.submit(handle, None).unwrap();

    let shown = compositor.acquire_for_composition().unwrap().unwrap();
    compositor.release(shown).unwrap();

    let handle = client.acquire_for_render().unwrap();
    let again = client.ipc_resource(&handle, IpcDirection::ToClient);
    assert_eq!(again.msg_type, IpcMsgType::Update);
    assert_eq!(again.pack(&GenericIpcPacker).ints, vec![handle.buffer_id().as_u64()]);
    assert_eq!(again.unpack(&GenericIpcPacker, &message), Ok(()));

    let other_client = queue.client_port();
    assert_eq!(
        other_client
            .ipc_resource(&handle, IpcDirection::ToClient)
            .msg_type,
        IpcMsgType::Full
    );
    client.submit(handle, None).unwrap();
}

/// Allocator whose `deallocate` reads the queue back, like a platform allocator that keeps its
/// own bookkeeping in sync with the queue.
#[derive(Default)]
struct ReentrantAllocator {
    heap: HeapAllocator,
    queue: Mutex<Option<BufferQueue>>,
    reentered: AtomicUsize,
}

impl BufferAllocator for ReentrantAllocator {
    fn allocate(&self, properties: &BufferProperties) -> Result<NativeBuffer, AllocationError> {
        self.heap.allocate(properties)
    }

    fn deallocate(&self, native: NativeBuffer) {
        let queue = self.queue.lock().unwrap().clone();
        if let Some(queue) = queue {
            queue.snapshot();
            self.reentered.fetch_add(1, Ordering::SeqCst);
        }
        self.heap.deallocate(native);
    }
}

#[test]
fn deallocate_may_call_back_into_the_queue() {
    let allocator = Arc::new(ReentrantAllocator::default());
    let queue = BufferQueue::new(
        &QueueConfig {
            capacity: 3,
            policy: Policy::FrameDropping,
            preallocate: true,
            ..QueueConfig::default()
        },
        allocator.clone(),
        Arc::new(NullCompositorReport),
    )
    .unwrap();
    *allocator.queue.lock().unwrap() = Some(queue.clone());
    let client = queue.client_port();
    let compositor = queue.compositor_port();
    let selector = queue.policy_selector();

    // idle slots destroyed by the shrink itself
    selector.set_capacity(1).unwrap();
    assert_eq!(allocator.reentered.load(Ordering::SeqCst), 2);

    selector.set_capacity(3).unwrap();
    for _ in 0..3 {
        let handle = client.acquire_for_render().unwrap();
        client.submit(handle, None).unwrap();
    }
    selector.set_capacity(1).unwrap();

    // stale frame in slot 1 retired by the selection
    let shown = compositor.acquire_for_composition().unwrap().unwrap();
    assert_eq!(allocator.reentered.load(Ordering::SeqCst), 3);

    // slot 2 retired on release
    compositor.release(shown).unwrap();
    assert_eq!(allocator.reentered.load(Ordering::SeqCst), 4);
    assert_eq!(allocator.heap.total_deallocations(), 4);
    assert_eq!(queue.snapshot().live_slots(), 1);

    allocator.queue.lock().unwrap().take();
}
