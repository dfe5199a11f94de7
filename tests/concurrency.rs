use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, unbounded};
use test_log::test;
use xian_buffer_queue::engine::{BufferId, BufferQueue, Policy, QueueConfig, QueueError, SlotState};

const RECV_LIMIT: Duration = Duration::from_secs(5);

fn queue(capacity: usize, policy: Policy) -> BufferQueue {
    let config = QueueConfig {
        capacity,
        policy,
        ..QueueConfig::default()
    };
    BufferQueue::with_heap_allocator(&config).unwrap()
}

fn spawn_blocked_producer(
    queue: &BufferQueue,
) -> (
    Receiver<Result<BufferId, QueueError>>,
    thread::JoinHandle<()>,
) {
    let (tx, rx) = unbounded();
    let queue = queue.clone();
    let producer = thread::spawn(move || {
        let result = queue.client_port().acquire_for_render();
        tx.send(result.map(|handle| handle.buffer_id())).unwrap();
    });
    (rx, producer)
}

#[test]
fn close_wakes_blocked_producers() {
    let queue = queue(1, Policy::Queueing);
    let _held = queue.client_port().acquire_for_render().unwrap();

    let producers: Vec<_> = (0..3).map(|_| spawn_blocked_producer(&queue)).collect();
    for (rx, _) in &producers {
        assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());
    }

    queue.close();
    for (rx, producer) in producers {
        assert_eq!(rx.recv_timeout(RECV_LIMIT).unwrap(), Err(QueueError::Closed));
        producer.join().unwrap();
    }

    let compositor = queue.compositor_port();
    assert_eq!(
        compositor.acquire_for_composition().unwrap_err(),
        QueueError::Closed
    );
    assert_eq!(
        compositor.wait_for_frame(Duration::from_millis(10)),
        Err(QueueError::Closed)
    );
}

#[test]
fn growing_capacity_unblocks_producer() {
    let queue = queue(1, Policy::Queueing);
    let held = queue.client_port().acquire_for_render().unwrap();
    let (rx, producer) = spawn_blocked_producer(&queue);
    assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());

    queue.policy_selector().set_capacity(2).unwrap();
    let granted = rx.recv_timeout(RECV_LIMIT).unwrap().unwrap();
    assert_ne!(granted, held.buffer_id());
    producer.join().unwrap();
}

#[test]
fn switching_to_frame_dropping_unblocks_producer() {
    let queue = queue(2, Policy::Queueing);
    let client = queue.client_port();
    let mut submitted = Vec::new();
    for _ in 0..2 {
        let handle = client.acquire_for_render().unwrap();
        submitted.push(handle.buffer_id());
        client.submit(handle, None).unwrap();
    }

    let (rx, producer) = spawn_blocked_producer(&queue);
    assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());

    queue
        .policy_selector()
        .set_policy(Policy::FrameDropping)
        .unwrap();
    assert_eq!(rx.recv_timeout(RECV_LIMIT).unwrap(), Ok(submitted[0]));
    producer.join().unwrap();
    assert_eq!(queue.snapshot().ready.len(), 1);
}

#[test]
fn shrinking_never_revokes_leases() {
    let queue = queue(3, Policy::Queueing);
    let client = queue.client_port();
    let compositor = queue.compositor_port();

    let handles: Vec<_> = (0..3)
        .map(|_| client.acquire_for_render().unwrap())
        .collect();
    queue.policy_selector().set_capacity(1).unwrap();

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.capacity, 1);
    assert_eq!(snapshot.count(SlotState::ClientOwned), 3);
    assert_eq!(
        snapshot
            .slots
            .iter()
            .filter(|slot| slot.retiring)
            .map(|slot| slot.index)
            .collect::<Vec<_>>(),
        vec![1, 2]
    );

    for handle in handles {
        client.submit(handle, None).unwrap();
    }
    for _ in 0..3 {
        let shown = compositor.acquire_for_composition().unwrap().unwrap();
        compositor.release(shown).unwrap();
    }

    let snapshot = queue.snapshot();
    assert_eq!(snapshot.live_slots(), 1);
    assert_eq!(snapshot.state_of(0), Some(SlotState::Free));
}

#[test]
fn wait_for_frame_ignores_ring_of_a_frame_already_taken() {
    let queue = queue(2, Policy::Queueing);
    let client = queue.client_port();
    let compositor = queue.compositor_port();

    let handle = client.acquire_for_render().unwrap();
    client.submit(handle, None).unwrap();
    let shown = compositor.acquire_for_composition().unwrap().unwrap();
    compositor.release(shown).unwrap();

    let started = Instant::now();
    assert_eq!(compositor.wait_for_frame(Duration::from_millis(200)), Ok(false));
    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[test]
fn doorbell_rings_on_submit_from_another_thread() {
    let queue = queue(2, Policy::Queueing);
    let compositor = queue.compositor_port();

    assert_eq!(compositor.wait_for_frame(Duration::from_millis(10)), Ok(false));

    let submitter = {
        let queue = queue.clone();
        thread::spawn(move || {
            let client = queue.client_port();
            let handle = client.acquire_for_render().unwrap();
            client.submit(handle, None).unwrap();
        })
    };
    assert_eq!(compositor.wait_for_frame(RECV_LIMIT), Ok(true));
    submitter.join().unwrap();

    let shown = compositor.acquire_for_composition().unwrap().unwrap();
    compositor.release(shown).unwrap();
}

/// Producers and a compositor run concurrently; every acquire records the buffer in a shared
/// in-use set, so two simultaneous owners of one buffer fail the test. A non-empty `resizes`
/// cycles the capacity through those values while the run is in progress.
fn run_exclusive_ownership(
    policy: Policy,
    capacity: usize,
    producers: usize,
    frames: usize,
    resizes: &[usize],
) {
    let queue = queue(capacity, policy);
    let in_use = Arc::new(Mutex::new(HashSet::new()));
    let max_capacity = resizes.iter().copied().fold(capacity, usize::max);

    let stop = Arc::new(AtomicBool::new(false));
    let resizer = (!resizes.is_empty()).then(|| {
        let selector = queue.policy_selector();
        let stop = Arc::clone(&stop);
        let resizes = resizes.to_vec();
        thread::spawn(move || {
            for &next in resizes.iter().cycle() {
                if stop.load(Ordering::SeqCst) {
                    break;
                }
                selector.set_capacity(next).unwrap();
                thread::sleep(Duration::from_millis(1));
            }
        })
    });

    let workers: Vec<_> = (0..producers)
        .map(|_| {
            let queue = queue.clone();
            let in_use = Arc::clone(&in_use);
            thread::spawn(move || {
                let client = queue.client_port();
                for _ in 0..frames {
                    let handle = match client.acquire_for_render_timeout(RECV_LIMIT) {
                        Ok(handle) => handle,
                        Err(QueueError::Closed) => return,
                        Err(err) => panic!("producer failed: {err}"),
                    };
                    assert!(in_use.lock().unwrap().insert(handle.buffer_id()));
                    thread::yield_now();
                    assert!(in_use.lock().unwrap().remove(&handle.buffer_id()));
                    match client.submit(handle, None) {
                        Ok(()) | Err(QueueError::Closed) => {}
                        Err(err) => panic!("submit failed: {err}"),
                    }
                }
            })
        })
        .collect();

    let compositor = queue.compositor_port();
    let expected = producers * frames;
    let mut shown = 0;
    let mut last_age = 0;
    while shown < expected {
        let Some(handle) = compositor.acquire_for_composition().unwrap() else {
            let idle = workers.iter().all(|worker| worker.is_finished());
            if idle && queue.snapshot().ready.is_empty() {
                break;
            }
            compositor.wait_for_frame(Duration::from_millis(50)).unwrap();
            continue;
        };

        assert!(handle.age() > last_age, "frames presented out of order");
        last_age = handle.age();
        assert!(in_use.lock().unwrap().insert(handle.buffer_id()));
        let snapshot = queue.snapshot();
        assert!(snapshot.live_slots() <= max_capacity);
        assert_eq!(snapshot.count(SlotState::CompositorOwned), 1);
        assert!(in_use.lock().unwrap().remove(&handle.buffer_id()));

        compositor.release(handle).unwrap();
        shown += 1;
    }

    for worker in workers {
        worker.join().unwrap();
    }
    stop.store(true, Ordering::SeqCst);
    if let Some(resizer) = resizer {
        resizer.join().unwrap();
    }
    if policy == Policy::Queueing {
        assert_eq!(shown, expected, "queueing must present every frame");
    }

    if let Some(&last) = resizes.last() {
        queue.policy_selector().set_capacity(last).unwrap();
        let snapshot = queue.snapshot();
        assert_eq!(snapshot.count(SlotState::ClientOwned), 0);
        assert_eq!(snapshot.count(SlotState::CompositorOwned), 0);
        assert!(snapshot.live_slots() <= last);
    }
    queue.close();
}

#[test]
fn queueing_keeps_ownership_exclusive_under_contention() {
    run_exclusive_ownership(Policy::Queueing, 3, 3, 50, &[]);
}

#[test]
fn frame_dropping_keeps_ownership_exclusive_under_contention() {
    run_exclusive_ownership(Policy::FrameDropping, 3, 2, 100, &[]);
}

#[test]
fn queueing_survives_capacity_changes_under_contention() {
    run_exclusive_ownership(Policy::Queueing, 3, 3, 50, &[1, 4, 2]);
}

#[test]
fn frame_dropping_survives_capacity_changes_under_contention() {
    run_exclusive_ownership(Policy::FrameDropping, 3, 2, 100, &[1, 4, 2]);
}
