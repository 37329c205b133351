use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::SystemTime;

use chanmux::core::queue::HandoffQueue;

const PAYLOAD_SIZE: usize = 255;

fn start_gate() -> Arc<(Mutex<bool>, Condvar)> {
    Arc::new((Mutex::new(false), Condvar::new()))
}

fn wait_for_start(start_pair: &(Mutex<bool>, Condvar)) {
    let (lock, cvar) = start_pair;
    let mut started = lock.lock().unwrap();
    while !*started {
        started = cvar.wait(started).unwrap();
    }
}

fn open_gate(start_pair: &(Mutex<bool>, Condvar)) {
    let (lock, cvar) = start_pair;
    *lock.lock().unwrap() = true;
    cvar.notify_all();
}

/// Many producers enqueue into a single queue drained by a blocking consumer.
pub fn benchmark_handoff_collect(n_producers: usize, n_items: usize) {
    let queue = HandoffQueue::new();
    let start_pair = start_gate();

    for _ in 0..n_producers {
        let queue = queue.clone();
        let start_pair = start_pair.clone();

        thread::spawn(move || {
            wait_for_start(&start_pair);
            for i in 0..n_items {
                queue.enqueue([(i % 256) as u8; PAYLOAD_SIZE]).unwrap();
            }
        });
    }

    let start = SystemTime::now();
    open_gate(&start_pair);

    for _ in 0..n_producers * n_items {
        queue.dequeue().unwrap();
    }

    let duration = SystemTime::now().duration_since(start).unwrap();
    log::info!(
        "[benchmark_handoff_collect] {n_items} items of {PAYLOAD_SIZE} bytes per {n_producers} producers: {}s",
        duration.as_secs_f32()
    )
}

/// Consumers register their dequeue operations first, so every item is handed off directly.
pub fn benchmark_handoff_waiters(n_consumers: usize, n_items: usize) {
    let queue = HandoffQueue::new();
    let done = HandoffQueue::new();

    for _ in 0..n_consumers {
        let queue = queue.clone();
        let done = done.clone();

        thread::spawn(move || {
            for _ in 0..n_items {
                queue.begin_dequeue().wait().unwrap();
            }
            done.enqueue(()).unwrap();
        });
    }

    let start = SystemTime::now();
    for i in 0..n_consumers * n_items {
        queue.enqueue([(i % 256) as u8; PAYLOAD_SIZE]).unwrap();
    }
    for _ in 0..n_consumers {
        done.dequeue().unwrap();
    }

    let duration = SystemTime::now().duration_since(start).unwrap();
    log::info!(
        "[benchmark_handoff_waiters] {n_items} items of {PAYLOAD_SIZE} bytes per {n_consumers} consumers: {}s",
        duration.as_secs_f32()
    )
}
