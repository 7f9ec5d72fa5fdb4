//! A self-perpetuating loop in the style of the smallest useful firmware:
//! one task re-posting itself with fresh arguments, a keep-alive helper
//! that never lets the queue run dry, and a timeout that shuts the whole
//! thing down.
//!
//! Run with `RUST_LOG=trace` to watch the ticker thread lifecycle.
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use tickloop::{task, EventLoop, HelperFunctions};
use tickloop_port_std::{start_ticker, stop_ticker};

static EVENT_LOOP: EventLoop<768> = EventLoop::new();
static KEEP_RUNNING: AtomicBool = AtomicBool::new(true);
static ROUNDS: AtomicU32 = AtomicU32::new(0);

fn churn(a: i32, b: i32) {
    if KEEP_RUNNING.load(Ordering::Relaxed) {
        ROUNDS.fetch_add(1, Ordering::Relaxed);
        let _ = EVENT_LOOP.next_tick(task(churn).args((a + b, a - b)));
    }
}

fn shut_down() {
    KEEP_RUNNING.store(false, Ordering::Relaxed);
}

fn main() {
    tickloop_port_std::env_logger::init();

    EVENT_LOOP.set_helper_functions(HelperFunctions {
        pre_queue_process: None,
        post_queue_process: Some(|len| {
            if len == 0 && KEEP_RUNNING.load(Ordering::Relaxed) {
                let _ = EVENT_LOOP.next_tick(task(|| {}));
            }
            0
        }),
        on_task_allocation_failed: Some(|_| log::warn!("task buffer full, dropping work")),
    });

    start_ticker();
    EVENT_LOOP.next_tick(task(churn).args((1, 2))).unwrap();
    EVENT_LOOP.set_timeout(task(shut_down), 50).unwrap();
    EVENT_LOOP.run();
    stop_ticker();

    println!("looped {} times in 50 ms", ROUNDS.load(Ordering::Relaxed));
}
