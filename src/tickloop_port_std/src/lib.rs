#![doc = include_str!("./lib.md")]
#![deny(unsafe_op_in_unsafe_fn)]

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use spin::Mutex as SpinMutex;

/// Re-exported so binaries can initialize logging without naming the crate
/// themselves.
pub extern crate env_logger;

enum TickerCmd {
    Stop,
}

struct TickerState {
    cmd_send: mpsc::Sender<TickerCmd>,
    join: thread::JoinHandle<()>,
}

static TICKER: SpinMutex<Option<TickerState>> = SpinMutex::new(None);

/// Start the background thread that advances the global clock by one
/// millisecond per elapsed millisecond. Idempotent.
pub fn start_ticker() {
    let mut ticker = TICKER.lock();
    if ticker.is_some() {
        log::trace!("ticker thread already running");
        return;
    }
    log::trace!("starting the ticker thread");
    let (cmd_send, cmd_recv) = mpsc::channel();
    let join = thread::Builder::new()
        .name("tickloop clock".to_owned())
        .spawn(move || ticker_thread(cmd_recv))
        .expect("failed to spawn the ticker thread");
    *ticker = Some(TickerState { cmd_send, join });
}

/// Stop the ticker thread and wait for it to exit. Idempotent.
pub fn stop_ticker() {
    let state = TICKER.lock().take();
    let Some(state) = state else { return };
    log::trace!("stopping the ticker thread");
    let _ = state.cmd_send.send(TickerCmd::Stop);
    let _ = state.join.join();
    log::trace!("stopped the ticker thread");
}

fn ticker_thread(cmd_recv: mpsc::Receiver<TickerCmd>) {
    let mut next = Instant::now() + Duration::from_millis(1);
    loop {
        let timeout = next.saturating_duration_since(Instant::now());
        match cmd_recv.recv_timeout(timeout) {
            Ok(TickerCmd::Stop) | Err(mpsc::RecvTimeoutError::Disconnected) => return,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // Credit every whole millisecond since the last wakeup, so
                // scheduling hiccups delay ticks but never lose them.
                loop {
                    tickloop::clock::tick(1);
                    next += Duration::from_millis(1);
                    if next > Instant::now() {
                        break;
                    }
                }
            }
        }
    }
}
