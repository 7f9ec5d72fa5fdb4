//! The event loop.
//!
//! # Generations
//!
//! Work is drained in *generations*. A generation is the set of records
//! present in the queue at the moment a drain begins; it is delimited by
//! two offsets into the queue, `cur_begin` and `delimiter`. Everything
//! pushed while the generation runs, whether by the application or by the
//! drain reinjecting a still-pending record, lands after `delimiter` and
//! runs in the next generation. The result is a two-level, starvation-free
//! schedule: work that was pending when the round started always runs
//! before work produced during the round.
//!
//! Each record is handled once per generation:
//!
//!  - [`TaskKind::Immediate`] records execute and are discarded.
//!  - [`TaskKind::Timeout`] records execute once their countdown is
//!    exhausted by the accumulated `passed_ms`; otherwise the countdown is
//!    decremented in place and the record is reinjected.
//!  - [`TaskKind::LongTimeout`] records compare their absolute deadline
//!    against [`clock::absolute`] and are reinjected until it passes.
//!  - [`TaskKind::Interval`] records execute whenever their countdown
//!    expires, rearm to their period, and are always reinjected.
//!  - [`TaskKind::Event`] records are always reinjected; after the copy,
//!    the application's [`EventSlot`] is rewritten to the new location.
//!  - [`TaskKind::Disabled`] records are skipped.
//!
//! # Re-entrancy and placement
//!
//! Every operation takes `&self`; the loop's state lives in `Cell`s. This
//! is load-bearing: a task body may push more work into the very loop that
//! is executing it, which is how applications keep a loop alive (push a
//! task from `post_queue_process` whenever the queue runs dry) and how
//! self-perpetuating tasks are written. A loop may be placed in a `static`.
//!
//! The loop is a single-context structure. The only thing an interrupt
//! handler may do is advance the clock via [`clock::tick`]; it must never
//! enqueue, cancel, or drain. `run` and `run_once` must not be called from
//! inside a task.
//!
//! [`clock::tick`]: crate::clock::tick
//! [`clock::absolute`]: crate::clock::absolute
use core::cell::Cell;

use crate::clock;
use crate::error::AllocationError;
use crate::queue::{TaskQueue, TaskRef};
use crate::task::{ArgTuple, FnIdent, RawTask, Schedule, Task, TaskFn, TaskKind};
use crate::time::Instant;
use crate::utils::Init;

/// Delays up to this many milliseconds fit a 16-bit in-record countdown;
/// anything longer is anchored to an absolute deadline instead.
pub const SHORT_TIMEOUT_MAX_MS: u32 = u16::MAX as u32;

/// Optional application hooks around and inside a drain.
#[derive(Debug, Clone, Copy, Default)]
pub struct HelperFunctions {
    /// Runs before each generation with the current queue length.
    pub pre_queue_process: Option<fn(u16) -> u8>,
    /// Runs after each generation with the remaining queue length.
    pub post_queue_process: Option<fn(u16) -> u8>,
    /// Reports an enqueue that failed for lack of buffer space, identified
    /// by the callable of the rejected task.
    pub on_task_allocation_failed: Option<fn(FnIdent)>,
}

impl Init for HelperFunctions {
    const INIT: Self = Self {
        pre_queue_process: None,
        post_queue_process: None,
        on_task_allocation_failed: None,
    };
}

/// An application-owned cell tracking an event handler's current record.
///
/// A [`TaskKind::Event`] record moves to a new slot on every generation,
/// so its handle goes stale once per drain. The slot is the stable
/// indirection: the loop rewrites it each time the record moves, and
/// [`EventLoop::clear_event_handler`] disables whatever the slot currently
/// names. Slots are bound with [`EventLoop::bind_event_handler`] and must
/// live in a `static`.
///
/// Like the loop itself, a slot belongs to the single context driving the
/// loop, and each slot must only ever be used with one loop.
pub struct EventSlot {
    current: Cell<Option<TaskRef>>,
}

// Safety: only touched from the context driving the loop; the interrupt
// contract (tick only) keeps every other context out.
unsafe impl Sync for EventSlot {}

impl EventSlot {
    pub const fn new() -> Self {
        Self {
            current: Cell::new(None),
        }
    }

    /// Handle of the currently bound record, if any.
    #[inline]
    pub fn get(&self) -> Option<TaskRef> {
        self.current.get()
    }

    #[inline]
    pub(crate) fn set(&self, task: Option<TaskRef>) {
        self.current.set(task);
    }
}

impl Default for EventSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Init for EventSlot {
    const INIT: Self = Self::new();
}

impl core::fmt::Debug for EventSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("EventSlot").field(&self.current.get()).finish()
    }
}

/// A cooperative event loop over a task buffer of `N` bytes.
///
/// `N` must exceed the footprint of the largest record pushed into it;
/// an over-large record simply never finds a slot.
pub struct EventLoop<const N: usize> {
    queue: TaskQueue<N>,
    /// Start of the current generation. Equals the queue head.
    cur_begin: Cell<usize>,
    /// One past the end of the current generation.
    delimiter: Cell<usize>,
    /// One past the end of the next generation. Equals the queue tail.
    next_end: Cell<usize>,
    helpers: Cell<HelperFunctions>,
    draining: Cell<bool>,
}

// Safety: single-context structure; see the module documentation. The
// interrupt contract (clock ticks only) is what makes `static` placement
// sound.
unsafe impl<const N: usize> Sync for EventLoop<N> {}

impl<const N: usize> EventLoop<N> {
    /// Capacity of the task buffer in bytes.
    pub const TASK_BUFFER_SIZE: usize = N;

    pub const fn new() -> Self {
        Self {
            queue: TaskQueue::new(),
            cur_begin: Cell::new(0),
            delimiter: Cell::new(0),
            next_end: Cell::new(0),
            helpers: Cell::new(HelperFunctions::INIT),
            draining: Cell::new(false),
        }
    }

    pub fn set_helper_functions(&self, helpers: HelperFunctions) {
        self.helpers.set(helpers);
    }

    /// Number of live records, disabled ones included.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.len() == 0
    }

    /// Copy the record at `src` to the queue tail and extend the next
    /// generation over it. On failure, reports through
    /// [`HelperFunctions::on_task_allocation_failed`].
    ///
    /// # Safety
    ///
    /// `src` must point to a live, fully initialized record.
    unsafe fn push_record(&self, src: *const RawTask) -> Result<TaskRef, AllocationError> {
        let result = unsafe { self.queue.push_raw(src) };
        self.next_end.set(self.queue.tail());
        match result {
            Ok(offset) => {
                // The push may have restarted an empty ring at the buffer
                // start; the generation origin tracks the queue head.
                self.cur_begin.set(self.queue.head());
                Ok(TaskRef { offset })
            }
            Err(e) => {
                let ident = unsafe { RawTask::ident_at(src) };
                if let Some(report) = self.helpers.get().on_task_allocation_failed {
                    report(ident);
                }
                Err(e)
            }
        }
    }

    fn push_task<F, A>(&self, task: Task<F, A>) -> Result<TaskRef, AllocationError>
    where
        F: TaskFn<A>,
        A: ArgTuple,
    {
        // Safety: `task` is a live record for the duration of the call
        unsafe { self.push_record(task.raw_ptr()) }
    }

    /// Schedule `task` for the next generation.
    pub fn next_tick<F, A>(&self, task: Task<F, A>) -> Result<TaskRef, AllocationError>
    where
        F: TaskFn<A>,
        A: ArgTuple,
    {
        self.push_task(task)
    }

    /// Schedule `task` to run once, `ms` milliseconds from now.
    ///
    /// Delays of at most [`SHORT_TIMEOUT_MAX_MS`] count down in the record
    /// itself; longer delays are pinned to an absolute deadline of the
    /// monotonic clock. Several timeouts for the same callable co-exist;
    /// [`clear_timeout`](Self::clear_timeout) disables all of them.
    pub fn set_timeout<F, A>(&self, task: Task<F, A>, ms: u32) -> Result<TaskRef, AllocationError>
    where
        F: TaskFn<A>,
        A: ArgTuple,
    {
        let mut task = task;
        if ms <= SHORT_TIMEOUT_MAX_MS {
            task.set_sched(Schedule::Timeout {
                time_left: ms as u16,
            });
        } else {
            task.set_sched(Schedule::LongTimeout {
                fire_at: clock::absolute() + ms as u64,
            });
        }
        self.push_task(task)
    }

    /// Schedule `task` to run once at `when`. A deadline already in the
    /// past degrades to [`next_tick`](Self::next_tick).
    pub fn schedule_timeout<F, A>(
        &self,
        task: Task<F, A>,
        when: Instant,
    ) -> Result<TaskRef, AllocationError>
    where
        F: TaskFn<A>,
        A: ArgTuple,
    {
        let now = clock::absolute();
        if when < now {
            return self.next_tick(task);
        }
        let diff = when.saturating_duration_since(now);
        let mut task = task;
        if diff <= SHORT_TIMEOUT_MAX_MS as u64 {
            task.set_sched(Schedule::Timeout {
                time_left: diff as u16,
            });
        } else {
            task.set_sched(Schedule::LongTimeout { fire_at: when });
        }
        self.push_task(task)
    }

    /// Schedule `task` to run every `ms` milliseconds, starting `ms`
    /// milliseconds from now.
    pub fn set_interval<F, A>(&self, task: Task<F, A>, ms: u16) -> Result<TaskRef, AllocationError>
    where
        F: TaskFn<A>,
        A: ArgTuple,
    {
        let mut task = task;
        task.set_sched(Schedule::Interval {
            time_left: ms,
            period: ms,
        });
        self.push_task(task)
    }

    /// Bind `task` as an event handler tracked by `slot`, replacing and
    /// disabling whatever the slot was bound to before. The slot follows
    /// the record as it moves between generations; on allocation failure
    /// the slot ends up unbound.
    pub fn bind_event_handler<F, A>(
        &self,
        slot: &'static EventSlot,
        task: Task<F, A>,
    ) -> Result<TaskRef, AllocationError>
    where
        F: TaskFn<A>,
        A: ArgTuple,
    {
        if slot.get().is_some() {
            self.clear_event_handler(slot);
        }
        let mut task = task;
        task.set_sched(Schedule::Event { keeper: Some(slot) });
        let result = self.push_task(task);
        slot.set(result.ok());
        result
    }

    /// Disable the handler currently tracked by `slot`, if any, and unbind
    /// the slot. Idempotent.
    pub fn clear_event_handler(&self, slot: &'static EventSlot) {
        if let Some(bound) = slot.get() {
            // Only a live Event record is torn down; anything else means
            // the slot went stale and the record is already gone.
            // Safety: a bound slot names a record the drain keeps alive
            if unsafe { RawTask::kind_at(self.queue.record_at(bound.offset)) } == TaskKind::Event {
                self.queue.disable(bound.offset);
            }
        }
        slot.set(None);
    }

    /// Disable the record behind `task` in place.
    pub fn disable_task(&self, task: TaskRef) {
        self.queue.disable(task.offset);
    }

    /// Run the callable of the record behind `task` right now, in place.
    ///
    /// This is how bound event handlers fire: an interrupt marks the
    /// event, and the main context triggers the slot's current record.
    /// Disabled records are ignored. Scheduling state does not change.
    pub fn trigger(&self, task: TaskRef) {
        let record = self.queue.record_at(task.offset);
        // Safety: handle validity is the caller's contract
        unsafe {
            if RawTask::kind_at(record) != TaskKind::Disabled {
                RawTask::execute_at(record);
            }
        }
    }

    /// Disable every pending short or long timeout of `ident`. Idempotent;
    /// unknown identities are ignored.
    pub fn clear_timeout(&self, ident: FnIdent) {
        self.scan(|offset, kind, record_ident| {
            if matches!(kind, TaskKind::Timeout | TaskKind::LongTimeout) && record_ident == ident {
                self.queue.disable(offset);
            }
            false
        });
    }

    /// Disable every pending interval of `ident`. Idempotent.
    pub fn clear_interval(&self, ident: FnIdent) {
        self.scan(|offset, kind, record_ident| {
            if kind == TaskKind::Interval && record_ident == ident {
                self.queue.disable(offset);
            }
            false
        });
    }

    /// First pending short or long timeout of `ident`. The handle is only
    /// valid until the next drain passes the record.
    pub fn find_timeout(&self, ident: FnIdent) -> Option<TaskRef> {
        let mut found = None;
        self.scan(|offset, kind, record_ident| {
            if matches!(kind, TaskKind::Timeout | TaskKind::LongTimeout) && record_ident == ident {
                found = Some(TaskRef { offset });
                true
            } else {
                false
            }
        });
        found
    }

    /// First pending interval of `ident`. Same validity rule as
    /// [`find_timeout`](Self::find_timeout).
    pub fn find_interval(&self, ident: FnIdent) -> Option<TaskRef> {
        let mut found = None;
        self.scan(|offset, kind, record_ident| {
            if kind == TaskKind::Interval && record_ident == ident {
                found = Some(TaskRef { offset });
                true
            } else {
                false
            }
        });
        found
    }

    /// Kind of the record behind `task`.
    pub fn task_kind(&self, task: TaskRef) -> TaskKind {
        // Safety: handle validity is the caller's contract
        unsafe { RawTask::kind_at(self.queue.record_at(task.offset)) }
    }

    /// Identity of the record behind `task`.
    pub fn task_ident(&self, task: TaskRef) -> FnIdent {
        // Safety: handle validity is the caller's contract
        unsafe { RawTask::ident_at(self.queue.record_at(task.offset)) }
    }

    /// Remaining countdown of a short timeout or interval record.
    pub fn task_time_left(&self, task: TaskRef) -> Option<u16> {
        // Safety: handle validity is the caller's contract
        match unsafe { RawTask::sched_at(self.queue.record_at(task.offset)) } {
            Schedule::Timeout { time_left } | Schedule::Interval { time_left, .. } => {
                Some(time_left)
            }
            _ => None,
        }
    }

    /// Absolute deadline of a long timeout record.
    pub fn task_fire_at(&self, task: TaskRef) -> Option<Instant> {
        // Safety: handle validity is the caller's contract
        match unsafe { RawTask::sched_at(self.queue.record_at(task.offset)) } {
            Schedule::LongTimeout { fire_at } => Some(fire_at),
            _ => None,
        }
    }

    /// Period of an interval record.
    pub fn task_period(&self, task: TaskRef) -> Option<u16> {
        // Safety: handle validity is the caller's contract
        match unsafe { RawTask::sched_at(self.queue.record_at(task.offset)) } {
            Schedule::Interval { period, .. } => Some(period),
            _ => None,
        }
    }

    /// Queue bookkeeping `(head, tail, truncation marker, length)`, for
    /// tests and debugging.
    #[doc(hidden)]
    pub fn debug_queue_markers(&self) -> (usize, usize, Option<usize>, usize) {
        (
            self.queue.head(),
            self.queue.tail(),
            self.queue.truncated(),
            self.queue.len(),
        )
    }

    /// Generation bookkeeping `(cur_begin, delimiter, next_end)`, for
    /// tests and debugging.
    #[doc(hidden)]
    pub fn debug_generation_markers(&self) -> (usize, usize, usize) {
        (
            self.cur_begin.get(),
            self.delimiter.get(),
            self.next_end.get(),
        )
    }

    /// Visit every live record between the current generation's start and
    /// the next generation's end. A record awaiting execution sits in this
    /// range no matter which of the two generations it belongs to, so the
    /// cancellation and lookup scans need no per-record generation tag.
    fn scan(&self, mut visit: impl FnMut(usize, TaskKind, FnIdent) -> bool) {
        let mut p = self.cur_begin.get();
        let end = self.next_end.get();
        while p != end {
            let record = self.queue.record_at(p);
            // Safety: `cur_begin..next_end` covers live records only
            let (kind, ident) = unsafe { (RawTask::kind_at(record), RawTask::ident_at(record)) };
            if visit(p, kind, ident) {
                return;
            }
            p = self.queue.next_after(p);
        }
    }

    /// Drain one generation, then run again until no work remains.
    ///
    /// `passed_ms` for each drain is measured from consecutive clock
    /// reads. With a `post_queue_process` helper that refills the queue
    /// this never returns.
    pub fn run(&self) {
        let mut prev = clock::absolute();
        while self.cur_begin.get() != self.next_end.get() {
            let now = clock::absolute();
            let passed_ms = now.saturating_duration_since(prev).min(u16::MAX as u64) as u16;
            self.run_once(passed_ms);
            prev = now;
        }
    }

    /// Drain exactly one generation, crediting `passed_ms` milliseconds to
    /// every countdown in it. Returns the status byte of whichever helper
    /// ran last, zero without helpers.
    pub fn run_once(&self, passed_ms: u16) -> u8 {
        let helpers = self.helpers.get();
        let mut status = 0;
        if let Some(pre) = helpers.pre_queue_process {
            status = pre(self.queue.len() as u16);
        }
        self.run_current_queue(passed_ms);
        if let Some(post) = helpers.post_queue_process {
            status = post(self.queue.len() as u16);
        }
        status
    }

    fn run_current_queue(&self, passed_ms: u16) {
        debug_assert!(!self.draining.get(), "run_once called from inside a task");
        self.draining.set(true);

        // The generation boundary is everything pending right now; records
        // pushed while the drain runs land past it.
        self.delimiter.set(self.next_end.get());

        let mut p = self.cur_begin.get();
        while p != self.delimiter.get() {
            let record = self.queue.record_at(p);
            // Safety: `p` walks live records of the current generation
            match unsafe { RawTask::sched_at(record) } {
                Schedule::Immediate => {
                    // Safety: live record
                    unsafe { RawTask::execute_at(record) };
                }
                Schedule::Timeout { time_left } => {
                    if time_left <= passed_ms {
                        // Safety: live record
                        unsafe { RawTask::execute_at(record) };
                    } else {
                        // Safety: live record; reinjection copies it out
                        unsafe {
                            RawTask::set_sched_at(
                                record,
                                Schedule::Timeout {
                                    time_left: time_left - passed_ms,
                                },
                            );
                            let _ = self.push_record(record);
                        }
                    }
                }
                Schedule::LongTimeout { fire_at } => {
                    if fire_at <= clock::absolute() {
                        // Safety: live record
                        unsafe { RawTask::execute_at(record) };
                    } else {
                        // Safety: live record
                        let _ = unsafe { self.push_record(record) };
                    }
                }
                Schedule::Interval { time_left, period } => {
                    if time_left <= passed_ms {
                        // Safety: live record
                        unsafe { RawTask::execute_at(record) };
                        // Safety: live record; rearm after the call so a
                        // cancellation from inside the task still lands on
                        // the record that gets reinjected
                        unsafe {
                            RawTask::set_sched_at(
                                record,
                                Schedule::Interval {
                                    time_left: period,
                                    period,
                                },
                            );
                        }
                    } else {
                        // Safety: live record
                        unsafe {
                            RawTask::set_sched_at(
                                record,
                                Schedule::Interval {
                                    time_left: time_left - passed_ms,
                                    period,
                                },
                            );
                        }
                    }
                    // Safety: live record
                    let _ = unsafe { self.push_record(record) };
                }
                Schedule::Event { keeper } => {
                    // Safety: live record
                    if let Ok(moved) = unsafe { self.push_record(record) } {
                        if let Some(slot) = keeper {
                            slot.set(Some(moved));
                        }
                    }
                }
                Schedule::Disabled => {}
            }

            let next = self.queue.next_after(p);
            if next == 0 && self.queue.truncated() == Some(self.delimiter.get()) {
                // The generation boundary sat on the truncation marker;
                // it wraps along with the iterator.
                self.delimiter.set(next);
            }
            self.queue.pop();
            p = next;
            self.cur_begin.set(p);
        }

        self.draining.set(false);
    }
}

impl<const N: usize> Default for EventLoop<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Init for EventLoop<N> {
    const INIT: Self = Self::new();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::task;
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

    #[test]
    fn immediate_tasks_run_in_fifo_order() {
        static ORDER: std::sync::Mutex<Vec<u8>> = std::sync::Mutex::new(Vec::new());
        fn first() {
            ORDER.lock().unwrap().push(1);
        }
        fn second() {
            ORDER.lock().unwrap().push(2);
        }

        let el = EventLoop::<512>::new();
        el.next_tick(task(first)).unwrap();
        el.next_tick(task(second)).unwrap();
        el.run_once(0);
        assert_eq!(*ORDER.lock().unwrap(), [1, 2]);
        assert!(el.is_empty());
    }

    #[test]
    fn work_pushed_during_drain_waits_for_next_generation() {
        static EL: EventLoop<512> = EventLoop::new();
        static CHILD_RUNS: AtomicUsize = AtomicUsize::new(0);
        fn child() {
            CHILD_RUNS.fetch_add(1, Ordering::Relaxed);
        }
        fn parent() {
            EL.next_tick(task(child)).unwrap();
        }

        EL.next_tick(task(parent)).unwrap();
        EL.run_once(0);
        assert_eq!(CHILD_RUNS.load(Ordering::Relaxed), 0);
        assert_eq!(EL.len(), 1);
        EL.run_once(0);
        assert_eq!(CHILD_RUNS.load(Ordering::Relaxed), 1);
        assert!(EL.is_empty());
    }

    #[test]
    fn timeout_zero_fires_in_the_next_generation() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);
        fn fire() {
            RUNS.fetch_add(1, Ordering::Relaxed);
        }

        let el = EventLoop::<512>::new();
        el.set_timeout(task(fire), 0).unwrap();
        assert_eq!(RUNS.load(Ordering::Relaxed), 0);
        el.run_once(0);
        assert_eq!(RUNS.load(Ordering::Relaxed), 1);
        assert!(el.is_empty());
    }

    #[test]
    fn timeout_counts_down_in_place() {
        fn fire() {}

        let el = EventLoop::<512>::new();
        el.set_timeout(task(fire), 1_000).unwrap();
        el.run_once(300);
        el.run_once(300);
        let pending = el.find_timeout(FnIdent::of(&fire)).unwrap();
        assert_eq!(el.task_time_left(pending), Some(400));
        assert_eq!(el.task_kind(pending), TaskKind::Timeout);
    }

    #[test]
    fn clear_timeout_disables_every_match() {
        static RUNS: AtomicUsize = AtomicUsize::new(0);
        fn doomed() {
            RUNS.fetch_add(1, Ordering::Relaxed);
        }

        let el = EventLoop::<512>::new();
        el.set_timeout(task(doomed), 10).unwrap();
        el.set_timeout(task(doomed), 20).unwrap();
        el.clear_timeout(FnIdent::of(&doomed));
        assert_eq!(el.find_timeout(FnIdent::of(&doomed)), None);
        for _ in 0..8 {
            el.run_once(10);
        }
        assert_eq!(RUNS.load(Ordering::Relaxed), 0);
        assert!(el.is_empty());
    }

    #[test]
    fn interval_record_carries_period_and_countdown() {
        fn beat() {}

        let el = EventLoop::<512>::new();
        el.set_interval(task(beat), 100).unwrap();
        el.run_once(40);
        let pending = el.find_interval(FnIdent::of(&beat)).unwrap();
        assert_eq!(el.task_time_left(pending), Some(60));
        assert_eq!(el.task_period(pending), Some(100));
        el.clear_interval(FnIdent::of(&beat));
        el.run_once(0);
        assert!(el.is_empty());
    }

    #[test]
    fn helper_status_comes_from_the_last_helper() {
        static PRE_SEEN: AtomicU8 = AtomicU8::new(0);

        let el = EventLoop::<512>::new();
        el.set_helper_functions(HelperFunctions {
            pre_queue_process: Some(|len| {
                PRE_SEEN.store(len as u8, Ordering::Relaxed);
                7
            }),
            post_queue_process: None,
            on_task_allocation_failed: None,
        });
        el.next_tick(task(|| {})).unwrap();
        assert_eq!(el.run_once(0), 7);
        assert_eq!(PRE_SEEN.load(Ordering::Relaxed), 1);

        el.set_helper_functions(HelperFunctions {
            pre_queue_process: Some(|_| 7),
            post_queue_process: Some(|_| 9),
            on_task_allocation_failed: None,
        });
        assert_eq!(el.run_once(0), 9);
    }

    #[test]
    fn allocation_failure_reports_once_and_changes_nothing() {
        static FAILURES: AtomicUsize = AtomicUsize::new(0);
        fn victim() {}

        let el = EventLoop::<256>::new();
        el.set_helper_functions(HelperFunctions {
            pre_queue_process: None,
            post_queue_process: None,
            on_task_allocation_failed: Some(|_| {
                FAILURES.fetch_add(1, Ordering::Relaxed);
            }),
        });
        while el.next_tick(task(victim)).is_ok() {}
        assert_eq!(FAILURES.load(Ordering::Relaxed), 1);
        let len = el.len();
        assert_eq!(el.next_tick(task(victim)), Err(AllocationError));
        assert_eq!(el.len(), len);
        assert_eq!(FAILURES.load(Ordering::Relaxed), 2);
    }
}
