//! The circular task queue.
//!
//! A fixed byte buffer holding task records back to back. Records are
//! heterogeneously sized; iteration advances by each record's self-reported
//! footprint. The region in use is delimited by two offsets:
//!
//! ```text
//! [0]────────[head]━━━━━━━━━━━[tail]────────[N]
//!             └── live records ──┘
//! ```
//!
//! When a record does not fit between `tail` and the end of the buffer, the
//! queue wraps: the record is placed at offset 0 and the old `tail` is
//! remembered as the *truncation marker*, the point where this lap of the
//! ring logically ends. While the marker is set the live region is split:
//!
//! ```text
//! [0]━━━━[tail]────[head]━━━━[truncated]╌╌╌╌[N]
//!  └─ newer ─┘      └─ older ────┘     unused
//! ```
//!
//! Iteration hops back to offset 0 upon reaching the marker, and popping
//! the last record before the marker clears it. Disabled records keep
//! their footprint, so cancellation never disturbs the layout.
//!
//! All state lives in `Cell`s: tasks executing during a drain are allowed
//! to push new records through a shared reference. The queue is strictly a
//! single-context structure; see the crate documentation.
use core::cell::{Cell, UnsafeCell};
use core::mem::{size_of, MaybeUninit};

use crate::error::AllocationError;
use crate::task::{RawTask, Schedule, RECORD_ALIGN};
use crate::utils::Init;

/// Backing storage for task records: `N` raw bytes behind an `UnsafeCell`,
/// so the drain and re-entrant pushes can rewrite records through a shared
/// reference. Aligned so that offset 0 (and with it every padded record
/// offset) satisfies [`RECORD_ALIGN`].
#[repr(C, align(16))]
pub(crate) struct RecordBuffer<const N: usize>(UnsafeCell<[MaybeUninit<u8>; N]>);

impl<const N: usize> RecordBuffer<N> {
    const fn new() -> Self {
        Self(UnsafeCell::new([MaybeUninit::uninit(); N]))
    }

    #[inline]
    fn as_mut_ptr(&self) -> *mut u8 {
        self.0.get().cast()
    }
}

/// Handle to a record living in a queue.
///
/// A handle names the record's current slot. It stays valid until the
/// scheduler moves past that slot, i.e. until the record is popped at the
/// end of its generation; using a handle after that names whatever record
/// occupies the slot next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskRef {
    pub(crate) offset: usize,
}

pub(crate) struct TaskQueue<const N: usize> {
    buffer: RecordBuffer<N>,
    head: Cell<usize>,
    tail: Cell<usize>,
    truncated: Cell<Option<usize>>,
    len: Cell<usize>,
}

impl<const N: usize> TaskQueue<N> {
    pub(crate) const fn new() -> Self {
        Self {
            buffer: RecordBuffer::new(),
            head: Cell::new(0),
            tail: Cell::new(0),
            truncated: Cell::new(None),
            len: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len.get()
    }

    #[inline]
    pub(crate) fn head(&self) -> usize {
        self.head.get()
    }

    #[inline]
    pub(crate) fn tail(&self) -> usize {
        self.tail.get()
    }

    #[inline]
    pub(crate) fn truncated(&self) -> Option<usize> {
        self.truncated.get()
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.buffer.as_mut_ptr()
    }

    /// Pointer to the record slot at `offset`.
    ///
    /// Dereferencing requires a live record there; computing the pointer
    /// only requires the offset to be in bounds.
    #[inline]
    pub(crate) fn record_at(&self, offset: usize) -> *mut RawTask {
        debug_assert!(offset + size_of::<RawTask>() <= N);
        debug_assert!(offset % RECORD_ALIGN == 0);
        // Safety: the offset is within the buffer
        unsafe { self.base().add(offset) }.cast()
    }

    /// Find a slot for a record of `n` bytes and commit `tail` (and the
    /// truncation marker, when wrapping) to it.
    fn alloc(&self, n: usize) -> Option<usize> {
        debug_assert!(n > 0 && n % RECORD_ALIGN == 0);
        if self.len.get() == 0 {
            // Nothing is live, so the ring may restart at the buffer
            // start when the stranded tail cannot take the record. A
            // truncation marker over an empty ring would leave iteration
            // pointing at a popped slot.
            debug_assert_eq!(self.truncated.get(), None);
            let tail = self.tail.get();
            if tail + n < N {
                self.tail.set(tail + n);
                return Some(tail);
            }
            if n < N {
                self.head.set(0);
                self.tail.set(n);
                return Some(0);
            }
            return None;
        }
        let head = self.head.get();
        let tail = self.tail.get();
        if head <= tail && tail + n < N {
            // room left in this lap
            self.tail.set(tail + n);
            Some(tail)
        } else if head <= tail && tail + n >= N && n < head {
            // wrap: this lap ends at `tail`, the record starts a new one
            self.truncated.set(Some(tail));
            self.tail.set(n);
            Some(0)
        } else if head > tail && tail + n < head {
            // already wrapped; fill towards `head`
            self.tail.set(tail + n);
            Some(tail)
        } else {
            None
        }
    }

    /// Copy the record at `src` into a freshly allocated slot and return
    /// the slot offset. On failure nothing changes.
    ///
    /// # Safety
    ///
    /// `src` must point to a live, fully initialized record whose declared
    /// size is its true footprint.
    pub(crate) unsafe fn push_raw(&self, src: *const RawTask) -> Result<usize, AllocationError> {
        let n = unsafe { RawTask::size_at(src) };
        let Some(offset) = self.alloc(n) else {
            return Err(AllocationError);
        };
        // Bitwise copy. The source is either outside the buffer or a live
        // record; allocation never hands out bytes of the live region, so
        // the ranges cannot overlap.
        // Safety: `src` is readable for `n` bytes per the contract above,
        // and `offset..offset + n` is within the buffer
        unsafe {
            core::ptr::copy_nonoverlapping(src.cast::<u8>(), self.base().add(offset), n);
        }
        self.len.set(self.len.get() + 1);
        Ok(offset)
    }

    /// Discard the record at `head`. No-op on an empty queue.
    pub(crate) fn pop(&self) {
        if self.len.get() == 0 {
            return;
        }
        let head = self.head.get();
        // Safety: a non-empty queue has a live record at `head`
        let size = unsafe { RawTask::size_at(self.record_at(head)) };
        match self.truncated.get() {
            Some(t) if head + size >= t => {
                // the lap ends here; resume at the buffer start
                self.head.set(0);
                self.truncated.set(None);
            }
            _ => self.head.set(head + size),
        }
        self.len.set(self.len.get() - 1);
    }

    /// Replace the record at `offset` with a same-size tombstone, keeping
    /// the ring layout intact.
    ///
    /// `offset` must name a live record start; handles that outlived their
    /// record hit the debug assertion and are otherwise ignored.
    pub(crate) fn disable(&self, offset: usize) {
        let valid = offset % RECORD_ALIGN == 0 && offset + size_of::<RawTask>() <= N;
        debug_assert!(valid, "stale task handle");
        if !valid {
            return;
        }
        // Safety: in-bounds, record-aligned slot; only the tag is rewritten
        unsafe { RawTask::set_sched_at(self.record_at(offset), Schedule::Disabled) };
    }

    /// Offset of the record following the one at `offset`, hopping back to
    /// the buffer start when the advance crosses the truncation marker.
    pub(crate) fn next_after(&self, offset: usize) -> usize {
        // Safety: callers only advance from live records
        let next = offset + unsafe { RawTask::size_at(self.record_at(offset)) };
        match self.truncated.get() {
            Some(t) if next >= t => 0,
            _ => next,
        }
    }
}

impl<const N: usize> Init for TaskQueue<N> {
    const INIT: Self = Self::new();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::task;
    use quickcheck_macros::quickcheck;

    fn push_probe<const K: usize, const N: usize>(
        q: &TaskQueue<N>,
    ) -> Result<usize, AllocationError> {
        let t = task(move |_buf: [u8; K]| {}).args(([0u8; K],));
        // Safety: `t` is a live record on the stack
        unsafe { q.push_raw(t.raw_ptr()) }
    }

    /// Offsets and sizes of the live records, head first.
    fn walk<const N: usize>(q: &TaskQueue<N>) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        let mut off = q.head();
        for _ in 0..q.len() {
            let size = unsafe { RawTask::size_at(q.record_at(off)) };
            out.push((off, size));
            off = q.next_after(off);
        }
        assert_eq!(off, q.tail());
        out
    }

    #[test]
    fn empty_queue() {
        let q = TaskQueue::<256>::new();
        assert_eq!(q.len(), 0);
        assert_eq!(q.head(), q.tail());
        assert_eq!(q.truncated(), None);
        q.pop(); // no-op
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn push_then_pop_advances_head_by_footprint() {
        let q = TaskQueue::<1024>::new();
        let first = push_probe::<1, 1024>(&q).unwrap();
        let second = push_probe::<24, 1024>(&q).unwrap();
        assert_eq!(q.len(), 2);

        let sizes = walk(&q);
        assert_eq!(sizes[0].0, first);
        assert_eq!(sizes[1].0, second);
        assert_eq!(second, first + sizes[0].1);

        q.pop();
        assert_eq!(q.len(), 1);
        assert_eq!(q.head(), second);
        q.pop();
        assert_eq!(q.len(), 0);
        assert_eq!(q.head(), q.tail());
    }

    #[test]
    fn rejects_when_full_without_state_change() {
        let q = TaskQueue::<512>::new();
        while push_probe::<1, 512>(&q).is_ok() {}
        let snapshot = (q.head(), q.tail(), q.truncated(), q.len());
        assert_eq!(push_probe::<1, 512>(&q), Err(AllocationError));
        assert_eq!((q.head(), q.tail(), q.truncated(), q.len()), snapshot);
    }

    #[test]
    fn wrap_sets_and_clears_truncation() {
        let q = TaskQueue::<1024>::new();
        let mut pushed = 0;
        while push_probe::<1, 1024>(&q).is_ok() {
            pushed += 1;
        }
        let s = walk(&q)[0].1;
        assert!(pushed >= 4, "buffer too small for the probe record");

        // Free two slots at the front, then wrap.
        q.pop();
        q.pop();
        assert_eq!(q.head(), 2 * s);
        let wrapped = push_probe::<1, 1024>(&q).unwrap();
        assert_eq!(wrapped, 0);
        assert_eq!(q.truncated(), Some(pushed * s));
        assert_eq!(q.tail(), s);

        // The advance from the last old-lap record hops to the start.
        let offsets: Vec<usize> = walk(&q).iter().map(|&(o, _)| o).collect();
        assert_eq!(offsets[offsets.len() - 1], 0);
        assert_eq!(offsets[offsets.len() - 2], (pushed - 1) * s);

        // Popping through the marker clears it.
        for _ in 0..pushed - 2 {
            q.pop();
        }
        assert_eq!(q.truncated(), None);
        assert_eq!(q.head(), 0);
        q.pop();
        assert_eq!(q.len(), 0);
        assert_eq!(q.head(), q.tail());
    }

    #[test]
    fn stranded_tail_restarts_at_the_buffer_start() {
        let q = TaskQueue::<512>::new();
        let mut pushed = 0;
        while push_probe::<1, 512>(&q).is_ok() {
            pushed += 1;
        }
        for _ in 0..pushed {
            q.pop();
        }
        assert_eq!(q.len(), 0);
        assert_eq!(q.head(), q.tail());
        assert!(q.head() > 0);

        // The next record cannot fit at the stranded tail; the empty ring
        // restarts cleanly instead of planting a truncation marker.
        let off = push_probe::<1, 512>(&q).unwrap();
        assert_eq!(off, 0);
        assert_eq!(q.head(), 0);
        assert_eq!(q.truncated(), None);
        assert_eq!(walk(&q), [(0, unsafe { RawTask::size_at(q.record_at(0)) })]);
    }

    #[test]
    fn disable_preserves_layout() {
        let q = TaskQueue::<1024>::new();
        for _ in 0..3 {
            push_probe::<8, 1024>(&q).unwrap();
        }
        let before = walk(&q);
        q.disable(before[1].0);
        let after = walk(&q);
        assert_eq!(before, after);
        let kind = unsafe { RawTask::kind_at(q.record_at(before[1].0)) };
        assert_eq!(kind, crate::task::TaskKind::Disabled);
    }

    /// Random push/pop sequences against a queue model: the live record
    /// chain always matches, stays aligned, and ends at `tail`.
    #[quickcheck]
    fn matches_model(ops: Vec<u8>) {
        let q = TaskQueue::<1024>::new();
        let mut model: std::collections::VecDeque<usize> = Default::default();
        for op in ops {
            match op % 5 {
                0 => {
                    q.pop();
                    model.pop_front();
                }
                1 | 2 => {
                    if let Ok(off) = push_probe::<1, 1024>(&q) {
                        model.push_back(unsafe { RawTask::size_at(q.record_at(off)) });
                    }
                }
                3 => {
                    if let Ok(off) = push_probe::<40, 1024>(&q) {
                        model.push_back(unsafe { RawTask::size_at(q.record_at(off)) });
                    }
                }
                _ => {
                    if let Ok(off) = push_probe::<90, 1024>(&q) {
                        model.push_back(unsafe { RawTask::size_at(q.record_at(off)) });
                    }
                }
            }
            assert_eq!(q.len(), model.len());
            let chain = walk(&q);
            assert_eq!(chain.len(), model.len());
            for (&(off, size), &expected) in chain.iter().zip(model.iter()) {
                assert_eq!(size, expected);
                assert_eq!(off % RECORD_ALIGN, 0);
                assert!(off + size <= 1024);
            }
        }
    }
}
