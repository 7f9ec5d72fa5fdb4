//! The global monotonic clock.
//!
//! A single process-wide counter of elapsed milliseconds. The timer
//! interrupt (or, on a hosted target, a ticker thread) calls [`tick`], and
//! everything else only reads. The counter is a relaxed atomic: there is
//! exactly one writer, readers tolerate the value changing between
//! consecutive loads, and no ordering with other memory is implied.
//!
//! This module requires 64-bit atomic load/store/add. Targets without them
//! (8- and some 16-bit MCUs) must instead mask interrupts around a widened
//! read in their port layer; the scheduler only consumes the [`absolute`]
//! accessor, so such a port can shadow it.
//!
//! An optional signed offset turns the boot-relative counter into a
//! Unix-epoch wall clock for [`now`]. The scheduler itself never reads the
//! offset.
use core::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::time::Instant;

static ELAPSED_MS: AtomicU64 = AtomicU64::new(0);
static WALL_OFFSET_MS: AtomicI64 = AtomicI64::new(0);

/// Milliseconds elapsed since system start.
#[inline]
pub fn absolute() -> Instant {
    Instant::from_millis(ELAPSED_MS.load(Ordering::Relaxed))
}

/// Advance the clock by `ms` milliseconds.
///
/// Intended to be called from the timer interrupt, once per millisecond
/// with `ms = 1`. The interrupt must not touch anything else in this crate.
#[inline]
pub fn tick(ms: u16) {
    ELAPSED_MS.fetch_add(ms as u64, Ordering::Relaxed);
}

/// Current wall-clock time, i.e. [`absolute`] shifted by the configured
/// offset.
#[inline]
pub fn now() -> Instant {
    let ms = ELAPSED_MS.load(Ordering::Relaxed);
    Instant::from_millis(ms.saturating_add_signed(offset()))
}

/// Offset between system start and the Unix epoch, in milliseconds.
#[inline]
pub fn offset() -> i64 {
    WALL_OFFSET_MS.load(Ordering::Relaxed)
}

/// Configure the wall-clock offset.
#[inline]
pub fn set_offset(ms: i64) {
    WALL_OFFSET_MS.store(ms, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_accumulate() {
        let before = absolute();
        tick(3);
        tick(1);
        let after = absolute();
        assert!(after.saturating_duration_since(before) >= 4);
    }

    #[test]
    fn monotonic() {
        let mut prev = absolute();
        for _ in 0..100 {
            tick(1);
            let cur = absolute();
            assert!(cur >= prev);
            prev = cur;
        }
    }

    #[test]
    fn wall_clock_follows_offset() {
        // Other tests tick concurrently, so only check the offset delta.
        let base = now().as_millis() as i64 - offset();
        set_offset(5_000);
        let shifted = now().as_millis() as i64 - (base + 5_000);
        assert!((0..10_000).contains(&shifted));
        set_offset(0);
    }
}
