//! Error types.
use core::fmt;

/// The task buffer has no slot large enough for the record being pushed.
///
/// Running out of task storage is a normal, reportable outcome, not a
/// fault: the failed operation leaves the queue untouched and the caller
/// decides whether to retry later, drop the work, or escalate through the
/// [`HelperFunctions::on_task_allocation_failed`] hook.
///
/// [`HelperFunctions::on_task_allocation_failed`]:
///     crate::HelperFunctions::on_task_allocation_failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationError;

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("task buffer exhausted")
    }
}
