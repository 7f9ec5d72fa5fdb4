#![doc = include_str!("./lib.md")]
#![cfg_attr(not(test), no_std)] // Link `std` only when building a test (`cfg(test)`)
#![deny(unsafe_op_in_unsafe_fn)]

pub mod clock;
mod error;
mod eventloop;
mod queue;
mod task;
pub mod time;
pub mod utils;

pub use crate::{
    error::AllocationError,
    eventloop::{EventLoop, EventSlot, HelperFunctions, SHORT_TIMEOUT_MAX_MS},
    queue::TaskRef,
    task::{task, ArgTuple, FnIdent, Task, TaskFn, TaskKind},
    time::Instant,
};
