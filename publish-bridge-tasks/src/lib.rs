//!
//! Publish-Bridge-Tasks provides the schedulable background tasks that
//! drive the bridge.
//!
//! A task here is a single named worker thread that sleeps until it is
//! triggered, runs its loop body to completion and goes back to sleep.
//! Triggers coalesce so a burst of wakeups never stacks up parallel or
//! redundant runs of the body.
//!

#![deny(unsafe_code)]
#![deny(missing_docs)]

pub mod triggered_task;
pub use triggered_task::{TriggeredTask, Waker};
