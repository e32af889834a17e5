//!
//! Publish-Bridge-Core is the collection of traits shared by every piece
//! of the publish bridge: the channels that have something to publish,
//! the sinks they publish into and the background task that drives them.
//!

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod publishable;
pub use publishable::{Publishable, PublisherId};

pub mod publisher_subscriber;
pub use publisher_subscriber::{Publisher, Subscriber};

#[cfg(feature = "std")]
pub mod task;
#[cfg(feature = "std")]
pub use task::{Priority, SchedulingPolicy, Task, TaskConfig, TaskError, TaskState};
