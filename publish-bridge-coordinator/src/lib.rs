//!
//! Publish-Bridge-Coordinator
//!
//! The publish coordinator is a process wide worker that publishes the data of
//! every channel in the process.  Channels register with the coordinator,
//! flag themselves as dirty whenever they have new data and the coordinator's
//! worker calls `publish` on every dirty channel the next time it runs.
//!
//! Any number of requests for the same channel before the worker gets to it
//! collapse into a single call to `publish`, and the worker is only ever woken
//! once for a burst of requests.
//!
//! The coordinator lives for as long as somebody holds a [`CoordinatorHandle`]
//! to it.  The [`CoordinatorSlot`] it is obtained from only keeps a weak
//! reference so the coordinator (and its worker thread) goes away as soon as
//! the last channel does.
//!

#![deny(unsafe_code)]
#![deny(missing_docs)]

pub mod registry;
pub use registry::{DrainPass, DrainStats, PublishRegistry};

pub mod coordinator;
pub use coordinator::{CoordinatorHandle, PublishCoordinator};

pub mod slot;
pub use slot::CoordinatorSlot;
