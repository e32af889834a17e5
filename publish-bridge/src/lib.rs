//!
//! # Publish Bridge
//!
//! The publish bridge moves publishing off of the threads that produce data.
//!
//! ## Description
//!
//! In a robotics system many components produce data at their own rates and
//! from their own threads.  Publishing that data to a transport (serializing
//! it, writing it to a socket) from each of those threads means every
//! producer pays for the transport, and giving every channel its own
//! publishing thread means a process with a hundred topics has a hundred idle
//! threads.  The publish bridge does neither.  A single, lowest priority
//! worker per process publishes for every channel.
//!
//! ## Technical Overview
//!
//! The bridge is made of three pieces:
//!
//! * A [`Publishable`](core::Publishable) is anything that can be told to
//!   flush its pending data.  [`BufferedChannel`](channels::BufferedChannel)
//!   is the Publishable most users want.  It buffers samples and flushes
//!   them into any [`Publisher`](core::Publisher).
//! * The [`PublishCoordinator`](coordinator::PublishCoordinator) keeps every
//!   registered Publishable with a pending flag.  Writing to a channel sets
//!   its flag and wakes the coordinator.
//! * The coordinator's [`TriggeredTask`](tasks::TriggeredTask) runs a drain
//!   pass whenever it is woken: every flag that is set is cleared and its
//!   channel is published.  Wakeups coalesce, so a hundred writes that land
//!   before the worker gets to run cost a single pass and a single call to
//!   each channel's `publish`.
//!
//! The coordinator is shared.  [`PublishCoordinator::instance`](coordinator::PublishCoordinator::instance)
//! hands out the process wide coordinator, creating and starting it when
//! there isn't one, and the coordinator is torn down as soon as the last
//! channel holding it goes away.
//!
//! ```no_run
//! use publish_bridge::prelude::*;
//!
//! let coordinator = PublishCoordinator::instance().unwrap();
//! let publisher = LocalPublisher::new();
//! let mut subscriber = publisher.subscribe();
//! let channel = BufferedChannel::new("odometry", publisher, BufferPolicy::Latest, coordinator);
//!
//! channel.write(42u64);
//! // ... some time later, on the coordinator's worker ...
//! subscriber.get();
//! ```
//!

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
pub mod prelude;

/// Publish Bridge Channels
#[cfg(feature = "std")]
pub use publish_bridge_channels as channels;
/// Publish Bridge Publish Coordinator
#[cfg(feature = "std")]
pub use publish_bridge_coordinator as coordinator;
/// Publish Bridge Core Traits
pub use publish_bridge_core as core;
/// Publish Bridge Schedulable Tasks
#[cfg(feature = "std")]
pub use publish_bridge_tasks as tasks;
