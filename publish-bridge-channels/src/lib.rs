//!
//! Publish-Bridge Channels
//!
//! Channels sit between the threads producing data and the publisher that
//! pushes it to a transport.  Producers write into a channel from wherever
//! they are running, the channel buffers the data and asks the publish
//! coordinator to flush it.  The actual publishing happens on the
//! coordinator's worker.
//!

#![deny(missing_docs)]

pub mod buffered;
pub use buffered::{BufferPolicy, BufferedChannel};

pub mod local;
pub use local::{LocalPublisher, LocalSubscriber};
