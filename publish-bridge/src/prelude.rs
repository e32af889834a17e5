//!
//! The commonly used pieces of the publish bridge
//!

pub use publish_bridge_channels::{BufferPolicy, BufferedChannel, LocalPublisher, LocalSubscriber};
pub use publish_bridge_coordinator::{CoordinatorHandle, CoordinatorSlot, PublishCoordinator};
pub use publish_bridge_core::{
    Priority, Publishable, Publisher, PublisherId, SchedulingPolicy, Subscriber, Task, TaskConfig,
    TaskError, TaskState,
};
pub use publish_bridge_tasks::{TriggeredTask, Waker};
