//!
//! The Coordinator Slot
//!
//! A slot hands out the one live coordinator it knows of.  It only keeps a
//! weak reference to that coordinator, ownership belongs to whoever called
//! `instance`, so the coordinator is torn down once every handle is gone and
//! the next call to `instance` builds a fresh one.
//!

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use publish_bridge_core::{TaskConfig, TaskError};

use crate::coordinator::{CoordinatorHandle, PublishCoordinator};

/// A lazily populated, non-owning home for a coordinator
pub struct CoordinatorSlot {
    /// The current coordinator, never owned so it can be torn down
    current: Mutex<Weak<PublishCoordinator>>,
}

impl CoordinatorSlot {
    /// Create an empty slot
    pub const fn new() -> Self {
        Self {
            current: Mutex::new(Weak::new()),
        }
    }

    fn current_lock(&self) -> MutexGuard<'_, Weak<PublishCoordinator>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live coordinator of this slot, creating and starting one with the
    /// default configuration if there is none
    pub fn instance(&self) -> Result<CoordinatorHandle, TaskError> {
        self.instance_with_config(TaskConfig::default)
    }

    /// The live coordinator of this slot, creating and starting one with the
    /// given configuration if there is none.
    ///
    /// Note: the configuration is only built when a coordinator is created.
    /// The slot stays locked while the coordinator is created so concurrent
    /// callers all end up with the same coordinator.
    pub fn instance_with_config<F>(&self, config: F) -> Result<CoordinatorHandle, TaskError>
    where
        F: FnOnce() -> TaskConfig,
    {
        let mut current = self.current_lock();
        if let Some(coordinator) = current.upgrade() {
            return Ok(coordinator);
        }

        let coordinator = Arc::new(PublishCoordinator::with_config(config()));
        coordinator.start()?;
        *current = Arc::downgrade(&coordinator);
        Ok(coordinator)
    }

    /// The live coordinator of this slot, without creating one
    pub fn current(&self) -> Option<CoordinatorHandle> {
        self.current_lock().upgrade()
    }

    /// Forget the current coordinator.
    ///
    /// The forgotten coordinator keeps running for as long as it has owners,
    /// the next call to `instance` creates a new one.
    pub fn reset(&self) {
        *self.current_lock() = Weak::new();
    }
}

impl Default for CoordinatorSlot {
    fn default() -> Self {
        Self::new()
    }
}
