//!
//! The Publish Registry
//!
//! The registry maps every registered channel to a flag that is set while the
//! channel has data that hasn't been published yet.  It has no locking of its
//! own, the coordinator keeps it behind a single mutex that is held both for
//! the short register/deregister/flag updates and for a whole drain pass.
//!

use std::{
    collections::HashMap,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Weak},
    time::Duration,
};

use quanta::Clock;
use tracing::error;

use publish_bridge_core::{Publishable, PublisherId};

/// Statistics about the drain passes run over a registry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// The number of drain passes run
    pub passes: u64,
    /// The total number of calls to `publish` over every pass
    pub published: u64,
    /// The number of calls to `publish` that panicked
    pub panicked: u64,
    /// How long the most recent pass took
    pub last_pass: Duration,
}

/// The channels published during a single drain pass.
///
/// The pass holds a strong reference to each channel it published.  Dropping
/// a channel can run code that needs the registry again (a channel
/// deregistering itself on drop, for example) so a pass should only be
/// dropped once the registry lock has been released.
#[must_use = "drop the pass after releasing the registry lock"]
pub struct DrainPass {
    published: Vec<Arc<dyn Publishable>>,
}

impl DrainPass {
    /// The number of channels that were published
    pub fn len(&self) -> usize {
        self.published.len()
    }

    /// Whether no channel was published
    pub fn is_empty(&self) -> bool {
        self.published.is_empty()
    }
}

/// A single registered channel
struct Entry {
    /// The channel, the registry never keeps a channel alive
    publisher: Weak<dyn Publishable>,
    /// Whether the channel has data since it was last published
    pending: bool,
}

/// The map of registered channels and their pending flags
pub struct PublishRegistry {
    /// Every registered channel keyed by its address
    entries: HashMap<PublisherId, Entry>,
    /// Drain pass statistics
    stats: DrainStats,
    /// The quanta high-precision clock used to time drain passes
    clock: Clock,
}

impl PublishRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            stats: DrainStats::default(),
            clock: Clock::new(),
        }
    }

    /// Register a channel with no pending data.
    ///
    /// Note: registering a channel that is already registered clears its
    /// pending flag.
    pub fn register<P: Publishable + 'static>(&mut self, publisher: &Arc<P>) {
        let id = PublisherId::of(&**publisher);
        let weak: Weak<P> = Arc::downgrade(publisher);
        let publisher: Weak<dyn Publishable> = weak;
        self.entries.insert(
            id,
            Entry {
                publisher,
                pending: false,
            },
        );
    }

    /// Remove a channel from the registry.
    ///
    /// Returns whether the channel was registered.
    pub fn deregister(&mut self, id: PublisherId) -> bool {
        self.entries.remove(&id).is_some()
    }

    /// Flag a channel as having data to publish.
    ///
    /// Returns false if the channel isn't registered.
    pub fn mark_pending(&mut self, id: PublisherId) -> bool {
        match self.entries.get_mut(&id) {
            Some(entry) => {
                entry.pending = true;
                true
            }
            None => false,
        }
    }

    /// Whether a channel is registered
    pub fn is_registered(&self, id: PublisherId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Whether a channel is registered and flagged as having data
    pub fn is_pending(&self, id: PublisherId) -> bool {
        self.entries.get(&id).is_some_and(|entry| entry.pending)
    }

    /// The number of registered channels
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no registered channels
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Statistics about the drain passes run so far
    pub fn stats(&self) -> DrainStats {
        self.stats
    }

    /// Run a drain pass.
    ///
    /// Every pending flag is cleared and `publish` is called once on each
    /// channel that was pending.  A flag is cleared before its channel's
    /// `publish` is called.  Channels that have been dropped without being
    /// deregistered are removed.
    ///
    /// A panic inside `publish` is caught and logged, the rest of the pass
    /// still runs.  The channel is moved into the returned pass before its
    /// `publish` is called so no channel is ever dropped inside this call.
    pub fn drain(&mut self) -> DrainPass {
        let start = self.clock.now();
        let mut published: Vec<Arc<dyn Publishable>> = Vec::new();

        for (id, entry) in self.entries.iter_mut().filter(|(_, entry)| entry.pending) {
            entry.pending = false;
            let Some(publisher) = entry.publisher.upgrade() else {
                continue;
            };
            published.push(publisher);

            let publisher = &published[published.len() - 1];
            if panic::catch_unwind(AssertUnwindSafe(|| publisher.publish())).is_err() {
                self.stats.panicked += 1;
                error!(channel = id.addr(), "publish panicked");
            }
        }

        self.entries
            .retain(|_, entry| entry.publisher.strong_count() > 0);

        self.stats.passes += 1;
        self.stats.published += published.len() as u64;
        self.stats.last_pass = self.clock.now().duration_since(start);

        DrainPass { published }
    }
}

impl Default for PublishRegistry {
    fn default() -> Self {
        Self::new()
    }
}
