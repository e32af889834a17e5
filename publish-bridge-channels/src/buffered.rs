//!
//! Buffered Channels
//!
//! A buffered channel collects samples written from any thread and hands
//! them to its publisher from the publish coordinator's worker.  Writing only
//! costs a short lock and a (usually coalesced) wakeup of the coordinator,
//! the publisher itself is never called from the writing thread.
//!

use std::{
    collections::VecDeque,
    fmt::Debug,
    mem,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
};

use tracing::{debug, warn};

use publish_bridge_core::{Publishable, Publisher};
use publish_bridge_coordinator::CoordinatorHandle;

/// How a buffered channel keeps samples that haven't been published yet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferPolicy {
    /// Only the most recent sample is kept
    Latest,
    /// Up to the given number of samples are kept, the oldest sample is
    /// dropped when a sample is written to a full buffer.
    ///
    /// Note: a capacity of zero is treated as a capacity of one.
    Bounded(usize),
}

impl BufferPolicy {
    fn capacity(&self) -> usize {
        match self {
            BufferPolicy::Latest => 1,
            BufferPolicy::Bounded(capacity) => (*capacity).max(1),
        }
    }
}

/// A channel that buffers samples until the publish coordinator flushes them
/// into its publisher.
///
/// The channel registers itself with the coordinator when it is created and
/// deregisters itself when it is dropped.  It holds a handle to the
/// coordinator so the coordinator lives at least as long as the channel.
pub struct BufferedChannel<P>
where
    P: Publisher + Send + 'static,
    P::Data: Send + 'static,
    P::Error: Debug,
{
    /// The name of the channel (usually the topic), used in logs
    name: String,
    /// How samples are buffered
    policy: BufferPolicy,
    /// Samples waiting for the coordinator
    pending: Mutex<VecDeque<P::Data>>,
    /// The publisher samples are flushed into
    sink: Mutex<P>,
    /// The number of samples dropped because the buffer was full
    dropped: AtomicU64,
    /// The coordinator that flushes this channel
    coordinator: CoordinatorHandle,
}

impl<P> BufferedChannel<P>
where
    P: Publisher + Send + 'static,
    P::Data: Send + 'static,
    P::Error: Debug,
{
    /// Create a new buffered channel and register it with `coordinator`
    pub fn new(
        name: impl Into<String>,
        sink: P,
        policy: BufferPolicy,
        coordinator: CoordinatorHandle,
    ) -> Arc<Self> {
        let channel = Arc::new(Self {
            name: name.into(),
            policy,
            pending: Mutex::new(VecDeque::with_capacity(policy.capacity())),
            sink: Mutex::new(sink),
            dropped: AtomicU64::new(0),
            coordinator,
        });
        channel.coordinator.register(&channel);
        channel
    }

    fn pending_lock(&self) -> MutexGuard<'_, VecDeque<P::Data>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Buffer a sample and ask the coordinator to publish it
    pub fn write(&self, sample: P::Data) -> bool {
        {
            let mut pending = self.pending_lock();
            if pending.len() >= self.policy.capacity() {
                pending.pop_front();
                let dropped = self.dropped.fetch_add(1, Ordering::AcqRel) + 1;
                if self.policy != BufferPolicy::Latest {
                    debug!(channel = %self.name, dropped, "buffer full, dropped oldest sample");
                }
            }
            pending.push_back(sample);
        }

        self.coordinator.request_publish(self)
    }

    /// The number of samples waiting to be published
    pub fn pending(&self) -> usize {
        self.pending_lock().len()
    }

    /// The number of samples that were overwritten before being published
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Acquire)
    }

    /// The name of the channel
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The buffer policy of the channel
    pub fn policy(&self) -> BufferPolicy {
        self.policy
    }

    /// The coordinator flushing this channel
    pub fn coordinator(&self) -> &CoordinatorHandle {
        &self.coordinator
    }

    /// Run `f` with exclusive access to the channel's publisher
    pub fn with_sink<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut sink)
    }
}

impl<P> Publishable for BufferedChannel<P>
where
    P: Publisher + Send + 'static,
    P::Data: Send + 'static,
    P::Error: Debug,
{
    fn publish(&self) {
        // Writers only wait for the swap, never for the publisher
        let samples = mem::take(&mut *self.pending_lock());
        if samples.is_empty() {
            return;
        }

        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        for sample in samples {
            if let Err(err) = sink.publish(sample) {
                warn!(channel = %self.name, ?err, "publisher rejected sample, dropping it");
            }
        }
    }
}

impl<P> Drop for BufferedChannel<P>
where
    P: Publisher + Send + 'static,
    P::Data: Send + 'static,
    P::Error: Debug,
{
    fn drop(&mut self) {
        self.coordinator.deregister(&*self);
    }
}
