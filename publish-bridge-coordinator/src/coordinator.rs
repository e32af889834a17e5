//!
//! The Publish Coordinator
//!
//! The coordinator pairs a [`PublishRegistry`] with a [`TriggeredTask`] whose
//! loop body drains the registry.  Producers call
//! [`PublishCoordinator::request_publish`] from any thread, that flags the
//! channel and triggers the task.  The task coalesces triggers so a burst of
//! requests costs a single drain pass.
//!

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use publish_bridge_core::{Publishable, PublisherId, Task, TaskConfig, TaskError};
use publish_bridge_tasks::{TriggeredTask, Waker};

use crate::{
    registry::{DrainStats, PublishRegistry},
    slot::CoordinatorSlot,
};

/// The shared-ownership handle channels hold to keep the coordinator alive
pub type CoordinatorHandle = Arc<PublishCoordinator>;

/// The slot backing [`PublishCoordinator::instance`]
static PROCESS_SLOT: CoordinatorSlot = CoordinatorSlot::new();

/// Lock the registry, recovering it if a `publish` panicked while it was held
fn lock(registry: &Mutex<PublishRegistry>) -> MutexGuard<'_, PublishRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The loop body of the coordinator's task
fn drain(registry: &Mutex<PublishRegistry>) {
    let pass = {
        let mut registry = lock(registry);
        registry.drain()
    };
    // Channels released here may deregister themselves, which needs the lock
    drop(pass);
}

/// Publish Coordinator
///
/// A single background worker that publishes the data of every registered
/// channel.  The coordinator stops its worker when it is dropped, so it
/// should be shared through a [`CoordinatorHandle`] held by every channel
/// using it.
pub struct PublishCoordinator {
    /// The name used to tag the coordinator's logs
    name: String,
    /// The registered channels, shared with the task's loop body
    registry: Arc<Mutex<PublishRegistry>>,
    /// Triggers the task without locking it
    waker: Waker,
    /// The task running the drain passes
    task: Mutex<TriggeredTask>,
}

impl PublishCoordinator {
    /// The process wide coordinator.
    ///
    /// The coordinator is created and started if there isn't a live one.
    /// Callers should hold on to the returned handle, the coordinator is
    /// torn down as soon as the last handle is dropped.
    pub fn instance() -> Result<CoordinatorHandle, TaskError> {
        PROCESS_SLOT.instance()
    }

    /// The slot backing [`PublishCoordinator::instance`]
    pub fn process_slot() -> &'static CoordinatorSlot {
        &PROCESS_SLOT
    }

    /// Create a new, stopped, coordinator with the default task configuration
    pub fn new() -> Self {
        Self::with_config(TaskConfig::default())
    }

    /// Create a new, stopped, coordinator
    pub fn with_config(config: TaskConfig) -> Self {
        let name = config.name.clone();
        let registry = Arc::new(Mutex::new(PublishRegistry::new()));
        let body_registry = registry.clone();
        let task = TriggeredTask::new(config, move || drain(&body_registry));

        debug!(component = %name, "creating publish coordinator");

        Self {
            name,
            registry,
            waker: task.waker(),
            task: Mutex::new(task),
        }
    }

    fn task(&self) -> MutexGuard<'_, TriggeredTask> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the coordinator's worker
    pub fn start(&self) -> Result<(), TaskError> {
        self.task().start()
    }

    /// Stop the coordinator's worker, blocking until the current drain pass
    /// (if any) is over.
    ///
    /// Requests made while the coordinator is stopped are drained once it is
    /// started again.
    pub fn stop(&self) -> Result<bool, TaskError> {
        self.task().stop()
    }

    /// Whether the coordinator's worker is running
    pub fn is_running(&self) -> bool {
        self.task().is_running()
    }

    /// Register a channel with the coordinator.
    ///
    /// A channel must be registered before it requests a publish.
    pub fn register<P: Publishable + 'static>(&self, publisher: &Arc<P>) {
        lock(&self.registry).register(publisher);
    }

    /// Remove a channel from the coordinator.
    ///
    /// Removing a channel that isn't registered does nothing.
    pub fn deregister<P: Publishable + ?Sized>(&self, publisher: &P) {
        lock(&self.registry).deregister(PublisherId::of(publisher));
    }

    /// Flag a channel as having data and wake the coordinator's worker.
    ///
    /// Any number of requests made before the worker's next drain pass result
    /// in a single call to the channel's `publish`.  Always returns true.
    ///
    /// Note: the channel must be registered.  Requesting a publish for an
    /// unregistered channel is a bug in the caller and panics in debug
    /// builds.
    pub fn request_publish<P: Publishable + ?Sized>(&self, publisher: &P) -> bool {
        {
            let mut registry = lock(&self.registry);
            let registered = registry.mark_pending(PublisherId::of(publisher));
            debug_assert!(registered, "publish requested for a channel that is not registered");
        }

        self.waker.wake();
        true
    }

    /// Whether a channel is registered with the coordinator
    pub fn is_registered<P: Publishable + ?Sized>(&self, publisher: &P) -> bool {
        lock(&self.registry).is_registered(PublisherId::of(publisher))
    }

    /// The number of registered channels
    pub fn registered(&self) -> usize {
        lock(&self.registry).len()
    }

    /// Statistics about the drain passes run so far
    pub fn stats(&self) -> DrainStats {
        lock(&self.registry).stats()
    }
}

impl Default for PublishCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PublishCoordinator {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = task.stop() {
            warn!(component = %self.name, %err, "publish coordinator worker did not stop cleanly");
        }
        info!(component = %self.name, "publish coordinator cleans up: no more work");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        thread,
        time::{Duration, Instant},
    };

    use crossbeam::channel::{unbounded, Receiver, Sender};

    const TIMEOUT: Duration = Duration::from_secs(2);
    const QUIET: Duration = Duration::from_millis(50);

    /// Reports the channel's name every time it is published
    struct RecordingChannel {
        name: &'static str,
        calls: AtomicUsize,
        published: Sender<&'static str>,
    }

    impl RecordingChannel {
        fn new(name: &'static str, published: Sender<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                published,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::Acquire)
        }
    }

    impl Publishable for RecordingChannel {
        fn publish(&self) {
            self.calls.fetch_add(1, Ordering::AcqRel);
            self.published.send(self.name).unwrap();
        }
    }

    /// Parks inside `publish` until the test opens the gate
    struct GatedChannel {
        calls: AtomicUsize,
        entered: Sender<()>,
        gate: Receiver<()>,
    }

    impl Publishable for GatedChannel {
        fn publish(&self) {
            self.calls.fetch_add(1, Ordering::AcqRel);
            self.entered.send(()).unwrap();
            self.gate.recv().unwrap();
        }
    }

    fn wait_for(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + TIMEOUT;
        while !condition() {
            assert!(Instant::now() < deadline, "timed out waiting for condition");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_publish_scenario() {
        let (tx, rx) = unbounded();
        let coordinator = PublishCoordinator::new();
        let a = RecordingChannel::new("A", tx.clone());
        let b = RecordingChannel::new("B", tx.clone());
        let c = RecordingChannel::new("C", tx);
        coordinator.register(&a);
        coordinator.register(&b);
        coordinator.register(&c);

        assert!(coordinator.request_publish(&*b));
        coordinator.start().unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "B");
        assert!(rx.recv_timeout(QUIET).is_err());

        coordinator.stop().unwrap();
        coordinator.request_publish(&*a);
        coordinator.request_publish(&*c);
        coordinator.request_publish(&*a);
        coordinator.start().unwrap();

        let mut names = vec![
            rx.recv_timeout(TIMEOUT).unwrap(),
            rx.recv_timeout(TIMEOUT).unwrap(),
        ];
        names.sort();
        assert_eq!(names, vec!["A", "C"]);
        assert!(rx.recv_timeout(QUIET).is_err());

        assert_eq!((a.calls(), b.calls(), c.calls()), (1, 1, 1));
        wait_for(|| coordinator.stats().passes == 2);
    }

    #[test]
    fn test_concurrent_requests_coalesce() {
        let (tx, rx) = unbounded();
        let coordinator = Arc::new(PublishCoordinator::new());
        let channel = RecordingChannel::new("X", tx);
        coordinator.register(&channel);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                let channel = channel.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(coordinator.request_publish(&*channel));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        coordinator.start().unwrap();
        rx.recv_timeout(TIMEOUT).unwrap();
        assert!(rx.recv_timeout(QUIET).is_err());
        assert_eq!(channel.calls(), 1);
        wait_for(|| coordinator.stats().passes == 1);
    }

    #[test]
    fn test_only_requested_channels_are_published() {
        let (tx, rx) = unbounded();
        let coordinator = PublishCoordinator::new();
        coordinator.start().unwrap();
        let a = RecordingChannel::new("A", tx.clone());
        let b = RecordingChannel::new("B", tx);
        coordinator.register(&a);
        coordinator.register(&b);

        coordinator.request_publish(&*a);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "A");
        assert!(rx.recv_timeout(QUIET).is_err());
        assert_eq!(b.calls(), 0);
    }

    #[test]
    fn test_request_during_publish_is_drained_again() {
        let (entered_tx, entered_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let coordinator = Arc::new(PublishCoordinator::new());
        coordinator.start().unwrap();
        let channel = Arc::new(GatedChannel {
            calls: AtomicUsize::new(0),
            entered: entered_tx,
            gate: gate_rx,
        });
        coordinator.register(&channel);

        coordinator.request_publish(&*channel);
        entered_rx.recv_timeout(TIMEOUT).unwrap();

        // The flag is already cleared, this request has to survive the call
        let requester = {
            let coordinator = coordinator.clone();
            let channel = channel.clone();
            thread::spawn(move || coordinator.request_publish(&*channel))
        };
        thread::sleep(Duration::from_millis(20));
        gate_tx.send(()).unwrap();

        entered_rx.recv_timeout(TIMEOUT).unwrap();
        gate_tx.send(()).unwrap();
        assert!(requester.join().unwrap());

        coordinator.stop().unwrap();
        assert_eq!(channel.calls.load(Ordering::Acquire), 2);
    }

    #[test]
    fn test_deregister_is_idempotent() {
        let (tx, _rx) = unbounded();
        let coordinator = PublishCoordinator::new();
        let registered = RecordingChannel::new("A", tx.clone());
        let never_registered = RecordingChannel::new("B", tx);

        coordinator.register(&registered);
        coordinator.deregister(&*registered);
        coordinator.deregister(&*registered);
        coordinator.deregister(&*never_registered);

        assert!(!coordinator.is_registered(&*registered));
        assert_eq!(coordinator.registered(), 0);
    }

    #[test]
    fn test_deregistered_channel_is_not_published() {
        let (tx, rx) = unbounded();
        let coordinator = PublishCoordinator::new();
        let channel = RecordingChannel::new("A", tx);
        coordinator.register(&channel);

        coordinator.request_publish(&*channel);
        coordinator.deregister(&*channel);
        coordinator.start().unwrap();

        wait_for(|| coordinator.stats().passes == 1);
        assert!(rx.recv_timeout(QUIET).is_err());
        assert_eq!(channel.calls(), 0);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not registered")]
    fn test_request_publish_unregistered() {
        let (tx, _rx) = unbounded();
        let coordinator = PublishCoordinator::new();
        let channel = RecordingChannel::new("A", tx);

        coordinator.request_publish(&*channel);
    }

    #[test]
    fn test_drop_waits_for_drain_pass() {
        struct SlowChannel {
            finished: AtomicBool,
            entered: Sender<()>,
        }

        impl Publishable for SlowChannel {
            fn publish(&self) {
                self.entered.send(()).unwrap();
                thread::sleep(Duration::from_millis(50));
                self.finished.store(true, Ordering::Release);
            }
        }

        let (entered_tx, entered_rx) = unbounded();
        let coordinator = Arc::new(PublishCoordinator::new());
        coordinator.start().unwrap();
        let channel = Arc::new(SlowChannel {
            finished: AtomicBool::new(false),
            entered: entered_tx,
        });
        coordinator.register(&channel);

        coordinator.request_publish(&*channel);
        entered_rx.recv_timeout(TIMEOUT).unwrap();
        drop(coordinator);

        assert!(channel.finished.load(Ordering::Acquire));
    }

    #[test]
    fn test_last_handle_released_from_worker() {
        /// Owns the only handle to its coordinator
        struct OwningChannel {
            coordinator: CoordinatorHandle,
            entered: Sender<()>,
            gate: Receiver<()>,
        }

        impl Publishable for OwningChannel {
            fn publish(&self) {
                self.entered.send(()).unwrap();
                self.gate.recv().unwrap();
            }
        }

        impl Drop for OwningChannel {
            fn drop(&mut self) {
                self.coordinator.deregister(&*self);
            }
        }

        let (entered_tx, entered_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let coordinator = Arc::new(PublishCoordinator::new());
        coordinator.start().unwrap();
        let weak_coordinator = Arc::downgrade(&coordinator);
        let channel = Arc::new(OwningChannel {
            coordinator,
            entered: entered_tx,
            gate: gate_rx,
        });
        channel.coordinator.register(&channel);

        channel.coordinator.request_publish(&*channel);
        entered_rx.recv_timeout(TIMEOUT).unwrap();

        // The drain pass now holds the last reference to the channel, which
        // holds the last reference to the coordinator
        drop(channel);
        gate_tx.send(()).unwrap();

        wait_for(|| weak_coordinator.upgrade().is_none());
    }

    #[test]
    fn test_process_instance() {
        let first = PublishCoordinator::instance().unwrap();
        let second = PublishCoordinator::instance().unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_running());
    }

    #[test]
    fn test_panicking_publish_keeps_worker_serving() {
        /// Owns a handle to its coordinator and panics when published
        struct PanickingOwner {
            coordinator: CoordinatorHandle,
            entered: Sender<()>,
            gate: Receiver<()>,
        }

        impl Publishable for PanickingOwner {
            fn publish(&self) {
                self.entered.send(()).unwrap();
                self.gate.recv().unwrap();
                panic!("transport rejected the sample");
            }
        }

        impl Drop for PanickingOwner {
            fn drop(&mut self) {
                self.coordinator.deregister(&*self);
            }
        }

        let (entered_tx, entered_rx) = unbounded();
        let (gate_tx, gate_rx) = unbounded();
        let coordinator = Arc::new(PublishCoordinator::new());
        coordinator.start().unwrap();
        let owner = Arc::new(PanickingOwner {
            coordinator: coordinator.clone(),
            entered: entered_tx,
            gate: gate_rx,
        });
        coordinator.register(&owner);

        coordinator.request_publish(&*owner);
        entered_rx.recv_timeout(TIMEOUT).unwrap();

        // The drain pass now holds the last reference to the panicking channel
        drop(owner);
        gate_tx.send(()).unwrap();

        let (tx, rx) = unbounded();
        let requester = {
            let coordinator = coordinator.clone();
            thread::spawn(move || {
                let channel = RecordingChannel::new("after", tx);
                coordinator.register(&channel);
                coordinator.request_publish(&*channel);
                channel
            })
        };
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "after");
        let channel = requester.join().unwrap();

        wait_for(|| coordinator.registered() == 1);
        assert!(coordinator.is_registered(&*channel));
        assert_eq!(coordinator.stats().panicked, 1);
        assert!(coordinator.is_running());
    }
}
