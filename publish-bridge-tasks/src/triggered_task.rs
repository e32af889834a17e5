//!
//! The Triggered Task
//!
//! The triggered task owns a single worker thread that runs a loop body
//! whenever it is woken.  The wakeup is a capacity-1 crossbeam channel, the
//! single slot in that channel is the "a run is pending" flag:
//!
//! * a trigger while a run is pending finds the slot full and is dropped,
//! * a trigger while the body is running refills the (already consumed) slot
//!   so exactly one more run follows,
//! * a trigger while the task is stopped stays in the slot and the body runs
//!   once as soon as the task is started.
//!

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle, ThreadId},
    time::{Duration, Instant},
};

use crossbeam::channel::{
    bounded, never, select, tick, Receiver, Sender, TryRecvError, TrySendError,
};
use tracing::{debug, error};

use publish_bridge_core::{Task, TaskConfig, TaskError, TaskState};

/// The loop body of a task.
///
/// Note: the body is shared with every worker the task spawns so a stopped
/// task can be started again.
type Body = Arc<dyn Fn() + Send + Sync>;

/// A cheap, cloneable handle that triggers a task's loop body.
///
/// Wakers stay valid across stop and start of the task they came from.
#[derive(Clone, Debug)]
pub struct Waker {
    tx: Sender<()>,
}

impl Waker {
    /// Request a run of the loop body.
    ///
    /// Returns false if a run was already pending and this wakeup was
    /// coalesced into it.
    pub fn wake(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => false,
        }
    }
}

/// A worker that is currently alive
struct Worker {
    /// Dropping the sender disconnects the worker's stop receiver
    stop: Sender<()>,
    /// The worker thread
    handle: JoinHandle<()>,
    /// Used to tell a stop from the worker itself apart
    thread_id: ThreadId,
}

/// Counters shared between the task and its workers
#[derive(Default)]
struct Counters {
    /// Completed runs of the loop body
    runs: AtomicU64,
    /// Runs of the loop body that panicked
    panics: AtomicU64,
}

/// Triggered Task
///
/// The Triggered Task runs its body on a dedicated thread each time it is
/// triggered and, if the configuration has a non-zero period, each period.
/// The body is never run concurrently with itself.
pub struct TriggeredTask {
    /// The configuration the task was created with
    config: TaskConfig,
    /// The loop body
    body: Body,
    /// The sending end of the pending-run slot
    waker: Waker,
    /// The receiving end of the pending-run slot, cloned into every worker
    wake: Receiver<()>,
    /// The current worker, if the task is running
    worker: Option<Worker>,
    /// Run statistics
    counters: Arc<Counters>,
}

impl TriggeredTask {
    /// Create a new, stopped, Triggered Task
    pub fn new<F>(config: TaskConfig, body: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let (tx, wake) = bounded(1);

        Self {
            config,
            body: Arc::new(body),
            waker: Waker { tx },
            wake,
            worker: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// A handle that can trigger this task from any thread
    pub fn waker(&self) -> Waker {
        self.waker.clone()
    }

    /// The configuration of this task
    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// The number of completed runs of the loop body
    pub fn runs(&self) -> u64 {
        self.counters.runs.load(Ordering::Acquire)
    }

    /// The number of runs of the loop body that ended in a panic
    pub fn panics(&self) -> u64 {
        self.counters.panics.load(Ordering::Acquire)
    }

    /// Whether the caller is running on this task's worker thread
    pub fn is_worker_thread(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| worker.thread_id == thread::current().id())
    }
}

impl Task for TriggeredTask {
    fn start(&mut self) -> Result<(), TaskError> {
        if self.worker.is_some() {
            return Err(TaskError::AlreadyRunning {
                name: self.config.name.clone(),
            });
        }

        let (stop, stop_rx) = bounded(0);
        let name = self.config.name.clone();
        let body = self.body.clone();
        let wake = self.wake.clone();
        let period = self.config.period;
        let counters = self.counters.clone();

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || work(&name, body, wake, stop_rx, period, counters))
            .map_err(|source| TaskError::Spawn {
                name: self.config.name.clone(),
                source,
            })?;

        debug!(
            task = %self.config.name,
            priority = ?self.config.priority,
            policy = ?self.config.policy,
            period_us = self.config.period.as_micros() as u64,
            "started task"
        );

        self.worker = Some(Worker {
            stop,
            thread_id: handle.thread().id(),
            handle,
        });
        Ok(())
    }

    fn stop(&mut self) -> Result<bool, TaskError> {
        let Some(Worker {
            stop,
            handle,
            thread_id,
        }) = self.worker.take()
        else {
            return Ok(false);
        };
        drop(stop);

        // Joining ourselves would never return.  The worker exits on its own
        // once the current run of the body is over.
        if thread_id == thread::current().id() {
            debug!(task = %self.config.name, "stopping task from its own worker");
            return Ok(true);
        }

        handle.join().map_err(|_| TaskError::WorkerPanicked {
            name: self.config.name.clone(),
        })?;
        debug!(task = %self.config.name, runs = self.runs(), "stopped task");
        Ok(true)
    }

    fn trigger(&self) -> bool {
        self.waker.wake()
    }

    fn state(&self) -> TaskState {
        if self.worker.is_some() {
            TaskState::Running
        } else {
            TaskState::Stopped
        }
    }
}

impl Drop for TriggeredTask {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            error!(task = %self.config.name, %err, "failed to stop task");
        }
    }
}

/// What woke the worker up
enum Event {
    Run,
    Stop,
}

/// The worker thread's main loop
fn work(
    name: &str,
    body: Body,
    wake: Receiver<()>,
    stop: Receiver<()>,
    period: Duration,
    counters: Arc<Counters>,
) {
    let ticker: Receiver<Instant> = if period.is_zero() {
        never()
    } else {
        tick(period)
    };

    loop {
        let event = select! {
            recv(stop) -> _ => Event::Stop,
            recv(wake) -> msg => match msg {
                Ok(()) => Event::Run,
                Err(_) => Event::Stop,
            },
            recv(ticker) -> _ => Event::Run,
        };

        match event {
            Event::Stop => break,
            Event::Run => {
                // A stop that raced with this wakeup wins
                if let Err(TryRecvError::Disconnected) = stop.try_recv() {
                    break;
                }
                if panic::catch_unwind(AssertUnwindSafe(|| (*body)())).is_err() {
                    counters.panics.fetch_add(1, Ordering::AcqRel);
                    error!(task = %name, "loop body panicked");
                }
                counters.runs.fetch_add(1, Ordering::AcqRel);
            }
        }
    }
}
