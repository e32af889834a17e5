//!
//! A schedulable background task.
//!
//! A Task owns one worker that runs a loop body whenever it is triggered
//! (and optionally every period).  Triggers coalesce: any number of triggers
//! that arrive before the worker gets around to the body result in a single
//! run, and a trigger that arrives while the body is running results in
//! exactly one more run afterwards.
//!

use std::{io, time::Duration};

use thiserror::Error;

/// The current state of a Task
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// The task has no worker.  Triggers are kept pending until it is started.
    Stopped,
    /// The task's worker is alive and serving triggers.
    Running,
}

/// The scheduling priority requested for a task's worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// The lowest priority available to the scheduling policy
    #[default]
    Lowest,
    /// The platform's normal priority
    Normal,
    /// The highest priority available to the scheduling policy
    Highest,
}

/// The scheduling class requested for a task's worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SchedulingPolicy {
    /// The default time-shared (non real-time) class
    #[default]
    Other,
    /// A real-time class
    RealTime,
}

/// The configuration of a Task
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskConfig {
    /// The name of the task, also used as the worker thread's name
    pub name: String,
    /// The requested priority of the worker
    pub priority: Priority,
    /// The requested scheduling class of the worker
    pub policy: SchedulingPolicy,
    /// The period of the task.
    ///
    /// Note: a zero period means the body only ever runs when triggered.
    pub period: Duration,
}

impl TaskConfig {
    /// Create a trigger-only, lowest priority, non real-time configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: Priority::Lowest,
            policy: SchedulingPolicy::Other,
            period: Duration::ZERO,
        }
    }

    /// Set the requested priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the requested scheduling class
    pub fn with_policy(mut self, policy: SchedulingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the period (zero disables periodic runs)
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Whether the body runs on a period in addition to triggers
    pub fn is_periodic(&self) -> bool {
        !self.period.is_zero()
    }
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self::new("PublishCoordinator")
    }
}

/// An Error from controlling a Task
#[derive(Debug, Error)]
pub enum TaskError {
    /// The worker thread could not be spawned
    #[error("failed to spawn worker for task `{name}`")]
    Spawn {
        /// The name of the task
        name: String,
        /// The error returned by the OS
        #[source]
        source: io::Error,
    },
    /// `start` was called on a task that is already running
    #[error("task `{name}` is already running")]
    AlreadyRunning {
        /// The name of the task
        name: String,
    },
    /// The worker thread died from a panic outside of the loop body
    #[error("worker of task `{name}` panicked")]
    WorkerPanicked {
        /// The name of the task
        name: String,
    },
}

/// A schedulable background task with start/stop/trigger semantics
pub trait Task {
    /// Start the task's worker
    fn start(&mut self) -> Result<(), TaskError>;

    /// Stop the task's worker, blocking until the current run (if any)
    /// has finished.
    ///
    /// Returns `Ok(false)` if the task was not running.
    fn stop(&mut self) -> Result<bool, TaskError>;

    /// Ask for the loop body to be run as soon as possible.
    ///
    /// Returns false if the trigger was coalesced into an already pending run.
    fn trigger(&self) -> bool;

    /// The current state of the task
    fn state(&self) -> TaskState;

    /// Whether the task's worker is currently alive
    fn is_running(&self) -> bool {
        self.state() == TaskState::Running
    }
}
