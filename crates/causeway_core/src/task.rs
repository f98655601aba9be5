//! # Task Spawning
//!
//! A task is a closure running on its own OS thread. Spawning is the only
//! ordering the parent gets for free:
//!
//! ```text
//! parent:  write a ──> spawn(body) ──> ... (no further ordering)
//!                         │
//!                         ▼
//! child:               body starts: sees a
//!                      body ends:   nobody is told
//! ```
//!
//! Everything the parent wrote before `spawn` is visible when the body
//! starts. Nothing flows back: a task's termination is not ordered before
//! any event in any other context. A parent that needs the child's results
//! must receive them over a [`Channel`](crate::sync::Channel) or through a
//! [`Mutex`](crate::sync::Mutex).
//!
//! ## Failure
//!
//! A panicking body is caught at the task boundary. It is logged, counted,
//! and optionally recorded; the panic never unwinds into other tasks.

use std::any::Any;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;

use parking_lot::Mutex;

use crate::config::SpawnConfig;
use crate::error::{CoreError, CoreResult};

/// Source of task ids. Zero is never handed out.
static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_TASK: Cell<Option<TaskId>> = const { Cell::new(None) };
}

/// Opaque identity of an execution context.
///
/// Used for diagnostics and lock-holder bookkeeping only. Ids carry no
/// ordering meaning: a smaller id does not imply an earlier start.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        Self(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the id of the calling context.
    ///
    /// Threads that were not started by a [`Spawner`] get an id assigned on
    /// first use, so the main thread has one too.
    #[must_use]
    pub fn current() -> Self {
        CURRENT_TASK.with(|current| {
            if let Some(id) = current.get() {
                id
            } else {
                let id = Self::next();
                current.set(Some(id));
                id
            }
        })
    }

    /// Returns the raw numeric id.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Record of a task body that panicked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskFailure {
    /// The failed task.
    pub task: TaskId,
    /// OS thread name the task ran under.
    pub name: String,
    /// The panic payload, rendered as text.
    pub message: String,
}

impl From<TaskFailure> for CoreError {
    fn from(failure: TaskFailure) -> Self {
        CoreError::TaskBodyFailure {
            task: failure.task,
            message: failure.message,
        }
    }
}

/// Counters for a spawner.
///
/// `spawned - completed - failed` is the number of bodies that have not
/// returned yet, as far as this snapshot can tell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TaskStats {
    /// Tasks successfully handed to the OS.
    pub spawned: u64,
    /// Bodies that returned normally.
    pub completed: u64,
    /// Bodies that panicked.
    pub failed: u64,
}

/// State shared between a spawner and the tasks it started.
#[derive(Default)]
struct SpawnerShared {
    spawned: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    failures: Mutex<VecDeque<TaskFailure>>,
}

/// Starts tasks on dedicated OS threads.
///
/// Cheap to clone; clones share counters and failure records.
#[derive(Clone)]
pub struct Spawner {
    config: Arc<SpawnConfig>,
    shared: Arc<SpawnerShared>,
}

impl fmt::Debug for Spawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spawner")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl Spawner {
    /// Creates a spawner from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the config does not validate.
    pub fn new(config: SpawnConfig) -> CoreResult<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: SpawnConfig) -> Self {
        Self {
            config: Arc::new(config),
            shared: Arc::new(SpawnerShared::default()),
        }
    }

    /// Returns the process-wide default spawner used by [`spawn`].
    pub fn global() -> &'static Spawner {
        static GLOBAL: OnceLock<Spawner> = OnceLock::new();
        GLOBAL.get_or_init(|| Spawner::from_valid(SpawnConfig::default()))
    }

    /// Returns the config this spawner was built with.
    #[must_use]
    pub fn config(&self) -> &SpawnConfig {
        &self.config
    }

    /// Schedules `body` on a new thread and returns without waiting for it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SpawnFailed`] if the OS cannot create the thread.
    pub fn try_spawn<F>(&self, body: F) -> CoreResult<TaskId>
    where
        F: FnOnce() + Send + 'static,
    {
        let id = TaskId::next();
        let name = format!("{}-{}", self.config.name_prefix, id.0);

        let mut builder = thread::Builder::new().name(name.clone());
        if let Some(stack_size) = self.config.stack_size {
            builder = builder.stack_size(stack_size);
        }

        // Counted before the thread exists so completed never overtakes spawned.
        self.shared.spawned.fetch_add(1, Ordering::Relaxed);

        let shared = Arc::clone(&self.shared);
        let config = Arc::clone(&self.config);
        let spawned = builder.spawn(move || {
            CURRENT_TASK.with(|current| current.set(Some(id)));
            match panic::catch_unwind(AssertUnwindSafe(body)) {
                Ok(()) => {
                    shared.completed.fetch_add(1, Ordering::Relaxed);
                }
                Err(payload) => {
                    shared.failed.fetch_add(1, Ordering::Relaxed);
                    let message = panic_message(payload.as_ref());
                    tracing::error!(task = %id, name = %name, message = %message, "task body panicked");
                    if config.record_failures && config.max_recorded_failures > 0 {
                        let mut failures = shared.failures.lock();
                        while failures.len() >= config.max_recorded_failures {
                            failures.pop_front();
                        }
                        failures.push_back(TaskFailure { task: id, name, message });
                    }
                }
            }
        });

        match spawned {
            Ok(_detached) => {
                tracing::trace!(task = %id, "task spawned");
                Ok(id)
            }
            Err(e) => {
                self.shared.spawned.fetch_sub(1, Ordering::Relaxed);
                Err(CoreError::SpawnFailed(e.to_string()))
            }
        }
    }

    /// Schedules `body` on a new thread and returns without waiting for it.
    ///
    /// # Panics
    ///
    /// Panics if the OS cannot create the thread, like `std::thread::spawn`.
    /// Use [`Spawner::try_spawn`] to handle that case.
    pub fn spawn<F>(&self, body: F) -> TaskId
    where
        F: FnOnce() + Send + 'static,
    {
        match self.try_spawn(body) {
            Ok(id) => id,
            Err(e) => panic!("{e}"),
        }
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> TaskStats {
        TaskStats {
            spawned: self.shared.spawned.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
        }
    }

    /// Drains and returns the recorded failures, oldest first.
    pub fn take_failures(&self) -> Vec<TaskFailure> {
        self.shared.failures.lock().drain(..).collect()
    }
}

/// Schedules `body` on the global [`Spawner`].
///
/// Writes made by the caller before this call are visible to `body`. Nothing
/// is implied about when `body` runs or whether it finishes.
///
/// # Panics
///
/// Panics if the OS cannot create the thread.
pub fn spawn<F>(body: F) -> TaskId
where
    F: FnOnce() + Send + 'static,
{
    Spawner::global().spawn(body)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
