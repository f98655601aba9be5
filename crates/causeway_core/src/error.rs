//! # Core Error Types
//!
//! Every misuse of a primitive surfaces here as a value. None of these are
//! transient: retrying the same call on the same primitive fails again.

use thiserror::Error;

use crate::task::TaskId;

/// Errors that can occur when driving the coordination primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Attempted to send on a channel that has been closed.
    #[error("send on closed channel")]
    SendOnClosed,

    /// Attempted to close a channel that was already closed.
    #[error("close of closed channel")]
    DoubleClose,

    /// Attempted to unlock a mutex the calling context does not hold.
    #[error("unlock of mutex not held by {caller}")]
    UnlockNotHeld {
        /// The context that called unlock.
        caller: TaskId,
    },

    /// A spawned task's body panicked.
    #[error("task {task} failed: {message}")]
    TaskBodyFailure {
        /// The task whose body failed.
        task: TaskId,
        /// The panic payload, rendered as text.
        message: String,
    },

    /// The operating system refused to start a new thread.
    #[error("failed to spawn task: {0}")]
    SpawnFailed(String),

    /// Invalid configuration value or file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for coordination primitive operations.
pub type CoreResult<T> = Result<T, CoreError>;
