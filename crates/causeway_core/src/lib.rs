//! # CAUSEWAY Core
//!
//! Coordination primitives for establishing happens-before ordering between
//! independently scheduled units of work:
//! - Tasks on OS threads, with spawn ordered before the body starts
//! - Channels: rendezvous, buffered and unbounded
//! - A FIFO mutex with explicit lock/unlock
//! - A limiter bounding concurrency, built from a channel
//!
//! ## Architecture Rules
//!
//! 1. **Ordering is never implied** - Only channel and mutex operations order tasks
//! 2. **Misuse is a value** - Send on closed, double close and foreign unlock return errors
//! 3. **Failures stay local** - A panicking task never unwinds into another
//!
//! ## Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::sync::Arc;
//! use causeway_core::{spawn, Channel};
//!
//! let a = Arc::new(AtomicU32::new(0));
//! let done = Channel::new(0);
//!
//! let (writer, signal) = (Arc::clone(&a), done.clone());
//! spawn(move || {
//!     writer.store(7, Ordering::Relaxed);
//!     signal.send(()).unwrap();
//! });
//!
//! done.recv();
//! assert_eq!(a.load(Ordering::Relaxed), 7);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod sync;
pub mod task;

pub use config::SpawnConfig;
pub use error::{CoreError, CoreResult};
pub use sync::{Channel, ChannelStats, Limiter, Mutex, MutexGuard, OwnedMutexGuard, Ticket, TryRecv};
pub use task::{spawn, Spawner, TaskFailure, TaskId, TaskStats};
