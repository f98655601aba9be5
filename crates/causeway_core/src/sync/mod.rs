//! # Synchronization Primitives
//!
//! ARCHITECT'S ORDER: Every happens-before edge is explicit.
//!
//! ## The Problem
//!
//! ```text
//! Task 1:  a = "hello world"
//! Task 2:  print(a)
//!
//! Without synchronization: Task 2 may print anything, or nothing.
//! "Task 1 finished first" is not an ordering.
//! ```
//!
//! ## The Solution: Explicit Edges
//!
//! ```text
//! Channel:  send ──────────> matching receive
//!           receive #k ────> completion of send #(k + capacity)
//!           close ─────────> receive that reports closed
//! Mutex:    unlock #n ─────> lock #(n + 1) returns
//! Limiter:  release #k ────> admission #(k + N)
//! ```
//!
//! These are the only edges. Everything else is a race.

mod channel;
mod limiter;
mod mutex;

pub use channel::{Channel, ChannelStats, Iter, TryRecv};
pub use limiter::{Limiter, Ticket};
pub use mutex::{Mutex, MutexGuard, MutexStats, OwnedMutexGuard};
