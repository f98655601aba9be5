//! # Limiter
//!
//! Bounded concurrency from a buffered channel, nothing more:
//!
//! ```text
//! acquire:  send a token   (blocks while N tokens are out)
//! work
//! release:  receive a token
//! ```
//!
//! By the k/C rule on a channel of capacity N, the k-th release is ordered
//! before the (k+N)-th admission completes, so at most N callers are inside
//! their work at once. Callers beyond N simply wait; there is no overflow
//! error.

use crate::error::{CoreError, CoreResult};
use crate::sync::channel::{Channel, TryRecv};

/// A pool of `N` tickets guarding caller-supplied work.
///
/// Clones share the same pool.
///
/// ## Usage
///
/// ```rust
/// use causeway_core::sync::Limiter;
///
/// let limiter = Limiter::new(3).unwrap();
/// let answer = limiter.run(|| 6 * 7);
/// assert_eq!(answer, 42);
/// assert_eq!(limiter.in_flight(), 0);
/// ```
#[derive(Clone, Debug)]
pub struct Limiter {
    tickets: Channel<()>,
    limit: usize,
}

impl Limiter {
    /// Creates a limiter admitting at most `limit` concurrent work items.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if `limit` is zero, which would
    /// admit nobody.
    pub fn new(limit: usize) -> CoreResult<Self> {
        if limit == 0 {
            return Err(CoreError::InvalidConfig(
                "limiter needs at least one ticket".to_string(),
            ));
        }
        Ok(Self {
            tickets: Channel::new(limit),
            limit,
        })
    }

    /// Returns the maximum number of concurrent work items.
    #[inline]
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Returns the number of tickets currently held.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.tickets.len()
    }

    /// Returns the number of tickets that could be taken without waiting.
    #[must_use]
    pub fn available(&self) -> usize {
        self.limit.saturating_sub(self.in_flight())
    }

    /// Blocks until a ticket is free and returns it.
    ///
    /// The ticket is released when dropped, including during a panic.
    pub fn acquire(&self) -> Ticket<'_> {
        // The ticket channel is private and never closed.
        let held = match self.tickets.send(()) {
            Ok(()) => {
                tracing::trace!(limit = self.limit, "limiter admitted");
                true
            }
            Err(err) => {
                tracing::error!(limit = self.limit, %err, "limiter ticket pool unavailable");
                false
            }
        };
        Ticket { limiter: self, held }
    }

    /// Runs `work` once a ticket is free, releasing it on every exit path.
    ///
    /// If `work` panics, the ticket is released and the panic continues.
    pub fn run<R, F>(&self, work: F) -> R
    where
        F: FnOnce() -> R,
    {
        let _ticket = self.acquire();
        work()
    }

    fn release(&self) {
        match self.tickets.try_recv() {
            TryRecv::Value(()) => {}
            TryRecv::Empty | TryRecv::Closed => {
                tracing::error!(limit = self.limit, "limiter released a ticket it never issued");
            }
        }
    }
}

/// One admission through a [`Limiter`]. Releases on drop.
#[derive(Debug)]
#[must_use = "the ticket is released as soon as it is dropped"]
pub struct Ticket<'a> {
    limiter: &'a Limiter,
    held: bool,
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        if self.held {
            self.limiter.release();
        }
    }
}
