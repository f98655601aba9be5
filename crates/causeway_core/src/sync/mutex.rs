//! # Mutex
//!
//! A binary lock with explicit `lock`/`unlock` and FIFO hand-over.
//!
//! Every acquisition draws a ticket. Tickets are served strictly in the
//! order they were drawn, so for acquisitions `n < m` the release that ends
//! `n` is ordered before `m` returns from `lock`:
//!
//! ```text
//! A: lock (t0) ── write x ── unlock ─┐
//!                                    ▼
//! B:        lock (t1) ......... waits ── returns: sees x
//! ```
//!
//! The lock guards no data of its own. It orders whatever the critical
//! sections touch.
//!
//! ## Ownership
//!
//! `lock` records the calling [`TaskId`] as holder, and only that context
//! may call `unlock`. Guards obtained from [`Mutex::guard`] or
//! [`Mutex::lock_owned`] own the lock instead; they release on drop and can
//! be moved to another task to unlock there.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex as StateLock};

use crate::error::{CoreError, CoreResult};
use crate::task::TaskId;

/// Who currently owns the lock.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Holder {
    /// Taken with `lock`, released with `unlock` by the same context.
    Context(TaskId),
    /// Taken through a guard, released when the guard drops.
    Guard(TaskId),
}

/// Acquisition counters of a mutex.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MutexStats {
    /// Successful acquisitions.
    pub acquisitions: u64,
    /// Acquisitions that had to wait for an earlier ticket.
    pub contended: u64,
}

struct LockState {
    /// Next ticket to hand out.
    next_ticket: u64,
    /// Ticket allowed to hold the lock. Free when equal to `next_ticket`.
    now_serving: u64,
    holder: Option<Holder>,
    stats: MutexStats,
}

/// A FIFO mutual-exclusion lock.
///
/// ## Usage
///
/// ```rust
/// use causeway_core::sync::Mutex;
///
/// let lock = Mutex::new();
/// lock.lock();
/// // critical section
/// lock.unlock().unwrap();
///
/// // A second unlock is a misuse error, not a silent no-op.
/// assert!(lock.unlock().is_err());
/// ```
pub struct Mutex {
    state: StateLock<LockState>,
    /// Signalled on every release.
    turn: Condvar,
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Mutex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Mutex")
            .field("locked", &(state.now_serving != state.next_ticket))
            .field("holder", &state.holder)
            .field("waiting", &state.next_ticket.saturating_sub(state.now_serving + 1))
            .finish()
    }
}

impl Mutex {
    /// Creates an unlocked mutex.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: StateLock::new(LockState {
                next_ticket: 0,
                now_serving: 0,
                holder: None,
                stats: MutexStats {
                    acquisitions: 0,
                    contended: 0,
                },
            }),
            turn: Condvar::new(),
        }
    }

    /// Blocks until the lock is free, then holds it for the calling context.
    ///
    /// Waiters are admitted in the order they called `lock`.
    pub fn lock(&self) {
        let me = TaskId::current();
        self.acquire(Holder::Context(me));
    }

    /// Takes the lock if it is free and nobody is queued for it.
    pub fn try_lock(&self) -> bool {
        let mut state = self.state.lock();
        if state.now_serving != state.next_ticket {
            return false;
        }
        state.next_ticket += 1;
        state.holder = Some(Holder::Context(TaskId::current()));
        state.stats.acquisitions += 1;
        true
    }

    /// Releases a lock taken with [`Mutex::lock`] or [`Mutex::try_lock`].
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::UnlockNotHeld`] if the lock is free, held by
    /// another context, or held through a guard.
    pub fn unlock(&self) -> CoreResult<()> {
        let caller = TaskId::current();
        let mut state = self.state.lock();
        match state.holder {
            Some(Holder::Context(holder)) if holder == caller => {
                self.release(&mut state);
                Ok(())
            }
            _ => Err(CoreError::UnlockNotHeld { caller }),
        }
    }

    /// Locks and returns a guard that unlocks on drop.
    pub fn guard(&self) -> MutexGuard<'_> {
        self.acquire(Holder::Guard(TaskId::current()));
        MutexGuard { mutex: self }
    }

    /// Locks and returns a `'static` guard that unlocks on drop.
    ///
    /// The guard can be moved into a spawned task, which then releases the
    /// lock when it is done.
    pub fn lock_owned(self: &Arc<Self>) -> OwnedMutexGuard {
        self.acquire(Holder::Guard(TaskId::current()));
        OwnedMutexGuard {
            mutex: Arc::clone(self),
        }
    }

    /// Returns true while some context or guard holds the lock.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        let state = self.state.lock();
        state.now_serving != state.next_ticket
    }

    /// Returns the context that acquired the lock, if it is held.
    ///
    /// For a guard this stays the task that called [`Mutex::guard`] or
    /// [`Mutex::lock_owned`], even after the guard has moved to another task.
    #[must_use]
    pub fn holder(&self) -> Option<TaskId> {
        match self.state.lock().holder {
            Some(Holder::Context(id) | Holder::Guard(id)) => Some(id),
            None => None,
        }
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> MutexStats {
        self.state.lock().stats
    }

    fn acquire(&self, holder: Holder) {
        let mut state = self.state.lock();
        let ticket = state.next_ticket;
        state.next_ticket += 1;

        if state.now_serving != ticket {
            state.stats.contended += 1;
            tracing::debug!(ticket, serving = state.now_serving, "mutex contended");
            while state.now_serving != ticket {
                self.turn.wait(&mut state);
            }
        }

        state.holder = Some(holder);
        state.stats.acquisitions += 1;
    }

    fn release(&self, state: &mut LockState) {
        state.holder = None;
        state.now_serving += 1;
        // Only the next ticket can proceed, but waiters share one condvar.
        self.turn.notify_all();
    }

    fn release_guard(&self) {
        let mut state = self.state.lock();
        self.release(&mut state);
    }
}

/// Scoped lock guard. See [`Mutex::guard`].
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
}

impl fmt::Debug for MutexGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutexGuard").finish_non_exhaustive()
    }
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.release_guard();
    }
}

/// Lock guard that owns a handle to its mutex. See [`Mutex::lock_owned`].
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct OwnedMutexGuard {
    mutex: Arc<Mutex>,
}

impl OwnedMutexGuard {
    /// Returns the mutex this guard holds.
    #[must_use]
    pub fn mutex(&self) -> &Arc<Mutex> {
        &self.mutex
    }
}

impl fmt::Debug for OwnedMutexGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedMutexGuard").finish_non_exhaustive()
    }
}

impl Drop for OwnedMutexGuard {
    fn drop(&mut self) {
        self.mutex.release_guard();
    }
}
