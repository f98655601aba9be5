//! # Channel
//!
//! Typed handoff queue. The capacity decides how far a sender may run ahead
//! of its receivers:
//!
//! ```text
//! capacity 0   send #s completes only after receive #s took the value
//! capacity C   send #s completes once receive #(s - C) has happened
//! unbounded    send never waits
//! ```
//!
//! In every mode a completed send is ordered before the receive that takes
//! its value, and receive #k is ordered before the completion of send
//! #(k + C). Closing is ordered before every receive that observes it.
//!
//! ## Close
//!
//! After [`Channel::close`], buffered values are still delivered. Once they
//! are gone, every receive returns `None` immediately, forever. A rendezvous
//! channel has no buffer: a sender parked on it when it closes gets its value
//! back as [`CoreError::SendOnClosed`] and no receiver sees it.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{CoreError, CoreResult};

/// Slots reserved up front; the queue grows past this on demand.
const INITIAL_SLOTS: usize = 64;

/// Outcome of a receive that does not wait forever.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TryRecv<T> {
    /// A value was received.
    Value(T),
    /// Nothing was available in time, and the channel is still open.
    Empty,
    /// The channel is closed and drained.
    Closed,
}

impl<T> TryRecv<T> {
    /// Converts into the value, if one was received.
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Empty | Self::Closed => None,
        }
    }
}

/// Send/receive counters of a channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Values handed to the channel and not taken back.
    pub sent: u64,
    /// Values taken by receivers.
    pub received: u64,
    /// Values currently waiting for a receiver.
    pub buffered: usize,
}

struct State<T> {
    queue: VecDeque<T>,
    closed: bool,
    /// Sequence number of the last send that entered the queue.
    sent: u64,
    /// Sequence number of the last receive that took a value.
    received: u64,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    /// Signalled when a value is queued or the channel closes.
    readable: Condvar,
    /// Signalled when a value is taken or the channel closes.
    writable: Condvar,
    /// `None` means unbounded.
    capacity: Option<usize>,
}

/// A multi-producer, multi-consumer handoff channel.
///
/// Cloning yields another handle to the same channel; the channel lives as
/// long as any handle does.
///
/// ## Usage
///
/// ```rust
/// use causeway_core::sync::Channel;
///
/// let ch = Channel::new(1);
/// ch.send("hello").unwrap();
/// ch.close().unwrap();
///
/// assert_eq!(ch.recv(), Some("hello"));
/// assert_eq!(ch.recv(), None);
/// ```
pub struct Channel<T> {
    inner: Arc<Inner<T>>,
}

// Manual Clone implementation that doesn't require T: Clone
impl<T> Clone for Channel<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Channel")
            .field("capacity", &self.inner.capacity)
            .field("buffered", &state.queue.len())
            .field("closed", &state.closed)
            .field("sent", &state.sent)
            .field("received", &state.received)
            .finish()
    }
}

impl<T> Channel<T> {
    /// Creates a channel holding up to `capacity` unreceived values.
    ///
    /// A capacity of zero creates a rendezvous channel.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self::with_capacity(Some(capacity))
    }

    /// Creates a channel whose sends never wait.
    #[must_use]
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        // Capacity is a ceiling enforced by `has_room`, not a reservation.
        let queue = VecDeque::with_capacity(capacity.map_or(0, |c| c.min(INITIAL_SLOTS)));
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    queue,
                    closed: false,
                    sent: 0,
                    received: 0,
                }),
                readable: Condvar::new(),
                writable: Condvar::new(),
                capacity,
            }),
        }
    }

    /// Returns the capacity, or `None` for an unbounded channel.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> Option<usize> {
        self.inner.capacity
    }

    /// Returns true for a capacity-zero channel.
    #[inline]
    #[must_use]
    pub fn is_rendezvous(&self) -> bool {
        self.inner.capacity == Some(0)
    }

    /// Returns the number of values waiting for a receiver.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// Returns true if no value is waiting for a receiver.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().queue.is_empty()
    }

    /// Returns true once [`Channel::close`] has succeeded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().closed
    }

    /// Returns a snapshot of the counters.
    #[must_use]
    pub fn stats(&self) -> ChannelStats {
        let state = self.inner.state.lock();
        ChannelStats {
            sent: state.sent,
            received: state.received,
            buffered: state.queue.len(),
        }
    }

    /// Sends a value, waiting as long as the capacity requires.
    ///
    /// On a rendezvous channel this returns only after a receiver has taken
    /// the value. On a bounded channel it waits for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SendOnClosed`] if the channel is closed before
    /// the send completes. The value is dropped.
    pub fn send(&self, value: T) -> CoreResult<()> {
        let inner = &*self.inner;
        let mut state = inner.state.lock();

        loop {
            if state.closed {
                return Err(CoreError::SendOnClosed);
            }
            if inner.has_room(&state) {
                break;
            }
            inner.writable.wait(&mut state);
        }

        state.queue.push_back(value);
        state.sent += 1;
        let seq = state.sent;
        inner.readable.notify_one();

        if inner.capacity == Some(0) {
            while state.received < seq {
                if state.closed {
                    // Receivers never take from a closed rendezvous channel,
                    // so the queued value is still ours.
                    state.queue.pop_back();
                    state.sent -= 1;
                    inner.writable.notify_all();
                    return Err(CoreError::SendOnClosed);
                }
                inner.writable.wait(&mut state);
            }
        }

        Ok(())
    }

    /// Receives a value, waiting until one arrives or the channel is closed.
    ///
    /// Returns `None` once the channel is closed and drained; every later
    /// call returns `None` without waiting.
    pub fn recv(&self) -> Option<T> {
        let inner = &*self.inner;
        let mut state = inner.state.lock();
        loop {
            if let Some(value) = inner.take(&mut state) {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            inner.readable.wait(&mut state);
        }
    }

    /// Receives a value if one is ready, without waiting.
    pub fn try_recv(&self) -> TryRecv<T> {
        let inner = &*self.inner;
        let mut state = inner.state.lock();
        match inner.take(&mut state) {
            Some(value) => TryRecv::Value(value),
            None if state.closed => TryRecv::Closed,
            None => TryRecv::Empty,
        }
    }

    /// Receives a value, waiting at most `timeout`.
    ///
    /// Returns [`TryRecv::Empty`] if the timeout elapses first.
    pub fn recv_timeout(&self, timeout: Duration) -> TryRecv<T> {
        let inner = &*self.inner;
        let deadline = Instant::now() + timeout;
        let mut state = inner.state.lock();
        loop {
            if let Some(value) = inner.take(&mut state) {
                return TryRecv::Value(value);
            }
            if state.closed {
                return TryRecv::Closed;
            }
            if inner.readable.wait_until(&mut state, deadline).timed_out() {
                return match inner.take(&mut state) {
                    Some(value) => TryRecv::Value(value),
                    None if state.closed => TryRecv::Closed,
                    None => TryRecv::Empty,
                };
            }
        }
    }

    /// Closes the channel.
    ///
    /// Wakes every waiting sender and receiver. Buffered values stay
    /// receivable.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DoubleClose`] if the channel was already closed.
    pub fn close(&self) -> CoreResult<()> {
        let inner = &*self.inner;
        let pending = {
            let mut state = inner.state.lock();
            if state.closed {
                return Err(CoreError::DoubleClose);
            }
            state.closed = true;
            state.queue.len()
        };
        inner.readable.notify_all();
        inner.writable.notify_all();
        tracing::debug!(pending, capacity = ?inner.capacity, "channel closed");
        Ok(())
    }

    /// Returns an iterator that receives until the channel is closed and
    /// drained.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { channel: self }
    }
}

impl<T> Inner<T> {
    fn has_room(&self, state: &State<T>) -> bool {
        match self.capacity {
            None => true,
            // One offered value at a time; its sender waits for the taker.
            Some(0) => state.queue.is_empty(),
            Some(capacity) => state.queue.len() < capacity,
        }
    }

    fn take(&self, state: &mut State<T>) -> Option<T> {
        if state.closed && self.capacity == Some(0) {
            return None;
        }
        let value = state.queue.pop_front()?;
        state.received += 1;
        self.writable.notify_all();
        Some(value)
    }
}

/// Blocking iterator over received values. See [`Channel::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    channel: &'a Channel<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.channel.recv()
    }
}

impl<'a, T> IntoIterator for &'a Channel<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Iter<'a, T> {
        self.iter()
    }
}
