//! # Memory Model Scenarios
//!
//! The classic happens-before walkthrough, one scenario per test, each
//! repeated so that a missing edge would show up as a flake:
//!
//! 1. Spawn is ordered before the body starts
//! 2. Task exit is ordered before nothing; an explicit edge is required
//! 3. A buffered send is ordered before the matching receive completes
//! 4. A close is ordered before the receive that observes it
//! 5. An unbuffered receive is ordered before the send completes
//! 6. Receive k is ordered before send k+C completes (work limiter)
//! 7. Unlock n is ordered before lock n+1 returns
//!
//! Run with: cargo test --test memory_model_scenarios -- --nocapture

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use causeway_core::{spawn, Channel, Limiter, Mutex};

const HELLO_WORLD: u64 = 0x4845_4c4c_4f;
const ROUNDS: usize = 500;

/// A message slot with no ordering of its own.
#[derive(Clone, Default)]
struct Slot(Arc<AtomicU64>);

impl Slot {
    fn write(&self, v: u64) {
        self.0.store(v, Ordering::Relaxed);
    }

    fn read(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

// ============================================================================
// SCENARIO 1: SPAWN
// ============================================================================

#[test]
fn scenario_spawn_sees_parent_writes() {
    for _ in 0..ROUNDS {
        let a = Slot::default();
        a.write(HELLO_WORLD);

        let observed = Channel::new(1);
        let (child_a, child_observed) = (a.clone(), observed.clone());
        spawn(move || child_observed.send(child_a.read()).unwrap());

        assert_eq!(observed.recv(), Some(HELLO_WORLD));
    }
}

// ============================================================================
// SCENARIO 2: TASK EXIT
// ============================================================================

/// Only the explicit edge is asserted. Reading `a` before `done.recv()` would
/// be a race with no defined answer, so the test never does it.
#[test]
fn scenario_task_exit_needs_an_explicit_edge() {
    for _ in 0..ROUNDS {
        let a = Slot::default();
        let done: Channel<()> = Channel::new(0);

        let (child_a, child_done) = (a.clone(), done.clone());
        spawn(move || {
            child_a.write(HELLO_WORLD);
            child_done.close().unwrap();
        });

        assert_eq!(done.recv(), None);
        assert_eq!(a.read(), HELLO_WORLD);
    }
}

// ============================================================================
// SCENARIO 3: BUFFERED SEND BEFORE RECEIVE
// ============================================================================

#[test]
fn scenario_buffered_send_before_receive() {
    for _ in 0..ROUNDS {
        let a = Slot::default();
        let c = Channel::new(10);

        let (child_a, child_c) = (a.clone(), c.clone());
        spawn(move || {
            child_a.write(HELLO_WORLD);
            child_c.send(0).unwrap();
        });

        assert_eq!(c.recv(), Some(0));
        assert_eq!(a.read(), HELLO_WORLD);
    }
}

// ============================================================================
// SCENARIO 4: CLOSE BEFORE RECEIVE
// ============================================================================

#[test]
fn scenario_close_before_receive() {
    for _ in 0..ROUNDS {
        let a = Slot::default();
        let c: Channel<i32> = Channel::new(10);

        let (child_a, child_c) = (a.clone(), c.clone());
        spawn(move || {
            child_a.write(HELLO_WORLD);
            child_c.close().unwrap();
        });

        // A closed channel reports "no value", never a zero that could be data.
        assert_eq!(c.recv(), None);
        assert_eq!(c.recv(), None);
        assert_eq!(a.read(), HELLO_WORLD);
    }
}

// ============================================================================
// SCENARIO 5: UNBUFFERED RECEIVE BEFORE SEND COMPLETES
// ============================================================================

#[test]
fn scenario_unbuffered_receive_before_send_completes() {
    for _ in 0..ROUNDS {
        let a = Slot::default();
        let c = Channel::new(0);

        let (child_a, child_c) = (a.clone(), c.clone());
        spawn(move || {
            child_a.write(HELLO_WORLD);
            child_c.recv();
        });

        c.send(0).unwrap();
        assert_eq!(a.read(), HELLO_WORLD);
    }
}

// ============================================================================
// SCENARIO 6: WORK LIMITER
// ============================================================================

#[test]
fn scenario_channel_as_work_limiter() {
    let limit: Channel<i32> = Channel::new(3);
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Channel::unbounded();

    let work: Vec<Box<dyn FnOnce(usize) -> usize + Send>> = (0..10)
        .map(|_| Box::new(|x: usize| x * 2) as Box<dyn FnOnce(usize) -> usize + Send>)
        .collect();

    for (i, w) in work.into_iter().enumerate() {
        let limit = limit.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        let done = done.clone();
        spawn(move || {
            limit.send(1).unwrap();
            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            let out = w(i);
            running.fetch_sub(1, Ordering::SeqCst);
            limit.recv();
            done.send(out).unwrap();
        });
    }

    let mut results: Vec<usize> = (0..10).filter_map(|_| done.recv()).collect();
    results.sort_unstable();
    assert_eq!(results, (0..10).map(|i| i * 2).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

#[test]
fn scenario_limiter_matches_hand_rolled_limit() {
    let limiter = Limiter::new(3).unwrap();
    let running = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let done = Channel::unbounded();

    for i in 0..10_usize {
        let limiter = limiter.clone();
        let running = Arc::clone(&running);
        let peak = Arc::clone(&peak);
        let done = done.clone();
        spawn(move || {
            let out = limiter.run(|| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                std::thread::yield_now();
                running.fetch_sub(1, Ordering::SeqCst);
                i
            });
            done.send(out).unwrap();
        });
    }

    let mut results: Vec<usize> = (0..10).filter_map(|_| done.recv()).collect();
    results.sort_unstable();
    assert_eq!(results, (0..10).collect::<Vec<_>>());
    assert!(peak.load(Ordering::SeqCst) <= 3);
}

// ============================================================================
// SCENARIO 7: UNLOCK BEFORE LOCK
// ============================================================================

#[test]
fn scenario_unlock_before_next_lock() {
    for _ in 0..ROUNDS {
        let l = Arc::new(Mutex::new());
        let a = Slot::default();

        // Locked here, unlocked by the spawned task.
        let guard = l.lock_owned();
        let child_a = a.clone();
        spawn(move || {
            child_a.write(HELLO_WORLD);
            drop(guard);
        });

        l.lock();
        assert_eq!(a.read(), HELLO_WORLD);
        l.unlock().unwrap();
    }
}
