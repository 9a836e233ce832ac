//! Microtask and macrotask queue management.
//!
//! Microtasks form a plain FIFO. Macrotasks are ordered by due time and,
//! among equal due times, by insertion order; the `(due, seq)` pair doubles
//! as the cancellation token.

use core_types::JsError;
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

/// Result of running a task. An `Err` is an uncaught exception.
pub type TaskResult = Result<(), JsError>;

/// A microtask to be executed by the scheduler.
///
/// Microtasks are drained to exhaustion before any macrotask runs.
/// Future reactions and combinator bookkeeping are microtasks.
pub struct Microtask {
    callback: Box<dyn FnOnce() -> TaskResult>,
}

impl Microtask {
    /// Creates a new Microtask from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> TaskResult + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the microtask.
    pub fn run(self) -> TaskResult {
        (self.callback)()
    }
}

impl fmt::Debug for Microtask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Microtask {{ ... }}")
    }
}

/// A timer- or host-driven task.
pub struct Macrotask {
    callback: Box<dyn FnOnce() -> TaskResult>,
}

impl Macrotask {
    /// Creates a new Macrotask from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() -> TaskResult + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Executes the macrotask.
    pub fn run(self) -> TaskResult {
        (self.callback)()
    }
}

impl fmt::Debug for Macrotask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Macrotask {{ ... }}")
    }
}

/// Identifies a queued macrotask; used to cancel it.
///
/// Ordering of tokens is the execution order of their macrotasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TimerToken {
    due: Duration,
    seq: u64,
}

impl TimerToken {
    /// When the macrotask becomes runnable.
    pub fn due(&self) -> Duration {
        self.due
    }

    /// Insertion sequence number, unique per queue.
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// A FIFO queue for microtasks.
#[derive(Debug, Default)]
pub struct MicrotaskQueue {
    queue: VecDeque<(u64, Microtask)>,
    next_seq: u64,
}

impl MicrotaskQueue {
    /// Creates a new empty MicrotaskQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a microtask to the end of the queue, returning its sequence number.
    pub fn enqueue(&mut self, microtask: Microtask) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push_back((seq, microtask));
        seq
    }

    /// Removes and returns the oldest microtask with its sequence number.
    pub fn dequeue(&mut self) -> Option<(u64, Microtask)> {
        self.queue.pop_front()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued microtasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Total number of microtasks ever enqueued.
    pub fn total_enqueued(&self) -> u64 {
        self.next_seq
    }

    /// Removes every queued microtask.
    pub fn clear(&mut self) -> Vec<(u64, Microtask)> {
        self.queue.drain(..).collect()
    }
}

/// A queue for macrotasks ordered by `(due, seq)`.
#[derive(Debug, Default)]
pub struct MacrotaskQueue {
    queue: BTreeMap<TimerToken, Macrotask>,
    next_seq: u64,
}

impl MacrotaskQueue {
    /// Creates a new empty MacrotaskQueue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a macrotask due at `due`.
    pub fn schedule(&mut self, due: Duration, task: Macrotask) -> TimerToken {
        let token = TimerToken {
            due,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.queue.insert(token, task);
        token
    }

    /// Removes the macrotask for `token` if it is still queued.
    pub fn cancel(&mut self, token: TimerToken) -> Option<Macrotask> {
        self.queue.remove(&token)
    }

    /// Removes and returns the earliest macrotask if it is due at `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(TimerToken, Macrotask)> {
        let first = *self.queue.keys().next()?;
        if first.due > now {
            return None;
        }
        self.queue.remove(&first).map(|task| (first, task))
    }

    /// Due time of the earliest macrotask.
    pub fn next_due(&self) -> Option<Duration> {
        self.queue.keys().next().map(|token| token.due)
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Returns the number of queued macrotasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Removes every queued macrotask, in execution order.
    pub fn clear(&mut self) -> Vec<(TimerToken, Macrotask)> {
        std::mem::take(&mut self.queue).into_iter().collect()
    }
}
