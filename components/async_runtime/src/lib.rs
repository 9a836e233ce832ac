//! Deterministic single-threaded scheduler with promise-like futures.
//!
//! This crate provides the async runtime components:
//! - Scheduler with a microtask queue and a due-time ordered macrotask queue
//! - Future, a single-assignment state machine with chaining, adoption and
//!   combinators
//! - Unhandled-error reporting for uncaught task errors and unobserved
//!   rejections
//!
//! # Overview
//!
//! - [`Scheduler`] - Owns the queues; the host drives it with
//!   [`Scheduler::run_one_macrotask`] or [`Scheduler::drain_all`]
//! - [`Future`] - Eventual value; reactions always run as microtasks
//! - [`Clock`] - Time source for macrotask due-times
//!
//! # Examples
//!
//! ## Ordering
//!
//! ```
//! use async_runtime::{Future, Resolution, Scheduler};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//!
//! let scheduler = Scheduler::new();
//! let log = Rc::new(RefCell::new(Vec::new()));
//!
//! log.borrow_mut().push("start");
//! let l = log.clone();
//! scheduler.schedule_macrotask(move || { l.borrow_mut().push("timeout"); Ok(()) }, Duration::ZERO);
//! let (l1, l2) = (log.clone(), log.clone());
//! Future::<(), ()>::resolved_in(&scheduler, ())
//!     .then(move |_| { l1.borrow_mut().push("promise 1"); Resolution::Fulfill(()) })
//!     .then(move |_| { l2.borrow_mut().push("promise 2"); Resolution::Fulfill(()) });
//! log.borrow_mut().push("end");
//!
//! scheduler.drain_all();
//! assert_eq!(*log.borrow(), vec!["start", "end", "promise 1", "promise 2", "timeout"]);
//! ```
//!
//! ## Combinators
//!
//! ```
//! use async_runtime::{Future, Scheduler};
//!
//! let scheduler = Scheduler::new();
//! let _guard = scheduler.enter();
//!
//! let all = Future::<i32, String>::all(vec![
//!     Future::resolved(1),
//!     Future::resolved(2),
//!     Future::resolved(3),
//! ]);
//! scheduler.drain_all();
//! assert_eq!(all.value(), Some(vec![1, 2, 3]));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod combinators;
pub mod future;
pub mod scheduler;
pub mod task_queue;
pub mod unhandled;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use combinators::{AggregateError, Settled};
pub use future::{Future, FutureState, Handler, Resolution, Thenable};
pub use scheduler::{EnterGuard, Scheduler, SchedulerBuilder, TeardownReport};
pub use task_queue::{Macrotask, MacrotaskQueue, Microtask, MicrotaskQueue, TaskResult, TimerToken};
pub use unhandled::{ErrorSink, TaskOrigin, UnhandledError, UnhandledKind};
