//! The scheduler: two task queues and the deterministic drain algorithm.
//!
//! The host drives progress by calling [`Scheduler::run_one_macrotask`] from
//! its own loop, or [`Scheduler::drain_all`] in tests and headless runs.
//! Each turn:
//! 1. Drains the microtask queue to exhaustion, including microtasks queued
//!    by microtasks of the same drain
//! 2. Takes the earliest due macrotask and executes it
//! 3. Drains microtasks again
//!
//! Errors escaping a task never stop the scheduler. They are caught at the
//! dispatch boundary and handed to the unhandled-error sink.

use crate::clock::{Clock, ManualClock};
use crate::future::Future;
use crate::task_queue::{
    Macrotask, MacrotaskQueue, Microtask, MicrotaskQueue, TaskResult, TimerToken,
};
use crate::unhandled::{log_unhandled, ErrorSink, TaskOrigin, UnhandledError};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Duration;

thread_local! {
    static CURRENT: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

/// Yields a report while the watched future is still rejected and unobserved.
pub(crate) type RejectionWatch = Box<dyn Fn() -> Option<UnhandledError>>;

/// A single-threaded microtask/macrotask scheduler.
///
/// `Scheduler` is a handle; clones share the same queues. Each thread has a
/// default instance reachable through [`Scheduler::current`], and any number
/// of isolated instances can be created with [`Scheduler::new`].
///
/// # Examples
///
/// ```
/// use async_runtime::Scheduler;
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use std::time::Duration;
///
/// let scheduler = Scheduler::new();
/// let log = Rc::new(RefCell::new(Vec::new()));
///
/// let l = log.clone();
/// scheduler.schedule_microtask(move || { l.borrow_mut().push("a"); Ok(()) });
/// let l = log.clone();
/// scheduler.schedule_macrotask(move || { l.borrow_mut().push("b"); Ok(()) }, Duration::ZERO);
/// let l = log.clone();
/// scheduler.schedule_microtask(move || { l.borrow_mut().push("c"); Ok(()) });
///
/// scheduler.drain_all();
/// assert_eq!(*log.borrow(), vec!["a", "c", "b"]);
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

struct Inner {
    microtasks: RefCell<MicrotaskQueue>,
    macrotasks: RefCell<MacrotaskQueue>,
    clock: Rc<dyn Clock>,
    sink: RefCell<Option<ErrorSink>>,
    report_cancelled: bool,
    draining: Cell<bool>,
    rejections: RefCell<Vec<RejectionWatch>>,
    next_future_id: Cell<u64>,
}

/// Configures a [`Scheduler`].
///
/// Defaults: a fresh [`ManualClock`], unhandled errors logged through
/// `tracing`, teardown does not log cancelled items individually.
#[derive(Default)]
pub struct SchedulerBuilder {
    clock: Option<Rc<dyn Clock>>,
    sink: Option<ErrorSink>,
    report_cancelled: bool,
}

impl SchedulerBuilder {
    /// Time source used for macrotask due-times.
    pub fn clock(mut self, clock: Rc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Receives uncaught task errors and unhandled rejections.
    pub fn error_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&UnhandledError) + 'static,
    {
        self.sink = Some(Rc::new(sink));
        self
    }

    /// Log every item dropped by [`Scheduler::teardown`].
    pub fn report_cancelled(mut self, enabled: bool) -> Self {
        self.report_cancelled = enabled;
        self
    }

    /// Creates the scheduler with empty queues.
    pub fn build(self) -> Scheduler {
        let clock = self
            .clock
            .unwrap_or_else(|| Rc::new(ManualClock::new()) as Rc<dyn Clock>);
        Scheduler {
            inner: Rc::new(Inner {
                microtasks: RefCell::new(MicrotaskQueue::new()),
                macrotasks: RefCell::new(MacrotaskQueue::new()),
                clock,
                sink: RefCell::new(self.sink),
                report_cancelled: self.report_cancelled,
                draining: Cell::new(false),
                rejections: RefCell::new(Vec::new()),
                next_future_id: Cell::new(0),
            }),
        }
    }
}

impl fmt::Debug for SchedulerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerBuilder")
            .field("custom_clock", &self.clock.is_some())
            .field("custom_sink", &self.sink.is_some())
            .field("report_cancelled", &self.report_cancelled)
            .finish()
    }
}

/// What [`Scheduler::teardown`] dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Microtasks that never ran
    pub microtasks: usize,
    /// Macrotasks that never ran
    pub macrotasks: usize,
}

/// Restores the previous thread default when dropped.
///
/// Returned by [`Scheduler::enter`].
#[must_use = "the scheduler stays the thread default only while the guard lives"]
pub struct EnterGuard {
    prev: Option<Scheduler>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        let prev = self.prev.take();
        let replaced = CURRENT.with(|cell| cell.replace(prev));
        drop(replaced);
    }
}

impl fmt::Debug for EnterGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnterGuard {{ ... }}")
    }
}

struct DrainGuard<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl Scheduler {
    /// Creates a scheduler with default configuration.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts configuring a scheduler.
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::default()
    }

    /// The calling thread's default scheduler, created on first use.
    pub fn current() -> Scheduler {
        CURRENT.with(|cell| {
            cell.borrow_mut()
                .get_or_insert_with(Scheduler::new)
                .clone()
        })
    }

    /// Makes this scheduler the thread default until the guard is dropped.
    pub fn enter(&self) -> EnterGuard {
        let prev = CURRENT.with(|cell| cell.replace(Some(self.clone())));
        EnterGuard { prev }
    }

    /// Creates a pending future whose reactions run on this scheduler.
    pub fn future<T, E>(&self) -> Future<T, E>
    where
        T: Clone + 'static,
        E: Clone + fmt::Debug + 'static,
    {
        Future::new_in(self)
    }

    /// Replaces the unhandled-error sink.
    pub fn set_error_sink<F>(&self, sink: F)
    where
        F: Fn(&UnhandledError) + 'static,
    {
        *self.inner.sink.borrow_mut() = Some(Rc::new(sink));
    }

    /// Current time of this scheduler's clock.
    pub fn now(&self) -> Duration {
        self.inner.clock.now()
    }

    /// Queues `f` as a microtask.
    pub fn schedule_microtask<F>(&self, f: F)
    where
        F: FnOnce() -> TaskResult + 'static,
    {
        self.enqueue_microtask(Microtask::new(f));
    }

    /// Adds a microtask to the microtask queue.
    pub fn enqueue_microtask(&self, microtask: Microtask) {
        let seq = self.inner.microtasks.borrow_mut().enqueue(microtask);
        tracing::trace!(seq, "microtask queued");
    }

    /// Queues `f` as a macrotask due after `delay`.
    pub fn schedule_macrotask<F>(&self, f: F, delay: Duration) -> TimerToken
    where
        F: FnOnce() -> TaskResult + 'static,
    {
        self.enqueue_macrotask(Macrotask::new(f), delay)
    }

    /// Adds a macrotask due at `now + delay`, saturating at `Duration::MAX`.
    pub fn enqueue_macrotask(&self, task: Macrotask, delay: Duration) -> TimerToken {
        let due = self.now().saturating_add(delay);
        let token = self.inner.macrotasks.borrow_mut().schedule(due, task);
        tracing::trace!(?token, "macrotask queued");
        token
    }

    /// Removes a macrotask that has not run yet.
    ///
    /// Returns `false` if it already ran or was already cancelled.
    pub fn cancel(&self, token: TimerToken) -> bool {
        let removed = self.inner.macrotasks.borrow_mut().cancel(token);
        let cancelled = removed.is_some();
        drop(removed);
        tracing::trace!(?token, cancelled, "macrotask cancel");
        cancelled
    }

    /// Number of queued microtasks.
    pub fn pending_microtasks(&self) -> usize {
        self.inner.microtasks.borrow().len()
    }

    /// Number of queued macrotasks, due or not.
    pub fn pending_macrotasks(&self) -> usize {
        self.inner.macrotasks.borrow().len()
    }

    /// Due time of the earliest macrotask.
    pub fn next_due(&self) -> Option<Duration> {
        self.inner.macrotasks.borrow().next_due()
    }

    /// Returns true if both queues are empty.
    pub fn is_idle(&self) -> bool {
        self.inner.microtasks.borrow().is_empty() && self.inner.macrotasks.borrow().is_empty()
    }

    /// Microtask checkpoint: runs microtasks until the queue is empty.
    ///
    /// Returns the number of microtasks executed.
    pub fn run_microtasks(&self) -> usize {
        let Some(_guard) = self.begin_drain("run_microtasks") else {
            return 0;
        };
        let ran = self.drain_microtasks();
        self.flush_rejections_if_idle();
        ran
    }

    /// Runs pending microtasks, then at most one due macrotask followed by
    /// the microtasks it produced.
    ///
    /// Unobserved rejections are only reported once both queues are empty.
    /// A host that keeps a timer queued at all times should call
    /// [`run_microtasks`](Self::run_microtasks) or [`drain_all`](Self::drain_all)
    /// at some point where nothing else is pending, or rejection reports will
    /// accumulate.
    ///
    /// Returns `true` if a macrotask was executed.
    pub fn run_one_macrotask(&self) -> bool {
        let Some(_guard) = self.begin_drain("run_one_macrotask") else {
            return false;
        };
        self.drain_microtasks();
        let ran = self.run_due_macrotask();
        self.flush_rejections_if_idle();
        ran
    }

    /// Runs until both queues are empty, waiting on the clock for macrotasks
    /// that are not due yet.
    ///
    /// Returns the number of macrotasks executed.
    pub fn drain_all(&self) -> usize {
        let Some(_guard) = self.begin_drain("drain_all") else {
            return 0;
        };
        let mut macrotasks = 0;
        loop {
            self.drain_microtasks();
            if self.run_due_macrotask() {
                macrotasks += 1;
                continue;
            }
            let next_due = self.next_due();
            match next_due {
                Some(due) => self.inner.clock.wait_until(due),
                None => {
                    self.flush_rejections_if_idle();
                    if self.is_idle() {
                        break;
                    }
                }
            }
        }
        tracing::debug!(macrotasks, now = ?self.now(), "scheduler drained");
        macrotasks
    }

    /// Drops every queued item and pending rejection report.
    pub fn teardown(&self) -> TeardownReport {
        let microtasks = self.inner.microtasks.borrow_mut().clear();
        let macrotasks = self.inner.macrotasks.borrow_mut().clear();
        let watches = std::mem::take(&mut *self.inner.rejections.borrow_mut());

        if self.inner.report_cancelled {
            for (seq, _) in &microtasks {
                tracing::debug!(seq, "microtask cancelled by teardown");
            }
            for (token, _) in &macrotasks {
                tracing::debug!(?token, "macrotask cancelled by teardown");
            }
        }

        let report = TeardownReport {
            microtasks: microtasks.len(),
            macrotasks: macrotasks.len(),
        };
        tracing::debug!(
            microtasks = report.microtasks,
            macrotasks = report.macrotasks,
            "scheduler torn down"
        );
        drop(microtasks);
        drop(macrotasks);
        drop(watches);
        report
    }

    pub(crate) fn next_future_id(&self) -> u64 {
        let id = self.inner.next_future_id.get();
        self.inner.next_future_id.set(id + 1);
        id
    }

    pub(crate) fn watch_rejection(&self, watch: RejectionWatch) {
        self.inner.rejections.borrow_mut().push(watch);
    }

    pub(crate) fn report(&self, error: UnhandledError) {
        let sink = self.inner.sink.borrow().clone();
        match sink {
            Some(sink) => sink(&error),
            None => log_unhandled(&error),
        }
    }

    fn begin_drain(&self, operation: &'static str) -> Option<DrainGuard<'_>> {
        if self.inner.draining.replace(true) {
            tracing::warn!(operation, "ignored re-entrant drain from inside a running task");
            return None;
        }
        Some(DrainGuard {
            flag: &self.inner.draining,
        })
    }

    fn drain_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            let next = self.inner.microtasks.borrow_mut().dequeue();
            let Some((seq, microtask)) = next else {
                break;
            };
            self.dispatch(TaskOrigin::Microtask { seq }, || microtask.run());
            ran += 1;
        }
        if ran > 0 {
            tracing::trace!(ran, "microtask checkpoint");
        }
        ran
    }

    fn run_due_macrotask(&self) -> bool {
        let now = self.now();
        let next = self.inner.macrotasks.borrow_mut().pop_due(now);
        let Some((token, task)) = next else {
            return false;
        };
        tracing::trace!(?token, "macrotask running");
        self.dispatch(TaskOrigin::Macrotask { token }, || task.run());
        self.drain_microtasks();
        true
    }

    fn dispatch<F>(&self, origin: TaskOrigin, run: F)
    where
        F: FnOnce() -> TaskResult,
    {
        match panic::catch_unwind(AssertUnwindSafe(run)) {
            Ok(Ok(())) => {}
            Ok(Err(error)) => self.report(UnhandledError::exception(origin, error)),
            Err(panic) => self.report(UnhandledError::panic(origin, panic)),
        }
    }

    fn flush_rejections_if_idle(&self) {
        if !self.is_idle() {
            return;
        }
        let watches = std::mem::take(&mut *self.inner.rejections.borrow_mut());
        for watch in watches {
            if let Some(report) = watch() {
                self.report(report);
            }
        }
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("now", &self.now())
            .field("microtasks", &self.pending_microtasks())
            .field("macrotasks", &self.pending_macrotasks())
            .finish()
    }
}
