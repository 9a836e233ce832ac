//! Single-assignment eventual values.
//!
//! A [`Future`] starts `Pending` and settles at most once, to `Fulfilled` or
//! `Rejected`. Continuations registered with [`Future::then`] and friends are
//! stored as reaction records and always dispatched through the scheduler's
//! microtask queue, never inline.

use crate::scheduler::Scheduler;
use crate::unhandled::{panic_error, TaskOrigin, UnhandledError};
use core_types::JsError;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

/// The state of a Future.
///
/// Once settled (Fulfilled or Rejected), a Future cannot change state.
#[derive(Debug, Clone, PartialEq)]
pub enum FutureState<T, E> {
    /// Not settled yet.
    Pending,
    /// Settled with a value.
    Fulfilled(T),
    /// Settled with an error.
    Rejected(E),
}

impl<T, E> FutureState<T, E> {
    /// Returns true unless pending.
    pub fn is_settled(&self) -> bool {
        !matches!(self, FutureState::Pending)
    }

    /// Returns true if fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        matches!(self, FutureState::Fulfilled(_))
    }

    /// Returns true if rejected.
    pub fn is_rejected(&self) -> bool {
        matches!(self, FutureState::Rejected(_))
    }

    /// `"pending"`, `"fulfilled"` or `"rejected"`.
    pub fn label(&self) -> &'static str {
        match self {
            FutureState::Pending => "pending",
            FutureState::Fulfilled(_) => "fulfilled",
            FutureState::Rejected(_) => "rejected",
        }
    }
}

/// Something a Future can adopt: it reports exactly one eventual outcome to
/// the callbacks it is given.
///
/// This is the capability check for "is this value a thenable". [`Future`]
/// implements it; hosts may implement it for their own deferred values.
pub trait Thenable<T, E> {
    /// Registers the callbacks. Only the first callback invoked counts.
    fn subscribe(&self, on_fulfilled: Box<dyn FnOnce(T)>, on_rejected: Box<dyn FnOnce(E)>);

    /// Id of the underlying future, if this thenable is one.
    fn future_id(&self) -> Option<u64> {
        None
    }
}

/// What a handler (or a producer) settles a future with.
pub enum Resolution<T, E> {
    /// Fulfill with a plain value.
    Fulfill(T),
    /// Reject; this is how a handler "throws".
    Reject(E),
    /// Mirror the eventual outcome of another future or thenable.
    Adopt(Rc<dyn Thenable<T, E>>),
}

impl<T, E> Resolution<T, E> {
    /// Wraps a thenable for adoption.
    pub fn adopt<S>(source: S) -> Self
    where
        S: Thenable<T, E> + 'static,
    {
        Resolution::Adopt(Rc::new(source))
    }
}

impl<T, E> From<Result<T, E>> for Resolution<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Resolution::Fulfill(value),
            Err(error) => Resolution::Reject(error),
        }
    }
}

impl<T, E> From<Future<T, E>> for Resolution<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    fn from(future: Future<T, E>) -> Self {
        Resolution::Adopt(Rc::new(future))
    }
}

impl<T, E> fmt::Debug for Resolution<T, E>
where
    T: fmt::Debug,
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Fulfill(value) => f.debug_tuple("Fulfill").field(value).finish(),
            Resolution::Reject(error) => f.debug_tuple("Reject").field(error).finish(),
            Resolution::Adopt(_) => write!(f, "Adopt(..)"),
        }
    }
}

/// A boxed handler for [`Future::then_with`].
///
/// Boxing lets an absent handler be written as plain `None`.
pub struct Handler<A, U, E> {
    callback: Box<dyn FnOnce(A) -> Resolution<U, E>>,
}

impl<A, U, E> Handler<A, U, E> {
    /// Creates a new Handler from a closure.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(A) -> Resolution<U, E> + 'static,
    {
        Self {
            callback: Box::new(f),
        }
    }

    /// Calls the handler.
    pub fn call(self, arg: A) -> Resolution<U, E> {
        (self.callback)(arg)
    }
}

impl<A, U, E> fmt::Debug for Handler<A, U, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler {{ ... }}")
    }
}

type Callback<A, U, E> = Box<dyn FnOnce(A) -> Resolution<U, E>>;

/// A reaction to be triggered when a Future settles.
///
/// Each path already captures its handler and the downstream future it
/// settles, so the record does not need to know the downstream's type.
pub(crate) struct Reaction<T, E> {
    pub(crate) on_fulfilled: Box<dyn FnOnce(T)>,
    pub(crate) on_rejected: Box<dyn FnOnce(E)>,
}

struct Shared<T, E> {
    id: u64,
    scheduler: Scheduler,
    state: RefCell<FutureState<T, E>>,
    reactions: RefCell<Vec<Reaction<T, E>>>,
    // Adopting another source; external settlement is ignored from now on.
    locked: Cell<bool>,
    // A reaction was registered; a rejection is observed.
    handled: Cell<bool>,
}

/// A single-assignment eventual value.
///
/// `Future` is a handle: clones share the same state.
///
/// # Examples
///
/// ```
/// use async_runtime::{Future, Resolution, Scheduler};
///
/// let scheduler = Scheduler::new();
/// let future: Future<i32, String> = Future::new_in(&scheduler);
/// let doubled = future.then(|v| Resolution::Fulfill(v * 2));
///
/// future.fulfill(21);
/// future.fulfill(0); // ignored: first settlement wins
/// assert!(doubled.is_pending()); // reactions run as microtasks
///
/// scheduler.drain_all();
/// assert_eq!(doubled.value(), Some(42));
/// ```
pub struct Future<T, E> {
    shared: Rc<Shared<T, E>>,
}

impl<T, E> Clone for Future<T, E> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T, E> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    /// Creates a pending future on the thread's default scheduler.
    pub fn new() -> Self {
        Self::new_in(&Scheduler::current())
    }

    /// Creates a pending future on `scheduler`.
    pub fn new_in(scheduler: &Scheduler) -> Self {
        Self {
            shared: Rc::new(Shared {
                id: scheduler.next_future_id(),
                scheduler: scheduler.clone(),
                state: RefCell::new(FutureState::Pending),
                reactions: RefCell::new(Vec::new()),
                locked: Cell::new(false),
                handled: Cell::new(false),
            }),
        }
    }

    /// A future already fulfilled with `value`.
    pub fn resolved(value: T) -> Self {
        Self::resolved_in(&Scheduler::current(), value)
    }

    /// A future on `scheduler` already fulfilled with `value`.
    pub fn resolved_in(scheduler: &Scheduler, value: T) -> Self {
        let future = Self::new_in(scheduler);
        future.fulfill(value);
        future
    }

    /// A future already rejected with `error`.
    pub fn rejected(error: E) -> Self {
        Self::rejected_in(&Scheduler::current(), error)
    }

    /// A future on `scheduler` already rejected with `error`.
    pub fn rejected_in(scheduler: &Scheduler, error: E) -> Self {
        let future = Self::new_in(scheduler);
        future.reject(error);
        future
    }

    /// Id of this future, unique within its scheduler.
    pub fn id(&self) -> u64 {
        self.shared.id
    }

    /// The scheduler dispatching this future's reactions.
    pub fn scheduler(&self) -> &Scheduler {
        &self.shared.scheduler
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> FutureState<T, E> {
        self.shared.state.borrow().clone()
    }

    /// Returns true while not settled.
    pub fn is_pending(&self) -> bool {
        !self.shared.state.borrow().is_settled()
    }

    /// Returns true if fulfilled.
    pub fn is_fulfilled(&self) -> bool {
        self.shared.state.borrow().is_fulfilled()
    }

    /// Returns true if rejected.
    pub fn is_rejected(&self) -> bool {
        self.shared.state.borrow().is_rejected()
    }

    /// The fulfillment value, if fulfilled.
    pub fn value(&self) -> Option<T> {
        match &*self.shared.state.borrow() {
            FutureState::Fulfilled(value) => Some(value.clone()),
            _ => None,
        }
    }

    /// The rejection error, if rejected.
    pub fn error(&self) -> Option<E> {
        match &*self.shared.state.borrow() {
            FutureState::Rejected(error) => Some(error.clone()),
            _ => None,
        }
    }

    /// Fulfills the future with `value`.
    ///
    /// If the future is already settled, or is adopting another source, this
    /// is a no-op.
    pub fn fulfill(&self, value: T) {
        if self.accepts_settlement() {
            self.settle(Ok(value));
        }
    }

    /// Rejects the future with `error`.
    ///
    /// If the future is already settled, or is adopting another source, this
    /// is a no-op.
    pub fn reject(&self, error: E) {
        if self.accepts_settlement() {
            self.settle(Err(error));
        }
    }

    /// Makes this future mirror `source`'s eventual outcome.
    ///
    /// The subscription happens in a microtask, so a chain of futures adopting
    /// one another advances one hop per microtask instead of recursing.
    pub fn adopt<S>(&self, source: S)
    where
        S: Thenable<T, E> + 'static,
    {
        self.adopt_shared(Rc::new(source));
    }

    /// Settles according to `resolution`.
    pub fn resolve(&self, resolution: Resolution<T, E>) {
        match resolution {
            Resolution::Fulfill(value) => self.fulfill(value),
            Resolution::Reject(error) => self.reject(error),
            Resolution::Adopt(source) => self.adopt_shared(source),
        }
    }

    /// Chains a fulfillment handler; rejections pass through unchanged.
    ///
    /// The handler runs in a microtask even if this future is already
    /// fulfilled. A panicking handler is reported as an exception and the
    /// returned future stays pending, since an arbitrary `E` cannot be built
    /// from a panic. Use [`then_catching`](Self::then_catching) to reject
    /// downstream instead.
    pub fn then<U, F>(&self, on_fulfilled: F) -> Future<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> Resolution<U, E> + 'static,
    {
        self.chain::<U>(Box::new(on_fulfilled), Box::new(Resolution::Reject))
    }

    /// Like [`then`](Self::then), but a panicking handler rejects the
    /// returned future with an `InternalError` carrying the panic message.
    pub fn then_catching<U, F>(&self, on_fulfilled: F) -> Future<U, E>
    where
        U: Clone + 'static,
        E: From<JsError>,
        F: FnOnce(T) -> Resolution<U, E> + 'static,
    {
        self.chain::<U>(
            Box::new(move |value| {
                match panic::catch_unwind(AssertUnwindSafe(move || on_fulfilled(value))) {
                    Ok(resolution) => resolution,
                    Err(panic) => {
                        tracing::debug!("then handler panicked, rejecting downstream");
                        Resolution::Reject(E::from(panic_error(panic)))
                    }
                }
            }),
            Box::new(Resolution::Reject),
        )
    }

    /// Chains optional fulfillment and rejection handlers.
    ///
    /// Exactly one handler runs, chosen by how this future settles. When the
    /// matching handler is absent the outcome passes through: a value is
    /// converted with `Into`, an error is forwarded as is.
    pub fn then_with<U>(
        &self,
        on_fulfilled: Option<Handler<T, U, E>>,
        on_rejected: Option<Handler<E, U, E>>,
    ) -> Future<U, E>
    where
        U: Clone + 'static,
        T: Into<U>,
    {
        let on_fulfilled: Callback<T, U, E> = match on_fulfilled {
            Some(handler) => Box::new(move |value| handler.call(value)),
            None => Box::new(|value: T| Resolution::Fulfill(value.into())),
        };
        let on_rejected: Callback<E, U, E> = match on_rejected {
            Some(handler) => Box::new(move |error| handler.call(error)),
            None => Box::new(Resolution::Reject),
        };
        self.chain(on_fulfilled, on_rejected)
    }

    /// Chains a rejection handler; values pass through unchanged.
    ///
    /// Returning [`Resolution::Fulfill`] recovers the chain, returning
    /// [`Resolution::Reject`] re-throws.
    pub fn catch_error<F>(&self, on_rejected: F) -> Future<T, E>
    where
        F: FnOnce(E) -> Resolution<T, E> + 'static,
    {
        self.chain::<T>(Box::new(Resolution::Fulfill), Box::new(on_rejected))
    }

    /// Runs `on_settled` on either outcome without observing it.
    ///
    /// The original outcome passes through, unless `on_settled` fails, in
    /// which case the returned future rejects with that error.
    pub fn finally<F>(&self, on_settled: F) -> Future<T, E>
    where
        F: FnOnce() -> Result<(), E> + 'static,
    {
        let slot = Rc::new(Cell::new(Some(on_settled)));
        let other = Rc::clone(&slot);
        self.chain::<T>(
            Box::new(move |value| match run_once(&*slot) {
                Ok(()) => Resolution::Fulfill(value),
                Err(error) => Resolution::Reject(error),
            }),
            Box::new(move |error| match run_once(&*other) {
                Ok(()) => Resolution::Reject(error),
                Err(thrown) => Resolution::Reject(thrown),
            }),
        )
    }

    /// Registers a reaction; dispatches it right away (as a microtask) if
    /// this future is already settled.
    pub(crate) fn add_reaction(&self, reaction: Reaction<T, E>) {
        self.shared.handled.set(true);
        let state = self.state();
        match state {
            FutureState::Pending => self.shared.reactions.borrow_mut().push(reaction),
            FutureState::Fulfilled(value) => self.dispatch(reaction, Ok(value)),
            FutureState::Rejected(error) => self.dispatch(reaction, Err(error)),
        }
    }

    fn chain<U>(&self, on_fulfilled: Callback<T, U, E>, on_rejected: Callback<E, U, E>) -> Future<U, E>
    where
        U: Clone + 'static,
    {
        let downstream = Future::new_in(self.scheduler());
        let on_value = downstream.clone();
        let on_error = downstream.clone();
        self.add_reaction(Reaction {
            on_fulfilled: Box::new(move |value| on_value.resolve(on_fulfilled(value))),
            on_rejected: Box::new(move |error| on_error.resolve(on_rejected(error))),
        });
        downstream
    }

    fn accepts_settlement(&self) -> bool {
        if self.shared.locked.get() || !self.is_pending() {
            tracing::trace!(id = self.id(), "settlement ignored");
            return false;
        }
        true
    }

    fn adopt_shared(&self, source: Rc<dyn Thenable<T, E>>) {
        if !self.accepts_settlement() {
            return;
        }
        if source.future_id() == Some(self.id()) {
            self.scheduler().report(UnhandledError::exception(
                TaskOrigin::Future { id: self.id() },
                JsError::type_error("Chaining cycle detected for future"),
            ));
            return;
        }
        self.shared.locked.set(true);
        let on_value = self.clone();
        let on_error = self.clone();
        self.scheduler().schedule_microtask(move || {
            source.subscribe(
                Box::new(move |value| on_value.settle(Ok(value))),
                Box::new(move |error| on_error.settle(Err(error))),
            );
            Ok(())
        });
    }

    fn settle(&self, outcome: Result<T, E>) {
        {
            let mut state = self.shared.state.borrow_mut();
            if state.is_settled() {
                return;
            }
            *state = match &outcome {
                Ok(value) => FutureState::Fulfilled(value.clone()),
                Err(error) => FutureState::Rejected(error.clone()),
            };
        }
        let reactions = std::mem::take(&mut *self.shared.reactions.borrow_mut());
        tracing::trace!(
            id = self.id(),
            state = self.shared.state.borrow().label(),
            reactions = reactions.len(),
            "future settled"
        );

        if outcome.is_err() && !self.shared.handled.get() {
            self.watch_rejection();
        }
        for reaction in reactions {
            self.dispatch(reaction, outcome.clone());
        }
    }

    fn dispatch(&self, reaction: Reaction<T, E>, outcome: Result<T, E>) {
        self.scheduler().schedule_microtask(move || {
            match outcome {
                Ok(value) => (reaction.on_fulfilled)(value),
                Err(error) => (reaction.on_rejected)(error),
            }
            Ok(())
        });
    }

    fn watch_rejection(&self) {
        let shared = Rc::clone(&self.shared);
        self.scheduler().watch_rejection(Box::new(move || {
            if shared.handled.get() {
                return None;
            }
            match &*shared.state.borrow() {
                FutureState::Rejected(error) => {
                    Some(UnhandledError::rejection(shared.id, error.clone()))
                }
                _ => None,
            }
        }));
    }
}

fn run_once<F, E>(slot: &Cell<Option<F>>) -> Result<(), E>
where
    F: FnOnce() -> Result<(), E>,
{
    slot.take().map_or(Ok(()), |f| f())
}

impl<T, E> Thenable<T, E> for Future<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    fn subscribe(&self, on_fulfilled: Box<dyn FnOnce(T)>, on_rejected: Box<dyn FnOnce(E)>) {
        self.add_reaction(Reaction {
            on_fulfilled,
            on_rejected,
        });
    }

    fn future_id(&self) -> Option<u64> {
        Some(self.id())
    }
}

impl<T, E> Default for Future<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> fmt::Debug for Future<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("id", &self.shared.id)
            .field("state", &self.shared.state.borrow().label())
            .field("reactions", &self.shared.reactions.borrow().len())
            .finish()
    }
}
