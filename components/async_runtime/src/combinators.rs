//! `all`, `all_settled`, `race` and `any`.
//!
//! Every combinator subscribes to its inputs with ordinary reactions, so its
//! bookkeeping runs in microtasks and every input counts as observed: an
//! input rejecting after the combinator has settled is absorbed, not
//! reported as unhandled.

use crate::future::{Future, Reaction};
use crate::scheduler::Scheduler;
use core_types::JsError;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use thiserror::Error;

/// Outcome record produced by [`Future::all_settled`].
///
/// Serializes as `{"status": "fulfilled", "value": ..}` or
/// `{"status": "rejected", "error": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Settled<T, E> {
    /// The input fulfilled.
    Fulfilled {
        /// Fulfillment value
        value: T,
    },
    /// The input rejected.
    Rejected {
        /// Rejection error
        error: E,
    },
}

/// Rejection of [`Future::any`] when every input rejected.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("All futures were rejected ({} errors)", .errors.len())]
pub struct AggregateError<E> {
    /// Rejection reasons in input order
    pub errors: Vec<E>,
}

impl From<AggregateError<JsError>> for JsError {
    fn from(aggregate: AggregateError<JsError>) -> Self {
        JsError::aggregate("All promises were rejected", aggregate.errors)
    }
}

fn scheduler_for<T, E>(inputs: &[Future<T, E>]) -> Scheduler
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    inputs
        .first()
        .map(|input| input.scheduler().clone())
        .unwrap_or_else(Scheduler::current)
}

impl<T, E> Future<T, E>
where
    T: Clone + 'static,
    E: Clone + fmt::Debug + 'static,
{
    /// Fulfills with every value, in input order, once all inputs fulfill.
    /// Rejects with the first rejection observed.
    ///
    /// An empty input fulfills with an empty vector.
    pub fn all<I>(futures: I) -> Future<Vec<T>, E>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        let inputs: Vec<_> = futures.into_iter().collect();
        let combined = Future::new_in(&scheduler_for(&inputs));
        if inputs.is_empty() {
            combined.fulfill(Vec::new());
            return combined;
        }

        let values: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; inputs.len()]));
        let remaining = Rc::new(Cell::new(inputs.len()));
        for (index, input) in inputs.iter().enumerate() {
            let values = Rc::clone(&values);
            let remaining = Rc::clone(&remaining);
            let on_value = combined.clone();
            let on_error = combined.clone();
            input.add_reaction(Reaction {
                on_fulfilled: Box::new(move |value| {
                    values.borrow_mut()[index] = Some(value);
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let collected = values.borrow_mut().drain(..).flatten().collect();
                        on_value.fulfill(collected);
                    }
                }),
                on_rejected: Box::new(move |error| on_error.reject(error)),
            });
        }
        combined
    }

    /// Fulfills with one [`Settled`] record per input, in input order, once
    /// every input has settled. Never rejects.
    pub fn all_settled<I>(futures: I) -> Future<Vec<Settled<T, E>>, E>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        let inputs: Vec<_> = futures.into_iter().collect();
        let combined = Future::new_in(&scheduler_for(&inputs));
        if inputs.is_empty() {
            combined.fulfill(Vec::new());
            return combined;
        }

        let outcomes: Rc<RefCell<Vec<Option<Settled<T, E>>>>> =
            Rc::new(RefCell::new(vec![None; inputs.len()]));
        let remaining = Rc::new(Cell::new(inputs.len()));
        let record = {
            let combined = combined.clone();
            move |index: usize, outcome: Settled<T, E>| {
                outcomes.borrow_mut()[index] = Some(outcome);
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    let collected = outcomes.borrow_mut().drain(..).flatten().collect();
                    combined.fulfill(collected);
                }
            }
        };
        let record = Rc::new(record);
        for (index, input) in inputs.iter().enumerate() {
            let on_value = Rc::clone(&record);
            let on_error = Rc::clone(&record);
            input.add_reaction(Reaction {
                on_fulfilled: Box::new(move |value| on_value(index, Settled::Fulfilled { value })),
                on_rejected: Box::new(move |error| on_error(index, Settled::Rejected { error })),
            });
        }
        combined
    }

    /// Settles like the first input to settle, either way.
    ///
    /// An empty input never settles.
    pub fn race<I>(futures: I) -> Future<T, E>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        let inputs: Vec<_> = futures.into_iter().collect();
        let combined = Future::new_in(&scheduler_for(&inputs));
        for input in &inputs {
            let on_value = combined.clone();
            let on_error = combined.clone();
            input.add_reaction(Reaction {
                on_fulfilled: Box::new(move |value| on_value.fulfill(value)),
                on_rejected: Box::new(move |error| on_error.reject(error)),
            });
        }
        combined
    }

    /// Fulfills with the first fulfillment observed. Rejects with an
    /// [`AggregateError`] holding every reason, in input order, only when all
    /// inputs reject.
    ///
    /// An empty input rejects with an empty aggregate.
    pub fn any<I>(futures: I) -> Future<T, AggregateError<E>>
    where
        I: IntoIterator<Item = Future<T, E>>,
    {
        let inputs: Vec<_> = futures.into_iter().collect();
        let combined = Future::new_in(&scheduler_for(&inputs));
        if inputs.is_empty() {
            combined.reject(AggregateError { errors: Vec::new() });
            return combined;
        }

        let errors: Rc<RefCell<Vec<Option<E>>>> = Rc::new(RefCell::new(vec![None; inputs.len()]));
        let remaining = Rc::new(Cell::new(inputs.len()));
        for (index, input) in inputs.iter().enumerate() {
            let errors = Rc::clone(&errors);
            let remaining = Rc::clone(&remaining);
            let on_value = combined.clone();
            let on_error = combined.clone();
            input.add_reaction(Reaction {
                on_fulfilled: Box::new(move |value| on_value.fulfill(value)),
                on_rejected: Box::new(move |error| {
                    errors.borrow_mut()[index] = Some(error);
                    remaining.set(remaining.get() - 1);
                    if remaining.get() == 0 {
                        let errors = errors.borrow_mut().drain(..).flatten().collect();
                        on_error.reject(AggregateError { errors });
                    }
                }),
            });
        }
        combined
    }
}
