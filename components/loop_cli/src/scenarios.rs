//! Built-in event loop scenarios
//!
//! Each scenario is a small program written against the scheduler and
//! [`Future`] API. Synchronous steps run inside [`Scenario::play`]; anything
//! scheduled there runs when the runner drains the loop afterwards.

use crate::error::{CliError, CliResult};
use async_runtime::{Future, Resolution, Scheduler};
use core_types::{JsError, Value};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

type JsFuture = Future<Value, JsError>;

/// One logged line, stamped with the scheduler's clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceLine {
    /// Scheduler time when the line was logged, in milliseconds
    pub at_ms: u64,
    /// Logged text
    pub text: String,
}

/// Output sink handed to scenarios, the `console.log` of this runtime.
#[derive(Clone)]
pub struct Console {
    scheduler: Scheduler,
    lines: Rc<RefCell<Vec<TraceLine>>>,
}

impl Console {
    /// Creates an empty console stamping lines with `scheduler`'s clock.
    pub fn new(scheduler: &Scheduler) -> Self {
        Self {
            scheduler: scheduler.clone(),
            lines: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// The scheduler scenarios queue their work on.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Appends a line.
    pub fn log(&self, text: impl Into<String>) {
        let line = TraceLine {
            at_ms: self.scheduler.now().as_millis() as u64,
            text: text.into(),
        };
        tracing::debug!(at_ms = line.at_ms, text = %line.text, "console");
        self.lines.borrow_mut().push(line);
    }

    /// Lines logged so far.
    pub fn lines(&self) -> Vec<TraceLine> {
        self.lines.borrow().clone()
    }

    /// Logged text only, without timestamps.
    pub fn texts(&self) -> Vec<String> {
        self.lines.borrow().iter().map(|line| line.text.clone()).collect()
    }
}

/// A named, runnable scenario.
pub struct Scenario {
    /// Name used with `--scenario`
    pub name: &'static str,
    /// One-line description shown by `--list`
    pub summary: &'static str,
    body: fn(&Console) -> CliResult<()>,
}

impl Scenario {
    /// Looks up a built-in scenario by name.
    pub fn find(name: &str) -> CliResult<&'static Scenario> {
        SCENARIOS
            .iter()
            .find(|scenario| scenario.name == name)
            .ok_or_else(|| CliError::UnknownScenario(name.to_string()))
    }

    /// Runs the synchronous part of the scenario.
    pub fn play(&self, console: &Console) -> CliResult<()> {
        (self.body)(console)
    }
}

impl fmt::Debug for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("summary", &self.summary)
            .finish()
    }
}

/// Every scenario the CLI knows about, in `--list` order.
pub static SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "sync-vs-timeout",
        summary: "a timer callback runs after the remaining synchronous code",
        body: sync_vs_timeout,
    },
    Scenario {
        name: "microtask-priority",
        summary: "a future reaction runs before a zero-delay timer",
        body: microtask_priority,
    },
    Scenario {
        name: "interview",
        summary: "start, end, promise 1, promise 2, timeout",
        body: interview,
    },
    Scenario {
        name: "chaining",
        summary: "each then transforms the value: 1, 2, 4",
        body: chaining,
    },
    Scenario {
        name: "error-propagation",
        summary: "rejections skip fulfillment handlers until a catch",
        body: error_propagation,
    },
    Scenario {
        name: "recovery",
        summary: "catch recovers with a default value or re-throws",
        body: recovery,
    },
    Scenario {
        name: "finally",
        summary: "finally clears a loading flag and lets the value through",
        body: finally,
    },
    Scenario {
        name: "adoption",
        summary: "an outer future adopts an inner one settled by a timer",
        body: adoption,
    },
    Scenario {
        name: "combinators",
        summary: "all, allSettled, race and any",
        body: combinators,
    },
    Scenario {
        name: "first-wins",
        summary: "only the first settlement of a future counts",
        body: first_wins,
    },
    Scenario {
        name: "callback-hell",
        summary: "user, orders and order details fetched in sequence",
        body: callback_hell,
    },
    Scenario {
        name: "sequential-vs-parallel",
        summary: "awaiting one fetch after another takes twice as long as all",
        body: sequential_vs_parallel,
    },
    Scenario {
        name: "timeout-cancel",
        summary: "a request raced against a timer that is cleared once it settles",
        body: timeout_cancel,
    },
    Scenario {
        name: "retry-backoff",
        summary: "failed attempts are retried after 1s, 2s, 4s ...",
        body: retry_backoff,
    },
    Scenario {
        name: "unhandled",
        summary: "an unobserved rejection and a failing timer reach the error sink",
        body: unhandled,
    },
];

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn done<E>() -> Resolution<Value, E> {
    Resolution::Fulfill(Value::Undefined)
}

/// A future settled with `outcome` by a timer after `delay_ms`.
fn timeout(console: &Console, delay_ms: u64, outcome: Result<Value, JsError>) -> JsFuture {
    let future = JsFuture::new_in(console.scheduler());
    let settle = future.clone();
    console.scheduler().schedule_macrotask(
        move || {
            settle.resolve(outcome.into());
            Ok(())
        },
        ms(delay_ms),
    );
    future
}

fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn sync_vs_timeout(console: &Console) -> CliResult<()> {
    console.log("first");
    let c = console.clone();
    console.scheduler().schedule_macrotask(
        move || {
            c.log("second");
            Ok(())
        },
        ms(100),
    );
    console.log("third");
    Ok(())
}

fn microtask_priority(console: &Console) -> CliResult<()> {
    console.log("1 - Sync");
    let c = console.clone();
    console.scheduler().schedule_macrotask(
        move || {
            c.log("4 - setTimeout");
            Ok(())
        },
        Duration::ZERO,
    );
    let c = console.clone();
    JsFuture::resolved_in(console.scheduler(), Value::Undefined).then(move |_| {
        c.log("3 - Promise");
        done()
    });
    console.log("2 - Sync");
    Ok(())
}

fn interview(console: &Console) -> CliResult<()> {
    console.log("start");
    let c = console.clone();
    console.scheduler().schedule_macrotask(
        move || {
            c.log("timeout");
            Ok(())
        },
        Duration::ZERO,
    );
    let (first, second) = (console.clone(), console.clone());
    JsFuture::resolved_in(console.scheduler(), Value::Undefined)
        .then(move |_| {
            first.log("promise 1");
            done()
        })
        .then(move |_| {
            second.log("promise 2");
            done()
        });
    console.log("end");
    Ok(())
}

fn chaining(console: &Console) -> CliResult<()> {
    let step = |console: &Console, f: fn(f64) -> f64| {
        let c = console.clone();
        move |value: Value| {
            c.log(format!("value: {}", value));
            let n = value.as_number().unwrap_or(f64::NAN);
            Resolution::<Value, JsError>::Fulfill(Value::number(f(n)))
        }
    };
    JsFuture::resolved_in(console.scheduler(), Value::from(1))
        .then(step(console, |n| n + 1.0))
        .then(step(console, |n| n * 2.0))
        .then(step(console, |n| n));
    Ok(())
}

fn error_propagation(console: &Console) -> CliResult<()> {
    let (skipped, also_skipped, caught) = (console.clone(), console.clone(), console.clone());
    JsFuture::rejected_in(console.scheduler(), JsError::error("Initial error"))
        .then(move |_| {
            skipped.log("This will be skipped");
            done()
        })
        .then(move |_| {
            also_skipped.log("This will also be skipped");
            done()
        })
        .catch_error(move |error| {
            caught.log(format!("Caught error: {}", error.message));
            done()
        });

    let caught = console.clone();
    JsFuture::resolved_in(console.scheduler(), Value::from("start"))
        .then(|_| Resolution::Reject(JsError::error("Something went wrong")))
        .then(|_: Value| Resolution::Reject(JsError::error("Something went wrong with the result")))
        .catch_error(move |error| {
            caught.log(format!("Caught error: {}", error.message));
            done()
        });
    Ok(())
}

fn recovery(console: &Console) -> CliResult<()> {
    let c = console.clone();
    JsFuture::rejected_in(console.scheduler(), JsError::error("Failed"))
        .catch_error(|_| Resolution::Fulfill(Value::from("default value")))
        .then(move |value| {
            c.log(value.to_string());
            done()
        });

    let c = console.clone();
    JsFuture::rejected_in(console.scheduler(), JsError::error("Critical: disk full"))
        .catch_error(|error| {
            if error.message.contains("Critical") {
                Resolution::Reject(error)
            } else {
                Resolution::Fulfill(Value::from("recovered"))
            }
        })
        .catch_error(move |error| {
            c.log(format!("Re-thrown: {}", error.message));
            done()
        });
    Ok(())
}

fn finally(console: &Console) -> CliResult<()> {
    let loading = Rc::new(Cell::new(true));
    if loading.get() {
        console.log("is loading...");
    }

    let (fetched, failed, cleanup, after) = (
        console.clone(),
        console.clone(),
        console.clone(),
        console.clone(),
    );
    let (flag, observed) = (Rc::clone(&loading), Rc::clone(&loading));
    timeout(console, 500, Ok(Value::from("payload")))
        .then(move |value| {
            fetched.log("data fetched");
            Resolution::Fulfill(value)
        })
        .catch_error(move |error| {
            failed.log("error fetching data");
            Resolution::Reject(error)
        })
        .finally(move || {
            flag.set(false);
            cleanup.log("loading complete");
            Ok(())
        })
        .then(move |value| {
            after.log(format!("value: {}, loading: {}", value, observed.get()));
            done()
        });
    Ok(())
}

fn adoption(console: &Console) -> CliResult<()> {
    let inner = timeout(console, 1000, Ok(Value::from("inner")));
    let outer = JsFuture::new_in(console.scheduler());
    outer.adopt(inner);

    let c = console.clone();
    outer.then(move |value| {
        c.log(value.to_string());
        done()
    });
    console.log(format!("outer is {}", outer.state().label()));
    Ok(())
}

fn combinators(console: &Console) -> CliResult<()> {
    let scheduler = console.scheduler();
    let numbers = || -> Vec<JsFuture> {
        (1..=3i32)
            .map(|n| JsFuture::resolved_in(scheduler, Value::from(n)))
            .collect()
    };

    let c = console.clone();
    Future::all(numbers()).then(move |values| {
        c.log(format!("all: [{}]", join(&values)));
        done()
    });

    let c = console.clone();
    Future::all_settled(vec![
        JsFuture::resolved_in(scheduler, Value::from(1)),
        JsFuture::rejected_in(scheduler, JsError::error("boom")),
        timeout(console, 10, Ok(Value::from(3))),
    ])
    .then(move |records| match serde_json::to_string(&records) {
        Ok(json) => {
            c.log(format!("allSettled: {}", json));
            done()
        }
        Err(error) => Resolution::Reject(JsError::internal(error.to_string())),
    });

    let c = console.clone();
    Future::race(vec![
        timeout(console, 100, Ok(Value::from("slow"))),
        timeout(console, 50, Ok(Value::from("fast"))),
    ])
    .then(move |value| {
        c.log(format!("race: {}", value));
        done()
    });

    let c = console.clone();
    Future::any(vec![
        JsFuture::rejected_in(scheduler, JsError::error("offline")),
        timeout(console, 30, Ok(Value::from(3))),
        timeout(console, 20, Ok(Value::from(2))),
    ])
    .then(move |value| {
        c.log(format!("any: {}", value));
        done()
    });

    let c = console.clone();
    Future::any(vec![
        JsFuture::rejected_in(scheduler, JsError::error("first")),
        timeout(console, 5, Err(JsError::error("second"))),
    ])
    .catch_error(move |aggregate| {
        let reasons: Vec<_> = aggregate.errors.iter().map(|e| e.message.as_str()).collect();
        c.log(format!("any rejected: {} [{}]", aggregate, reasons.join(", ")));
        done()
    });
    Ok(())
}

fn first_wins(console: &Console) -> CliResult<()> {
    let future = JsFuture::new_in(console.scheduler());
    future.fulfill(Value::from("first"));
    future.fulfill(Value::from("second"));
    future.reject(JsError::error("error"));

    let c = console.clone();
    future.then(move |value| {
        c.log(value.to_string());
        done()
    });
    Ok(())
}

fn get_user(console: &Console, id: i32) -> JsFuture {
    timeout(
        console,
        1000,
        Ok(Value::from(format!("{{ id: {}, name: 'John' }}", id))),
    )
}

fn get_orders(console: &Console) -> JsFuture {
    timeout(
        console,
        1000,
        Ok(Value::from(
            "[{ orderId: 1, item: 'Book' }, { orderId: 2, item: 'Pen' }]",
        )),
    )
}

fn get_order_details(console: &Console, order_id: i32) -> JsFuture {
    timeout(
        console,
        1000,
        Ok(Value::from(format!(
            "{{ orderId: {}, totalPrice: 20, status: 'Shipped' }}",
            order_id
        ))),
    )
}

fn callback_hell(console: &Console) -> CliResult<()> {
    let (user_log, orders_log, details_log, error_log) = (
        console.clone(),
        console.clone(),
        console.clone(),
        console.clone(),
    );
    let (orders_source, details_source) = (console.clone(), console.clone());
    get_user(console, 1)
        .then(move |user| {
            user_log.log(format!("User: {}", user));
            Resolution::from(get_orders(&orders_source))
        })
        .then(move |orders| {
            orders_log.log(format!("Orders: {}", orders));
            Resolution::from(get_order_details(&details_source, 1))
        })
        .then(move |details| {
            details_log.log(format!("Order Details: {}", details));
            done()
        })
        .catch_error(move |error| {
            error_log.log(format!("Error: {}", error.message));
            done()
        });
    Ok(())
}

fn sequential_vs_parallel(console: &Console) -> CliResult<()> {
    let start = console.scheduler().now();
    let elapsed = move |console: &Console| {
        console.scheduler().now().saturating_sub(start).as_millis()
    };

    let (user_log, orders_log, orders_source) = (console.clone(), console.clone(), console.clone());
    get_user(console, 1)
        .then(move |_| {
            user_log.log("sequential: got user");
            Resolution::from(get_orders(&orders_source))
        })
        .then(move |_| {
            orders_log.log(format!("sequential: got orders in {}ms", elapsed(&orders_log)));
            done()
        });

    let c = console.clone();
    Future::all(vec![get_user(console, 1), get_orders(console)]).then(move |results| {
        c.log(format!("parallel: {} results in {}ms", results.len(), elapsed(&c)));
        done()
    });
    Ok(())
}

/// Sends a request that answers after `work_ms`, aborted if it takes longer
/// than `limit_ms`.
fn request_with_timeout(console: &Console, name: &'static str, work_ms: u64, limit_ms: u64) {
    let scheduler = console.scheduler().clone();
    console.log(format!("{}: request sent", name));

    let response = JsFuture::new_in(&scheduler);
    let settle = response.clone();
    let work = scheduler.schedule_macrotask(
        move || {
            settle.fulfill(Value::from(format!("{} response", name)));
            Ok(())
        },
        ms(work_ms),
    );

    let aborted = JsFuture::new_in(&scheduler);
    let (abort, s, c) = (aborted.clone(), scheduler.clone(), console.clone());
    let timer = scheduler.schedule_macrotask(
        move || {
            let cancelled = s.cancel(work);
            c.log(format!("{}: aborting, request cancelled: {}", name, cancelled));
            abort.reject(JsError::error("Request timed out"));
            Ok(())
        },
        ms(limit_ms),
    );

    let (s, ok_log) = (scheduler.clone(), console.clone());
    let (err_log, err_scheduler) = (console.clone(), scheduler);
    Future::race(vec![response, aborted])
        .then(move |value| {
            let cleared = s.cancel(timer);
            ok_log.log(format!("{}: {} (timeout cleared: {})", name, value, cleared));
            done()
        })
        .catch_error(move |error| {
            let cleared = err_scheduler.cancel(timer);
            err_log.log(format!("{}: {} (timeout cleared: {})", name, error.message, cleared));
            done()
        });
}

fn timeout_cancel(console: &Console) -> CliResult<()> {
    request_with_timeout(console, "fast", 200, 500);
    request_with_timeout(console, "slow", 800, 500);
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct Flaky {
    name: &'static str,
    failures: u32,
    max_attempts: u32,
}

/// Runs attempt `attempt_no` (zero-based). On failure, waits
/// `1000 * 2^attempt_no` milliseconds before the next one.
fn attempt(console: &Console, flaky: Flaky, attempt_no: u32) -> JsFuture {
    let outcome = if attempt_no < flaky.failures {
        Err(JsError::error("network down"))
    } else {
        Ok(Value::from(format!("connected on attempt {}", attempt_no + 1)))
    };
    let c = console.clone();
    timeout(console, 100, outcome).catch_error(move |error| {
        if attempt_no + 1 >= flaky.max_attempts {
            return Resolution::Reject(error);
        }
        let backoff = 1000 * 2u64.pow(attempt_no);
        c.log(format!(
            "{}: attempt {} failed ({}), retrying in {}ms",
            flaky.name,
            attempt_no + 1,
            error.message,
            backoff
        ));
        let next = c.clone();
        let retry = timeout(&c, backoff, Ok(Value::Undefined))
            .then(move |_| Resolution::from(attempt(&next, flaky, attempt_no + 1)));
        Resolution::from(retry)
    })
}

fn retry_backoff(console: &Console) -> CliResult<()> {
    for flaky in [
        Flaky {
            name: "flaky",
            failures: 2,
            max_attempts: 4,
        },
        Flaky {
            name: "down",
            failures: u32::MAX,
            max_attempts: 3,
        },
    ] {
        let (ok_log, err_log) = (console.clone(), console.clone());
        attempt(console, flaky, 0)
            .then(move |value| {
                ok_log.log(format!("{}: {}", flaky.name, value));
                done()
            })
            .catch_error(move |error| {
                err_log.log(format!(
                    "{}: gave up after {} attempts ({})",
                    flaky.name, flaky.max_attempts, error.message
                ));
                done()
            });
    }
    Ok(())
}

fn unhandled(console: &Console) -> CliResult<()> {
    console.log("rejecting without a handler");
    JsFuture::rejected_in(console.scheduler(), JsError::type_error("nobody caught this"));

    let c = console.clone();
    console.scheduler().schedule_macrotask(
        move || {
            c.log("timer still runs");
            Err(JsError::error("timer callback threw"))
        },
        ms(10),
    );
    Ok(())
}
