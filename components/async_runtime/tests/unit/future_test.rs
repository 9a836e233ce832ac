//! Unit tests for Future

use super::Trace;
use async_runtime::{Future, FutureState, Handler, Resolution, Scheduler, Thenable};
use core_types::{ErrorKind, JsError};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

fn setup() -> Scheduler {
    Scheduler::builder().error_sink(|_| {}).build()
}

#[test]
fn fulfill_then_reject_keeps_first_value() {
    let scheduler = setup();
    let future: Future<i32, &str> = Future::new_in(&scheduler);
    future.fulfill(1);
    future.fulfill(2);
    future.reject("e");
    assert_eq!(future.state(), FutureState::Fulfilled(1));
}

#[test]
fn reject_then_fulfill_keeps_error() {
    let scheduler = setup();
    let future: Future<i32, &str> = Future::new_in(&scheduler);
    future.reject("first");
    future.fulfill(1);
    future.reject("second");
    assert_eq!(future.error(), Some("first"));
}

#[test]
fn then_on_settled_future_runs_after_sync_code() {
    let scheduler = setup();
    let trace = Trace::new();
    let future: Future<i32, ()> = Future::new_in(&scheduler);
    future.fulfill(1);

    let t = trace.clone();
    future.then(move |v| {
        t.log(format!("cb {}", v));
        Resolution::Fulfill(())
    });
    trace.log("after");

    assert_eq!(trace.lines(), vec!["after"]);
    scheduler.drain_all();
    assert_eq!(trace.lines(), vec!["after", "cb 1"]);
}

#[test]
fn settling_does_not_run_reactions_synchronously() {
    let scheduler = setup();
    let trace = Trace::new();
    let future: Future<i32, ()> = Future::new_in(&scheduler);
    let t = trace.clone();
    future.then(move |_| {
        t.log("reaction");
        Resolution::Fulfill(())
    });

    future.fulfill(5);
    trace.log("after fulfill");
    assert_eq!(scheduler.pending_microtasks(), 1);

    scheduler.drain_all();
    assert_eq!(trace.lines(), vec!["after fulfill", "reaction"]);
}

#[test]
fn reactions_run_in_registration_order() {
    let scheduler = setup();
    let trace = Trace::new();
    let future: Future<&str, ()> = Future::new_in(&scheduler);
    for name in ["first", "second", "third"] {
        let t = trace.clone();
        future.then(move |v| {
            t.log(format!("{} {}", name, v));
            Resolution::Fulfill(())
        });
    }
    future.fulfill("x");
    scheduler.drain_all();
    assert_eq!(trace.lines(), vec!["first x", "second x", "third x"]);
}

#[test]
fn reaction_fires_once() {
    let scheduler = setup();
    let calls = Rc::new(Cell::new(0));
    let future: Future<i32, ()> = Future::new_in(&scheduler);
    let c = calls.clone();
    future.then(move |_| {
        c.set(c.get() + 1);
        Resolution::Fulfill(())
    });
    future.fulfill(1);
    future.fulfill(2);
    scheduler.drain_all();
    scheduler.drain_all();
    assert_eq!(calls.get(), 1);
}

#[test]
fn chaining_transforms_values() {
    let scheduler = setup();
    let result = Future::<i32, JsError>::resolved_in(&scheduler, 1)
        .then(|v| Resolution::Fulfill(v + 1))
        .then(|v| Resolution::Fulfill(v * 2));
    scheduler.drain_all();
    assert_eq!(result.value(), Some(4));
}

#[test]
fn handler_rejection_skips_to_catch() {
    let scheduler = setup();
    let trace = Trace::new();
    let t = trace.clone();
    let caught = Future::<&str, JsError>::resolved_in(&scheduler, "start")
        .then(|_| Resolution::<i32, _>::Reject(JsError::error("Something went wrong")))
        .then(move |_| {
            t.log("skipped");
            Resolution::Fulfill(0)
        })
        .catch_error(|e| Resolution::Fulfill(e.message.len() as i32));
    scheduler.drain_all();
    assert!(trace.lines().is_empty());
    assert_eq!(caught.value(), Some("Something went wrong".len() as i32));
}

#[test]
fn catch_can_recover_or_rethrow() {
    let scheduler = setup();
    let failed = Future::<String, JsError>::rejected_in(&scheduler, JsError::error("Failed"));
    let recovered = failed.catch_error(|_| Resolution::Fulfill("default value".to_string()));
    let rethrown = failed.catch_error(|e| {
        if e.message.contains("Critical") {
            Resolution::Fulfill("recovered".to_string())
        } else {
            Resolution::Reject(JsError::type_error(format!("rethrown: {}", e.message)))
        }
    });
    scheduler.drain_all();
    assert_eq!(recovered.value(), Some("default value".to_string()));
    assert_eq!(rethrown.error().map(|e| e.kind), Some(ErrorKind::TypeError));
}

#[test]
fn then_with_absent_handlers_passes_through() {
    let scheduler = setup();
    let ok: Future<i32, String> = Future::resolved_in(&scheduler, 7);
    let err: Future<i32, String> = Future::rejected_in(&scheduler, "bad".to_string());

    let forwarded_value = ok.then_with::<i64>(None, None);
    let forwarded_error = err.then_with::<i32>(None, None);
    let handled = err.then_with(
        Some(Handler::new(|v: i32| Resolution::Fulfill(i64::from(v)))),
        Some(Handler::new(|e: String| Resolution::Fulfill(e.len() as i64))),
    );
    forwarded_error.catch_error(|_| Resolution::Fulfill(0));
    scheduler.drain_all();

    assert_eq!(forwarded_value.value(), Some(7i64));
    assert_eq!(forwarded_error.error(), Some("bad".to_string()));
    assert_eq!(handled.value(), Some(3i64));
}

#[test]
fn only_one_handler_runs() {
    let scheduler = setup();
    let trace = Trace::new();
    let (t1, t2) = (trace.clone(), trace.clone());
    Future::<(), String>::rejected_in(&scheduler, "x".into()).then_with(
        Some(Handler::new(move |_: ()| {
            t1.log("fulfilled");
            Resolution::Fulfill(())
        })),
        Some(Handler::new(move |_: String| {
            t2.log("rejected");
            Resolution::Fulfill(())
        })),
    );
    scheduler.drain_all();
    assert_eq!(trace.lines(), vec!["rejected"]);
}

#[test]
fn finally_runs_without_changing_outcome() {
    let scheduler = setup();
    let trace = Trace::new();
    let (t1, t2) = (trace.clone(), trace.clone());
    let ok = Future::<i32, String>::resolved_in(&scheduler, 3).finally(move || {
        t1.log("finally ok");
        Ok(())
    });
    let err = Future::<i32, String>::rejected_in(&scheduler, "e".into()).finally(move || {
        t2.log("finally err");
        Ok(())
    });
    err.catch_error(|_| Resolution::Fulfill(0));
    scheduler.drain_all();

    assert_eq!(ok.value(), Some(3));
    assert_eq!(err.error(), Some("e".to_string()));
    assert_eq!(trace.lines(), vec!["finally ok", "finally err"]);
}

#[test]
fn failing_finally_replaces_outcome() {
    let scheduler = setup();
    let from_ok = Future::<i32, String>::resolved_in(&scheduler, 3).finally(|| Err("cleanup".into()));
    let from_err = Future::<i32, String>::rejected_in(&scheduler, "orig".into())
        .finally(|| Err("cleanup".into()));
    scheduler.drain_all();
    assert_eq!(from_ok.error(), Some("cleanup".to_string()));
    assert_eq!(from_err.error(), Some("cleanup".to_string()));
}

#[test]
fn handler_returning_future_is_adopted() {
    let scheduler = setup();
    let inner: Future<i32, ()> = Future::new_in(&scheduler);
    let i = inner.clone();
    let outer = Future::<(), ()>::resolved_in(&scheduler, ()).then(move |_| Resolution::from(i));
    scheduler.drain_all();
    assert!(outer.is_pending());

    inner.fulfill(10);
    scheduler.drain_all();
    assert_eq!(outer.value(), Some(10));
}

#[test]
fn adoption_waits_for_delayed_inner_future() {
    let scheduler = setup();
    let inner: Future<&str, ()> = Future::new_in(&scheduler);
    let i = inner.clone();
    scheduler.schedule_macrotask(
        move || {
            i.fulfill("X");
            Ok(())
        },
        Duration::from_millis(1000),
    );

    let outer: Future<&str, ()> = Future::new_in(&scheduler);
    outer.adopt(inner);
    assert!(outer.is_pending());

    scheduler.drain_all();
    assert_eq!(outer.value(), Some("X"));
}

#[test]
fn adoption_mirrors_rejection() {
    let scheduler = setup();
    let outer: Future<i32, &str> = Future::new_in(&scheduler);
    outer.resolve(Resolution::from(Future::<i32, &str>::rejected_in(
        &scheduler,
        "inner failed",
    )));
    scheduler.drain_all();
    assert_eq!(outer.error(), Some("inner failed"));
}

#[test]
fn adoption_chain_of_many_hops_settles() {
    let scheduler = setup();
    let source: Future<u32, ()> = Future::new_in(&scheduler);
    let mut last = source.clone();
    for _ in 0..500 {
        let next: Future<u32, ()> = Future::new_in(&scheduler);
        next.adopt(last);
        last = next;
    }
    source.fulfill(42);
    scheduler.drain_all();
    assert_eq!(last.value(), Some(42));
}

#[test]
fn self_adoption_is_refused() {
    let reports = Rc::new(Cell::new(0));
    let r = reports.clone();
    let scheduler = Scheduler::builder()
        .error_sink(move |_| r.set(r.get() + 1))
        .build();
    let future: Future<i32, ()> = Future::new_in(&scheduler);
    future.adopt(future.clone());
    future.fulfill(1);
    scheduler.drain_all();
    assert_eq!(reports.get(), 1);
    assert_eq!(future.value(), Some(1));
}

struct Immediate(i32);

impl Thenable<i32, String> for Immediate {
    fn subscribe(&self, on_fulfilled: Box<dyn FnOnce(i32)>, _on_rejected: Box<dyn FnOnce(String)>) {
        on_fulfilled(self.0);
    }
}

#[test]
fn custom_thenable_is_adopted_asynchronously() {
    let scheduler = setup();
    let future: Future<i32, String> = Future::new_in(&scheduler);
    future.adopt(Immediate(9));
    assert!(future.is_pending());
    scheduler.run_microtasks();
    assert_eq!(future.value(), Some(9));
}

#[test]
fn thousand_sequential_thens_terminate() {
    let scheduler = setup();
    let mut future = Future::<u32, ()>::resolved_in(&scheduler, 0);
    for _ in 0..1000 {
        future = future.then(|v| Resolution::Fulfill(v + 1));
    }
    scheduler.drain_all();
    assert_eq!(future.value(), Some(1000));
    assert!(scheduler.is_idle());
}

#[test]
fn default_scheduler_is_used_by_new() {
    let future: Future<i32, ()> = Future::new();
    let doubled = future.then(|v| Resolution::Fulfill(v * 2));
    future.fulfill(4);
    Scheduler::current().drain_all();
    assert_eq!(doubled.value(), Some(8));
}
