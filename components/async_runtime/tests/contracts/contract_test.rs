//! Contract tests for async_runtime component
//!
//! These tests pin the public surface other components build on: the
//! scheduler's queue operations, the future's settlement API and the
//! shape of unhandled-error reports.

use async_runtime::{
    Clock, Future, FutureState, Macrotask, ManualClock, Microtask, Resolution, Scheduler,
    TeardownReport, TimerToken,
};
use core_types::{JsError, Value};
use std::rc::Rc;
use std::time::Duration;

mod scheduler_contract {
    use super::*;

    #[test]
    fn scheduler_new_is_idle() {
        let scheduler = Scheduler::new();
        assert!(scheduler.is_idle());
        assert_eq!(scheduler.now(), Duration::ZERO);
    }

    #[test]
    fn enqueue_microtask_accepts_microtask() {
        let scheduler = Scheduler::new();
        scheduler.enqueue_microtask(Microtask::new(|| Ok(())));
        assert_eq!(scheduler.pending_microtasks(), 1);
        assert_eq!(scheduler.run_microtasks(), 1);
    }

    #[test]
    fn enqueue_macrotask_returns_token() {
        let scheduler = Scheduler::new();
        let token: TimerToken =
            scheduler.enqueue_macrotask(Macrotask::new(|| Ok(())), Duration::from_millis(5));
        assert_eq!(token.due(), Duration::from_millis(5));
        assert_eq!(scheduler.next_due(), Some(token.due()));
    }

    #[test]
    fn cancel_reports_whether_task_was_pending() {
        let scheduler = Scheduler::new();
        let token = scheduler.schedule_macrotask(|| Ok(()), Duration::ZERO);
        assert!(scheduler.cancel(token));
        assert!(!scheduler.cancel(token));
    }

    #[test]
    fn drain_all_returns_macrotask_count() {
        let scheduler = Scheduler::new();
        scheduler.schedule_macrotask(|| Ok(()), Duration::ZERO);
        scheduler.schedule_macrotask(|| Ok(()), Duration::from_millis(10));
        scheduler.schedule_microtask(|| Ok(()));
        assert_eq!(scheduler.drain_all(), 2);
        assert!(scheduler.is_idle());
    }

    #[test]
    fn teardown_reports_dropped_items() {
        let scheduler = Scheduler::new();
        scheduler.schedule_microtask(|| Ok(()));
        scheduler.schedule_macrotask(|| Ok(()), Duration::from_secs(1));
        assert_eq!(
            scheduler.teardown(),
            TeardownReport {
                microtasks: 1,
                macrotasks: 1
            }
        );
    }

    #[test]
    fn builder_accepts_shared_clock() {
        let clock = Rc::new(ManualClock::new());
        let scheduler = Scheduler::builder().clock(clock.clone()).build();
        clock.advance(Duration::from_millis(3));
        assert_eq!(scheduler.now(), clock.now());
    }
}

mod future_contract {
    use super::*;

    #[test]
    fn future_new_is_pending() {
        let scheduler = Scheduler::new();
        let future: Future<Value, JsError> = Future::new_in(&scheduler);
        assert_eq!(future.state(), FutureState::Pending);
        assert!(future.is_pending());
    }

    #[test]
    fn future_carries_js_values() {
        let scheduler = Scheduler::new();
        let future = Future::<Value, JsError>::resolved_in(&scheduler, Value::from("ok"));
        let next = future.then(|v| Resolution::Fulfill(Value::from(format!("{}!", v))));
        scheduler.drain_all();
        assert_eq!(next.value(), Some(Value::from("ok!")));
    }

    #[test]
    fn clones_share_state() {
        let scheduler = Scheduler::new();
        let future: Future<i32, ()> = Future::new_in(&scheduler);
        let clone = future.clone();
        clone.fulfill(1);
        assert_eq!(future.id(), clone.id());
        assert_eq!(future.value(), Some(1));
    }

    #[test]
    fn resolution_from_result() {
        let ok: Resolution<i32, ()> = Ok(1).into();
        let err: Resolution<i32, ()> = Err(()).into();
        assert!(matches!(ok, Resolution::Fulfill(1)));
        assert!(matches!(err, Resolution::Reject(())));
    }

    #[test]
    fn scheduler_future_is_bound_to_scheduler() {
        let scheduler = Scheduler::new();
        let future = scheduler.future::<i32, ()>();
        let next = future.then(|v| Resolution::Fulfill(v + 1));
        future.fulfill(1);
        assert_eq!(scheduler.pending_microtasks(), 1);
        scheduler.drain_all();
        assert_eq!(next.value(), Some(2));
    }

    #[test]
    fn future_ids_are_unique_per_scheduler() {
        let scheduler = Scheduler::new();
        let a: Future<i32, ()> = Future::new_in(&scheduler);
        let b: Future<i32, ()> = Future::new_in(&scheduler);
        assert_ne!(a.id(), b.id());
    }
}
