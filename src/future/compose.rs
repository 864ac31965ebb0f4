//! Set combinators: `all`, `any`, and `first`.
//!
//! Each combinator registers itself as a dependent of every child and keeps
//! strong references to all of them until every child has settled, so a
//! child that loses a race still runs its own settlement dispatch.

use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::future::Future;
use crate::scheduler::Scheduler;
use crate::value::Value;

struct GatherState {
    children: Vec<Future>,
    values: Vec<Option<Value>>,
    first_error: Option<Error>,
    last_error: Option<Error>,
    remaining: usize,
}

impl Future {
    /// Resolves with the ordered list of every child's value once all
    /// children settle.
    ///
    /// If any child rejects, `all` still waits for the remaining children
    /// and then rejects with the first error observed in completion order.
    /// An empty input resolves immediately with an empty list.
    pub fn all(children: impl IntoIterator<Item = Future>) -> Future {
        let children: Vec<Future> = children.into_iter().collect();
        let destination = Future::pending();
        if children.is_empty() {
            destination.settle(Ok(Value::list([])));
            return destination;
        }
        let scheduler = Scheduler::current_or_default();
        let count = children.len();
        let handles = children.clone();
        let state = Arc::new(Mutex::new(GatherState {
            children,
            values: vec![None; count],
            first_error: None,
            last_error: None,
            remaining: count,
        }));
        for (index, child) in handles.into_iter().enumerate() {
            let state = state.clone();
            let destination = destination.clone();
            child.then_register(&scheduler, move |settled| {
                let mut gather = state.lock().unwrap();
                match settled.outcome_snapshot() {
                    Ok(value) => gather.values[index] = Some(value),
                    Err(error) => {
                        if gather.first_error.is_none() {
                            gather.first_error = Some(error);
                        }
                    }
                }
                gather.remaining -= 1;
                if gather.remaining == 0 {
                    gather.children.clear();
                    let outcome = match gather.first_error.take() {
                        Some(error) => Err(error),
                        None => {
                            let values: Vec<Value> = gather
                                .values
                                .iter_mut()
                                .map(|slot| slot.take().unwrap_or(Value::Bool(false)))
                                .collect();
                            Ok(Value::list(values))
                        }
                    };
                    drop(gather);
                    destination.settle(outcome);
                }
            });
        }
        destination
    }

    /// Resolves with the first child to resolve; rejects only when every
    /// child has rejected, reporting the last error observed.
    ///
    /// An empty input rejects immediately.
    pub fn any(children: impl IntoIterator<Item = Future>) -> Future {
        let children: Vec<Future> = children.into_iter().collect();
        let destination = Future::pending();
        if children.is_empty() {
            destination.settle(Err(Error::dependency_failed("no futures supplied")));
            return destination;
        }
        let scheduler = Scheduler::current_or_default();
        let count = children.len();
        let handles = children.clone();
        let state = Arc::new(Mutex::new(GatherState {
            children,
            values: Vec::new(),
            first_error: None,
            last_error: None,
            remaining: count,
        }));
        for child in handles {
            let state = state.clone();
            let destination = destination.clone();
            child.then_register(&scheduler, move |settled| {
                let outcome = settled.outcome_snapshot();
                let mut gather = state.lock().unwrap();
                gather.remaining -= 1;
                let finished = gather.remaining == 0;
                if finished {
                    gather.children.clear();
                }
                match outcome {
                    Ok(value) => {
                        drop(gather);
                        destination.settle(Ok(value));
                    }
                    Err(error) => {
                        gather.last_error = Some(error);
                        if finished {
                            let error = gather
                                .last_error
                                .take()
                                .unwrap_or_else(|| Error::dependency_failed("no resolved children"));
                            drop(gather);
                            destination.settle(Err(error));
                        }
                    }
                }
            });
        }
        destination
    }

    /// Settles with the first child to settle, either outcome.
    ///
    /// The remaining children are disowned but referenced until they settle
    /// too. An empty input rejects immediately.
    pub fn first(children: impl IntoIterator<Item = Future>) -> Future {
        let children: Vec<Future> = children.into_iter().collect();
        let destination = Future::pending();
        if children.is_empty() {
            destination.settle(Err(Error::dependency_failed("no futures supplied")));
            return destination;
        }
        let scheduler = Scheduler::current_or_default();
        let count = children.len();
        let handles = children.clone();
        let state = Arc::new(Mutex::new(GatherState {
            children,
            values: Vec::new(),
            first_error: None,
            last_error: None,
            remaining: count,
        }));
        for child in handles {
            let state = state.clone();
            let destination = destination.clone();
            child.then_register(&scheduler, move |settled| {
                destination.settle_from(settled);
                let mut gather = state.lock().unwrap();
                gather.remaining -= 1;
                if gather.remaining == 0 {
                    gather.children.clear();
                }
            });
        }
        destination
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::Promise;
    use crate::thread;
    use pretty_assertions::assert_eq;

    #[test]
    fn all_collects_values_in_input_order() {
        let all = Future::all([
            Future::new_for_int(1),
            Future::new_for_int(2),
            Future::new_for_int(3),
        ]);
        let value = thread::wait_for(&all).unwrap();
        let items = value.as_list().unwrap().to_vec();
        let ints: Vec<i32> = items.iter().map(|v| v.as_int().unwrap()).collect();
        assert_eq!(ints, vec![1, 2, 3]);
    }

    #[test]
    fn all_of_nothing_resolves() {
        let all = Future::all([]);
        assert!(all.is_resolved());
        assert_eq!(all.value().unwrap().as_list().unwrap().len(), 0);
    }

    #[test]
    fn all_waits_for_every_child_before_rejecting() {
        let promise = Promise::new();
        let all = Future::all([
            Future::new_for_int(1),
            Future::rejected(Error::Cancelled),
            promise.future(),
        ]);
        std::thread::sleep(std::time::Duration::from_millis(20));
        // The rejected child has been observed, but the set must not settle
        // until the last child does.
        assert!(all.is_pending());
        promise.resolve_int(3);
        let error = thread::wait_for(&all).unwrap_err();
        assert_eq!(error, Error::Cancelled);
    }

    #[test]
    fn all_reports_first_error_by_completion_order() {
        let slow = Promise::new();
        let fast = Promise::new();
        // Input order: slow first. Completion order: fast first.
        let all = Future::all([slow.future(), fast.future()]);
        fast.reject(Error::TimedOut);
        std::thread::sleep(std::time::Duration::from_millis(20));
        slow.reject(Error::Cancelled);
        let error = thread::wait_for(&all).unwrap_err();
        assert_eq!(error, Error::TimedOut);
    }

    #[test]
    fn any_resolves_with_first_success() {
        let any = Future::any([
            Future::rejected(Error::Cancelled),
            Future::new_for_int(5),
            Future::rejected(Error::TimedOut),
        ]);
        let value = thread::wait_for(&any).unwrap();
        assert_eq!(value.as_int(), Some(5));
    }

    #[test]
    fn any_rejects_with_last_error_when_all_fail() {
        let any = Future::any([
            Future::rejected(Error::Cancelled),
            Future::rejected(Error::TimedOut),
        ]);
        let error = thread::wait_for(&any).unwrap_err();
        assert_eq!(error, Error::TimedOut);
    }

    #[test]
    fn any_of_nothing_rejects() {
        let any = Future::any([]);
        assert!(any.is_rejected());
    }

    #[test]
    fn first_takes_either_outcome() {
        let never = Promise::new();
        let first = Future::first([Future::rejected(Error::Cancelled), never.future()]);
        let error = thread::wait_for(&first).unwrap_err();
        assert_eq!(error, Error::Cancelled);
    }

    #[test]
    fn first_against_pending_behaves_like_the_settled_child() {
        let never = Promise::new();
        let first = Future::first([Future::new_for_int(11), never.future()]);
        let value = thread::wait_for(&first).unwrap();
        assert_eq!(value.as_int(), Some(11));
    }
}
