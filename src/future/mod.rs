//! Single-settlement futures with dependent-callback propagation.
//!
//! A [`Future`] is a ref-counted node holding an atomic status word, an
//! outcome slot, and an ordered list of dependents. Settlement happens
//! exactly once; the settler drains the dependent list and dispatches each
//! callback to the scheduler it was registered with. Registration after
//! settlement still goes through the scheduler, never inline into the
//! registering call.
//!
//! Composition lives in the sibling modules: [`Promise`] for external
//! settlers, set combinators (`all`/`any`/`first`), chain combinators
//! (`then`/`catch`/`finally` and their loop variants), timeout sources, and
//! signal sources on unix.

mod chain;
mod compose;
mod promise;
#[cfg(unix)]
mod signal;
mod timeout;

pub use promise::Promise;
#[cfg(unix)]
pub use signal::unix_signal;
pub use timeout::{timeout_ms, timeout_seconds};

use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::task::{Context, Poll, Waker};

use crate::error::{Error, Result};
use crate::scheduler::{Scheduler, WorkItem};
use crate::value::Value;

/// Settlement status of a future.
///
/// The status is monotonic: once a future leaves `Pending` it never changes
/// again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FutureStatus {
    /// Not settled yet.
    Pending = 0,
    /// Settled with a value.
    Resolved = 1,
    /// Settled with an error.
    Rejected = 2,
}

impl FutureStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => FutureStatus::Pending,
            1 => FutureStatus::Resolved,
            _ => FutureStatus::Rejected,
        }
    }
}

/// A single-settlement asynchronous value.
///
/// Cloning a future clones the handle, not the node: all clones observe the
/// same settlement. Dropping the last handle releases the node without
/// cancelling whatever may still settle it.
#[derive(Clone)]
pub struct Future {
    core: Arc<Core>,
}

struct Core {
    status: AtomicU8,
    state: Mutex<State>,
    settled: Condvar,
}

struct State {
    outcome: Option<Result<Value>>,
    dependents: Vec<Dependent>,
    wakers: Vec<Waker>,
}

/// A callback waiting on settlement, paired with the scheduler that must
/// run it. `target == None` is the internal proxy path used by combinator
/// chaining and channel handoff; those run on the settler's thread.
struct Dependent {
    target: Option<Scheduler>,
    callback: Box<dyn FnOnce(&Future) + Send + 'static>,
}

impl Future {
    pub(crate) fn pending() -> Self {
        Future {
            core: Arc::new(Core {
                status: AtomicU8::new(FutureStatus::Pending as u8),
                state: Mutex::new(State {
                    outcome: None,
                    dependents: Vec::new(),
                    wakers: Vec::new(),
                }),
                settled: Condvar::new(),
            }),
        }
    }

    /// Creates an already-resolved future.
    pub fn resolved(value: Value) -> Self {
        let future = Future::pending();
        future.settle(Ok(value));
        future
    }

    /// Creates an already-rejected future.
    pub fn rejected(error: Error) -> Self {
        let future = Future::pending();
        future.settle(Err(error));
        future
    }

    /// Creates a future resolved with `true`.
    pub fn new_true() -> Self {
        Future::resolved(Value::Bool(true))
    }

    /// Creates a future resolved with `false`.
    pub fn new_false() -> Self {
        Future::resolved(Value::Bool(false))
    }

    /// Creates a future resolved with a 32-bit integer.
    pub fn new_for_int(value: i32) -> Self {
        Future::resolved(Value::Int(value))
    }

    /// Creates a future resolved with a 64-bit integer.
    pub fn new_for_int64(value: i64) -> Self {
        Future::resolved(Value::Int64(value))
    }

    /// Creates a future resolved with a double.
    pub fn new_for_double(value: f64) -> Self {
        Future::resolved(Value::Double(value))
    }

    /// Creates a future resolved with a string.
    pub fn new_for_string(value: impl AsRef<str>) -> Self {
        Future::resolved(Value::string(value))
    }

    /// Creates a future rejected with the given error.
    pub fn new_for_error(error: Error) -> Self {
        Future::rejected(error)
    }

    /// Returns the current settlement status.
    pub fn status(&self) -> FutureStatus {
        FutureStatus::from_u8(self.core.status.load(Ordering::Acquire))
    }

    /// True until the future settles.
    pub fn is_pending(&self) -> bool {
        self.status() == FutureStatus::Pending
    }

    /// True once the future has settled with a value.
    pub fn is_resolved(&self) -> bool {
        self.status() == FutureStatus::Resolved
    }

    /// True once the future has settled with an error.
    pub fn is_rejected(&self) -> bool {
        self.status() == FutureStatus::Rejected
    }

    /// Returns the value if resolved.
    pub fn value(&self) -> Option<Value> {
        let state = self.core.state.lock().unwrap();
        match state.outcome {
            Some(Ok(ref value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Returns the error if rejected.
    pub fn error(&self) -> Option<Error> {
        let state = self.core.state.lock().unwrap();
        match state.outcome {
            Some(Err(ref error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Subscribes a callback to run exactly once after this future settles.
    ///
    /// The callback is dispatched to `scheduler` as a work item; if the
    /// future is already settled the dispatch happens immediately, but the
    /// callback is never invoked inline in the registering call. Callbacks
    /// registered while pending run in registration order.
    pub fn then_register<F>(&self, scheduler: &Scheduler, callback: F)
    where
        F: FnOnce(&Future) + Send + 'static,
    {
        let not_registered = {
            let mut state = self.core.state.lock().unwrap();
            if state.outcome.is_none() {
                state.dependents.push(Dependent {
                    target: Some(scheduler.clone()),
                    callback: Box::new(callback),
                });
                None
            } else {
                Some(callback)
            }
        };
        if let Some(callback) = not_registered {
            let future = self.clone();
            scheduler.push(WorkItem::new(move || callback(&future)));
        }
    }

    /// Detaches the handle while keeping settlement propagation alive.
    ///
    /// Registers a no-op dependent so the node participates in dispatch as
    /// usual, then drops the handle. Useful for fire-and-forget pipelines.
    pub fn disown(self) {
        if self.is_pending() {
            let scheduler = Scheduler::current_or_default();
            self.then_register(&scheduler, |_settled| {});
        }
    }

    /// Settles the future. Returns `false` if another settler won the race.
    pub(crate) fn settle(&self, outcome: Result<Value>) -> bool {
        let (dependents, wakers) = {
            let mut state = self.core.state.lock().unwrap();
            if state.outcome.is_some() {
                return false;
            }
            let status = match outcome {
                Ok(_) => FutureStatus::Resolved,
                Err(_) => FutureStatus::Rejected,
            };
            state.outcome = Some(outcome);
            self.core.status.store(status as u8, Ordering::Release);
            (
                std::mem::take(&mut state.dependents),
                std::mem::take(&mut state.wakers),
            )
        };
        self.core.settled.notify_all();
        for dependent in dependents {
            match dependent.target {
                Some(scheduler) => {
                    let future = self.clone();
                    let callback = dependent.callback;
                    scheduler.push(WorkItem::new(move || callback(&future)));
                }
                None => (dependent.callback)(self),
            }
        }
        for waker in wakers {
            waker.wake();
        }
        true
    }

    /// Copies another settled future's outcome into this one.
    pub(crate) fn settle_from(&self, settled: &Future) {
        self.settle(settled.outcome_snapshot());
    }

    /// Registers an internal proxy invoked on the settler's thread. Used by
    /// combinator chaining and channel handoff; user callbacks always go
    /// through [`Future::then_register`].
    pub(crate) fn on_settle_inline<F>(&self, callback: F)
    where
        F: FnOnce(&Future) + Send + 'static,
    {
        let not_registered = {
            let mut state = self.core.state.lock().unwrap();
            if state.outcome.is_none() {
                state.dependents.push(Dependent {
                    target: None,
                    callback: Box::new(callback),
                });
                None
            } else {
                Some(callback)
            }
        };
        if let Some(callback) = not_registered {
            callback(self);
        }
    }

    /// Proxies this future's eventual outcome into `target`.
    pub(crate) fn forward_into(&self, target: Future) {
        self.on_settle_inline(move |settled| {
            target.settle_from(settled);
        });
    }

    /// Clones the settled outcome; pending futures report a failure rather
    /// than panicking.
    pub(crate) fn outcome_snapshot(&self) -> Result<Value> {
        let state = self.core.state.lock().unwrap();
        match state.outcome {
            Some(ref outcome) => outcome.clone(),
            None => Err(Error::failed("future has not settled")),
        }
    }

    /// Blocks the calling thread until settlement.
    pub(crate) fn wait_blocking(&self) -> Result<Value> {
        let mut state = self.core.state.lock().unwrap();
        loop {
            if let Some(ref outcome) = state.outcome {
                return outcome.clone();
            }
            state = self.core.settled.wait(state).unwrap();
        }
    }
}

impl std::future::Future for Future {
    type Output = Result<Value>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.core.state.lock().unwrap();
        if let Some(ref outcome) = state.outcome {
            return Poll::Ready(outcome.clone());
        }
        state.wakers.push(cx.waker().clone());
        Poll::Pending
    }
}

impl From<Result<Value>> for Future {
    fn from(outcome: Result<Value>) -> Self {
        match outcome {
            Ok(value) => Future::resolved(value),
            Err(error) => Future::rejected(error),
        }
    }
}

impl fmt::Debug for Future {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("status", &self.status())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn resolved_future_reports_value() {
        let future = Future::new_for_int(42);
        assert_eq!(future.status(), FutureStatus::Resolved);
        assert!(future.is_resolved());
        assert!(!future.is_pending());
        assert_eq!(future.value().unwrap().as_int(), Some(42));
        assert!(future.error().is_none());
    }

    #[test]
    fn rejected_future_reports_error() {
        let future = Future::rejected(Error::TimedOut);
        assert_eq!(future.status(), FutureStatus::Rejected);
        assert_eq!(future.error(), Some(Error::TimedOut));
        assert!(future.value().is_none());
    }

    #[test]
    fn settlement_is_monotonic() {
        let future = Future::pending();
        assert!(future.settle(Ok(Value::Int(1))));
        assert!(!future.settle(Ok(Value::Int(2))));
        assert!(!future.settle(Err(Error::TimedOut)));
        assert_eq!(future.value().unwrap().as_int(), Some(1));
    }

    #[test]
    fn dependents_run_exactly_once_in_order() {
        let scheduler = Scheduler::get_default();
        let future = Future::pending();
        let order = Arc::new(Mutex::new(Vec::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        for tag in 0..4 {
            let order = order.clone();
            let calls = calls.clone();
            future.then_register(&scheduler, move |_settled| {
                order.lock().unwrap().push(tag);
                calls.fetch_add(1, Ordering::SeqCst);
            });
        }
        future.settle(Ok(Value::Bool(true)));

        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while calls.load(Ordering::SeqCst) < 4 {
            assert!(std::time::Instant::now() < deadline, "dependents never ran");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn late_registration_still_dispatches() {
        let scheduler = Scheduler::get_default();
        let future = Future::new_for_int(7);
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        future.then_register(&scheduler, move |settled| {
            *seen2.lock().unwrap() = settled.value().and_then(|v| v.as_int());
        });
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while seen.lock().unwrap().is_none() {
            assert!(std::time::Instant::now() < deadline, "callback never ran");
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(*seen.lock().unwrap(), Some(7));
    }

    #[test]
    fn concurrent_settlers_race_to_exactly_one_winner() {
        for _ in 0..50 {
            let future = Future::pending();
            let resolver = future.clone();
            let rejecter = future.clone();
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let barrier2 = barrier.clone();
            let a = std::thread::spawn(move || {
                barrier.wait();
                resolver.settle(Ok(Value::Int(1)))
            });
            let b = std::thread::spawn(move || {
                barrier2.wait();
                rejecter.settle(Err(Error::Cancelled))
            });
            let a_won = a.join().unwrap();
            let b_won = b.join().unwrap();
            assert!(a_won ^ b_won, "exactly one settler must win");
            if a_won {
                assert!(future.is_resolved());
            } else {
                assert!(future.is_rejected());
            }
        }
    }

    #[test]
    fn wait_blocking_returns_outcome() {
        let future = Future::pending();
        let waiter = future.clone();
        let handle = std::thread::spawn(move || waiter.wait_blocking());
        std::thread::sleep(std::time::Duration::from_millis(10));
        future.settle(Ok(Value::Int(9)));
        let outcome = handle.join().unwrap().unwrap();
        assert_eq!(outcome.as_int(), Some(9));
    }
}
