//! Cooperative fibers multiplexed over a scheduler.
//!
//! A fiber wraps the spawned computation as a boxed state machine polled in
//! scheduler work items. Awaiting a [`Future`] that is still pending parks
//! the fiber; the future's settlement wakes it, and the wake enqueues a
//! resume on the fiber's home scheduler. On a thread-pool scheduler any
//! worker may run the resume — fibers keep no worker-local state across
//! awaits.
//!
//! Fibers cannot be killed from outside: racing the work against a timeout
//! or signal future is the cancellation idiom, and dropping the backing
//! future merely discards the eventual value.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll};

use futures::future::{BoxFuture, FutureExt};
use futures::task::{self, ArcWake};

use crate::error::Result;
use crate::future::Future;
use crate::scheduler::{Scheduler, WorkItem};
use crate::value::Value;

/// Fiber lifecycle states.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FiberState {
    /// Queued on the home scheduler, waiting to be polled.
    Ready = 0,
    /// Currently being polled.
    Running = 1,
    /// Parked at an await, waiting for a wake.
    Suspended = 2,
    /// Finished; the backing future is settled.
    Completed = 3,
}

struct Fiber {
    state: AtomicU8,
    thunk: Mutex<Option<BoxFuture<'static, Result<Value>>>>,
    backing: Future,
    home: Scheduler,
}

/// Spawns a fiber on the current thread's scheduler (or the process
/// default) and returns its backing future.
pub fn spawn<F>(fiber: F) -> Future
where
    F: std::future::Future<Output = Result<Value>> + Send + 'static,
{
    spawn_on(&Scheduler::current_or_default(), fiber)
}

pub(crate) fn spawn_on<F>(home: &Scheduler, fiber: F) -> Future
where
    F: std::future::Future<Output = Result<Value>> + Send + 'static,
{
    let backing = Future::pending();
    let fiber = Arc::new(Fiber {
        state: AtomicU8::new(FiberState::Ready as u8),
        thunk: Mutex::new(Some(fiber.boxed())),
        backing: backing.clone(),
        home: home.clone(),
    });
    log::trace!("fiber spawned");
    enqueue(fiber);
    backing
}

fn enqueue(fiber: Arc<Fiber>) {
    let home = fiber.home.clone();
    home.push(WorkItem::new(move || run(&fiber)));
}

/// Polls the fiber once. Runs inside a scheduler work item.
fn run(fiber: &Arc<Fiber>) {
    if fiber.state.load(Ordering::Acquire) == FiberState::Completed as u8 {
        return;
    }
    fiber
        .state
        .store(FiberState::Running as u8, Ordering::Release);

    let waker = task::waker_ref(fiber);
    let mut cx = Context::from_waker(&waker);
    let mut thunk = fiber.thunk.lock().unwrap();
    let Some(polled) = thunk.as_mut() else {
        return;
    };
    match polled.as_mut().poll(&mut cx) {
        Poll::Ready(outcome) => {
            *thunk = None;
            drop(thunk);
            fiber
                .state
                .store(FiberState::Completed as u8, Ordering::Release);
            log::trace!("fiber completed");
            fiber.backing.settle(outcome);
        }
        Poll::Pending => {
            drop(thunk);
            // Park the fiber. If the waker already fired during the poll it
            // moved Running to Ready; the failed exchange tells us to
            // re-enqueue instead of parking.
            let parked = fiber.state.compare_exchange(
                FiberState::Running as u8,
                FiberState::Suspended as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            );
            if parked.is_err() {
                enqueue(fiber.clone());
            }
        }
    }
}

impl ArcWake for Fiber {
    fn wake_by_ref(fiber: &Arc<Self>) {
        loop {
            let state = fiber.state.load(Ordering::Acquire);
            if state == FiberState::Suspended as u8 {
                let resumed = fiber.state.compare_exchange(
                    FiberState::Suspended as u8,
                    FiberState::Ready as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                if resumed.is_err() {
                    continue;
                }
                enqueue(fiber.clone());
                return;
            } else if state == FiberState::Running as u8 {
                // Wake raced the poll. Flag it; the poller re-enqueues when
                // its park exchange fails.
                let flagged = fiber.state.compare_exchange(
                    FiberState::Running as u8,
                    FiberState::Ready as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                );
                if flagged.is_err() {
                    continue;
                }
                return;
            } else {
                // Ready or Completed: already queued or nothing to do.
                return;
            }
        }
    }
}
