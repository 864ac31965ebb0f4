//! Work-item dispatch: the scheduler seam and its two realizations.
//!
//! A scheduler accepts closures ([`WorkItem`]s) and runs them later on one
//! or more threads it owns. The [`MainLoopScheduler`] serializes dispatch
//! on a single event-loop thread in FIFO order; the
//! [`ThreadPoolScheduler`] spreads work across workers with per-worker
//! deques and stealing. Exactly one scheduler claims any given thread, and
//! [`Scheduler::current`] recovers it from anywhere on that thread.

mod main_loop;
mod thread_pool;

pub use main_loop::MainLoopScheduler;
pub use thread_pool::{PoolConfig, PoolStats, ThreadPoolScheduler};

use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::error::Result;
use crate::future::Future;
use crate::value::Value;

/// A closure queued for later execution on a scheduler.
pub struct WorkItem(Box<dyn FnOnce() + Send + 'static>);

impl WorkItem {
    /// Wraps a closure as a work item.
    pub fn new(work: impl FnOnce() + Send + 'static) -> Self {
        WorkItem(Box::new(work))
    }

    /// Runs the closure, consuming the item.
    pub fn invoke(self) {
        (self.0)()
    }
}

impl fmt::Debug for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkItem").field(&"<closure>").finish()
    }
}

/// The dispatch seam every scheduler realization implements.
pub trait Dispatch: Send + Sync + 'static {
    /// Enqueues a work item for execution.
    fn push(&self, item: WorkItem);

    /// Enqueues a work item to run at or after `deadline`.
    ///
    /// Realizations without their own timer facility delegate to the
    /// process-default main-loop scheduler.
    fn push_at(&self, deadline: Instant, item: WorkItem);
}

/// A cloneable handle to a scheduler.
///
/// Handles held by futures and fibers keep the scheduler's queues alive;
/// the owning [`MainLoopScheduler`] / [`ThreadPoolScheduler`] value decides
/// when the threads stop.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<dyn Dispatch>,
}

thread_local! {
    static CURRENT: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

static DEFAULT: Lazy<Scheduler> = Lazy::new(|| main_loop::spawn_detached("filament-default"));

impl Scheduler {
    pub(crate) fn from_dispatch(inner: Arc<dyn Dispatch>) -> Self {
        Scheduler { inner }
    }

    /// Enqueues a work item on this scheduler.
    pub fn push(&self, item: WorkItem) {
        self.inner.push(item);
    }

    /// Enqueues a work item to run at or after `deadline`.
    pub fn push_at(&self, deadline: Instant, item: WorkItem) {
        self.inner.push_at(deadline, item);
    }

    /// Spawns a fiber on this scheduler and returns its backing future.
    ///
    /// The fiber's future settles with the spawned computation's outcome;
    /// every await point inside it suspends the fiber and resumes it here.
    pub fn spawn<F>(&self, fiber: F) -> Future
    where
        F: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        crate::fiber::spawn_on(self, fiber)
    }

    /// Returns the scheduler driving the current thread, if any.
    pub fn current() -> Option<Scheduler> {
        CURRENT.with(|slot| slot.borrow().clone())
    }

    /// Returns the process-default scheduler, starting its event-loop
    /// thread on first use.
    pub fn get_default() -> Scheduler {
        DEFAULT.clone()
    }

    pub(crate) fn current_or_default() -> Scheduler {
        Scheduler::current().unwrap_or_else(Scheduler::get_default)
    }

    pub(crate) fn same_as(&self, other: &Scheduler) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

/// Claims the current thread for `scheduler`. Only one scheduler may drive
/// a thread; a second claim replaces the first and logs, which only
/// happens if a thread is reused across runtimes.
pub(crate) fn set_current(scheduler: Scheduler) {
    CURRENT.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(previous) = slot.as_ref() {
            if !previous.same_as(&scheduler) {
                log::warn!("thread re-claimed by a different scheduler");
            }
        }
        *slot = Some(scheduler);
    });
}

/// Releases the current thread's scheduler claim.
pub(crate) fn clear_current() {
    CURRENT.with(|slot| slot.borrow_mut().take());
}
