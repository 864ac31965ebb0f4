//! Dedicated-thread futures and blocking waits.
//!
//! For work that genuinely needs its own OS thread (blocking syscalls,
//! long computations that should not occupy a scheduler worker), `spawn`
//! runs a closure on a named thread and exposes its eventual future as a
//! backing future. `wait_for` is the inverse bridge: it parks a plain
//! thread until a future settles.

use crate::error::{Error, Result};
use crate::future::Future;
use crate::platform;
use crate::scheduler::Scheduler;
use crate::value::Value;

/// Runs `work` on a dedicated named thread and returns a future that
/// settles with the outcome of the future `work` produces.
pub fn spawn<F>(name: &str, work: F) -> Future
where
    F: FnOnce() -> Future + Send + 'static,
{
    spawn_with_stack(name, 0, work)
}

/// Like [`spawn`], with a stack-size hint in bytes.
///
/// A hint of zero uses the platform default; non-zero hints are clamped up
/// to the platform minimum.
pub fn spawn_with_stack<F>(name: &str, stack_size: usize, work: F) -> Future
where
    F: FnOnce() -> Future + Send + 'static,
{
    let backing = Future::pending();
    let target = backing.clone();
    let mut builder = std::thread::Builder::new().name(name.to_string());
    let stack_size = platform::clamp_stack_size(stack_size);
    if stack_size > 0 {
        builder = builder.stack_size(stack_size);
    }
    let spawned = builder.spawn(move || {
        let produced = work();
        produced.forward_into(target);
    });
    match spawned {
        Ok(_handle) => backing,
        Err(err) => Future::rejected(Error::failed(format!(
            "failed to spawn thread: {err}"
        ))),
    }
}

/// Blocks the calling thread until `future` settles and returns its
/// outcome.
///
/// Calling this from a scheduler thread stalls that scheduler's dispatch
/// until settlement; if the settlement itself needs that scheduler, the
/// wait deadlocks. Wait from plain threads, await from fibers.
pub fn wait_for(future: &Future) -> Result<Value> {
    if Scheduler::current().is_some() {
        log::warn!("wait_for on a scheduler thread stalls its dispatch");
    }
    future.wait_blocking()
}
