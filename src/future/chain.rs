//! Chain combinators: `then`, `catch`, `finally`, and their loop variants.
//!
//! Callbacks receive the settled input future and return a new future; a
//! pending return is chained, meaning the combinator proxies its eventual
//! outcome. Callbacks run on the scheduler current at combinator creation
//! (falling back to the process default), never inline in the settler.

use std::sync::{Arc, Mutex};

use crate::future::Future;
use crate::scheduler::Scheduler;

#[derive(Clone, Copy, PartialEq, Eq)]
enum ChainMode {
    Then,
    Catch,
    Finally,
}

impl ChainMode {
    fn runs_on(self, settled: &Future) -> bool {
        match self {
            ChainMode::Then => settled.is_resolved(),
            ChainMode::Catch => settled.is_rejected(),
            ChainMode::Finally => true,
        }
    }
}

fn chain<F>(input: &Future, mode: ChainMode, callback: F) -> Future
where
    F: FnOnce(&Future) -> Future + Send + 'static,
{
    let destination = Future::pending();
    let scheduler = Scheduler::current_or_default();
    let target = destination.clone();
    input.then_register(&scheduler, move |settled| {
        if mode.runs_on(settled) {
            let produced = callback(settled);
            produced.forward_into(target);
        } else {
            target.settle_from(settled);
        }
    });
    destination
}

struct LoopState<F> {
    callback: Mutex<F>,
    destination: Future,
    scheduler: Scheduler,
    mode: ChainMode,
}

fn loop_step<F>(state: Arc<LoopState<F>>, input: Future)
where
    F: FnMut(&Future) -> Option<Future> + Send + 'static,
{
    let scheduler = state.scheduler.clone();
    input.then_register(&scheduler, move |settled| {
        if !state.mode.runs_on(settled) {
            state.destination.settle_from(settled);
            return;
        }
        let next = {
            let mut callback = state.callback.lock().unwrap();
            (&mut *callback)(settled)
        };
        match next {
            Some(next_input) => loop_step(state.clone(), next_input),
            None => state.destination.settle_from(settled),
        }
    });
}

fn chain_loop<F>(input: &Future, mode: ChainMode, callback: F) -> Future
where
    F: FnMut(&Future) -> Option<Future> + Send + 'static,
{
    let destination = Future::pending();
    let state = Arc::new(LoopState {
        callback: Mutex::new(callback),
        destination: destination.clone(),
        scheduler: Scheduler::current_or_default(),
        mode,
    });
    loop_step(state, input.clone());
    destination
}

impl Future {
    /// Invokes `callback` when this future resolves and settles with the
    /// returned future's outcome. A rejection skips the callback and
    /// propagates unchanged.
    pub fn then<F>(&self, callback: F) -> Future
    where
        F: FnOnce(&Future) -> Future + Send + 'static,
    {
        chain(self, ChainMode::Then, callback)
    }

    /// Mirror of [`Future::then`] for rejection: the callback runs only when
    /// this future rejects, and a resolution propagates unchanged.
    pub fn catch<F>(&self, callback: F) -> Future
    where
        F: FnOnce(&Future) -> Future + Send + 'static,
    {
        chain(self, ChainMode::Catch, callback)
    }

    /// Invokes `callback` regardless of outcome; the returned future decides
    /// the combinator's outcome.
    pub fn finally<F>(&self, callback: F) -> Future
    where
        F: FnOnce(&Future) -> Future + Send + 'static,
    {
        chain(self, ChainMode::Finally, callback)
    }

    /// Looping [`Future::then`]: each time the current input resolves the
    /// callback picks the next input with `Some`, or ends the loop with
    /// `None`, settling the combinator with the last input's outcome. A
    /// rejected input ends the loop with that rejection.
    pub fn then_loop<F>(&self, callback: F) -> Future
    where
        F: FnMut(&Future) -> Option<Future> + Send + 'static,
    {
        chain_loop(self, ChainMode::Then, callback)
    }

    /// Looping [`Future::finally`]: the callback runs on every settlement,
    /// resolved or rejected, until it returns `None`.
    pub fn finally_loop<F>(&self, callback: F) -> Future
    where
        F: FnMut(&Future) -> Option<Future> + Send + 'static,
    {
        chain_loop(self, ChainMode::Finally, callback)
    }
}
