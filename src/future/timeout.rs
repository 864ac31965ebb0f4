//! Timed future sources.

use std::time::{Duration, Instant};

use crate::error::Error;
use crate::future::Future;
use crate::scheduler::{Scheduler, WorkItem};

/// Creates a future that rejects with [`Error::TimedOut`] after `ms`
/// milliseconds.
///
/// The deadline is timed on the main-loop scheduler current at creation;
/// thread-pool workers delegate to the process default. Timeouts do not
/// interrupt anything by themselves; racing one against real work with
/// [`Future::first`] is the cancellation idiom.
pub fn timeout_ms(ms: u64) -> Future {
    timeout(Duration::from_millis(ms))
}

/// Creates a future that rejects with [`Error::TimedOut`] after `seconds`.
pub fn timeout_seconds(seconds: u32) -> Future {
    timeout(Duration::from_secs(u64::from(seconds)))
}

fn timeout(delay: Duration) -> Future {
    let future = Future::pending();
    let scheduler = Scheduler::current_or_default();
    let target = future.clone();
    scheduler.push_at(
        Instant::now() + delay,
        WorkItem::new(move || {
            target.settle(Err(Error::TimedOut));
        }),
    );
    future
}
