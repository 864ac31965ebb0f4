//! # Filament
//!
//! Filament is a concurrency runtime built from four pieces that compose:
//!
//! - **Futures** — single-settlement asynchronous values with a monotonic
//!   status machine and dependent callbacks dispatched in registration
//!   order ([`Future`], [`Promise`]).
//! - **Combinators** — `all`/`any`/`first` over sets of futures,
//!   `then`/`catch`/`finally` chains, and looping variants for pipelines
//!   that re-arm themselves.
//! - **Schedulers** — a cooperative single-thread main loop with FIFO
//!   dispatch and timers, and a work-stealing thread pool
//!   ([`MainLoopScheduler`], [`ThreadPoolScheduler`]).
//! - **Fibers and channels** — cooperative tasks that suspend at `await`
//!   and resume on their home scheduler ([`spawn`]), plus a bounded
//!   channel of futures pairing senders with receivers ([`Channel`]).
//!
//! ## Example
//!
//! ```no_run
//! use filament::{Future, Promise, Scheduler};
//!
//! let promise = Promise::new();
//! let awaited = promise.future();
//! let backing = Scheduler::get_default().spawn(async move {
//!     let winner = Future::first([awaited, filament::timeout_ms(1_000)]);
//!     winner.await
//! });
//! promise.resolve_int(42);
//! let value = filament::thread::wait_for(&backing).unwrap();
//! assert_eq!(value.as_int(), Some(42));
//! ```
//!
//! Cancellation is compositional: race work against [`timeout_ms`] (or a
//! signal future on unix) with [`Future::first`] and drop the loser's
//! result. Nothing interrupts a running work item.

#![warn(missing_docs, rust_2018_idioms)]

/// Bounded channels of futures.
pub mod channel;
/// Error taxonomy and result alias.
pub mod error;
/// Cooperative fibers.
pub mod fiber;
/// Futures, promises, and combinators.
pub mod future;
/// Page and stack size queries.
pub mod platform;
/// Scheduler interface and realizations.
pub mod scheduler;
/// Dedicated-thread futures and blocking waits.
pub mod thread;
/// Tagged runtime values.
pub mod value;
/// Compile-time version information.
pub mod version;

pub use channel::Channel;
pub use error::{Error, Result};
pub use fiber::spawn;
#[cfg(unix)]
pub use future::unix_signal;
pub use future::{Future, FutureStatus, Promise, timeout_ms, timeout_seconds};
pub use scheduler::{
    Dispatch, MainLoopScheduler, PoolConfig, PoolStats, Scheduler, ThreadPoolScheduler, WorkItem,
};
pub use value::Value;
