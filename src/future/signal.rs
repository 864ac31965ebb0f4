//! Unix signal futures.
//!
//! Each registered signal number gets one detached watcher thread for the
//! lifetime of the process; every future requested for that number before
//! the next delivery resolves with the signal number when it fires.

use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use signal_hook::iterator::Signals;

use crate::error::Error;
use crate::future::Future;
use crate::value::Value;

static WAITERS: Lazy<Mutex<HashMap<i32, Vec<Future>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Creates a future that resolves with `signum` the next time that signal
/// is delivered to the process.
///
/// Signals that cannot be trapped (or an exhausted watcher-thread spawn)
/// produce an immediately rejected future instead of panicking.
pub fn unix_signal(signum: i32) -> Future {
    let future = Future::pending();
    let mut waiters = WAITERS.lock().unwrap();
    if let Some(pending) = waiters.get_mut(&signum) {
        pending.push(future.clone());
        return future;
    }

    let mut signals = match Signals::new([signum]) {
        Ok(signals) => signals,
        Err(err) => {
            return Future::rejected(Error::failed(format!(
                "cannot watch signal {signum}: {err}"
            )));
        }
    };
    let spawned = std::thread::Builder::new()
        .name(format!("filament-signal-{signum}"))
        .spawn(move || {
            for delivered in signals.forever() {
                let pending = {
                    let mut waiters = WAITERS.lock().unwrap();
                    waiters
                        .get_mut(&delivered)
                        .map(std::mem::take)
                        .unwrap_or_default()
                };
                log::debug!("signal {delivered} delivered to {} waiter(s)", pending.len());
                for waiter in pending {
                    waiter.settle(Ok(Value::Int(delivered)));
                }
            }
        });
    match spawned {
        Ok(_handle) => {
            waiters.insert(signum, vec![future.clone()]);
            future
        }
        Err(err) => Future::rejected(Error::failed(format!(
            "cannot spawn signal watcher: {err}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread;
    use pretty_assertions::assert_eq;

    #[test]
    fn delivered_signal_resolves_waiters() {
        let signum = signal_hook::consts::SIGUSR1;
        let first = unix_signal(signum);
        let second = unix_signal(signum);
        assert!(first.is_pending());
        // Give the watcher thread a moment to install the handler.
        std::thread::sleep(std::time::Duration::from_millis(50));
        unsafe {
            libc::raise(signum);
        }
        let value = thread::wait_for(&first).unwrap();
        assert_eq!(value.as_int(), Some(signum));
        let value = thread::wait_for(&second).unwrap();
        assert_eq!(value.as_int(), Some(signum));
    }

    #[test]
    fn untrappable_signal_rejects() {
        let future = unix_signal(signal_hook::consts::SIGKILL);
        assert!(future.is_rejected());
    }
}
