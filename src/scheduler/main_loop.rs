//! Single-thread cooperative scheduler.
//!
//! One event-loop thread drains a FIFO work queue and a deadline heap.
//! Dispatch order for plain pushes is strictly FIFO; timed pushes run at or
//! after their deadline, ties broken by submission order.

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

use crate::error::Error;
use crate::scheduler::{self, Dispatch, Scheduler, WorkItem};

struct TimerEntry {
    deadline: Instant,
    seq: u64,
    item: WorkItem,
}

// BinaryHeap is a max-heap; reverse the comparison so the earliest
// deadline (and, within it, the earliest submission) pops first.
impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

struct LoopState {
    queue: VecDeque<WorkItem>,
    timers: BinaryHeap<TimerEntry>,
    next_seq: u64,
    stopping: bool,
}

struct LoopShared {
    state: Mutex<LoopState>,
    cond: Condvar,
}

impl Dispatch for LoopShared {
    fn push(&self, item: WorkItem) {
        let mut state = self.state.lock().unwrap();
        if state.stopping {
            log::warn!("push on a stopped main-loop scheduler; dropping work item");
            return;
        }
        state.queue.push_back(item);
        drop(state);
        self.cond.notify_one();
    }

    fn push_at(&self, deadline: Instant, item: WorkItem) {
        let mut state = self.state.lock().unwrap();
        if state.stopping {
            log::warn!("timed push on a stopped main-loop scheduler; dropping work item");
            return;
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.timers.push(TimerEntry {
            deadline,
            seq,
            item,
        });
        drop(state);
        self.cond.notify_one();
    }
}

fn event_loop(shared: Arc<LoopShared>) {
    scheduler::set_current(Scheduler::from_dispatch(shared.clone()));
    loop {
        let item = {
            let mut state = shared.state.lock().unwrap();
            loop {
                let now = Instant::now();
                while state
                    .timers
                    .peek()
                    .is_some_and(|entry| entry.deadline <= now)
                {
                    let entry = state.timers.pop().unwrap();
                    state.queue.push_back(entry.item);
                }
                if let Some(item) = state.queue.pop_front() {
                    break Some(item);
                }
                if state.stopping {
                    break None;
                }
                match state.timers.peek().map(|entry| entry.deadline) {
                    Some(deadline) => {
                        let wait = deadline.saturating_duration_since(now);
                        let (guard, _timeout) =
                            shared.cond.wait_timeout(state, wait).unwrap();
                        state = guard;
                    }
                    None => state = shared.cond.wait(state).unwrap(),
                }
            }
        };
        match item {
            Some(item) => item.invoke(),
            None => break,
        }
    }
    scheduler::clear_current();
}

/// Starts a detached event loop and returns its handle. Used for the
/// process-default scheduler, which lives until exit.
pub(crate) fn spawn_detached(name: &str) -> Scheduler {
    let shared = Arc::new(LoopShared {
        state: Mutex::new(LoopState {
            queue: VecDeque::new(),
            timers: BinaryHeap::new(),
            next_seq: 0,
            stopping: false,
        }),
        cond: Condvar::new(),
    });
    let loop_shared = shared.clone();
    // A failed spawn here leaves an inert scheduler: items queue up but
    // never run. There is no caller to hand the error to, so log it.
    if let Err(err) = std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || event_loop(loop_shared))
    {
        log::warn!("failed to start event-loop thread: {err}");
    }
    Scheduler::from_dispatch(shared)
}

/// A cooperative scheduler bound to one event-loop thread.
///
/// Dropping the owner stops the loop after the queued work drains;
/// unexpired timers are discarded. [`Scheduler`] handles obtained from
/// [`MainLoopScheduler::handle`] keep the queues alive but not the thread.
pub struct MainLoopScheduler {
    shared: Arc<LoopShared>,
    thread: Option<JoinHandle<()>>,
}

impl MainLoopScheduler {
    /// Starts a new event-loop thread.
    pub fn new() -> crate::error::Result<Self> {
        let shared = Arc::new(LoopShared {
            state: Mutex::new(LoopState {
                queue: VecDeque::new(),
                timers: BinaryHeap::new(),
                next_seq: 0,
                stopping: false,
            }),
            cond: Condvar::new(),
        });
        let loop_shared = shared.clone();
        let thread = std::thread::Builder::new()
            .name("filament-loop".to_string())
            .spawn(move || event_loop(loop_shared))
            .map_err(|err| Error::failed(format!("failed to start event loop: {err}")))?;
        log::debug!("main-loop scheduler started");
        Ok(MainLoopScheduler {
            shared,
            thread: Some(thread),
        })
    }

    /// Returns a dispatch handle for this scheduler.
    pub fn handle(&self) -> Scheduler {
        Scheduler::from_dispatch(self.shared.clone())
    }

    /// Stops the loop after queued work drains and joins the thread.
    pub fn shutdown(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        {
            let mut state = self.shared.state.lock().unwrap();
            state.stopping = true;
        }
        self.shared.cond.notify_all();
        let _ = thread.join();
        log::debug!("main-loop scheduler stopped");
    }
}

impl Drop for MainLoopScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn wait_until(check: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !check() {
            assert!(Instant::now() < deadline, "condition never became true");
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn dispatch_is_fifo() {
        let owner = MainLoopScheduler::new().unwrap();
        let scheduler = owner.handle();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..16 {
            let order = order.clone();
            scheduler.push(WorkItem::new(move || {
                order.lock().unwrap().push(tag);
            }));
        }
        wait_until(|| order.lock().unwrap().len() == 16);
        assert_eq!(*order.lock().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn timed_items_respect_deadlines() {
        let owner = MainLoopScheduler::new().unwrap();
        let scheduler = owner.handle();
        let order = Arc::new(Mutex::new(Vec::new()));
        let now = Instant::now();
        for (tag, delay_ms) in [(2u32, 60u64), (0, 10), (1, 30)] {
            let order = order.clone();
            scheduler.push_at(
                now + Duration::from_millis(delay_ms),
                WorkItem::new(move || order.lock().unwrap().push(tag)),
            );
        }
        wait_until(|| order.lock().unwrap().len() == 3);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn shutdown_drains_queued_work() {
        let mut owner = MainLoopScheduler::new().unwrap();
        let scheduler = owner.handle();
        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..64 {
            let ran = ran.clone();
            scheduler.push(WorkItem::new(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        }
        owner.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 64);
    }
}
