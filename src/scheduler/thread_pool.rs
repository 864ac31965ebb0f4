//! Work-stealing thread-pool scheduler.
//!
//! N workers each own a LIFO deque; submissions from non-worker threads
//! land in a shared injector, submissions from a worker land in its own
//! deque. Idle workers steal FIFO from siblings, then dip into the
//! injector, then park on a condvar. Shutdown waits for in-flight work and
//! terminates the workers with sentinel jobs drained like any other item.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::deque::{Injector, Steal, Stealer, Worker};

use crate::error::Error;
use crate::platform;
use crate::scheduler::{self, Dispatch, Scheduler, WorkItem};

const PARK_INTERVAL: Duration = Duration::from_millis(5);

/// Configuration for [`ThreadPoolScheduler`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads; `0` means one per logical CPU.
    pub workers: usize,
    /// Stack size for worker threads in bytes; `0` means the platform
    /// default. Non-zero hints are clamped to the platform minimum.
    pub stack_size: usize,
    /// Whether idle workers steal from sibling deques.
    pub steal: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            stack_size: 0,
            steal: true,
        }
    }
}

impl PoolConfig {
    /// Sets the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the worker stack size hint.
    pub fn with_stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = stack_size;
        self
    }

    /// Enables or disables work stealing.
    pub fn with_steal(mut self, steal: bool) -> Self {
        self.steal = steal;
        self
    }
}

enum Job {
    Work(WorkItem),
    Stop,
}

struct PoolShared {
    injector: Injector<Job>,
    stealers: Vec<Stealer<Job>>,
    park_flag: Mutex<bool>,
    park_cond: Condvar,
    done_flag: Mutex<()>,
    done_cond: Condvar,
    active: AtomicUsize,
    submitted: AtomicUsize,
    completed: AtomicUsize,
    shutdown: AtomicBool,
    steal: bool,
    workers: usize,
}

/// A point-in-time snapshot of a pool's counters.
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Work items accepted since the pool started.
    pub submitted: usize,
    /// Work items that finished running.
    pub completed: usize,
    /// Work items queued or currently running.
    pub active: usize,
    /// Items sitting in the shared injector queue.
    pub global_queue_len: usize,
    /// Number of worker threads.
    pub workers: usize,
}

struct LocalQueue {
    pool: usize,
    worker: Rc<Worker<Job>>,
}

thread_local! {
    static LOCAL: RefCell<Option<LocalQueue>> = const { RefCell::new(None) };
}

impl PoolShared {
    fn unpark_one(&self) {
        let mut flag = self.park_flag.lock().unwrap();
        *flag = true;
        drop(flag);
        self.park_cond.notify_one();
    }

    fn unpark_all(&self) {
        let mut flag = self.park_flag.lock().unwrap();
        *flag = true;
        drop(flag);
        self.park_cond.notify_all();
    }

    fn complete_one(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if self.active.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _flag = self.done_flag.lock().unwrap();
            self.done_cond.notify_all();
        }
    }
}

impl Dispatch for PoolShared {
    fn push(&self, item: WorkItem) {
        if self.shutdown.load(Ordering::Acquire) {
            log::warn!("push on a stopped thread-pool scheduler; dropping work item");
            return;
        }
        self.active.fetch_add(1, Ordering::AcqRel);
        self.submitted.fetch_add(1, Ordering::Relaxed);
        let mut job = Some(Job::Work(item));
        LOCAL.with(|slot| {
            if let Some(local) = slot.borrow().as_ref() {
                if local.pool == self as *const PoolShared as usize {
                    if let Some(job) = job.take() {
                        local.worker.push(job);
                    }
                }
            }
        });
        if let Some(job) = job {
            self.injector.push(job);
        }
        self.unpark_one();
    }

    fn push_at(&self, deadline: Instant, item: WorkItem) {
        // Workers carry no timer heap; deadlines are kept by the default
        // main-loop scheduler and the settled dependents dispatch back to
        // whichever scheduler registered them.
        Scheduler::get_default().push_at(deadline, item);
    }
}

fn find_job(shared: &PoolShared, local: &Worker<Job>, id: usize) -> Option<Job> {
    if let Some(job) = local.pop() {
        return Some(job);
    }
    if shared.steal {
        for (victim, stealer) in shared.stealers.iter().enumerate() {
            if victim == id {
                continue;
            }
            loop {
                match stealer.steal() {
                    Steal::Success(job) => return Some(job),
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }
    }
    loop {
        match shared.injector.steal() {
            Steal::Success(job) => return Some(job),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}

fn worker_loop(id: usize, shared: Arc<PoolShared>, local: Worker<Job>) {
    let local = Rc::new(local);
    scheduler::set_current(Scheduler::from_dispatch(shared.clone()));
    LOCAL.with(|slot| {
        *slot.borrow_mut() = Some(LocalQueue {
            pool: Arc::as_ptr(&shared) as *const PoolShared as usize,
            worker: local.clone(),
        });
    });
    log::trace!("worker {id} started");

    loop {
        if let Some(job) = find_job(&shared, &local, id) {
            match job {
                Job::Work(item) => {
                    item.invoke();
                    shared.complete_one();
                }
                Job::Stop => {
                    // Finish whatever this worker still owns locally; the
                    // sentinel itself is not counted as work.
                    while let Some(job) = local.pop() {
                        if let Job::Work(item) = job {
                            item.invoke();
                            shared.complete_one();
                        }
                    }
                    break;
                }
            }
            continue;
        }

        let flag = shared.park_flag.lock().unwrap();
        // Re-check under the lock: work may have arrived between the last
        // steal attempt and parking.
        if !shared.injector.is_empty() || !local.is_empty() {
            continue;
        }
        let (mut flag, _timeout) = shared
            .park_cond
            .wait_timeout(flag, PARK_INTERVAL)
            .unwrap();
        *flag = false;
    }

    LOCAL.with(|slot| slot.borrow_mut().take());
    scheduler::clear_current();
    log::trace!("worker {id} stopped");
}

/// Work-stealing scheduler over a pool of worker threads.
///
/// The owner value controls the worker threads: dropping it (or calling
/// [`ThreadPoolScheduler::shutdown`]) waits for queued and running work,
/// then stops the workers. [`Scheduler`] handles from
/// [`ThreadPoolScheduler::handle`] stay valid for the queues but push to a
/// stopped pool is dropped with a warning. Fibers suspended at an await do
/// not count as queued work.
pub struct ThreadPoolScheduler {
    shared: Arc<PoolShared>,
    handles: Vec<JoinHandle<()>>,
}

impl ThreadPoolScheduler {
    /// Creates a pool with the default configuration.
    pub fn new() -> crate::error::Result<Self> {
        Self::with_config(PoolConfig::default())
    }

    /// Creates a pool from an explicit configuration.
    pub fn with_config(config: PoolConfig) -> crate::error::Result<Self> {
        let workers = if config.workers == 0 {
            num_cpus::get()
        } else {
            config.workers
        };
        let locals: Vec<Worker<Job>> = (0..workers).map(|_| Worker::new_lifo()).collect();
        let stealers = locals.iter().map(Worker::stealer).collect();
        let shared = Arc::new(PoolShared {
            injector: Injector::new(),
            stealers,
            park_flag: Mutex::new(false),
            park_cond: Condvar::new(),
            done_flag: Mutex::new(()),
            done_cond: Condvar::new(),
            active: AtomicUsize::new(0),
            submitted: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            steal: config.steal,
            workers,
        });

        let stack_size = platform::clamp_stack_size(config.stack_size);
        let mut handles = Vec::with_capacity(workers);
        let mut spawn_error = None;
        for (id, local) in locals.into_iter().enumerate() {
            let shared_for_worker = shared.clone();
            let mut builder =
                std::thread::Builder::new().name(format!("filament-worker-{id}"));
            if stack_size > 0 {
                builder = builder.stack_size(stack_size);
            }
            match builder.spawn(move || worker_loop(id, shared_for_worker, local)) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    spawn_error = Some(Error::failed(format!(
                        "failed to start worker thread: {err}"
                    )));
                    break;
                }
            }
        }
        if let Some(error) = spawn_error {
            shared.shutdown.store(true, Ordering::Release);
            for _ in 0..handles.len() {
                shared.injector.push(Job::Stop);
            }
            shared.unpark_all();
            for handle in handles {
                let _ = handle.join();
            }
            return Err(error);
        }

        log::debug!("thread-pool scheduler started with {workers} worker(s)");
        Ok(ThreadPoolScheduler { shared, handles })
    }

    /// Returns a dispatch handle for this pool.
    pub fn handle(&self) -> Scheduler {
        Scheduler::from_dispatch(self.shared.clone())
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.shared.workers
    }

    /// Returns a snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            submitted: self.shared.submitted.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            active: self.shared.active.load(Ordering::Acquire),
            global_queue_len: self.shared.injector.len(),
            workers: self.shared.workers,
        }
    }

    /// Waits for queued and running work, then stops the workers.
    pub fn shutdown(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        {
            let mut flag = self.shared.done_flag.lock().unwrap();
            while self.shared.active.load(Ordering::Acquire) > 0 {
                let (guard, _timeout) = self
                    .shared
                    .done_cond
                    .wait_timeout(flag, Duration::from_millis(10))
                    .unwrap();
                flag = guard;
            }
        }
        self.shared.shutdown.store(true, Ordering::Release);
        for _ in 0..self.shared.workers {
            self.shared.injector.push(Job::Stop);
        }
        self.shared.unpark_all();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        log::debug!("thread-pool scheduler stopped");
    }
}

impl Drop for ThreadPoolScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}
