//! Scheduler, fiber, and dedicated-thread scenarios.

use filament::{
    Future, PoolConfig, Promise, Scheduler, ThreadPoolScheduler, Value, WorkItem, thread,
    timeout_ms,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[test]
fn work_stealing_throughput() {
    const K: usize = 1_000_000;
    let mut pool =
        ThreadPoolScheduler::with_config(PoolConfig::default().with_workers(4)).unwrap();
    let scheduler = pool.handle();
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..K {
        let count = count.clone();
        scheduler.push(WorkItem::new(move || {
            count.fetch_add(1, Ordering::Relaxed);
        }));
    }
    let deadline = Instant::now() + Duration::from_secs(60);
    while count.load(Ordering::Relaxed) < K {
        assert!(Instant::now() < deadline, "throughput run never finished");
        std::thread::sleep(Duration::from_millis(5));
    }
    pool.shutdown();
    assert_eq!(count.load(Ordering::Relaxed), K);
}

#[test]
fn fiber_awaits_a_race_settled_externally() {
    let pool =
        ThreadPoolScheduler::with_config(PoolConfig::default().with_workers(2)).unwrap();
    let promise = Promise::new();
    let raced = promise.future();
    let backing = pool.handle().spawn(async move {
        let winner = Future::first([raced, timeout_ms(100)]);
        winner.await
    });

    let external = promise.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        external.resolve_int(42);
    });

    let value = thread::wait_for(&backing).unwrap();
    assert_eq!(value.as_int(), Some(42));
}

#[test]
fn fiber_race_lost_to_timeout_rejects() {
    let promise = Promise::new();
    let raced = promise.future();
    let backing = filament::spawn(async move {
        let winner = Future::first([raced, timeout_ms(30)]);
        winner.await
    });
    let error = thread::wait_for(&backing).unwrap_err();
    assert_eq!(error, filament::Error::TimedOut);
}

#[test]
fn fibers_pass_futures_through_a_channel() {
    let pool =
        ThreadPoolScheduler::with_config(PoolConfig::default().with_workers(2)).unwrap();
    let scheduler = pool.handle();
    let channel = filament::Channel::new(4);

    let producer_channel = channel.clone();
    let producer = scheduler.spawn(async move {
        for i in 0..10 {
            let admitted = producer_channel.send(Future::new_for_int(i));
            admitted.await?;
        }
        producer_channel.close_send();
        Ok(Value::Bool(true))
    });

    let consumer_channel = channel.clone();
    let consumer = scheduler.spawn(async move {
        let mut total = 0i64;
        loop {
            let received = consumer_channel.receive();
            match received.await {
                Ok(value) => total += value.as_int64().unwrap_or(0),
                Err(_closed) => break,
            }
        }
        Ok(Value::Int64(total))
    });

    assert!(thread::wait_for(&producer).is_ok());
    let total = thread::wait_for(&consumer).unwrap();
    assert_eq!(total.as_int64(), Some(45));
}

#[test]
fn dedicated_thread_produces_a_string() {
    let backing = thread::spawn("integration-thread", || {
        Future::new_for_string("string3")
    });
    let settled = backing.finally(|settled| settled.clone());
    assert_eq!(
        thread::wait_for(&settled).unwrap().as_str().map(String::from),
        Some("string3".to_string())
    );
}

#[test]
fn dedicated_thread_waits_for_a_promise() {
    let promise = Promise::new();
    let observed = promise.future();
    let backing = thread::spawn("integration-wait-for", move || {
        let value = thread::wait_for(&observed);
        assert!(value.is_ok());
        Future::new_for_int(123)
    });

    let resolver = promise.clone();
    Scheduler::get_default().push(WorkItem::new(move || {
        resolver.resolve_bool(true);
    }));

    let value = thread::wait_for(&backing).unwrap();
    assert_eq!(value.as_int(), Some(123));
}

#[test]
fn main_loop_dispatch_order_is_stable_under_timers() {
    let owner = filament::MainLoopScheduler::new().unwrap();
    let scheduler = owner.handle();
    let order = Arc::new(std::sync::Mutex::new(Vec::new()));
    let now = Instant::now();
    for tag in 0..4u32 {
        let order = order.clone();
        scheduler.push(WorkItem::new(move || order.lock().unwrap().push(tag)));
    }
    let order2 = order.clone();
    scheduler.push_at(
        now + Duration::from_millis(20),
        WorkItem::new(move || order2.lock().unwrap().push(99)),
    );
    let deadline = Instant::now() + Duration::from_secs(5);
    while order.lock().unwrap().len() < 5 {
        assert!(Instant::now() < deadline, "dispatch never finished");
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 99]);
}

#[cfg(unix)]
#[test]
fn signal_future_resolves_on_delivery() {
    let signum = libc::SIGUSR2;
    let future = filament::unix_signal(signum);
    assert!(future.is_pending());
    std::thread::sleep(Duration::from_millis(50));
    unsafe {
        libc::raise(signum);
    }
    let value = thread::wait_for(&future).unwrap();
    assert_eq!(value.as_int(), Some(signum));
}
