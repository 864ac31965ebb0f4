//! Bounded multi-producer/multi-consumer channel of futures.
//!
//! Senders and receivers meet through futures: `send` returns a future
//! that resolves once the value is admitted (immediately when the buffer
//! has room or a receiver is parked, later when a slot frees up), and
//! `receive` returns a future carrying the sent future's outcome. The two
//! directions close independently: a closed send side lets receivers drain
//! what was already admitted or parked, a closed receive side drops the
//! buffer and refuses everything.
//!
//! All state lives under one mutex; handoffs are short. Futures affected
//! by an operation are settled after the lock is released.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};

use crate::error::Error;
use crate::future::Future;
use crate::value::Value;

/// A bounded FIFO of futures coordinating sender/receiver pairing.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Mutex<ChannelState>>,
}

struct ChannelState {
    capacity: usize,
    items: VecDeque<Future>,
    waiting_senders: VecDeque<(Future, Future)>,
    waiting_receivers: VecDeque<Future>,
    send_closed: bool,
    receive_closed: bool,
}

impl ChannelState {
    fn invalid(&self) -> bool {
        self.capacity == 0
    }
}

fn invalid_capacity() -> Future {
    Future::rejected(Error::failed("channel capacity must be at least 1"))
}

impl Channel {
    /// Creates a channel holding at most `capacity` buffered futures.
    ///
    /// A capacity of zero is invalid; the channel is still constructed, but
    /// every operation on it returns a rejected future.
    pub fn new(capacity: u32) -> Self {
        Channel {
            inner: Arc::new(Mutex::new(ChannelState {
                capacity: capacity as usize,
                items: VecDeque::new(),
                waiting_senders: VecDeque::new(),
                waiting_receivers: VecDeque::new(),
                send_closed: false,
                receive_closed: false,
            })),
        }
    }

    /// Sends a future into the channel.
    ///
    /// The returned future resolves with the buffered length once the value
    /// is admitted (zero for a direct handoff to a parked receiver), stays
    /// pending while the buffer is full, and rejects with
    /// [`Error::Closed`] when either direction is closed.
    pub fn send(&self, future: Future) -> Future {
        let mut handoff = None;
        let admission = {
            let mut state = self.inner.lock().unwrap();
            if state.invalid() {
                return invalid_capacity();
            }
            if state.send_closed || state.receive_closed {
                return Future::rejected(Error::Closed);
            }
            if let Some(receiver) = state.waiting_receivers.pop_front() {
                handoff = Some((future, receiver));
                Future::resolved(Value::Int64(0))
            } else if state.items.len() < state.capacity {
                state.items.push_back(future);
                Future::resolved(Value::Int64(state.items.len() as i64))
            } else {
                let admission = Future::pending();
                state.waiting_senders.push_back((future, admission.clone()));
                admission
            }
        };
        if let Some((sent, receiver)) = handoff {
            sent.forward_into(receiver);
        }
        admission
    }

    /// Receives the next future from the channel.
    ///
    /// Resolves with the oldest sent future's outcome. When the buffer is
    /// empty the returned future stays pending until a send arrives, and
    /// rejects with [`Error::Closed`] once the channel cannot deliver
    /// anything further.
    pub fn receive(&self) -> Future {
        let mut admitted = None;
        let received = {
            let mut state = self.inner.lock().unwrap();
            if state.invalid() {
                return invalid_capacity();
            }
            if let Some(item) = state.items.pop_front() {
                if let Some((queued, admission)) = state.waiting_senders.pop_front() {
                    state.items.push_back(queued);
                    admitted = Some((admission, state.items.len() as i64));
                }
                item
            } else if state.receive_closed || state.send_closed {
                Future::rejected(Error::Closed)
            } else {
                let receiver = Future::pending();
                state.waiting_receivers.push_back(receiver.clone());
                receiver
            }
        };
        if let Some((admission, buffered)) = admitted {
            admission.settle(Ok(Value::Int64(buffered)));
        }
        received
    }

    /// Closes the sending side.
    ///
    /// Already-admitted items and parked senders keep draining through
    /// `receive`; parked receivers have nothing left to wait for and
    /// reject with [`Error::Closed`].
    pub fn close_send(&self) {
        let starved = {
            let mut state = self.inner.lock().unwrap();
            if state.invalid() || state.send_closed {
                return;
            }
            state.send_closed = true;
            log::debug!("channel send side closed");
            // Parked receivers exist only when nothing is buffered or
            // queued behind the buffer, so none of them can be served.
            std::mem::take(&mut state.waiting_receivers)
        };
        for receiver in starved {
            receiver.settle(Err(Error::Closed));
        }
    }

    /// Closes the receiving side.
    ///
    /// Buffered items are dropped, parked senders and receivers reject,
    /// and every further send rejects immediately.
    pub fn close_receive(&self) {
        let (senders, receivers, dropped) = {
            let mut state = self.inner.lock().unwrap();
            if state.invalid() || state.receive_closed {
                return;
            }
            state.receive_closed = true;
            log::debug!(
                "channel receive side closed, dropping {} buffered item(s)",
                state.items.len()
            );
            (
                std::mem::take(&mut state.waiting_senders),
                std::mem::take(&mut state.waiting_receivers),
                std::mem::take(&mut state.items),
            )
        };
        drop(dropped);
        for (_unsent, admission) in senders {
            admission.settle(Err(Error::Closed));
        }
        for receiver in receivers {
            receiver.settle(Err(Error::Closed));
        }
    }

    /// True while sends can still be admitted (eventually).
    pub fn can_send(&self) -> bool {
        let state = self.inner.lock().unwrap();
        !state.invalid() && !state.send_closed && !state.receive_closed
    }

    /// True while receives can still deliver something.
    pub fn can_receive(&self) -> bool {
        let state = self.inner.lock().unwrap();
        !state.invalid()
            && !state.receive_closed
            && (!state.send_closed
                || !state.items.is_empty()
                || !state.waiting_senders.is_empty())
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock().unwrap();
        f.debug_struct("Channel")
            .field("capacity", &state.capacity)
            .field("buffered", &state.items.len())
            .field("waiting_senders", &state.waiting_senders.len())
            .field("waiting_receivers", &state.waiting_receivers.len())
            .field("send_closed", &state.send_closed)
            .field("receive_closed", &state.receive_closed)
            .finish()
    }
}
