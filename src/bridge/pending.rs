//! Pending-message buffer
//!
//! Ordered, unbounded holding area for messages accepted while the broker is
//! unreachable. There is no capacity limit: a long outage with steady inbound
//! traffic grows this buffer without bound, and everything in it is lost when
//! the process exits.
//!
//! A drain sends from the head of the queue one message at a time and only
//! removes a message after its send succeeded. The first failure ends the
//! drain, leaving the failed message at the head and the rest behind it in
//! their original order. Only one drain runs at a time.

use std::collections::VecDeque;
use std::future::Future;

use parking_lot::Mutex;

use crate::bridge::message::Message;
use crate::utils::error::BridgeError;

#[derive(Debug, Default)]
struct Inner {
    items: VecDeque<Message>,
    draining: bool,
}

#[derive(Debug, Default)]
pub struct PendingQueue {
    inner: Mutex<Inner>,
}

/// Outcome of one [`PendingQueue::drain_all`] invocation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    /// Messages delivered and removed by this drain.
    pub sent: usize,
    /// Messages still queued when the drain ended.
    pub remaining: usize,
    /// The failure that stopped the drain, if any.
    pub failure: Option<BridgeError>,
    /// True when another drain was already running and this one did nothing.
    pub skipped: bool,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `message` to the tail and returns the new depth.
    pub fn enqueue(&self, message: Message) -> usize {
        let mut inner = self.inner.lock();
        inner.items.push_back(message);
        inner.items.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().items.is_empty()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    /// Copy of the queued messages, head first.
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner.lock().items.iter().cloned().collect()
    }

    /// Removes and returns everything queued.
    pub fn clear(&self) -> Vec<Message> {
        self.inner.lock().items.drain(..).collect()
    }

    /// Sends every queued message through `send`, head first.
    ///
    /// Messages enqueued while the drain runs are picked up too. The lock is
    /// never held across `send`.
    pub async fn drain_all<F, Fut, T>(&self, mut send: F) -> DrainReport
    where
        F: FnMut(Message) -> Fut,
        Fut: Future<Output = Result<T, BridgeError>>,
    {
        {
            let mut inner = self.inner.lock();
            if inner.draining {
                return DrainReport {
                    remaining: inner.items.len(),
                    skipped: true,
                    ..DrainReport::default()
                };
            }
            inner.draining = true;
        }

        let mut sent = 0;
        loop {
            let head = {
                let mut inner = self.inner.lock();
                match inner.items.front() {
                    Some(message) => message.clone(),
                    None => {
                        inner.draining = false;
                        return DrainReport {
                            sent,
                            ..DrainReport::default()
                        };
                    }
                }
            };

            let outcome = send(head).await;

            let mut inner = self.inner.lock();
            match outcome {
                Ok(_) => {
                    // only the drain removes from the head, so it is still ours
                    inner.items.pop_front();
                    sent += 1;
                }
                Err(err) => {
                    inner.draining = false;
                    return DrainReport {
                        sent,
                        remaining: inner.items.len(),
                        failure: Some(err),
                        skipped: false,
                    };
                }
            }
        }
    }
}
