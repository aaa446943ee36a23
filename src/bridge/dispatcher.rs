//! Publish dispatcher
//!
//! Decides per message whether it goes straight to the broker or into the
//! pending buffer, and drains the buffer when the supervisor reports a ready
//! producer.
//!
//! `publish` never waits on the broker: direct sends run in their own task
//! and a failed one puts its message back into the buffer. Such a message
//! waits for the next drain, which only happens after a reconnect.
//!
//! A message is never left buffered behind a ready producer. If the producer
//! became ready between the readiness check and the enqueue, the drain that
//! readiness triggered may already be over, so `publish` starts another one.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::bridge::message::Message;
use crate::bridge::pending::{DrainReport, PendingQueue};
use crate::bridge::state::{ConnectionState, Route};
use crate::bridge::supervisor::{ConnectionSupervisor, Transition};
use crate::client::{Producer, TaggedEvent};
use crate::utils::error::BridgeError;

pub struct Dispatcher {
    supervisor: Arc<ConnectionSupervisor>,
    pending: PendingQueue,
    partition: u32,
}

impl Dispatcher {
    pub fn new(supervisor: Arc<ConnectionSupervisor>, partition: u32) -> Self {
        Self {
            supervisor,
            pending: PendingQueue::new(),
            partition,
        }
    }

    pub fn supervisor(&self) -> &Arc<ConnectionSupervisor> {
        &self.supervisor
    }

    pub fn pending(&self) -> &PendingQueue {
        &self.pending
    }

    pub fn publish(self: &Arc<Self>, message: Message) -> Route {
        if let Some(producer) = self.supervisor.producer() {
            self.send_direct(producer, message);
            return Route::Direct;
        }

        let depth = self.pending.enqueue(message);
        debug!(pending = depth, "Broker not available. Enqueueing message");

        if let Some(producer) = self.supervisor.producer() {
            self.spawn_drain(producer);
            return Route::Buffered { reconnect: false };
        }

        if self.supervisor.state() == ConnectionState::Disconnected {
            let reconnect = self.supervisor.disconnect_and_reconnect();
            Route::Buffered { reconnect }
        } else {
            // connected, producer still warming up: its ready event drains us
            Route::Buffered { reconnect: false }
        }
    }

    fn send_direct(self: &Arc<Self>, producer: Arc<dyn Producer>, message: Message) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let record = message.to_record(dispatcher.partition);
            match producer.send(&record).await {
                Ok(ack) => {
                    debug!(
                        topic = %ack.topic,
                        partition = ack.partition,
                        id = %ack.message_id,
                        "Message sent"
                    );
                }
                Err(e) => {
                    let err = BridgeError::from(e);
                    error!(topic = %message.topic(), error = %err, "Send failed. Enqueueing message");
                    dispatcher.pending.enqueue(message);
                }
            }
        });
    }

    fn spawn_drain(self: &Arc<Self>, producer: Arc<dyn Producer>) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            dispatcher.drain(producer).await;
        });
    }

    /// Applies a session event and drains the buffer when it made a producer
    /// ready. Called from the bridge's event loop only.
    pub async fn on_event(&self, event: TaggedEvent) -> Option<DrainReport> {
        match self.supervisor.handle_event(event) {
            Transition::Ready(producer) => Some(self.drain(producer).await),
            Transition::Lost(err) => {
                debug!(error = %err, pending = self.pending.len(), "Broker link lost");
                None
            }
            Transition::Connected | Transition::Ignored => None,
        }
    }

    /// Sends everything buffered through `producer`, oldest first, stopping at
    /// the first failure.
    pub async fn drain(&self, producer: Arc<dyn Producer>) -> DrainReport {
        let queued = self.pending.len();
        if queued > 0 && !self.pending.is_draining() {
            info!(pending = queued, "Sending pending messages...");
        }

        let partition = self.partition;
        let report = self
            .pending
            .drain_all(|message| {
                let producer = Arc::clone(&producer);
                async move {
                    let record = message.to_record(partition);
                    let ack = producer.send(&record).await.map_err(BridgeError::from)?;
                    debug!(
                        topic = %ack.topic,
                        partition = ack.partition,
                        id = %ack.message_id,
                        "Pending message sent"
                    );
                    Ok(ack)
                }
            })
            .await;

        match &report.failure {
            Some(err) => error!(
                error = %err,
                sent = report.sent,
                remaining = report.remaining,
                "Drain stopped at first failure"
            ),
            None if report.sent > 0 => info!(sent = report.sent, "Done"),
            None => {}
        }
        report
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        let lost = self.pending.len();
        if lost > 0 {
            warn!(lost, "Dropping bridge with pending messages");
        }
    }
}
