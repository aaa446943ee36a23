//! The `client` module is the seam between the bridge and the broker client.
//!
//! The bridge only talks to the broker through three traits:
//!
//! - [`BrokerClient`] opens sessions against a broker endpoint.
//! - [`Session`] is one connection; it creates producers and can be closed.
//! - [`Producer`] sends records into a topic.
//!
//! Connection progress is not returned from calls. It is reported through a
//! [`SessionEvents`] sink, tagged with the generation of the connect attempt
//! that produced it, so the bridge can drop events from sessions it has
//! already replaced.

pub mod protocol;
pub mod websocket;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

pub use websocket::WebSocketClient;

/// Notifications a session and its producer emit over their lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    Expired,
    ProducerReady,
    ProducerError(String),
}

/// A [`SessionEvent`] together with the connect attempt it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: SessionEvent,
}

/// Sink handed to sessions and producers for reporting [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    generation: u64,
    tx: UnboundedSender<TaggedEvent>,
}

impl SessionEvents {
    pub fn new(generation: u64, tx: UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn emit(&self, event: SessionEvent) {
        let tagged = TaggedEvent {
            generation: self.generation,
            event,
        };
        if let Err(e) = self.tx.send(tagged) {
            debug!(generation = self.generation, event = ?e.0.event, "No listener for session event");
        }
    }
}

/// A message as handed to the broker: the payload is already serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic: String,
    pub payload: String,
    pub partition: u32,
    pub message_id: String,
}

/// Broker-side confirmation of a send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAck {
    pub topic: String,
    pub partition: u32,
    pub message_id: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("session is not connected")]
    Disconnected,

    #[error("no answer from broker within {0:?}")]
    Timeout(Duration),

    #[error("broker rejected the message: {0}")]
    Rejected(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

pub trait BrokerClient: Send + Sync {
    /// Starts connecting to `endpoint` and returns immediately. The outcome is
    /// reported on `events` (`Connected`, or `Disconnected` on failure).
    fn connect(&self, endpoint: &str, events: SessionEvents) -> Arc<dyn Session>;
}

#[async_trait]
pub trait Session: Send + Sync {
    /// Creates a producer bound to this session. It is usable once
    /// `ProducerReady` has been emitted on `events`.
    fn create_producer(&self, events: SessionEvents) -> Arc<dyn Producer>;

    /// Tears the session down. Resolves once the connection is closed.
    async fn close(&self);
}

#[async_trait]
pub trait Producer: Send + Sync {
    async fn send(&self, record: &OutboundRecord) -> Result<SendAck, ClientError>;
}
