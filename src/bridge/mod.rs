//! Bridge between the ingress and the broker
//!
//! A [`Bridge`] owns everything with failure handling or ordering concerns:
//! the connection supervisor, the pending-message buffer and the publish
//! dispatcher. Session events from the broker client are delivered over a
//! channel to one event-loop task that applies them in order, so state
//! changes and buffer drains never run concurrently with each other.
//!
//! Handles are cheap to clone and share one underlying bridge; several
//! independent bridges can coexist in one process. Dropping the last handle
//! stops the event loop and closes the broker session, discarding anything
//! still buffered. [`Bridge::shutdown`] does the same and waits for the
//! close.

pub mod dispatcher;
pub mod message;
pub mod pending;
pub mod state;
pub mod supervisor;


use std::sync::{Arc, Weak};

use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::client::BrokerClient;
use dispatcher::Dispatcher;
use supervisor::ConnectionSupervisor;

pub use message::Message;
pub use pending::{DrainReport, PendingQueue};
pub use state::{ConnectionState, Route};

struct Inner {
    dispatcher: Arc<Dispatcher>,
    event_loop: AbortHandle,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.event_loop.abort();
    }
}

#[derive(Clone)]
pub struct Bridge {
    inner: Arc<Inner>,
}

impl Bridge {
    /// Creates a bridge without connecting. The first publish, or an explicit
    /// [`Bridge::connect`], opens the broker session.
    ///
    /// Must be called inside a Tokio runtime.
    pub fn new(client: Arc<dyn BrokerClient>, endpoint: impl Into<String>, partition: u32) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let supervisor = Arc::new(ConnectionSupervisor::new(client, endpoint, tx));
        let dispatcher = Arc::new(Dispatcher::new(supervisor, partition));

        let events: Weak<Dispatcher> = Arc::downgrade(&dispatcher);
        let event_loop = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                let Some(dispatcher) = events.upgrade() else {
                    break;
                };
                dispatcher.on_event(event).await;
            }
            debug!("Bridge event loop stopped");
        })
        .abort_handle();

        Self {
            inner: Arc::new(Inner {
                dispatcher,
                event_loop,
            }),
        }
    }

    fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.inner.dispatcher
    }

    /// Creates a bridge and starts connecting right away.
    pub fn start(client: Arc<dyn BrokerClient>, endpoint: impl Into<String>, partition: u32) -> Self {
        let bridge = Self::new(client, endpoint, partition);
        info!(endpoint = %bridge.endpoint(), "Connecting to broker");
        bridge.connect();
        bridge
    }

    pub fn connect(&self) -> bool {
        self.dispatcher().supervisor().connect()
    }

    pub fn reconnect(&self) -> bool {
        self.dispatcher().supervisor().disconnect_and_reconnect()
    }

    /// Hands `message` to the broker or buffers it. Returns without waiting on
    /// any broker interaction.
    pub fn publish(&self, message: Message) -> Route {
        self.dispatcher().publish(message)
    }

    pub fn endpoint(&self) -> &str {
        self.dispatcher().supervisor().endpoint()
    }

    pub fn state(&self) -> ConnectionState {
        self.dispatcher().supervisor().state()
    }

    /// True when connected and the producer has confirmed readiness.
    pub fn is_ready(&self) -> bool {
        self.dispatcher().supervisor().producer().is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.dispatcher().pending().len()
    }

    pub fn pending(&self) -> Vec<Message> {
        self.dispatcher().pending().snapshot()
    }

    /// Drains the buffer now if a ready producer is available.
    pub async fn drain(&self) -> Option<DrainReport> {
        let producer = self.dispatcher().supervisor().producer()?;
        Some(self.dispatcher().drain(producer).await)
    }

    /// Stops the event loop and closes the broker session. Buffered messages
    /// are discarded; their number is returned.
    pub async fn shutdown(&self) -> usize {
        self.inner.event_loop.abort();
        self.dispatcher().supervisor().shutdown().await;
        let lost = self.dispatcher().pending().clear().len();
        if lost > 0 {
            warn!(lost, "Discarding pending messages on shutdown");
        }
        lost
    }
}
