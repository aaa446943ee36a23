//! Connection supervisor
//!
//! Owns the broker session and its producer and tracks [`ConnectionState`].
//! All of that lives in one `Link` behind a mutex, and every transition goes
//! through [`ConnectionSupervisor::handle_event`], which the bridge calls
//! from a single event loop. A producer is only handed out once it has
//! reported ready, so a concurrent publish never sees a half-built one.
//!
//! Reconnects are reactive: nothing here retries on its own. A reconnect
//! closes the previous session (waiting for the close to finish) before a new
//! one is opened, and at most one attempt is outstanding at any time; extra
//! requests while one is in flight are ignored.
//!
//! Each connect attempt gets a new generation number. Events carry the
//! generation they were emitted for and anything from an older session is
//! dropped.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::bridge::state::ConnectionState;
use crate::client::{BrokerClient, Producer, Session, SessionEvent, SessionEvents, TaggedEvent};
use crate::utils::error::BridgeError;

#[derive(Default)]
struct Link {
    state: ConnectionState,
    generation: u64,
    session: Option<Arc<dyn Session>>,
    producer: Option<Arc<dyn Producer>>,
    producer_ready: bool,
    attempt_in_flight: bool,
    shut_down: bool,
}

impl Link {
    fn lose(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.producer = None;
        self.producer_ready = false;
        self.attempt_in_flight = false;
    }
}

/// What a session event meant for the rest of the bridge.
pub enum Transition {
    /// Stale or redundant event; nothing changed.
    Ignored,
    /// Connected to the broker; the producer is warming up.
    Connected,
    /// The producer is ready. Buffered messages can be drained through it.
    Ready(Arc<dyn Producer>),
    /// The connection or producer was lost.
    Lost(BridgeError),
}

pub struct ConnectionSupervisor {
    client: Arc<dyn BrokerClient>,
    endpoint: String,
    events: UnboundedSender<TaggedEvent>,
    link: Mutex<Link>,
}

impl ConnectionSupervisor {
    pub fn new(
        client: Arc<dyn BrokerClient>,
        endpoint: impl Into<String>,
        events: UnboundedSender<TaggedEvent>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            events,
            link: Mutex::new(Link::default()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        self.link.lock().state
    }

    /// The producer to send through, available only while connected and ready.
    pub fn producer(&self) -> Option<Arc<dyn Producer>> {
        let link = self.link.lock();
        match (&link.state, &link.producer, link.producer_ready) {
            (ConnectionState::Connected, Some(producer), true) => Some(Arc::clone(producer)),
            _ => None,
        }
    }

    pub fn reconnect_in_flight(&self) -> bool {
        self.link.lock().attempt_in_flight
    }

    /// Opens the first session. Returns false if a session already exists or
    /// an attempt is in flight; use [`Self::disconnect_and_reconnect`] then.
    pub fn connect(&self) -> bool {
        let mut link = self.link.lock();
        if link.shut_down || link.attempt_in_flight || link.session.is_some() {
            return false;
        }
        link.attempt_in_flight = true;
        link.generation += 1;
        self.open(&mut link);
        true
    }

    /// Tears down the current session and opens a new one once the close has
    /// completed. Returns false without doing anything if an attempt is
    /// already in flight.
    pub fn disconnect_and_reconnect(self: &Arc<Self>) -> bool {
        let (stale, generation) = {
            let mut link = self.link.lock();
            if link.shut_down {
                return false;
            }
            if link.attempt_in_flight {
                debug!("Reconnect already in flight");
                return false;
            }
            link.lose();
            link.attempt_in_flight = true;
            link.generation += 1;
            (link.session.take(), link.generation)
        };

        info!(endpoint = %self.endpoint, "Trying to reconnect to broker");
        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(session) = stale {
                session.close().await;
                debug!("Previous broker session closed");
            }

            let mut link = supervisor.link.lock();
            if link.shut_down || link.generation != generation {
                return;
            }
            supervisor.open(&mut link);
        });
        true
    }

    fn open(&self, link: &mut Link) {
        debug!(endpoint = %self.endpoint, generation = link.generation, "Connecting to broker");
        let events = SessionEvents::new(link.generation, self.events.clone());
        link.session = Some(self.client.connect(&self.endpoint, events));
    }

    /// Applies one session event. Must be called from a single task.
    pub fn handle_event(&self, tagged: TaggedEvent) -> Transition {
        let mut link = self.link.lock();
        if link.shut_down || tagged.generation != link.generation {
            debug!(
                generation = tagged.generation,
                current = link.generation,
                event = ?tagged.event,
                "Ignoring event from a stale session"
            );
            return Transition::Ignored;
        }

        match tagged.event {
            SessionEvent::Connected => {
                let Some(session) = link.session.clone() else {
                    return Transition::Ignored;
                };
                link.state = ConnectionState::Connected;
                info!(endpoint = %self.endpoint, "Broker connected");
                let events = SessionEvents::new(link.generation, self.events.clone());
                link.producer = Some(session.create_producer(events));
                link.producer_ready = false;
                Transition::Connected
            }
            SessionEvent::ProducerReady => {
                let producer = match (&link.state, &link.producer) {
                    (ConnectionState::Connected, Some(producer)) => Arc::clone(producer),
                    _ => return Transition::Ignored,
                };
                if link.producer_ready {
                    return Transition::Ignored;
                }
                link.producer_ready = true;
                link.attempt_in_flight = false;
                info!("Producer ready");
                Transition::Ready(producer)
            }
            SessionEvent::ProducerError(reason) => {
                if link.producer_ready {
                    error!(%reason, "Producer failed");
                } else {
                    error!(%reason, "Error initializing producer");
                }
                link.lose();
                Transition::Lost(BridgeError::ProducerInitializationFailure(reason))
            }
            SessionEvent::Disconnected => {
                warn!(endpoint = %self.endpoint, "Broker disconnected");
                link.lose();
                Transition::Lost(BridgeError::TransientBrokerUnavailable(
                    "broker disconnected".to_string(),
                ))
            }
            SessionEvent::Expired => {
                warn!(endpoint = %self.endpoint, "Broker session expired");
                link.lose();
                Transition::Lost(BridgeError::TransientBrokerUnavailable(
                    "broker session expired".to_string(),
                ))
            }
        }
    }

    /// Closes the current session for good. Later events and reconnect
    /// requests are ignored.
    pub async fn shutdown(&self) {
        let session = {
            let mut link = self.link.lock();
            link.shut_down = true;
            link.generation += 1;
            link.lose();
            link.session.take()
        };
        if let Some(session) = session {
            session.close().await;
        }
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        let Some(session) = self.link.get_mut().session.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(endpoint = %self.endpoint, "Closing broker session of dropped bridge");
                runtime.spawn(async move {
                    session.close().await;
                });
            }
            Err(_) => warn!(endpoint = %self.endpoint, "No runtime left to close broker session"),
        }
    }
}
