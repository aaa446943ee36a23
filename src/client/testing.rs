//! Scriptable in-memory broker used by the unit tests.
//!
//! In `auto` mode a session reports `Connected` as soon as it is opened and a
//! producer reports `ProducerReady` as soon as it is created. In manual mode
//! nothing is emitted until a test calls [`MemorySession::emit`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use super::{
    BrokerClient, ClientError, OutboundRecord, Producer, SendAck, Session, SessionEvent,
    SessionEvents,
};

#[derive(Default)]
struct MemoryState {
    auto: bool,
    connects: AtomicUsize,
    live_producers: AtomicUsize,
    max_live_producers: AtomicUsize,
    sessions: Mutex<Vec<Arc<MemorySession>>>,
    sent: Mutex<Vec<OutboundRecord>>,
    rejected: Mutex<Vec<Value>>,
    send_delay: Mutex<Option<Duration>>,
}

#[derive(Clone)]
pub(crate) struct MemoryBroker {
    state: Arc<MemoryState>,
}

impl MemoryBroker {
    pub fn manual() -> Self {
        Self {
            state: Arc::new(MemoryState::default()),
        }
    }

    pub fn auto() -> Self {
        Self {
            state: Arc::new(MemoryState {
                auto: true,
                ..MemoryState::default()
            }),
        }
    }

    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn live_producers(&self) -> usize {
        self.state.live_producers.load(Ordering::SeqCst)
    }

    pub fn max_live_producers(&self) -> usize {
        self.state.max_live_producers.load(Ordering::SeqCst)
    }

    pub fn session(&self, index: usize) -> Arc<MemorySession> {
        Arc::clone(&self.state.sessions.lock()[index])
    }

    pub fn latest_session(&self) -> Arc<MemorySession> {
        let sessions = self.state.sessions.lock();
        Arc::clone(sessions.last().expect("no session opened yet"))
    }

    pub fn sent(&self) -> Vec<OutboundRecord> {
        self.state.sent.lock().clone()
    }

    pub fn sent_payloads(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .map(|r| serde_json::from_str(&r.payload).expect("payload is JSON"))
            .collect()
    }

    /// Every send of a record whose payload equals `payload` fails.
    pub fn reject_payload(&self, payload: Value) {
        self.state.rejected.lock().push(payload);
    }

    pub fn set_send_delay(&self, delay: Duration) {
        *self.state.send_delay.lock() = Some(delay);
    }
}

impl BrokerClient for MemoryBroker {
    fn connect(&self, _endpoint: &str, events: SessionEvents) -> Arc<dyn Session> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        let session = Arc::new(MemorySession {
            events,
            state: Arc::clone(&self.state),
            closed: Arc::new(AtomicBool::new(false)),
            producers: AtomicUsize::new(0),
        });
        self.state.sessions.lock().push(Arc::clone(&session));
        if self.state.auto {
            session.emit(SessionEvent::Connected);
        }
        session
    }
}

pub(crate) struct MemorySession {
    events: SessionEvents,
    state: Arc<MemoryState>,
    closed: Arc<AtomicBool>,
    producers: AtomicUsize,
}

impl MemorySession {
    pub fn emit(&self, event: SessionEvent) {
        self.events.emit(event);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Session for MemorySession {
    fn create_producer(&self, events: SessionEvents) -> Arc<dyn Producer> {
        self.producers.fetch_add(1, Ordering::SeqCst);
        let live = self.state.live_producers.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_live_producers.fetch_max(live, Ordering::SeqCst);
        if self.state.auto {
            events.emit(SessionEvent::ProducerReady);
        }
        Arc::new(MemoryProducer {
            state: Arc::clone(&self.state),
            closed: Arc::clone(&self.closed),
        })
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let producers = self.producers.load(Ordering::SeqCst);
            self.state
                .live_producers
                .fetch_sub(producers, Ordering::SeqCst);
        }
        tokio::task::yield_now().await;
    }
}

struct MemoryProducer {
    state: Arc<MemoryState>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl Producer for MemoryProducer {
    async fn send(&self, record: &OutboundRecord) -> Result<SendAck, ClientError> {
        let delay = *self.state.send_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Disconnected);
        }

        let payload: Value = serde_json::from_str(&record.payload)
            .map_err(|e| ClientError::Protocol(e.to_string()))?;
        if self.state.rejected.lock().contains(&payload) {
            return Err(ClientError::Rejected(format!(
                "payload {payload} refused by test broker"
            )));
        }

        self.state.sent.lock().push(record.clone());
        Ok(SendAck {
            topic: record.topic.clone(),
            partition: record.partition,
            message_id: record.message_id.clone(),
        })
    }
}
