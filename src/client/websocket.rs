//! WebSocket broker client
//!
//! Implements the [`BrokerClient`] seam on top of `tokio-tungstenite`. Each
//! session runs as one background task that owns the socket; sessions and
//! producers talk to it through a command channel, so the socket is never
//! shared between tasks.
//!
//! Session lifecycle:
//! - `Connected` once the WebSocket handshake completes within the session
//!   timeout, `Disconnected` if it fails or times out
//! - a ping goes out every session timeout; two silent intervals in a row
//!   emit `Expired`
//! - a closed stream or read/write error emits `Disconnected`
//!
//! Producer readiness: without credentials a producer is ready as soon as it
//! is created. With credentials it logs in, authenticates with the returned
//! token and becomes ready on `authenticated`. An `error` frame before that
//! point, or no `authenticated` within the send timeout, is reported as
//! `ProducerError`.
//!
//! The broker protocol has no publish receipt, so a send succeeds once the
//! frame is flushed to the socket.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at, sleep_until, timeout};
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;
use url::Url;

use super::protocol::{ClientFrame, ServerFrame};
use super::{
    BrokerClient, ClientError, OutboundRecord, Producer, SendAck, Session, SessionEvent,
    SessionEvents,
};
use crate::config::BrokerSettings;

/// QoS requested for every publish: the bridge wants at-least-once handling.
const PUBLISH_QOS: u8 = 1;

#[derive(Debug, Clone)]
pub struct WebSocketClient {
    group_id: String,
    session_timeout: Duration,
    send_timeout: Duration,
    credentials: Option<(String, String)>,
}

impl WebSocketClient {
    pub fn new(settings: &BrokerSettings) -> Self {
        Self {
            group_id: settings.group_id.clone(),
            session_timeout: Duration::from_millis(settings.session_timeout_ms.max(1)),
            send_timeout: Duration::from_millis(settings.send_timeout_ms.max(1)),
            credentials: settings.credentials(),
        }
    }
}

/// Builds the WebSocket URL for `endpoint`. A bare `host:port` gets the
/// `ws://` scheme; the group id travels as a query parameter.
pub fn broker_url(endpoint: &str, group_id: &str) -> Result<Url, url::ParseError> {
    let mut url = if endpoint.contains("://") {
        Url::parse(endpoint)?
    } else {
        Url::parse(&format!("ws://{endpoint}"))?
    };
    url.query_pairs_mut().append_pair("group", group_id);
    Ok(url)
}

impl BrokerClient for WebSocketClient {
    fn connect(&self, endpoint: &str, events: SessionEvents) -> Arc<dyn Session> {
        let (tx, rx) = mpsc::unbounded_channel();

        match broker_url(endpoint, &self.group_id) {
            Ok(url) => {
                debug!(%url, generation = events.generation(), "Connecting to broker");
                tokio::spawn(run_session(url, self.clone(), events, rx));
            }
            Err(e) => {
                error!(endpoint, error = %e, "Invalid broker endpoint");
                events.emit(SessionEvent::Disconnected);
            }
        }

        Arc::new(WebSocketSession {
            commands: tx,
            send_timeout: self.send_timeout,
        })
    }
}

enum Command {
    Publish {
        frame: String,
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
    StartProducer {
        events: SessionEvents,
    },
    Close {
        done: oneshot::Sender<()>,
    },
}

pub struct WebSocketSession {
    commands: mpsc::UnboundedSender<Command>,
    send_timeout: Duration,
}

#[async_trait]
impl Session for WebSocketSession {
    fn create_producer(&self, events: SessionEvents) -> Arc<dyn Producer> {
        if let Err(mpsc::error::SendError(Command::StartProducer { events })) =
            self.commands.send(Command::StartProducer { events })
        {
            events.emit(SessionEvent::ProducerError("session is closed".to_string()));
        }

        Arc::new(WebSocketProducer {
            commands: self.commands.clone(),
            send_timeout: self.send_timeout,
        })
    }

    async fn close(&self) {
        let (done, closed) = oneshot::channel();
        if self.commands.send(Command::Close { done }).is_ok() {
            // an Err here means the session task already exited
            let _ = closed.await;
        }
    }
}

pub struct WebSocketProducer {
    commands: mpsc::UnboundedSender<Command>,
    send_timeout: Duration,
}

#[async_trait]
impl Producer for WebSocketProducer {
    async fn send(&self, record: &OutboundRecord) -> Result<SendAck, ClientError> {
        let frame = ClientFrame::Publish {
            topic: record.topic.clone(),
            payload: record.payload.clone(),
            message_id: Some(record.message_id.clone()),
            qos: Some(PUBLISH_QOS),
            partition: Some(record.partition),
        };
        let frame =
            serde_json::to_string(&frame).map_err(|e| ClientError::Protocol(e.to_string()))?;

        let (reply, answer) = oneshot::channel();
        self.commands
            .send(Command::Publish { frame, reply })
            .map_err(|_| ClientError::Disconnected)?;

        match timeout(self.send_timeout, answer).await {
            Err(_) => Err(ClientError::Timeout(self.send_timeout)),
            Ok(Err(_)) => Err(ClientError::Disconnected),
            Ok(Ok(result)) => result.map(|()| SendAck {
                topic: record.topic.clone(),
                partition: record.partition,
                message_id: record.message_id.clone(),
            }),
        }
    }
}

struct ProducerState {
    events: SessionEvents,
    ready: bool,
    login_deadline: Instant,
}

async fn run_session(
    url: Url,
    client: WebSocketClient,
    events: SessionEvents,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let connecting = timeout(client.session_timeout, connect_async(url.as_str()));
    tokio::pin!(connecting);

    let stream = loop {
        tokio::select! {
            result = &mut connecting => match result {
                Ok(Ok((stream, _response))) => break stream,
                Ok(Err(e)) => {
                    warn!(%url, error = %e, "Broker connection failed");
                    events.emit(SessionEvent::Disconnected);
                    return;
                }
                Err(_) => {
                    warn!(%url, timeout = ?client.session_timeout, "Broker connection timed out");
                    events.emit(SessionEvent::Disconnected);
                    return;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Close { done }) => {
                    let _ = done.send(());
                    return;
                }
                Some(Command::Publish { reply, .. }) => {
                    let _ = reply.send(Err(ClientError::Disconnected));
                }
                Some(Command::StartProducer { events }) => {
                    events.emit(SessionEvent::ProducerError("session is not connected".to_string()));
                }
                None => return,
            },
        }
    };

    info!(%url, "Broker connected");
    events.emit(SessionEvent::Connected);

    let (mut sink, mut source) = stream.split();
    let mut producer: Option<ProducerState> = None;
    let mut last_seen = Instant::now();
    let mut heartbeat = interval_at(Instant::now() + client.session_timeout, client.session_timeout);

    loop {
        let login_deadline = producer
            .as_ref()
            .filter(|p| !p.ready)
            .map(|p| p.login_deadline);

        tokio::select! {
            _ = sleep_until(login_deadline.unwrap_or_else(Instant::now)), if login_deadline.is_some() => {
                if let Some(p) = producer.take() {
                    warn!(%url, timeout = ?client.send_timeout, "Broker did not answer the producer login");
                    p.events.emit(SessionEvent::ProducerError("producer login timed out".to_string()));
                }
            }
            command = commands.recv() => match command {
                Some(Command::Publish { frame, reply }) => {
                    if let Err(e) = sink.send(WsMessage::text(frame)).await {
                        warn!(error = %e, "Failed to write publish frame");
                        let _ = reply.send(Err(ClientError::Disconnected));
                        events.emit(SessionEvent::Disconnected);
                        return;
                    }
                    let _ = reply.send(Ok(()));
                }
                Some(Command::StartProducer { events: producer_events }) => {
                    match &client.credentials {
                        Some((username, password)) => {
                            let login = ClientFrame::Login {
                                username: username.clone(),
                                password: password.clone(),
                            };
                            if !write_frame(&mut sink, &login).await {
                                events.emit(SessionEvent::Disconnected);
                                return;
                            }
                            producer = Some(ProducerState {
                                events: producer_events,
                                ready: false,
                                login_deadline: Instant::now() + client.send_timeout,
                            });
                        }
                        None => {
                            producer_events.emit(SessionEvent::ProducerReady);
                            producer = Some(ProducerState {
                                events: producer_events,
                                ready: true,
                                login_deadline: Instant::now(),
                            });
                        }
                    }
                }
                Some(Command::Close { done }) => {
                    let _ = sink.close().await;
                    let _ = done.send(());
                    debug!(%url, "Broker session closed");
                    return;
                }
                None => {
                    let _ = sink.close().await;
                    return;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    last_seen = Instant::now();
                    match serde_json::from_str::<ServerFrame>(&text) {
                        Ok(ServerFrame::LoginResponse { token }) => {
                            if producer.as_ref().is_some_and(|p| !p.ready)
                                && !write_frame(&mut sink, &ClientFrame::Auth { token }).await
                            {
                                events.emit(SessionEvent::Disconnected);
                                return;
                            }
                        }
                        Ok(ServerFrame::Authenticated {}) => {
                            if let Some(p) = producer.as_mut().filter(|p| !p.ready) {
                                p.ready = true;
                                p.events.emit(SessionEvent::ProducerReady);
                            }
                        }
                        Ok(ServerFrame::Error { message }) => {
                            match producer.take_if(|p| !p.ready) {
                                Some(p) => p.events.emit(SessionEvent::ProducerError(message)),
                                None => warn!(%message, "Broker reported an error"),
                            }
                        }
                        Err(_) => {
                            debug!(frame = %text.chars().take(100).collect::<String>(), "Ignoring unknown broker frame");
                        }
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => {
                    info!(%url, "Broker closed the connection");
                    events.emit(SessionEvent::Disconnected);
                    return;
                }
                Some(Ok(_)) => {
                    last_seen = Instant::now();
                }
                Some(Err(e)) => {
                    warn!(%url, error = %e, "Broker connection lost");
                    events.emit(SessionEvent::Disconnected);
                    return;
                }
            },
            _ = heartbeat.tick() => {
                if last_seen.elapsed() > client.session_timeout * 2 {
                    warn!(%url, "Broker session expired");
                    events.emit(SessionEvent::Expired);
                    return;
                }
                if let Err(e) = sink.send(WsMessage::Ping(Vec::new().into())).await {
                    warn!(error = %e, "Failed to ping broker");
                    events.emit(SessionEvent::Disconnected);
                    return;
                }
            }
        }
    }
}

async fn write_frame<S>(sink: &mut S, frame: &ClientFrame) -> bool
where
    S: Sink<WsMessage> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize frame: {e}");
            return false;
        }
    };
    match sink.send(WsMessage::text(text)).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Failed to write frame");
            false
        }
    }
}
