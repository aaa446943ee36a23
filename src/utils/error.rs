//! Error taxonomy for the bridge.
//!
//! Only [`BridgeError::MalformedRequest`] is ever reported to an HTTP caller.
//! Every broker-side failure is absorbed by the bridge and turned into
//! buffering plus a reconnect-triggered drain, because the caller has already
//! been acknowledged by the time the broker is involved.

use thiserror::Error;

use crate::client::ClientError;

pub type Result<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    /// The connection is down or the producer is not ready yet. Recovered by
    /// buffering the message and draining once the broker is reachable again.
    #[error("broker unavailable: {0}")]
    TransientBrokerUnavailable(String),

    /// The broker returned an explicit error, or gave no answer in time,
    /// while connected. The message is requeued.
    ///
    /// A send that timed out may still have been written by the broker, so
    /// requeueing it can produce a duplicate broker-side write. Delivery is
    /// at-least-once at best and is not guaranteed either way.
    #[error("broker rejected send: {0}")]
    SendRejected(String),

    /// The inbound request could not be turned into a message (empty topic,
    /// undecodable body). The only category visible outside the bridge.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The producer reported an error before it became ready. Treated as a
    /// lost connection; the next publish triggers a fresh reconnect.
    #[error("producer failed to initialize: {0}")]
    ProducerInitializationFailure(String),
}

impl BridgeError {
    /// Whether the error may be shown to the party that submitted the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, BridgeError::MalformedRequest(_))
    }
}

impl From<ClientError> for BridgeError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Disconnected => BridgeError::TransientBrokerUnavailable(err.to_string()),
            ClientError::Timeout(_) | ClientError::Rejected(_) | ClientError::Protocol(_) => {
                BridgeError::SendRejected(err.to_string())
            }
        }
    }
}
