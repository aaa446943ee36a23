//! Ingress adapter
//!
//! Turns an inbound publish request (topic + arbitrary JSON payload) into a
//! [`Message`] and hands it to the bridge. The acknowledgement means
//! "accepted for a delivery attempt", never "delivered": it is returned
//! before any send, buffering outcome or retry is known.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::bridge::{Bridge, Message};
use crate::utils::error::{BridgeError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub message_id: String,
}

pub fn accept(bridge: &Bridge, topic: &str, payload: Value) -> Result<Acknowledgement> {
    if topic.trim().is_empty() {
        warn!("Rejecting publish request without topic");
        return Err(BridgeError::MalformedRequest(
            "topic must not be empty".to_string(),
        ));
    }

    debug!(%topic, %payload, "Incoming publish request");

    let message = Message::new(topic, payload);
    let message_id = message.message_id().to_string();
    let route = bridge.publish(message);
    debug!(%topic, id = %message_id, ?route, "Publish request accepted");

    Ok(Acknowledgement { message_id })
}
