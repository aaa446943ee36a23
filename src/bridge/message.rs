//! Message definitions for the bridge
//!
//! `Message` is the canonical record created by the ingress adapter for every
//! accepted publish request. It is immutable once created; the dispatcher
//! only ever clones it or turns it into an [`OutboundRecord`].
//!
//! Notes on fields:
//! - `topic`: caller-supplied topic name, never empty
//! - `payload`: arbitrary JSON document, serialized only when sent
//! - `message_id`: generated UUID, carried to the broker so duplicates caused
//!   by requeued sends can be recognised downstream
//! - `accepted_at`: milliseconds since UNIX epoch at acceptance

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::client::OutboundRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    topic: String,
    payload: Value,
    message_id: String,
    accepted_at: i64,
}

impl Message {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
            message_id: Uuid::new_v4().to_string(),
            accepted_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn accepted_at(&self) -> i64 {
        self.accepted_at
    }

    /// The broker-facing form of this message, payload serialized as JSON text.
    pub fn to_record(&self, partition: u32) -> OutboundRecord {
        OutboundRecord {
            topic: self.topic.clone(),
            payload: self.payload.to_string(),
            partition,
            message_id: self.message_id.clone(),
        }
    }
}
