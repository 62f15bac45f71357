//! Event envelope for the realtime channel.
//!
//! Everything on the wire is `{type, data, timestamp}`. The payload under
//! `data` belongs to the server and the embedding application; this layer
//! never looks inside it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One realtime event, inbound or outbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event tag, e.g. `ticket_updated`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Opaque payload
    #[serde(default)]
    pub data: Value,
    /// When the sender produced the event
    pub timestamp: DateTime<Utc>,
}

impl EventEnvelope {
    /// Build an envelope stamped with the current time.
    pub fn now(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            timestamp: Utc::now(),
        }
    }

    /// Parse a wire frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Serialize for the wire.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
