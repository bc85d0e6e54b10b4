/*
[INPUT]:  JSON text frames exchanged with the server
[OUTPUT]: Parsed Frame values and the TransportEvent stream fed to the controller
[POS]:    Transport layer - wire format
[UPDATE]: When adding frame types or changing the wire shape
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// One JSON text frame on the socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// A single message on a topic, in either direction.
    Message { topic: String, data: Value },
    /// Server history for a topic, oldest first.
    Snapshot { topic: String, data: Vec<Value> },
    /// Client request for a `Snapshot` of a topic.
    SnapshotRequest { topic: String },
}

impl Frame {
    pub fn topic(&self) -> &str {
        match self {
            Frame::Message { topic, .. }
            | Frame::Snapshot { topic, .. }
            | Frame::SnapshotRequest { topic } => topic,
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Inbound frames that the controller cares about.
    pub fn into_event(self) -> Option<TransportEvent> {
        match self {
            Frame::Message { topic, data } => Some(TransportEvent::Message { topic, data }),
            Frame::Snapshot { topic, data } => Some(TransportEvent::Snapshot { topic, data }),
            Frame::SnapshotRequest { .. } => None,
        }
    }
}

/// Everything a transport reports to the connection controller.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected,
    Disconnected,
    Message { topic: String, data: Value },
    Snapshot { topic: String, data: Vec<Value> },
}
