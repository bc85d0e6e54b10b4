/*
[INPUT]:  Topic-tagged payloads to send, raw socket traffic to receive
[OUTPUT]: Transport contract plus WebSocket and in-memory implementations
[POS]:    Transport layer - the only code that touches the wire
[UPDATE]: When adding a transport or changing the frame format
*/

pub mod frame;
pub mod memory;
pub mod ws;

pub use frame::{Frame, TransportEvent};
pub use memory::MemoryTransport;
pub use ws::{ReconnectConfig, WsTransport};

use serde_json::Value;

use crate::error::Result;

/// What the runtime needs from a transport.
///
/// Inbound traffic and lifecycle changes are not pulled through this trait;
/// the event loop feeds them to
/// [`ConnectionController::handle_event`](crate::ConnectionController::handle_event)
/// as [`TransportEvent`]s.
pub trait Transport {
    /// Send one tagged payload. Ordered, at most once, no acknowledgement.
    fn send(&self, topic: &'static str, payload: Value) -> Result<()>;

    /// Ask the peer for its buffered history of `topic`.
    ///
    /// Transports without history support keep the default no-op.
    fn request_snapshot(&self, _topic: &'static str) -> Result<()> {
        Ok(())
    }
}
