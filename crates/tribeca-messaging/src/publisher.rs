/*
[INPUT]:  Typed command values from UI components
[OUTPUT]: Fire-and-forget topic-tagged frames handed to the transport
[POS]:    Producer API - the only way widgets send commands
[UPDATE]: When command delivery semantics change (e.g. queueing while offline)
*/

use std::fmt;

use tracing::{debug, warn};

use crate::connection::ConnectionController;
use crate::topics::{Payload, Topic};

#[derive(Clone, Debug)]
pub struct PublisherFactory {
    controller: ConnectionController,
}

impl PublisherFactory {
    pub fn new(controller: &ConnectionController) -> Self {
        Self {
            controller: controller.clone(),
        }
    }

    pub fn get_publisher<T: Payload>(&self, topic: Topic<T>) -> Publisher<T> {
        Publisher {
            topic,
            controller: self.controller.clone(),
        }
    }
}

/// Sends commands on one topic.
pub struct Publisher<T> {
    topic: Topic<T>,
    controller: ConnectionController,
}

impl<T: Payload> Publisher<T> {
    pub fn topic(&self) -> Topic<T> {
        self.topic
    }

    /// Hand `message` to the transport.
    ///
    /// Returns `false` when the command was dropped: while disconnected there
    /// is nobody to receive it, and transport failures are only logged.
    pub fn send(&self, message: &T) -> bool {
        let topic = self.topic.name();
        if !self.controller.is_connected() {
            debug!(topic, "dropping command while disconnected");
            return false;
        }

        let payload = match serde_json::to_value(message) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(topic, error = %err, "command serialization failed");
                return false;
            }
        };

        match self.controller.transport().send(topic, payload) {
            Ok(()) => {
                debug!(topic, "command sent");
                true
            }
            Err(err) => {
                warn!(topic, error = %err, "command send failed");
                false
            }
        }
    }
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            topic: self.topic,
            controller: self.controller.clone(),
        }
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("topic", &self.topic.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    use crate::topics::{CANCEL_ALL_ORDERS, CHANGE_NOTEPAD};
    use crate::transport::{Frame, MemoryTransport, TransportEvent};
    use crate::types::{CancelAllOrdersRequest, ChangeNotepadRequest};

    fn setup() -> (PublisherFactory, ConnectionController, Rc<MemoryTransport>) {
        let transport = Rc::new(MemoryTransport::new());
        let controller = ConnectionController::new(transport.clone()).unwrap();
        (controller.publisher_factory(), controller, transport)
    }

    #[test]
    fn test_send_while_disconnected_is_dropped() {
        let (factory, _controller, transport) = setup();
        let publisher = factory.get_publisher(CANCEL_ALL_ORDERS);

        assert!(!publisher.send(&CancelAllOrdersRequest::default()));
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_send_while_connected_tags_topic() {
        let (factory, controller, transport) = setup();
        controller.handle_event(TransportEvent::Connected);
        transport.take_sent();

        let publisher = factory.get_publisher(CHANGE_NOTEPAD);
        assert!(publisher.send(&ChangeNotepadRequest {
            content: "buy the dip".into(),
        }));

        assert_eq!(
            transport.sent(),
            vec![Frame::Message {
                topic: "ChangeNotepad".into(),
                data: serde_json::json!({ "content": "buy the dip" }),
            }]
        );
    }

    #[test]
    fn test_transport_failure_is_swallowed() {
        let (factory, controller, transport) = setup();
        controller.handle_event(TransportEvent::Connected);
        transport.fail_sends(true);

        let publisher = factory.get_publisher(CANCEL_ALL_ORDERS);
        assert!(!publisher.send(&CancelAllOrdersRequest::default()));
    }
}
