/*
[INPUT]:  ActiveChange state for the advertised pair, operator quoting toggles
[OUTPUT]: Per-pair view state and ActiveChangeRequest commands
[POS]:    View component - transient, recreated on every product advertisement
[UPDATE]: When per-pair widgets gain subscriptions or commands
*/

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use tracing::debug;
use tribeca_messaging::topics::{ACTIVE_CHANGE_REQUEST, ACTIVE_STATE};
use tribeca_messaging::{
    ActiveChangeRequest, ActiveState, Publisher, PublisherFactory, Scope, SubscriptionFactory,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairView {
    /// Last quoting state reported by the server.
    pub active: Option<bool>,
    /// Cleared when the transport drops.
    pub connected: bool,
}

/// Per-pair view owned by the main window.
///
/// Everything it subscribes to lives in a child scope of the window, so
/// [`DisplayPair::dispose`] and window teardown release the same resources.
#[derive(Debug)]
pub struct DisplayPair {
    name: String,
    scope: Scope,
    view: Rc<RefCell<PairView>>,
    active_publisher: Publisher<ActiveChangeRequest>,
}

impl DisplayPair {
    pub fn new(
        parent: &Scope,
        name: impl Into<String>,
        subscriptions: &SubscriptionFactory,
        publishers: &PublisherFactory,
    ) -> Result<Self> {
        let name = name.into();
        let scope = parent.child(format!("pair:{name}"));
        let view = Rc::new(RefCell::new(PairView {
            active: None,
            connected: true,
        }));

        let on_message = Rc::downgrade(&view);
        let on_batch = Rc::downgrade(&view);
        let on_disconnect = Rc::downgrade(&view);
        subscriptions
            .get_subscription(&scope, ACTIVE_STATE)?
            .on_message(move |state: &ActiveState| {
                if let Some(view) = on_message.upgrade() {
                    view.borrow_mut().active = Some(state.active);
                }
            })
            .on_batch(move |states: &[ActiveState]| {
                if let Some(view) = on_batch.upgrade()
                    && let Some(state) = states.last()
                {
                    view.borrow_mut().active = Some(state.active);
                }
            })
            .on_disconnect(move || {
                if let Some(view) = on_disconnect.upgrade() {
                    let mut view = view.borrow_mut();
                    view.connected = false;
                    view.active = None;
                }
            });

        debug!(pair = %name, "pair view created");
        Ok(Self {
            name,
            scope,
            view,
            active_publisher: publishers.get_publisher(ACTIVE_CHANGE_REQUEST),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn view(&self) -> PairView {
        self.view.borrow().clone()
    }

    pub fn is_disposed(&self) -> bool {
        self.scope.is_destroyed()
    }

    /// Ask the server to switch quoting on or off.
    pub fn request_active(&self, active: bool) -> bool {
        self.active_publisher.send(&ActiveChangeRequest { active })
    }

    /// Ask for the opposite of the last reported quoting state.
    pub fn toggle_active(&self) -> bool {
        let active = self.view.borrow().active.unwrap_or(false);
        self.request_active(!active)
    }

    /// Release every subscription of this view. Idempotent.
    pub fn dispose(&self) {
        if !self.scope.is_destroyed() {
            debug!(pair = %self.name, "pair view disposed");
        }
        self.scope.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tribeca_messaging::{ConnectionController, MemoryTransport, TransportEvent};

    fn setup() -> (ConnectionController, Rc<MemoryTransport>, Scope) {
        let transport = Rc::new(MemoryTransport::new());
        let controller = ConnectionController::new(transport.clone()).unwrap();
        controller.handle_event(TransportEvent::Connected);
        (controller, transport, Scope::new("window"))
    }

    fn active(value: bool) -> TransportEvent {
        TransportEvent::Message {
            topic: "ActiveChange".into(),
            data: json!({ "active": value }),
        }
    }

    #[test]
    fn test_tracks_active_state() {
        let (controller, _, window) = setup();
        let pair = DisplayPair::new(
            &window,
            "BTC/USD",
            &controller.subscription_factory(),
            &controller.publisher_factory(),
        )
        .unwrap();
        assert_eq!(pair.view().active, None);

        controller.handle_event(active(true));
        assert_eq!(pair.view().active, Some(true));
    }

    #[test]
    fn test_replays_buffered_state_on_creation() {
        let (controller, _, window) = setup();
        controller.handle_event(active(true));

        let pair = DisplayPair::new(
            &window,
            "BTC/USD",
            &controller.subscription_factory(),
            &controller.publisher_factory(),
        )
        .unwrap();
        assert_eq!(pair.view().active, Some(true));
    }

    #[test]
    fn test_toggle_requests_opposite_state() {
        let (controller, transport, window) = setup();
        let pair = DisplayPair::new(
            &window,
            "BTC/USD",
            &controller.subscription_factory(),
            &controller.publisher_factory(),
        )
        .unwrap();
        controller.handle_event(active(true));

        assert!(pair.toggle_active());
        assert_eq!(
            transport.sent_on("ActiveChangeRequest"),
            vec![json!({ "active": false })]
        );
    }

    #[test]
    fn test_dispose_and_parent_teardown_release_subscription() {
        let (controller, _, window) = setup();
        let factory = controller.subscription_factory();
        let publishers = controller.publisher_factory();

        let pair = DisplayPair::new(&window, "BTC/USD", &factory, &publishers).unwrap();
        assert_eq!(controller.active_subscriptions(), 1);
        pair.dispose();
        pair.dispose();
        assert!(pair.is_disposed());
        assert_eq!(controller.active_subscriptions(), 0);

        let second = DisplayPair::new(&window, "ETH/USD", &factory, &publishers).unwrap();
        window.destroy();
        assert!(second.is_disposed());
        assert_eq!(controller.active_subscriptions(), 0);
    }
}
