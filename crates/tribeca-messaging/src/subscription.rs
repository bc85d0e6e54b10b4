/*
[INPUT]:  Owner scopes and typed topics requested by UI components
[OUTPUT]: Scope-bound subscription handles with message/batch/disconnect callbacks
[POS]:    Consumer API - the only way widgets receive server state
[UPDATE]: When handler registration or teardown semantics change
*/

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::channel::{SubscriptionSlot, TopicChannel};
use crate::connection::ConnectionController;
use crate::error::Result;
use crate::scope::Scope;
use crate::topics::{Payload, Topic};

/// Creates subscriptions whose lifetime is tied to an owner [`Scope`].
#[derive(Clone, Debug)]
pub struct SubscriptionFactory {
    controller: ConnectionController,
}

impl SubscriptionFactory {
    pub fn new(controller: &ConnectionController) -> Self {
        Self {
            controller: controller.clone(),
        }
    }

    /// Subscribe to `topic` for as long as `scope` lives.
    ///
    /// Destroying `scope` disconnects the subscription.
    pub fn get_subscription<T: Payload>(
        &self,
        scope: &Scope,
        topic: Topic<T>,
    ) -> Result<Subscription<T>> {
        let channel = self.controller.channel(topic)?;
        let slot = channel.attach();

        let weak_slot = Rc::downgrade(&slot);
        let key = scope.register_on_teardown(move || {
            if let Some(slot) = weak_slot.upgrade() {
                slot.teardown();
            }
        });
        slot.bind_owner(scope.downgrade(), key);

        debug!(
            topic = topic.name(),
            scope = scope.name(),
            id = slot.id(),
            "subscription created"
        );

        Ok(Subscription {
            slot,
            channel,
            controller: self.controller.clone(),
        })
    }
}

/// Live, revocable binding from a topic to callbacks.
///
/// Registration methods replace earlier registrations and return `&Self`
/// so they can be chained.
pub struct Subscription<T: Payload> {
    slot: Rc<SubscriptionSlot<T>>,
    channel: Rc<TopicChannel<T>>,
    controller: ConnectionController,
}

impl<T: Payload> Subscription<T> {
    pub fn topic(&self) -> Topic<T> {
        self.channel.topic()
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }

    pub fn on_message(&self, handler: impl Fn(&T) + 'static) -> &Self {
        self.slot.set_message_handler(Rc::new(handler));
        self
    }

    /// Register the replay callback.
    ///
    /// It receives the buffered messages at most once per connection
    /// generation, before any live message of that generation. When the
    /// transport is already connected and state is buffered, it runs before
    /// this method returns.
    pub fn on_batch(&self, handler: impl Fn(&[T]) + 'static) -> &Self {
        self.slot.set_batch_handler(Rc::new(handler));

        let state = self.controller.state();
        if state.is_connected() {
            self.channel.replay_to(&self.slot, state.generation);
        }
        self
    }

    /// Called once for every transport disconnect while this subscription is active.
    pub fn on_disconnect(&self, handler: impl Fn() + 'static) -> &Self {
        self.slot.set_disconnect_handler(Rc::new(handler));
        self
    }

    /// Stop all deliveries. Returns `true` only for the call that did the teardown.
    pub fn disconnect(&self) -> bool {
        let torn_down = self.slot.teardown();
        if torn_down {
            debug!(topic = self.topic().name(), id = self.slot.id(), "subscription disconnected");
        }
        torn_down
    }
}

impl<T: Payload> Clone for Subscription<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            channel: self.channel.clone(),
            controller: self.controller.clone(),
        }
    }
}

impl<T: Payload> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic().name())
            .field("id", &self.slot.id())
            .field("active", &self.is_active())
            .finish()
    }
}
