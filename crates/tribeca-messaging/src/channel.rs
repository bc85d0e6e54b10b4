/*
[INPUT]:  Raw topic payloads from the transport, subscription registrations
[OUTPUT]: Decoded, ordered fan-out to active subscription slots with replay buffers
[POS]:    Routing layer - one typed channel per declared topic
[UPDATE]: When delivery ordering, replay, or teardown rules change
*/

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{MessagingError, Result};
use crate::scope::{TeardownKey, WeakScope};
use crate::topics::{Payload, Topic, TopicInfo};

pub(crate) type MessageHandler<T> = Rc<dyn Fn(&T)>;
pub(crate) type BatchHandler<T> = Rc<dyn Fn(&[T])>;
pub(crate) type DisconnectHandler = Rc<dyn Fn()>;

/// Per-subscription state shared between the handle and its channel.
///
/// Handlers are cloned out of their cells before being called, so a handler
/// may re-register, disconnect, or create subscriptions while it runs.
pub(crate) struct SubscriptionSlot<T> {
    id: u64,
    active: Cell<bool>,
    replayed_generation: Cell<Option<u64>>,
    live_generation: Cell<Option<u64>>,
    on_message: RefCell<Option<MessageHandler<T>>>,
    on_batch: RefCell<Option<BatchHandler<T>>>,
    on_disconnect: RefCell<Option<DisconnectHandler>>,
    owner: RefCell<Option<(WeakScope, TeardownKey)>>,
}

impl<T: Payload> SubscriptionSlot<T> {
    fn new(id: u64) -> Self {
        Self {
            id,
            active: Cell::new(true),
            replayed_generation: Cell::new(None),
            live_generation: Cell::new(None),
            on_message: RefCell::new(None),
            on_batch: RefCell::new(None),
            on_disconnect: RefCell::new(None),
            owner: RefCell::new(None),
        }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.get()
    }

    pub(crate) fn bind_owner(&self, scope: WeakScope, key: TeardownKey) {
        if self.is_active() {
            *self.owner.borrow_mut() = Some((scope, key));
        }
    }

    pub(crate) fn set_message_handler(&self, handler: MessageHandler<T>) {
        if self.is_active() {
            *self.on_message.borrow_mut() = Some(handler);
        }
    }

    pub(crate) fn set_batch_handler(&self, handler: BatchHandler<T>) {
        if self.is_active() {
            *self.on_batch.borrow_mut() = Some(handler);
        }
    }

    pub(crate) fn set_disconnect_handler(&self, handler: DisconnectHandler) {
        if self.is_active() {
            *self.on_disconnect.borrow_mut() = Some(handler);
        }
    }

    fn needs_replay(&self, generation: u64) -> bool {
        self.is_active() && self.replayed_generation.get() != Some(generation)
    }

    /// Hand `backlog` to the batch handler unless this generation was already replayed.
    pub(crate) fn offer_replay(&self, backlog: &[T], generation: u64) -> bool {
        if backlog.is_empty() || !self.needs_replay(generation) {
            return false;
        }
        let Some(handler) = self.on_batch.borrow().clone() else {
            return false;
        };

        self.replayed_generation.set(Some(generation));
        handler(backlog);
        true
    }

    /// Hand fresh server state to the batch handler.
    ///
    /// Supersedes a connect-time replay of the local buffer, but never follows
    /// a live message of the same generation.
    fn offer_snapshot(&self, snapshot: &[T], generation: u64) -> bool {
        if snapshot.is_empty()
            || !self.is_active()
            || self.live_generation.get() == Some(generation)
        {
            return false;
        }
        let Some(handler) = self.on_batch.borrow().clone() else {
            return false;
        };

        self.replayed_generation.set(Some(generation));
        handler(snapshot);
        true
    }

    fn deliver_live(&self, message: &T, backlog: &[T], generation: u64) {
        self.live_generation.set(Some(generation));
        if self.needs_replay(generation) {
            // Close the replay window for this generation before the first live message.
            let handler = self.on_batch.borrow().clone();
            self.replayed_generation.set(Some(generation));
            if let Some(handler) = handler
                && !backlog.is_empty()
            {
                handler(backlog);
            }
        }

        if !self.is_active() {
            return;
        }
        let handler = self.on_message.borrow().clone();
        if let Some(handler) = handler {
            handler(message);
        }
    }

    fn notify_disconnect(&self) {
        if !self.is_active() {
            return;
        }
        let handler = self.on_disconnect.borrow().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Deactivate the slot. Returns `false` when it was already inactive.
    pub(crate) fn teardown(&self) -> bool {
        if !self.active.replace(false) {
            return false;
        }

        self.on_message.borrow_mut().take();
        self.on_batch.borrow_mut().take();
        self.on_disconnect.borrow_mut().take();

        let owner = self.owner.borrow_mut().take();
        if let Some((scope, key)) = owner
            && let Some(scope) = scope.upgrade()
        {
            scope.cancel_teardown(key);
        }
        true
    }
}

/// Type-erased view of a [`TopicChannel`], used by the controller for routing.
pub(crate) trait ErasedChannel {
    fn info(&self) -> TopicInfo;

    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;

    /// Decode and fan out one live message.
    fn deliver(&self, data: Value, generation: u64);

    /// Replace the replay buffer with server history and hand it to every slot
    /// that has not taken a live message in `generation`.
    fn load_snapshot(&self, data: Vec<Value>, generation: u64);

    /// Offer the current buffer to every slot that has not replayed in `generation`.
    fn replay(&self, generation: u64);

    /// Fire the disconnect handler of every active slot once.
    fn notify_disconnect(&self);

    fn active_count(&self) -> usize;

    fn buffered_len(&self) -> usize;
}

pub(crate) struct TopicChannel<T> {
    topic: Topic<T>,
    buffer: RefCell<VecDeque<T>>,
    slots: RefCell<Vec<Rc<SubscriptionSlot<T>>>>,
    next_id: Cell<u64>,
}

impl<T: Payload> TopicChannel<T> {
    pub(crate) fn new(topic: Topic<T>) -> Self {
        Self {
            topic,
            buffer: RefCell::new(VecDeque::with_capacity(topic.history())),
            slots: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
        }
    }

    pub(crate) fn topic(&self) -> Topic<T> {
        self.topic
    }

    pub(crate) fn attach(&self) -> Rc<SubscriptionSlot<T>> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let slot = Rc::new(SubscriptionSlot::new(id));
        self.slots.borrow_mut().push(slot.clone());
        slot
    }

    pub(crate) fn buffered(&self) -> Vec<T> {
        self.buffer.borrow().iter().cloned().collect()
    }

    pub(crate) fn replay_to(&self, slot: &SubscriptionSlot<T>, generation: u64) -> bool {
        let backlog = self.buffered();
        slot.offer_replay(&backlog, generation)
    }

    /// Active slots in subscription order; inactive ones are pruned on the way.
    fn live_slots(&self) -> Vec<Rc<SubscriptionSlot<T>>> {
        let mut slots = self.slots.borrow_mut();
        slots.retain(|slot| slot.is_active());
        slots.clone()
    }

    fn remember(&self, message: T) {
        let history = self.topic.history();
        if history == 0 {
            return;
        }
        let mut buffer = self.buffer.borrow_mut();
        buffer.push_back(message);
        while buffer.len() > history {
            buffer.pop_front();
        }
    }

    fn decode(&self, data: Value) -> Option<T> {
        match serde_json::from_value::<T>(data) {
            Ok(message) => Some(message),
            Err(err) => {
                warn!(topic = self.topic.name(), error = %err, "dropping undecodable payload");
                None
            }
        }
    }
}

impl<T: Payload> ErasedChannel for TopicChannel<T> {
    fn info(&self) -> TopicInfo {
        self.topic.info()
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }

    fn deliver(&self, data: Value, generation: u64) {
        let Some(message) = self.decode(data) else {
            return;
        };

        let slots = self.live_slots();
        let backlog = if slots.iter().any(|slot| slot.needs_replay(generation)) {
            self.buffered()
        } else {
            Vec::new()
        };
        self.remember(message.clone());

        for slot in slots {
            slot.deliver_live(&message, &backlog, generation);
        }
    }

    fn load_snapshot(&self, data: Vec<Value>, generation: u64) {
        let decoded: Vec<T> = data.into_iter().filter_map(|value| self.decode(value)).collect();
        let history = self.topic.history();
        {
            let mut buffer = self.buffer.borrow_mut();
            buffer.clear();
            let skip = decoded.len().saturating_sub(history);
            buffer.extend(decoded.into_iter().skip(skip));
        }
        let snapshot = self.buffered();
        debug!(topic = self.topic.name(), buffered = snapshot.len(), "snapshot loaded");
        if snapshot.is_empty() {
            return;
        }
        for slot in self.live_slots() {
            slot.offer_snapshot(&snapshot, generation);
        }
    }

    fn replay(&self, generation: u64) {
        let backlog = self.buffered();
        if backlog.is_empty() {
            return;
        }
        for slot in self.live_slots() {
            slot.offer_replay(&backlog, generation);
        }
    }

    fn notify_disconnect(&self) {
        for slot in self.live_slots() {
            slot.notify_disconnect();
        }
    }

    fn active_count(&self) -> usize {
        self.slots
            .borrow()
            .iter()
            .filter(|slot| slot.is_active())
            .count()
    }

    fn buffered_len(&self) -> usize {
        self.buffer.borrow().len()
    }
}

/// The fixed set of typed channels, one per declared topic.
pub(crate) struct ChannelRegistry {
    channels: Vec<Rc<dyn ErasedChannel>>,
}

impl ChannelRegistry {
    pub(crate) fn new(channels: Vec<Rc<dyn ErasedChannel>>) -> Result<Self> {
        for (index, channel) in channels.iter().enumerate() {
            let name = channel.info().name;
            if channels[..index].iter().any(|other| other.info().name == name) {
                return Err(MessagingError::DuplicateTopic(name));
            }
        }
        Ok(Self { channels })
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Rc<dyn ErasedChannel>> {
        self.channels.iter()
    }

    pub(crate) fn find(&self, name: &str) -> Option<&Rc<dyn ErasedChannel>> {
        self.channels.iter().find(|channel| channel.info().name == name)
    }

    pub(crate) fn typed<T: Payload>(&self, topic: Topic<T>) -> Result<Rc<TopicChannel<T>>> {
        let channel = self
            .find(topic.name())
            .ok_or_else(|| MessagingError::UnknownTopic(topic.name().to_string()))?;

        channel
            .clone()
            .into_any()
            .downcast::<TopicChannel<T>>()
            .map_err(|_| MessagingError::PayloadMismatch {
                topic: topic.name(),
                expected: std::any::type_name::<T>(),
            })
    }
}
