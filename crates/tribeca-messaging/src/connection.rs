/*
[INPUT]:  Transport lifecycle and data events, reset hook registrations
[OUTPUT]: Connection state observable via `watch`, ordered fan-out of connect/disconnect/reset
[POS]:    Root of the messaging runtime - owns the channel registry and the transport handle
[UPDATE]: When changing reconnect semantics, generation rules, or reset ordering
*/

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::channel::{ChannelRegistry, TopicChannel};
use crate::error::Result;
use crate::publisher::PublisherFactory;
use crate::scope::Scope;
use crate::subscription::SubscriptionFactory;
use crate::topics::{self, Payload, Topic, TopicKind};
use crate::transport::{Transport, TransportEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connected,
}

/// Process-wide connection flag plus the number of disconnects seen so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub generation: u64,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self.status, ConnectionStatus::Connected)
    }
}

/// Why per-connection state is being cleared. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    Startup,
    Disconnect,
    Teardown,
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResetReason::Startup => "startup",
            ResetReason::Disconnect => "disconnect",
            ResetReason::Teardown => "teardown",
        })
    }
}

type ResetHook = Rc<dyn Fn(ResetReason)>;

struct ControllerInner {
    transport: Rc<dyn Transport>,
    registry: ChannelRegistry,
    state: watch::Sender<ConnectionState>,
    reset_hooks: RefCell<BTreeMap<u64, ResetHook>>,
    next_hook: Cell<u64>,
}

/// Connection lifecycle controller.
///
/// All methods must be called from the single event-loop thread; the type is
/// deliberately `!Send`.
#[derive(Clone)]
pub struct ConnectionController {
    inner: Rc<ControllerInner>,
}

impl ConnectionController {
    pub fn new(transport: Rc<dyn Transport>) -> Result<Self> {
        let registry = ChannelRegistry::new(topics::install_channels())?;
        let (state, _rx) = watch::channel(ConnectionState::default());

        Ok(Self {
            inner: Rc::new(ControllerInner {
                transport,
                registry,
                state,
                reset_hooks: RefCell::new(BTreeMap::new()),
                next_hook: Cell::new(0),
            }),
        })
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn generation(&self) -> u64 {
        self.state().generation
    }

    /// Observe connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn subscription_factory(&self) -> SubscriptionFactory {
        SubscriptionFactory::new(self)
    }

    pub fn publisher_factory(&self) -> PublisherFactory {
        PublisherFactory::new(self)
    }

    /// Run `hook` on every reset until `scope` is torn down.
    pub fn on_reset(&self, scope: &Scope, hook: impl Fn(ResetReason) + 'static) {
        let id = self.inner.next_hook.get();
        self.inner.next_hook.set(id + 1);
        self.inner.reset_hooks.borrow_mut().insert(id, Rc::new(hook));

        let inner = Rc::downgrade(&self.inner);
        scope.register_on_teardown(move || {
            if let Some(inner) = inner.upgrade() {
                inner.reset_hooks.borrow_mut().remove(&id);
            }
        });
    }

    /// Clear all per-connection derived state through the registered hooks.
    pub fn reset(&self, reason: ResetReason) {
        let hooks: Vec<ResetHook> = self.inner.reset_hooks.borrow().values().cloned().collect();
        debug!(%reason, hooks = hooks.len(), "reset");
        for hook in hooks {
            hook(reason);
        }
    }

    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Disconnected => self.on_disconnected(),
            TransportEvent::Message { topic, data } => self.route_message(&topic, data),
            TransportEvent::Snapshot { topic, data } => self.route_snapshot(&topic, data),
        }
    }

    /// Active subscriptions across every topic.
    pub fn active_subscriptions(&self) -> usize {
        self.inner
            .registry
            .iter()
            .map(|channel| channel.active_count())
            .sum()
    }

    /// Messages currently buffered for replay on the named topic.
    pub fn buffered_len(&self, topic: &str) -> usize {
        self.inner
            .registry
            .find(topic)
            .map(|channel| channel.buffered_len())
            .unwrap_or(0)
    }

    pub(crate) fn transport(&self) -> &Rc<dyn Transport> {
        &self.inner.transport
    }

    pub(crate) fn channel<T: Payload>(&self, topic: Topic<T>) -> Result<Rc<TopicChannel<T>>> {
        self.inner.registry.typed(topic)
    }

    fn on_connected(&self) {
        let changed = self.inner.state.send_if_modified(|state| {
            if state.is_connected() {
                return false;
            }
            state.status = ConnectionStatus::Connected;
            true
        });
        if !changed {
            debug!("connect event while already connected");
            return;
        }

        let generation = self.generation();
        info!(generation, "transport connected");

        let channels: Vec<_> = self.inner.registry.iter().cloned().collect();
        for channel in &channels {
            channel.replay(generation);
        }

        for channel in channels
            .iter()
            .filter(|channel| channel.info().kind == TopicKind::State)
        {
            let topic = channel.info().name;
            if let Err(err) = self.inner.transport.request_snapshot(topic) {
                warn!(topic, error = %err, "snapshot request failed");
            }
        }
    }

    fn on_disconnected(&self) {
        let changed = self.inner.state.send_if_modified(|state| {
            if !state.is_connected() {
                return false;
            }
            state.status = ConnectionStatus::Disconnected;
            state.generation += 1;
            true
        });
        if !changed {
            debug!("disconnect event while already disconnected");
            return;
        }

        info!(generation = self.generation(), "transport disconnected");

        let channels: Vec<_> = self.inner.registry.iter().cloned().collect();
        for channel in channels {
            channel.notify_disconnect();
        }

        self.reset(ResetReason::Disconnect);
    }

    fn route_message(&self, topic: &str, data: Value) {
        let state = self.state();
        if !state.is_connected() {
            debug!(topic, "dropping message received while disconnected");
            return;
        }
        let Some(channel) = self.inner.registry.find(topic).cloned() else {
            debug!(topic, "dropping message for unknown topic");
            return;
        };
        channel.deliver(data, state.generation);
    }

    fn route_snapshot(&self, topic: &str, data: Vec<Value>) {
        let state = self.state();
        if !state.is_connected() {
            debug!(topic, "dropping snapshot received while disconnected");
            return;
        }
        let Some(channel) = self.inner.registry.find(topic).cloned() else {
            debug!(topic, "dropping snapshot for unknown topic");
            return;
        };
        channel.load_snapshot(data, state.generation);
    }
}

impl fmt::Debug for ConnectionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionController")
            .field("state", &self.state())
            .field("active_subscriptions", &self.active_subscriptions())
            .finish()
    }
}
