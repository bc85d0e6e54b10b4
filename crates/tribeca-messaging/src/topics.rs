/*
[INPUT]:  Topic declarations (wire name, payload type, kind, history depth)
[OUTPUT]: Typed topic constants, static topic table, typed channel installation
[POS]:    Registry layer - closed set of message channels
[UPDATE]: When a topic is added; name and payload type are always added together
*/

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::channel::{ErasedChannel, TopicChannel};
use crate::types::{
    ActiveChangeRequest, ActiveState, ApplicationState, CancelAllOrdersRequest,
    ChangeNotepadRequest, CleanAllClosedOrdersRequest, CleanAllOrdersRequest, Notepad,
    OrderRequestFromUi, ProductAdvertisement, ServerMessage,
};

/// Anything that can travel on a topic.
pub trait Payload: Serialize + DeserializeOwned + Clone + fmt::Debug + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + fmt::Debug + 'static {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Server-to-client state; the latest values are buffered and replayed.
    State,
    /// Client-to-server command; never buffered.
    Command,
}

/// Untyped description of a declared topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TopicInfo {
    pub name: &'static str,
    pub kind: TopicKind,
    pub history: usize,
}

/// A named channel statically bound to payload type `T`.
///
/// Values only exist as the constants declared in this module.
pub struct Topic<T> {
    info: TopicInfo,
    _payload: PhantomData<fn() -> T>,
}

impl<T> Topic<T> {
    const fn declare(name: &'static str, kind: TopicKind, history: usize) -> Self {
        Self {
            info: TopicInfo {
                name,
                kind,
                history,
            },
            _payload: PhantomData,
        }
    }

    pub const fn name(&self) -> &'static str {
        self.info.name
    }

    pub const fn kind(&self) -> TopicKind {
        self.info.kind
    }

    /// How many of the latest messages are kept for replay.
    pub const fn history(&self) -> usize {
        self.info.history
    }

    pub const fn info(&self) -> TopicInfo {
        self.info
    }
}

impl<T> Clone for Topic<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Topic<T> {}

impl<T> fmt::Debug for Topic<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Topic")
            .field("name", &self.info.name)
            .field("kind", &self.info.kind)
            .field("payload", &std::any::type_name::<T>())
            .finish()
    }
}

macro_rules! topics {
    (
        $(
            $(#[$meta:meta])*
            $konst:ident: $payload:ty = $name:literal, $kind:ident, history $history:literal;
        )+
    ) => {
        $(
            $(#[$meta])*
            pub const $konst: Topic<$payload> = Topic::declare($name, TopicKind::$kind, $history);
        )+

        /// Every declared topic, in declaration order.
        pub const ALL: &[TopicInfo] = &[$($konst.info()),+];

        pub(crate) fn install_channels() -> Vec<Rc<dyn ErasedChannel>> {
            vec![$(Rc::new(TopicChannel::new($konst)) as Rc<dyn ErasedChannel>),+]
        }
    };
}

topics! {
    /// Exchange, pair and environment the server is trading.
    PRODUCT_ADVERTISEMENT: ProductAdvertisement = "ProductAdvertisement", State, history 1;
    APPLICATION_STATE: ApplicationState = "ApplicationState", State, history 1;
    NOTEPAD: Notepad = "Notepad", State, history 1;
    /// Quoting on/off for the advertised pair.
    ACTIVE_STATE: ActiveState = "ActiveChange", State, history 1;
    /// Operator-facing log lines; the last fifty are replayed.
    MESSAGES: ServerMessage = "Message", State, history 50;

    SUBMIT_NEW_ORDER: OrderRequestFromUi = "SubmitNewOrder", Command, history 0;
    CANCEL_ALL_ORDERS: CancelAllOrdersRequest = "CancelAllOrders", Command, history 0;
    CLEAN_ALL_ORDERS: CleanAllOrdersRequest = "CleanAllOrders", Command, history 0;
    CLEAN_ALL_CLOSED_ORDERS: CleanAllClosedOrdersRequest = "CleanAllClosedOrders", Command, history 0;
    CHANGE_NOTEPAD: ChangeNotepadRequest = "ChangeNotepad", Command, history 0;
    ACTIVE_CHANGE_REQUEST: ActiveChangeRequest = "ActiveChangeRequest", Command, history 0;
}

pub fn lookup(name: &str) -> Option<TopicInfo> {
    ALL.iter().copied().find(|info| info.name == name)
}
