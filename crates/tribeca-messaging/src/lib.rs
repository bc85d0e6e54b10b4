/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public messaging runtime crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

//! Topic-based publish/subscribe client runtime.
//!
//! A [`ConnectionController`] owns the transport handle and the fixed set of
//! typed topic channels. Widgets obtain [`Subscription`]s and [`Publisher`]s
//! from the factories and never touch the transport. Every subscription is
//! bound to a [`Scope`]; destroying the scope disconnects it.
//!
//! The runtime is single-threaded: drive it from one task (usually inside a
//! `tokio::task::LocalSet`) by feeding [`TransportEvent`]s to
//! [`ConnectionController::handle_event`].

mod channel;
pub mod connection;
pub mod error;
pub mod publisher;
pub mod schedule;
pub mod scope;
pub mod subscription;
pub mod topics;
pub mod transport;
pub mod types;

pub use connection::{ConnectionController, ConnectionState, ConnectionStatus, ResetReason};
pub use error::{MessagingError, Result};
pub use publisher::{Publisher, PublisherFactory};
pub use schedule::{ScheduledTask, schedule};
pub use scope::{Scope, TeardownKey, WeakScope};
pub use subscription::{Subscription, SubscriptionFactory};
pub use topics::{Payload, Topic, TopicInfo, TopicKind};
pub use transport::{
    Frame, MemoryTransport, ReconnectConfig, Transport, TransportEvent, WsTransport,
};

// Re-export all types
pub use types::*;
