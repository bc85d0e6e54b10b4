/*
[INPUT]:  Server state broadcast schemas and serde requirements
[OUTPUT]: Typed payloads for state topics
[POS]:    Data layer - type definitions for topic payloads
[UPDATE]: When a state topic is added or its schema changes
*/

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{Currency, Exchange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    pub base: Currency,
    pub quote: Currency,
}

impl CurrencyPair {
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Announces which exchange and pair the server is trading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductAdvertisement {
    pub exchange: Exchange,
    pub pair: CurrencyPair,
    pub environment: String,
}

/// Periodic process health sample from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationState {
    /// Resident memory in bytes.
    pub memory: u64,
    /// Server wall-clock hour, 0..=23.
    pub hour: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Notepad {
    pub content: String,
}

/// Whether quoting is enabled for the advertised pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveState {
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerMessage {
    pub text: String,
    pub time: DateTime<Utc>,
}
