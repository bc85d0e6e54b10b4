/*
[INPUT]:  Trading enumerations shared with the server
[OUTPUT]: Typed Rust enums with serialization support and static variant name lists
[POS]:    Data layer - type definitions for topic payloads
[UPDATE]: When a server enumeration gains or loses members
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a name does not match any declared variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a wire enumeration together with its ordered variant table.
///
/// UI option lists are built from `VARIANTS`, so the order of the arms is the
/// order the user sees.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $label)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const VARIANTS: &'static [&'static str] = &[$($label),+];

            pub const fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let s = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|variant| variant.as_str().eq_ignore_ascii_case(s))
                    .ok_or_else(|| UnknownVariant {
                        kind: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }
    };
}

named_enum! {
    pub enum Side {
        Bid => "Bid",
        Ask => "Ask",
    }
}

named_enum! {
    pub enum TimeInForce {
        Ioc => "IOC",
        Fok => "FOK",
        Gtc => "GTC",
    }
}

named_enum! {
    pub enum OrderType {
        Limit => "Limit",
        Market => "Market",
    }
}

named_enum! {
    pub enum Exchange {
        Null => "Null",
        HitBtc => "HitBtc",
        OkCoin => "OkCoin",
        AtlasAts => "AtlasAts",
        BtcChina => "BtcChina",
        Coinbase => "Coinbase",
        Bitfinex => "Bitfinex",
    }
}

named_enum! {
    pub enum Currency {
        Usd => "USD",
        Btc => "BTC",
        Ltc => "LTC",
        Eur => "EUR",
        Gbp => "GBP",
        Cny => "CNY",
        Eth => "ETH",
        Bfx => "BFX",
        Rrt => "RRT",
        Zec => "ZEC",
    }
}
