//! Shared newtypes and utilities used across all domain modules.
//!
//! Id types are serialization-transparent: they serialize/deserialize as the
//! plain strings the remote data store uses, so raw records and domain types
//! can share them without conversion.

pub mod money;

pub use money::{round_currency, round_whole};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::str::FromStr;

// ─── Ids ─────────────────────────────────────────────────────────────────────

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl FromStr for $name {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok($name(s.to_string()))
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                Ok($name(s))
            }
        }
    };
}

string_id!(
    /// Identifier of a produce listing.
    ListingId
);
string_id!(
    /// Identifier of a bid against a listing.
    BidId
);
string_id!(
    /// Identifier of a settled deal.
    DealId
);
string_id!(
    /// Identifier of a fulfillment transaction.
    TransactionId
);
string_id!(
    /// Identifier of a dispute raised against a transaction.
    DisputeId
);
string_id!(
    /// Identifier of a farmer, trader or admin account.
    UserId
);

/// Generate a fresh id: `{prefix}_{16 hex chars}`.
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{}_{}", prefix, hex::encode(rand::random::<[u8; 8]>()))
}

// ─── Unit ────────────────────────────────────────────────────────────────────

/// Unit a listing's quantity and per-unit prices are expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Kg,
    #[default]
    Quintal,
    Ton,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::Kg => "kg",
            Unit::Quintal => "quintal",
            Unit::Ton => "ton",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "kg" => Some(Unit::Kg),
            "quintal" => Some(Unit::Quintal),
            "ton" => Some(Unit::Ton),
            _ => None,
        }
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
