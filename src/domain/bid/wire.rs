//! Wire types for bid rows as the remote data store returns them.

use serde::{Deserialize, Serialize};

/// A bid nested inside a listing row.
///
/// Statuses arrive as free-form strings and numbers as plain JSON numbers;
/// both are checked when converting into [`Bid`](super::Bid).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidRecord {
    pub id: String,
    pub trader_id: String,
    #[serde(default)]
    pub trader_name: Option<String>,
    pub amount: serde_json::Number,
    pub quantity: serde_json::Number,
    #[serde(default)]
    pub message: Option<String>,
    /// RFC 3339.
    pub timestamp: String,
    pub status: String,
}
