//! Wire types for listing rows as the remote data store returns them.

use crate::domain::bid::wire::BidRecord;
use serde::{Deserialize, Serialize};

/// A produce listing row with its bids nested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListingRecord {
    pub id: String,
    pub farmer_id: String,
    /// Crop name.
    pub name: String,
    #[serde(default)]
    pub variety: Option<String>,
    pub quantity: serde_json::Number,
    pub unit: String,
    pub base_price: serde_json::Number,
    /// Stored copy of the derived price; recomputed on conversion.
    #[serde(default)]
    pub current_price: Option<serde_json::Number>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    /// `YYYY-MM-DD`.
    #[serde(default)]
    pub harvest_date: Option<String>,
    /// RFC 3339.
    pub created_at: String,
    pub status: String,
    #[serde(default)]
    pub bids: Vec<BidRecord>,
}
