//! Listing domain: produce offered for sale and the bids it owns.

mod convert;
pub mod state;
pub mod wire;

use crate::domain::bid::{Bid, BidStatus};
use crate::error::MarketError;
use crate::shared::{BidId, ListingId, Unit, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use convert::ListingValidationError;

// ─── ListingStatus ───────────────────────────────────────────────────────────

/// Listing lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Active,
    Bidding,
    Sold,
    Expired,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Bidding => "bidding",
            ListingStatus::Sold => "sold",
            ListingStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ListingStatus::Active),
            "bidding" => Some(ListingStatus::Bidding),
            "sold" => Some(ListingStatus::Sold),
            "expired" => Some(ListingStatus::Expired),
            _ => None,
        }
    }

    /// Whether the listing still takes bids and can be settled.
    pub fn is_open(&self) -> bool {
        matches!(self, ListingStatus::Active | ListingStatus::Bidding)
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── NewListing ──────────────────────────────────────────────────────────────

/// What a farmer fills in to put produce up for bidding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewListing {
    pub owner_id: UserId,
    pub crop_name: String,
    pub variety: Option<String>,
    pub quantity: Decimal,
    pub unit: Unit,
    pub base_price: Decimal,
    pub description: Option<String>,
    pub location: Option<String>,
    pub harvest_date: Option<NaiveDate>,
}

// ─── Listing ─────────────────────────────────────────────────────────────────

/// A farmer's produce offer open for bidding.
///
/// `current_price` and `status` are only changed through the bid book
/// operations in [`state`], which keep `current_price >= base_price` and make
/// a sold listing immutable. Stored rows come back in through
/// `ListingRecord`, never by deserializing this type directly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub id: ListingId,
    pub owner_id: UserId,
    pub crop_name: String,
    pub variety: Option<String>,
    pub quantity: Decimal,
    pub unit: Unit,
    pub base_price: Decimal,
    pub description: Option<String>,
    pub location: Option<String>,
    pub harvest_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub(crate) current_price: Decimal,
    pub(crate) status: ListingStatus,
    pub(crate) bids: Vec<Bid>,
}

impl Listing {
    pub fn new(id: ListingId, new: NewListing, now: DateTime<Utc>) -> Result<Self, MarketError> {
        if new.crop_name.trim().is_empty() {
            return Err(MarketError::invalid_state("crop name is required"));
        }
        if new.quantity <= Decimal::ZERO {
            return Err(MarketError::invalid_state(format!(
                "quantity must be positive, got {}",
                new.quantity
            )));
        }
        if new.base_price <= Decimal::ZERO {
            return Err(MarketError::invalid_state(format!(
                "base price must be positive, got {}",
                new.base_price
            )));
        }

        Ok(Self {
            id,
            owner_id: new.owner_id,
            crop_name: new.crop_name.trim().to_string(),
            variety: new.variety,
            quantity: new.quantity,
            unit: new.unit,
            base_price: new.base_price,
            description: new.description,
            location: new.location,
            harvest_date: new.harvest_date,
            created_at: now,
            current_price: new.base_price,
            status: ListingStatus::Active,
            bids: Vec::new(),
        })
    }

    pub fn status(&self) -> ListingStatus {
        self.status
    }

    pub fn current_price(&self) -> Decimal {
        self.current_price
    }

    /// All bids in insertion order. Never re-sorted in place.
    pub fn bids(&self) -> &[Bid] {
        &self.bids
    }

    pub fn bid(&self, bid_id: &BidId) -> Option<&Bid> {
        self.bids.iter().find(|b| &b.id == bid_id)
    }

    /// Bids still awaiting a decision.
    pub fn pending_bids(&self) -> impl Iterator<Item = &Bid> {
        self.bids.iter().filter(|b| b.status == BidStatus::Pending)
    }

    /// Quantity not yet committed to an accepted bid.
    pub fn remaining_quantity(&self) -> Decimal {
        let accepted: Decimal = self
            .bids
            .iter()
            .filter(|b| b.status == BidStatus::Accepted)
            .map(|b| b.quantity)
            .sum();
        self.quantity - accepted
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Price implied by the bids still in play (pending or accepted).
    pub(crate) fn live_price(&self) -> Decimal {
        self.bids
            .iter()
            .filter(|b| b.status != BidStatus::Rejected)
            .map(|b| b.amount)
            .fold(self.base_price, Decimal::max)
    }
}
