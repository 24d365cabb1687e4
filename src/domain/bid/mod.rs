//! Bid domain: trader offers, ranking, summary stats.

mod convert;
pub mod ranking;
pub mod wire;

use crate::shared::{BidId, ListingId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use convert::BidValidationError;
pub use ranking::{average_bid, highest_bid, rank_bids, suggested_next_bid, summarize, BidSummary};

// ─── BidStatus ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BidStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BidStatus::Pending => "pending",
            BidStatus::Accepted => "accepted",
            BidStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BidStatus::Pending),
            "accepted" => Some(BidStatus::Accepted),
            "rejected" => Some(BidStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── BidSubmission ───────────────────────────────────────────────────────────

/// What a trader submits. Id and timestamp are assigned on receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidSubmission {
    pub bidder_id: UserId,
    pub bidder_name: Option<String>,
    /// Offered price per unit.
    pub amount: Decimal,
    pub quantity: Decimal,
    pub message: Option<String>,
}

// ─── Bid ─────────────────────────────────────────────────────────────────────

/// A trader's offer against a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub listing_id: ListingId,
    pub bidder_id: UserId,
    pub bidder_name: Option<String>,
    /// Offered price per unit.
    pub amount: Decimal,
    pub quantity: Decimal,
    pub message: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub status: BidStatus,
}

impl Bid {
    pub fn from_submission(
        id: BidId,
        listing_id: ListingId,
        submission: BidSubmission,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            listing_id,
            bidder_id: submission.bidder_id,
            bidder_name: submission.bidder_name,
            amount: submission.amount,
            quantity: submission.quantity,
            message: submission.message.filter(|m| !m.trim().is_empty()),
            submitted_at,
            status: BidStatus::Pending,
        }
    }

    /// Price times quantity; `None` when the product does not fit a `Decimal`.
    pub fn total_value(&self) -> Option<Decimal> {
        self.amount.checked_mul(self.quantity)
    }

    pub fn is_pending(&self) -> bool {
        self.status == BidStatus::Pending
    }
}
