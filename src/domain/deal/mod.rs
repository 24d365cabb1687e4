//! Deal domain: the immutable record of an accepted bid.

pub mod settlement;

use crate::shared::{BidId, DealId, ListingId, Unit, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use settlement::{settle, Settlement, SettlementIds, SettlementTerms};

// ─── PaymentMethod ───────────────────────────────────────────────────────────

/// How the trader pays the farmer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    BankTransfer,
    Upi,
    DigitalWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Upi => "upi",
            PaymentMethod::DigitalWallet => "digital_wallet",
        }
    }

    /// Expected settlement time, as shown to the farmer.
    pub fn processing_time(&self) -> &'static str {
        match self {
            PaymentMethod::BankTransfer => "1-2 business days",
            PaymentMethod::Upi | PaymentMethod::DigitalWallet => "instant",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Deal ────────────────────────────────────────────────────────────────────

/// Settlement artifact produced from exactly one accepted bid.
///
/// `platform_fee + net_payout == gross_amount` holds exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub id: DealId,
    pub listing_id: ListingId,
    pub bid_id: BidId,
    pub farmer_id: UserId,
    pub trader_id: UserId,
    pub crop_name: String,
    pub quantity: Decimal,
    pub unit: Unit,
    pub price_per_unit: Decimal,
    pub gross_amount: Decimal,
    pub platform_fee_rate: Decimal,
    pub platform_fee: Decimal,
    pub net_payout: Decimal,
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
}
