//! Conversion: BidRecord → Bid (TryFrom + validation).

use super::wire::BidRecord;
use super::{Bid, BidStatus};
use crate::shared::money::decimal_from_json;
use crate::shared::{BidId, ListingId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;

#[derive(Debug)]
pub enum BidValidationError {
    Multiple(String, Vec<BidValidationError>),
    InvalidAmount(String),
    InvalidQuantity(String),
    InvalidTimestamp(String),
    InvalidStatus(String),
}

impl fmt::Display for BidValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidValidationError::Multiple(id, errors) => {
                writeln!(f, "Bid validation errors ({id}):")?;
                for err in errors {
                    writeln!(f, "  - {}", err)?;
                }
                Ok(())
            }
            BidValidationError::InvalidAmount(v) => write!(f, "Invalid amount: {v}"),
            BidValidationError::InvalidQuantity(v) => write!(f, "Invalid quantity: {v}"),
            BidValidationError::InvalidTimestamp(v) => write!(f, "Invalid timestamp: {v}"),
            BidValidationError::InvalidStatus(v) => write!(f, "Invalid status: {v}"),
        }
    }
}

impl std::error::Error for BidValidationError {}

fn positive(n: &serde_json::Number) -> Option<Decimal> {
    decimal_from_json(n).filter(|d| *d > Decimal::ZERO)
}

impl TryFrom<(BidRecord, &ListingId)> for Bid {
    type Error = BidValidationError;

    fn try_from((source, listing_id): (BidRecord, &ListingId)) -> Result<Self, Self::Error> {
        let mut errors = Vec::new();

        let amount = positive(&source.amount).unwrap_or_else(|| {
            errors.push(BidValidationError::InvalidAmount(source.amount.to_string()));
            Decimal::ZERO
        });
        let quantity = positive(&source.quantity).unwrap_or_else(|| {
            errors.push(BidValidationError::InvalidQuantity(
                source.quantity.to_string(),
            ));
            Decimal::ZERO
        });
        let submitted_at = DateTime::parse_from_rfc3339(&source.timestamp)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| {
                errors.push(BidValidationError::InvalidTimestamp(source.timestamp.clone()));
                DateTime::<Utc>::UNIX_EPOCH
            });
        let status = BidStatus::parse(&source.status).unwrap_or_else(|| {
            errors.push(BidValidationError::InvalidStatus(source.status.clone()));
            BidStatus::Pending
        });

        if !errors.is_empty() {
            return Err(BidValidationError::Multiple(source.id, errors));
        }

        Ok(Bid {
            id: BidId::from(source.id),
            listing_id: listing_id.clone(),
            bidder_id: UserId::from(source.trader_id),
            bidder_name: source.trader_name,
            amount,
            quantity,
            message: source.message.filter(|m| !m.trim().is_empty()),
            submitted_at,
            status,
        })
    }
}
