//! Conversion: ListingRecord → Listing (TryFrom + validation).

use super::wire::ListingRecord;
use super::{Listing, ListingStatus};
use crate::domain::bid::{Bid, BidStatus, BidValidationError};
use crate::shared::money::decimal_from_json;
use crate::shared::{ListingId, Unit, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug)]
pub enum ListingValidationError {
    Multiple(String, Vec<ListingValidationError>),
    MissingCropName,
    InvalidQuantity(String),
    InvalidBasePrice(String),
    InvalidUnit(String),
    InvalidStatus(String),
    InvalidHarvestDate(String),
    InvalidCreatedAt(String),
    DuplicateBid(String),
    MultipleAccepted,
    AcceptedOnUnsold(ListingStatus),
    SoldWithoutAccepted,
    PendingOnSold(String),
    BidBelowBase {
        bid: String,
        amount: Decimal,
        base_price: Decimal,
    },
    BidExceedsQuantity {
        bid: String,
        quantity: Decimal,
        available: Decimal,
    },
    BidTotalTooLarge(String),
    Bid(BidValidationError),
}

impl fmt::Display for ListingValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListingValidationError::Multiple(id, errors) => {
                writeln!(f, "Listing validation errors ({id}):")?;
                for err in errors {
                    writeln!(f, "  - {}", err)?;
                }
                Ok(())
            }
            ListingValidationError::MissingCropName => write!(f, "Missing crop name"),
            ListingValidationError::InvalidQuantity(v) => write!(f, "Invalid quantity: {v}"),
            ListingValidationError::InvalidBasePrice(v) => write!(f, "Invalid base price: {v}"),
            ListingValidationError::InvalidUnit(v) => write!(f, "Invalid unit: {v}"),
            ListingValidationError::InvalidStatus(v) => write!(f, "Invalid status: {v}"),
            ListingValidationError::InvalidHarvestDate(v) => {
                write!(f, "Invalid harvest date: {v}")
            }
            ListingValidationError::InvalidCreatedAt(v) => write!(f, "Invalid created_at: {v}"),
            ListingValidationError::DuplicateBid(id) => write!(f, "Duplicate bid id: {id}"),
            ListingValidationError::MultipleAccepted => write!(f, "More than one accepted bid"),
            ListingValidationError::AcceptedOnUnsold(status) => {
                write!(f, "Accepted bid on a listing that is {status}")
            }
            ListingValidationError::SoldWithoutAccepted => {
                write!(f, "Sold listing has no accepted bid")
            }
            ListingValidationError::PendingOnSold(id) => {
                write!(f, "Bid {id} is still pending on a sold listing")
            }
            ListingValidationError::BidBelowBase {
                bid,
                amount,
                base_price,
            } => write!(f, "Bid {bid} amount {amount} is below base price {base_price}"),
            ListingValidationError::BidExceedsQuantity {
                bid,
                quantity,
                available,
            } => write!(f, "Bid {bid} quantity {quantity} exceeds available {available}"),
            ListingValidationError::BidTotalTooLarge(id) => {
                write!(f, "Bid {id} total exceeds the representable amount")
            }
            ListingValidationError::Bid(err) => write!(f, "Bid: {}", err),
        }
    }
}

impl std::error::Error for ListingValidationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ListingValidationError::Bid(e) => Some(e),
            _ => None,
        }
    }
}

impl TryFrom<ListingRecord> for Listing {
    type Error = ListingValidationError;

    fn try_from(source: ListingRecord) -> Result<Self, Self::Error> {
        let mut errors: Vec<ListingValidationError> = Vec::new();
        let id = ListingId::from(source.id.clone());

        let crop_name = source.name.trim().to_string();
        if crop_name.is_empty() {
            errors.push(ListingValidationError::MissingCropName);
        }
        let quantity = decimal_from_json(&source.quantity)
            .filter(|q| *q > Decimal::ZERO)
            .unwrap_or_else(|| {
                errors.push(ListingValidationError::InvalidQuantity(
                    source.quantity.to_string(),
                ));
                Decimal::ZERO
            });
        let base_price = decimal_from_json(&source.base_price)
            .filter(|p| *p > Decimal::ZERO)
            .unwrap_or_else(|| {
                errors.push(ListingValidationError::InvalidBasePrice(
                    source.base_price.to_string(),
                ));
                Decimal::ZERO
            });
        let unit = Unit::parse(&source.unit).unwrap_or_else(|| {
            errors.push(ListingValidationError::InvalidUnit(source.unit.clone()));
            Unit::default()
        });
        let status = ListingStatus::parse(&source.status).unwrap_or_else(|| {
            errors.push(ListingValidationError::InvalidStatus(source.status.clone()));
            ListingStatus::Active
        });
        let harvest_date = match source.harvest_date.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map_err(|_| {
                    errors.push(ListingValidationError::InvalidHarvestDate(raw.to_string()))
                })
                .ok(),
        };
        let created_at = DateTime::parse_from_rfc3339(&source.created_at)
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|_| {
                errors.push(ListingValidationError::InvalidCreatedAt(
                    source.created_at.clone(),
                ));
                DateTime::<Utc>::UNIX_EPOCH
            });

        // Validate bids
        let mut bids: Vec<Bid> = Vec::new();
        let mut seen = HashSet::new();
        for record in source.bids {
            if !seen.insert(record.id.clone()) {
                errors.push(ListingValidationError::DuplicateBid(record.id.clone()));
                continue;
            }
            match Bid::try_from((record, &id)) {
                Ok(bid) => bids.push(bid),
                Err(err) => errors.push(ListingValidationError::Bid(err)),
            }
        }
        if bids.iter().filter(|b| b.status == BidStatus::Accepted).count() > 1 {
            errors.push(ListingValidationError::MultipleAccepted);
        }

        if !errors.is_empty() {
            return Err(ListingValidationError::Multiple(source.id, errors));
        }

        let mut listing = Listing {
            id,
            owner_id: UserId::from(source.farmer_id),
            crop_name,
            variety: source.variety.filter(|v| !v.trim().is_empty()),
            quantity,
            unit,
            base_price,
            description: source.description.filter(|d| !d.trim().is_empty()),
            location: source.location.filter(|l| !l.trim().is_empty()),
            harvest_date,
            created_at,
            current_price: base_price,
            status,
            bids,
        };
        let violations = book_violations(&listing);
        if !violations.is_empty() {
            return Err(ListingValidationError::Multiple(source.id, violations));
        }
        listing.current_price = listing.live_price();
        Ok(listing)
    }
}

/// Checks a well-formed row against the rules the bid book enforces on
/// writes, so a stored listing cannot carry a state `add_bid` and `settle`
/// would never produce.
fn book_violations(listing: &Listing) -> Vec<ListingValidationError> {
    let mut errors = Vec::new();

    let accepted = listing
        .bids
        .iter()
        .find(|b| b.status == BidStatus::Accepted);
    match (listing.status, accepted) {
        (ListingStatus::Sold, None) => errors.push(ListingValidationError::SoldWithoutAccepted),
        (ListingStatus::Sold, Some(_)) => {}
        (status, Some(_)) => errors.push(ListingValidationError::AcceptedOnUnsold(status)),
        (_, None) => {}
    }
    if let Some(bid) = accepted {
        if bid.quantity > listing.quantity {
            errors.push(ListingValidationError::BidExceedsQuantity {
                bid: bid.id.to_string(),
                quantity: bid.quantity,
                available: listing.quantity,
            });
        }
    }

    let available = listing.remaining_quantity().max(Decimal::ZERO);
    for bid in listing.pending_bids() {
        if listing.status == ListingStatus::Sold {
            errors.push(ListingValidationError::PendingOnSold(bid.id.to_string()));
        }
        if bid.amount < listing.base_price {
            errors.push(ListingValidationError::BidBelowBase {
                bid: bid.id.to_string(),
                amount: bid.amount,
                base_price: listing.base_price,
            });
        }
        if bid.quantity > available {
            errors.push(ListingValidationError::BidExceedsQuantity {
                bid: bid.id.to_string(),
                quantity: bid.quantity,
                available,
            });
        }
        if bid.total_value().is_none() {
            errors.push(ListingValidationError::BidTotalTooLarge(bid.id.to_string()));
        }
    }
    errors
}
