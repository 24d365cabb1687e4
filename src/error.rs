//! Unified marketplace error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level marketplace error.
///
/// Every variant is recoverable from the caller's point of view: correct the
/// input and retry, or surface it to the end user.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketError {
    #[error("Invalid bid: {0}")]
    InvalidBid(#[from] BidError),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

impl MarketError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        MarketError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        MarketError::InvalidState(msg.into())
    }
}

/// Reasons a bid is refused by the bid book.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BidError {
    #[error("Amount must be positive, got {0}")]
    NonPositiveAmount(Decimal),

    #[error("Quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("Amount {amount} is below the base price {base_price}")]
    BelowBasePrice { amount: Decimal, base_price: Decimal },

    #[error("Quantity {requested} exceeds the {available} still available")]
    ExceedsAvailable {
        requested: Decimal,
        available: Decimal,
    },

    #[error("Listing is {0} and not accepting bids")]
    ListingClosed(String),

    #[error("Bid targets listing {bid_listing}, not {listing}")]
    ListingMismatch { listing: String, bid_listing: String },

    #[error("Bid {0} already exists")]
    DuplicateBid(String),

    #[error("Amount {amount} for quantity {quantity} exceeds the representable total")]
    AmountTooLarge { amount: Decimal, quantity: Decimal },

    #[error("Bidder {0} is not a verified trader")]
    UnverifiedBidder(String),
}

/// Errors reported by a [`MarketStore`](crate::store::MarketStore).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Backend failure: {0}")]
    Backend(String),
}

impl From<StoreError> for MarketError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => MarketError::NotFound { entity, id },
            StoreError::Backend(msg) => MarketError::Storage(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: MarketError = StoreError::NotFound {
            entity: "listing",
            id: "lst_9".to_string(),
        }
        .into();
        assert_eq!(err, MarketError::not_found("listing", "lst_9"));
        assert_eq!(err.to_string(), "listing not found: lst_9");
    }

    #[test]
    fn test_store_backend_maps_to_storage() {
        let err: MarketError = StoreError::Backend("connection reset".into()).into();
        assert!(matches!(err, MarketError::Storage(ref m) if m == "connection reset"));
    }

    #[test]
    fn test_bid_error_display() {
        let err = MarketError::from(BidError::BelowBasePrice {
            amount: Decimal::from(2000),
            base_price: Decimal::from(2200),
        });
        assert_eq!(
            err.to_string(),
            "Invalid bid: Amount 2000 is below the base price 2200"
        );
    }
}
