//! Bid book: the write operations on a listing's bid collection.
//!
//! Every operation validates fully before it mutates, so a returned error
//! always leaves the listing untouched.

use super::{Listing, ListingStatus};
use crate::domain::bid::{Bid, BidStatus};
use crate::error::{BidError, MarketError};
use crate::shared::BidId;
use rust_decimal::Decimal;

impl Listing {
    /// Append a bid as `pending`.
    ///
    /// Raises `current_price` to the bid amount when higher, and moves an
    /// `active` listing to `bidding`.
    pub fn add_bid(&mut self, mut bid: Bid) -> Result<&Bid, MarketError> {
        self.check_bid(&bid)?;

        bid.status = BidStatus::Pending;
        self.current_price = self.current_price.max(bid.amount);
        if self.status == ListingStatus::Active {
            self.status = ListingStatus::Bidding;
        }
        self.bids.push(bid);

        let idx = self.bids.len() - 1;
        Ok(&self.bids[idx])
    }

    fn check_bid(&self, bid: &Bid) -> Result<(), BidError> {
        if bid.listing_id != self.id {
            return Err(BidError::ListingMismatch {
                listing: self.id.to_string(),
                bid_listing: bid.listing_id.to_string(),
            });
        }
        if !self.status.is_open() {
            return Err(BidError::ListingClosed(self.status.to_string()));
        }
        if bid.amount <= Decimal::ZERO {
            return Err(BidError::NonPositiveAmount(bid.amount));
        }
        if bid.quantity <= Decimal::ZERO {
            return Err(BidError::NonPositiveQuantity(bid.quantity));
        }
        if bid.total_value().is_none() {
            return Err(BidError::AmountTooLarge {
                amount: bid.amount,
                quantity: bid.quantity,
            });
        }
        if bid.amount < self.base_price {
            return Err(BidError::BelowBasePrice {
                amount: bid.amount,
                base_price: self.base_price,
            });
        }
        let available = self.remaining_quantity();
        if bid.quantity > available {
            return Err(BidError::ExceedsAvailable {
                requested: bid.quantity,
                available,
            });
        }
        if self.bid(&bid.id).is_some() {
            return Err(BidError::DuplicateBid(bid.id.to_string()));
        }
        Ok(())
    }

    /// Accept `accepted_bid_id` and reject every sibling.
    pub fn reject_other_bids(&mut self, accepted_bid_id: &BidId) -> Result<(), MarketError> {
        if self.bid(accepted_bid_id).is_none() {
            return Err(MarketError::not_found("bid", accepted_bid_id));
        }

        for bid in &mut self.bids {
            bid.status = if &bid.id == accepted_bid_id {
                BidStatus::Accepted
            } else {
                BidStatus::Rejected
            };
        }
        Ok(())
    }

    /// The farmer turns down a single pending bid.
    pub fn decline_bid(&mut self, bid_id: &BidId) -> Result<&Bid, MarketError> {
        if !self.status.is_open() {
            return Err(MarketError::invalid_state(format!(
                "listing {} is {}",
                self.id, self.status
            )));
        }
        let idx = self
            .bids
            .iter()
            .position(|b| &b.id == bid_id)
            .ok_or_else(|| MarketError::not_found("bid", bid_id))?;
        if !self.bids[idx].is_pending() {
            return Err(MarketError::invalid_state(format!(
                "bid {} is already {}",
                bid_id, self.bids[idx].status
            )));
        }

        self.bids[idx].status = BidStatus::Rejected;
        self.current_price = self.live_price();
        Ok(&self.bids[idx])
    }

    /// Withdraw the listing from the market without a sale.
    pub fn expire(&mut self) -> Result<(), MarketError> {
        if !self.status.is_open() {
            return Err(MarketError::invalid_state(format!(
                "listing {} is already {}",
                self.id, self.status
            )));
        }
        self.status = ListingStatus::Expired;
        Ok(())
    }

    pub(crate) fn mark_sold(&mut self) {
        self.status = ListingStatus::Sold;
    }
}
