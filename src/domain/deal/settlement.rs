//! Deal settlement: turn a pending bid into a deal and an open transaction.
//!
//! Pure with respect to I/O. All preconditions are checked before the listing
//! is touched, so either every side effect lands (bid accepted, siblings
//! rejected, listing sold, deal and transaction built) or none does.

use super::{Deal, PaymentMethod};
use crate::config::validate_fee_rate;
use crate::domain::listing::{Listing, ListingStatus};
use crate::domain::transaction::Transaction;
use crate::error::MarketError;
use crate::shared::{round_currency, BidId, DealId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Fee and rounding rules applied to one settlement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettlementTerms {
    pub fee_rate: Decimal,
    pub currency_decimals: u32,
    pub payment_method: PaymentMethod,
}

/// Ids for the two records a settlement creates.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementIds {
    pub deal_id: DealId,
    pub transaction_id: TransactionId,
}

/// What a successful settlement hands back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settlement {
    pub deal: Deal,
    pub transaction: Transaction,
}

pub fn settle(
    listing: &mut Listing,
    bid_id: &BidId,
    terms: &SettlementTerms,
    ids: SettlementIds,
    now: DateTime<Utc>,
) -> Result<Settlement, MarketError> {
    validate_fee_rate(terms.fee_rate)?;
    match listing.status() {
        ListingStatus::Active | ListingStatus::Bidding => {}
        ListingStatus::Sold => {
            return Err(MarketError::invalid_state(format!(
                "listing {} is already sold",
                listing.id
            )))
        }
        ListingStatus::Expired => {
            return Err(MarketError::invalid_state(format!(
                "listing {} has expired",
                listing.id
            )))
        }
    }
    let bid = listing
        .bid(bid_id)
        .ok_or_else(|| MarketError::not_found("bid", bid_id))?;
    if !bid.is_pending() {
        return Err(MarketError::invalid_state(format!(
            "bid {} is {}, not pending",
            bid_id, bid.status
        )));
    }

    let gross_amount = bid
        .total_value()
        .ok_or(MarketError::Overflow("gross amount"))?;
    let platform_fee = gross_amount
        .checked_mul(terms.fee_rate)
        .map(|fee| round_currency(fee, terms.currency_decimals))
        .ok_or(MarketError::Overflow("platform fee"))?;
    let net_payout = gross_amount - platform_fee;

    let deal = Deal {
        id: ids.deal_id,
        listing_id: listing.id.clone(),
        bid_id: bid.id.clone(),
        farmer_id: listing.owner_id.clone(),
        trader_id: bid.bidder_id.clone(),
        crop_name: listing.crop_name.clone(),
        quantity: bid.quantity,
        unit: listing.unit,
        price_per_unit: bid.amount,
        gross_amount,
        platform_fee_rate: terms.fee_rate,
        platform_fee,
        net_payout,
        payment_method: terms.payment_method,
        created_at: now,
    };

    listing.reject_other_bids(bid_id)?;
    listing.mark_sold();

    let transaction = Transaction::open(ids.transaction_id, deal.id.clone(), now);
    Ok(Settlement { deal, transaction })
}
