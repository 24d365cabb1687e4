//! Pure derivations over a listing's bids for display and decision support.
//!
//! Input is assumed clean: amounts and quantities were validated by the bid
//! book when the bids were added, so nothing here re-validates.

use super::Bid;
use crate::config::BidIncrements;
use crate::domain::listing::Listing;
use crate::error::MarketError;
use crate::shared::round_whole;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Bids by amount descending; equal amounts keep first-come priority.
///
/// The sort is stable, so bids with identical amount and timestamp stay in
/// insertion order.
pub fn rank_bids(bids: &[Bid]) -> Vec<&Bid> {
    let mut ranked: Vec<&Bid> = bids.iter().collect();
    ranked.sort_by(|a, b| {
        b.amount
            .cmp(&a.amount)
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
    });
    ranked
}

pub fn highest_bid(bids: &[Bid]) -> Option<&Bid> {
    rank_bids(bids).into_iter().next()
}

/// Mean amount rounded to the nearest whole currency unit; zero when empty.
pub fn average_bid(bids: &[Bid]) -> Result<Decimal, MarketError> {
    if bids.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let total = bids
        .iter()
        .try_fold(Decimal::ZERO, |acc, b| acc.checked_add(b.amount))
        .ok_or(MarketError::Overflow("average bid"))?;
    Ok(round_whole(total / Decimal::from(bids.len())))
}

/// Amount to suggest to the next bidder.
///
/// Highest bid plus one step, or the base price plus the opening premium
/// when nobody has bid yet.
pub fn suggested_next_bid(
    listing: &Listing,
    bids: &[Bid],
    increments: &BidIncrements,
) -> Result<Decimal, MarketError> {
    let next = match highest_bid(bids) {
        Some(top) => top.amount.checked_add(increments.step),
        None => listing.base_price.checked_add(increments.initial_premium),
    };
    next.ok_or(MarketError::Overflow("suggested next bid"))
}

/// The numbers shown on a listing's bidding panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidSummary {
    pub count: usize,
    pub highest: Option<Decimal>,
    pub average: Decimal,
    pub suggested_next: Decimal,
}

pub fn summarize(
    listing: &Listing,
    bids: &[Bid],
    increments: &BidIncrements,
) -> Result<BidSummary, MarketError> {
    Ok(BidSummary {
        count: bids.len(),
        highest: highest_bid(bids).map(|b| b.amount),
        average: average_bid(bids)?,
        suggested_next: suggested_next_bid(listing, bids, increments)?,
    })
}
