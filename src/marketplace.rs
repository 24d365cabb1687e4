//! High-level service: `Marketplace` with its builder.
//!
//! The service loads a snapshot from the store, applies a domain operation
//! and saves the result. Writers to the same listing, transaction, dispute or
//! trader verification are serialized by per-key async locks; reads take no
//! lock.

use crate::clock::{Clock, SystemClock};
use crate::config::MarketConfig;
use crate::domain::bid::{self, Bid, BidSubmission, BidSummary};
use crate::domain::deal::{settle, Deal, PaymentMethod, Settlement, SettlementIds, SettlementTerms};
use crate::domain::dispute::{self, Dispute, DisputeFilter, RaiseDispute, Resolution};
use crate::domain::listing::{Listing, NewListing};
use crate::domain::trader::{
    self, TraderApplication, TraderVerification, VerificationCheck, VerificationFilter,
    VerificationStatus,
};
use crate::domain::transaction::{DeliveryDetails, StatusChange, Transaction, TransactionStatus};
use crate::error::{BidError, MarketError, StoreError};
use crate::shared::{generate_id, BidId, DealId, DisputeId, ListingId, TransactionId, UserId};
use crate::store::{InMemoryStore, MarketStore};

use async_lock::{Mutex, MutexGuardArc};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

// ─── KeyedLocks ──────────────────────────────────────────────────────────────

/// One async mutex per key, created on first use and dropped once no task
/// holds or waits on it.
pub(crate) struct KeyedLocks<K: Eq + Hash + Clone> {
    slots: std::sync::Mutex<HashMap<K, Arc<Mutex<()>>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            slots: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Wait for exclusive access to `key`. Released when the guard drops.
    pub(crate) async fn lock(&self, key: &K) -> KeyGuard<'_, K> {
        let slot = self
            .slots()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        KeyGuard {
            locks: self,
            key: key.clone(),
            guard: Some(slot.lock_arc().await),
        }
    }

    fn slots(&self) -> std::sync::MutexGuard<'_, HashMap<K, Arc<Mutex<()>>>> {
        // The map stays consistent even if a holder panicked.
        self.slots
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots().len()
    }
}

/// Exclusive access to one key of a [`KeyedLocks`].
pub(crate) struct KeyGuard<'a, K: Eq + Hash + Clone> {
    locks: &'a KeyedLocks<K>,
    key: K,
    guard: Option<MutexGuardArc<()>>,
}

impl<K: Eq + Hash + Clone> Drop for KeyGuard<'_, K> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = self.locks.slots();
        // Waiters clone the slot under the map lock, so a count of one means
        // only the map still refers to it.
        if slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.key);
        }
    }
}

// ─── Marketplace ─────────────────────────────────────────────────────────────

/// The marketplace core: bid book, settlement, fulfillment, disputes and
/// trader verification.
pub struct Marketplace {
    config: MarketConfig,
    store: Arc<dyn MarketStore>,
    clock: Arc<dyn Clock>,
    listing_locks: KeyedLocks<ListingId>,
    transaction_locks: KeyedLocks<TransactionId>,
    dispute_locks: KeyedLocks<DisputeId>,
    trader_locks: KeyedLocks<UserId>,
}

impl Marketplace {
    pub fn builder() -> MarketplaceBuilder {
        MarketplaceBuilder::default()
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ── Listings ─────────────────────────────────────────────────────────

    pub async fn create_listing(&self, new: NewListing) -> Result<Listing, MarketError> {
        let listing = Listing::new(ListingId::new(generate_id("lst")), new, self.now())?;
        self.store.save_listing(&listing)?;
        tracing::info!(
            listing_id = %listing.id,
            owner_id = %listing.owner_id,
            crop = %listing.crop_name,
            base_price = %listing.base_price,
            "listing created"
        );
        Ok(listing)
    }

    pub async fn listing(&self, listing_id: &ListingId) -> Result<Listing, MarketError> {
        Ok(self.store.load_listing(listing_id)?)
    }

    pub async fn expire_listing(&self, listing_id: &ListingId) -> Result<Listing, MarketError> {
        let _guard = self.listing_locks.lock(listing_id).await;
        let mut listing = self.store.load_listing(listing_id)?;
        listing.expire()?;
        self.store.save_listing(&listing)?;
        tracing::info!(listing_id = %listing_id, "listing expired");
        Ok(listing)
    }

    // ── Bids ─────────────────────────────────────────────────────────────

    /// Record a trader's bid. The bid id and timestamp are assigned here.
    pub async fn place_bid(
        &self,
        listing_id: &ListingId,
        submission: BidSubmission,
    ) -> Result<Bid, MarketError> {
        if self.config.require_verified_bidders {
            self.ensure_verified(&submission.bidder_id)?;
        }
        let _guard = self.listing_locks.lock(listing_id).await;
        let mut listing = self.store.load_listing(listing_id)?;
        let bidder_id = submission.bidder_id.clone();
        let candidate = Bid::from_submission(
            BidId::new(generate_id("bid")),
            listing_id.clone(),
            submission,
            self.now(),
        );

        let bid = match listing.add_bid(candidate) {
            Ok(bid) => bid.clone(),
            Err(err) => {
                tracing::warn!(
                    listing_id = %listing_id,
                    bidder_id = %bidder_id,
                    error = %err,
                    "bid rejected"
                );
                return Err(err);
            }
        };
        self.store.save_listing(&listing)?;
        tracing::info!(
            listing_id = %listing_id,
            bid_id = %bid.id,
            bidder_id = %bid.bidder_id,
            amount = %bid.amount,
            quantity = %bid.quantity,
            "bid placed"
        );
        Ok(bid)
    }

    fn ensure_verified(&self, bidder_id: &UserId) -> Result<(), MarketError> {
        let approved = match self.store.load_verification(bidder_id) {
            Ok(verification) => verification.is_approved(),
            Err(StoreError::NotFound { .. }) => false,
            Err(err) => return Err(err.into()),
        };
        if approved {
            return Ok(());
        }
        tracing::warn!(bidder_id = %bidder_id, "bid from unverified trader refused");
        Err(BidError::UnverifiedBidder(bidder_id.to_string()).into())
    }

    /// All bids in the order they were placed.
    pub async fn bids(&self, listing_id: &ListingId) -> Result<Vec<Bid>, MarketError> {
        Ok(self.store.load_listing(listing_id)?.bids().to_vec())
    }

    pub async fn ranked_bids(&self, listing_id: &ListingId) -> Result<Vec<Bid>, MarketError> {
        let listing = self.store.load_listing(listing_id)?;
        Ok(bid::rank_bids(listing.bids()).into_iter().cloned().collect())
    }

    pub async fn highest_bid(&self, listing_id: &ListingId) -> Result<Option<Bid>, MarketError> {
        let listing = self.store.load_listing(listing_id)?;
        Ok(bid::highest_bid(listing.bids()).cloned())
    }

    pub async fn suggested_next_bid(&self, listing_id: &ListingId) -> Result<Decimal, MarketError> {
        let listing = self.store.load_listing(listing_id)?;
        bid::suggested_next_bid(&listing, listing.bids(), &self.config.increments())
    }

    pub async fn bid_summary(&self, listing_id: &ListingId) -> Result<BidSummary, MarketError> {
        let listing = self.store.load_listing(listing_id)?;
        bid::summarize(&listing, listing.bids(), &self.config.increments())
    }

    pub async fn decline_bid(
        &self,
        listing_id: &ListingId,
        bid_id: &BidId,
    ) -> Result<Bid, MarketError> {
        let _guard = self.listing_locks.lock(listing_id).await;
        let mut listing = self.store.load_listing(listing_id)?;
        let bid = listing.decline_bid(bid_id)?.clone();
        self.store.save_listing(&listing)?;
        tracing::info!(listing_id = %listing_id, bid_id = %bid_id, "bid declined");
        Ok(bid)
    }

    // ── Settlement ───────────────────────────────────────────────────────

    /// Accept one pending bid: the deal, the sold listing and a fresh
    /// transaction are committed together.
    pub async fn accept_bid(
        &self,
        listing_id: &ListingId,
        bid_id: &BidId,
        payment_method: Option<PaymentMethod>,
    ) -> Result<Settlement, MarketError> {
        let _guard = self.listing_locks.lock(listing_id).await;
        let mut listing = self.store.load_listing(listing_id)?;
        let terms = SettlementTerms {
            fee_rate: self.config.platform_fee_rate,
            currency_decimals: self.config.currency_decimals,
            payment_method: payment_method.unwrap_or_default(),
        };
        let ids = SettlementIds {
            deal_id: DealId::new(generate_id("deal")),
            transaction_id: TransactionId::new(generate_id("txn")),
        };

        let settlement = settle(&mut listing, bid_id, &terms, ids, self.now())?;
        self.store
            .commit_settlement(&listing, &settlement.deal, &settlement.transaction)?;

        let deal = &settlement.deal;
        tracing::info!(
            listing_id = %listing_id,
            bid_id = %bid_id,
            deal_id = %deal.id,
            transaction_id = %settlement.transaction.id,
            gross = %deal.gross_amount,
            fee = %deal.platform_fee,
            net = %deal.net_payout,
            payment_method = %deal.payment_method,
            "bid accepted, deal settled"
        );
        Ok(settlement)
    }

    pub async fn deal(&self, deal_id: &DealId) -> Result<Deal, MarketError> {
        Ok(self.store.load_deal(deal_id)?)
    }

    // ── Transactions ─────────────────────────────────────────────────────

    pub async fn transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Transaction, MarketError> {
        Ok(self.store.load_transaction(transaction_id)?)
    }

    /// Apply an externally reported status.
    pub async fn advance_transaction(
        &self,
        transaction_id: &TransactionId,
        target: TransactionStatus,
    ) -> Result<StatusChange, MarketError> {
        let _guard = self.transaction_locks.lock(transaction_id).await;
        let mut transaction = self.store.load_transaction(transaction_id)?;
        let from = transaction.status();

        let change = transaction.advance(target, self.now())?;
        match change {
            StatusChange::Applied => {
                self.store.save_transaction(&transaction)?;
                tracing::info!(
                    transaction_id = %transaction_id,
                    from = %from,
                    to = %target,
                    "transaction advanced"
                );
            }
            StatusChange::AlreadyCurrent => {
                tracing::debug!(
                    transaction_id = %transaction_id,
                    status = %target,
                    "status already current"
                );
            }
        }
        Ok(change)
    }

    pub async fn cancel_transaction(
        &self,
        transaction_id: &TransactionId,
        reason: impl Into<String>,
    ) -> Result<Transaction, MarketError> {
        let _guard = self.transaction_locks.lock(transaction_id).await;
        let mut transaction = self.store.load_transaction(transaction_id)?;
        transaction.cancel(reason, self.now())?;
        self.store.save_transaction(&transaction)?;
        tracing::info!(
            transaction_id = %transaction_id,
            reason = transaction.cancellation_reason().unwrap_or(""),
            "transaction cancelled"
        );
        Ok(transaction)
    }

    pub async fn update_delivery(
        &self,
        transaction_id: &TransactionId,
        details: DeliveryDetails,
    ) -> Result<Transaction, MarketError> {
        let _guard = self.transaction_locks.lock(transaction_id).await;
        let mut transaction = self.store.load_transaction(transaction_id)?;
        transaction.set_delivery_details(details, self.now())?;
        self.store.save_transaction(&transaction)?;
        tracing::debug!(transaction_id = %transaction_id, "delivery details updated");
        Ok(transaction)
    }

    // ── Disputes ─────────────────────────────────────────────────────────

    pub async fn raise_dispute(&self, request: RaiseDispute) -> Result<Dispute, MarketError> {
        let _guard = self.transaction_locks.lock(&request.transaction_id).await;
        let transaction = self.store.load_transaction(&request.transaction_id)?;
        let deal = self.store.load_deal(&transaction.deal_id)?;

        let dispute = Dispute::raise(
            DisputeId::new(generate_id("dsp")),
            request,
            &deal,
            &transaction,
            self.now(),
        )?;
        self.store.save_dispute(&dispute)?;
        tracing::info!(
            dispute_id = %dispute.id,
            transaction_id = %dispute.transaction_id,
            priority = ?dispute.priority,
            amount = %dispute.amount,
            "dispute raised"
        );
        Ok(dispute)
    }

    pub async fn investigate_dispute(
        &self,
        dispute_id: &DisputeId,
        note: Option<String>,
    ) -> Result<Dispute, MarketError> {
        self.update_dispute(dispute_id, "investigation started", |d, now| {
            d.start_investigation(note, now)
        })
        .await
    }

    pub async fn annotate_dispute(
        &self,
        dispute_id: &DisputeId,
        note: impl Into<String>,
    ) -> Result<Dispute, MarketError> {
        let note = note.into();
        self.update_dispute(dispute_id, "admin note added", |d, now| d.add_note(note, now))
            .await
    }

    pub async fn resolve_dispute(
        &self,
        dispute_id: &DisputeId,
        resolution: Resolution,
        note: Option<String>,
    ) -> Result<Dispute, MarketError> {
        self.update_dispute(dispute_id, "dispute resolved", |d, now| {
            d.resolve(resolution, note, now)
        })
        .await
    }

    pub async fn close_dispute(&self, dispute_id: &DisputeId) -> Result<Dispute, MarketError> {
        self.update_dispute(dispute_id, "dispute closed", |d, now| d.close(now))
            .await
    }

    pub async fn dispute(&self, dispute_id: &DisputeId) -> Result<Dispute, MarketError> {
        Ok(self.store.load_dispute(dispute_id)?)
    }

    /// Admin work queue, most urgent and oldest first.
    pub async fn dispute_queue(&self, filter: DisputeFilter) -> Result<Vec<Dispute>, MarketError> {
        let disputes = self.store.list_disputes()?;
        Ok(dispute::queue(&disputes, filter).into_iter().cloned().collect())
    }

    async fn update_dispute<F>(
        &self,
        dispute_id: &DisputeId,
        event: &'static str,
        apply: F,
    ) -> Result<Dispute, MarketError>
    where
        F: FnOnce(&mut Dispute, DateTime<Utc>) -> Result<(), MarketError>,
    {
        let _guard = self.dispute_locks.lock(dispute_id).await;
        let mut dispute = self.store.load_dispute(dispute_id)?;
        apply(&mut dispute, self.now())?;
        self.store.save_dispute(&dispute)?;
        tracing::info!(dispute_id = %dispute_id, status = %dispute.status(), "{}", event);
        Ok(dispute)
    }

    // ── Trader verification ──────────────────────────────────────────────

    /// File a verification. A trader may reapply only after a rejection.
    pub async fn submit_verification(
        &self,
        application: TraderApplication,
    ) -> Result<TraderVerification, MarketError> {
        let _guard = self.trader_locks.lock(&application.trader_id).await;
        match self.store.load_verification(&application.trader_id) {
            Ok(existing) if existing.status() != VerificationStatus::Rejected => {
                return Err(MarketError::invalid_state(format!(
                    "trader {} already has a {} verification",
                    existing.trader_id,
                    existing.status()
                )));
            }
            Ok(_) | Err(StoreError::NotFound { .. }) => {}
            Err(err) => return Err(err.into()),
        }

        let verification = TraderVerification::submit(application, self.now())?;
        self.store.save_verification(&verification)?;
        tracing::info!(
            trader_id = %verification.trader_id,
            business = %verification.business_name,
            missing_documents = verification.missing_documents().len(),
            "verification submitted"
        );
        Ok(verification)
    }

    pub async fn start_verification_review(
        &self,
        trader_id: &UserId,
    ) -> Result<TraderVerification, MarketError> {
        self.update_verification(trader_id, "verification review started", |v, now| {
            v.start_review(now)
        })
        .await
    }

    pub async fn record_verification_check(
        &self,
        trader_id: &UserId,
        check: VerificationCheck,
        passed: bool,
    ) -> Result<TraderVerification, MarketError> {
        self.update_verification(trader_id, "verification check recorded", |v, now| {
            v.record_check(check, passed, now)
        })
        .await
    }

    pub async fn approve_trader(
        &self,
        trader_id: &UserId,
    ) -> Result<TraderVerification, MarketError> {
        self.update_verification(trader_id, "trader approved", |v, now| v.approve(now))
            .await
    }

    pub async fn reject_trader(
        &self,
        trader_id: &UserId,
        reason: impl Into<String>,
    ) -> Result<TraderVerification, MarketError> {
        let reason = reason.into();
        self.update_verification(trader_id, "trader rejected", |v, now| v.reject(reason, now))
            .await
    }

    pub async fn verification(
        &self,
        trader_id: &UserId,
    ) -> Result<TraderVerification, MarketError> {
        Ok(self.store.load_verification(trader_id)?)
    }

    /// Admin review queue, oldest application first.
    pub async fn verification_queue(
        &self,
        filter: VerificationFilter,
    ) -> Result<Vec<TraderVerification>, MarketError> {
        let verifications = self.store.list_verifications()?;
        Ok(trader::queue(&verifications, filter)
            .into_iter()
            .cloned()
            .collect())
    }

    async fn update_verification<F>(
        &self,
        trader_id: &UserId,
        event: &'static str,
        apply: F,
    ) -> Result<TraderVerification, MarketError>
    where
        F: FnOnce(&mut TraderVerification, DateTime<Utc>) -> Result<(), MarketError>,
    {
        let _guard = self.trader_locks.lock(trader_id).await;
        let mut verification = self.store.load_verification(trader_id)?;
        apply(&mut verification, self.now())?;
        self.store.save_verification(&verification)?;
        tracing::info!(
            trader_id = %trader_id,
            status = %verification.status(),
            "{}",
            event
        );
        Ok(verification)
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct MarketplaceBuilder {
    config: MarketConfig,
    store: Option<Arc<dyn MarketStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for MarketplaceBuilder {
    fn default() -> Self {
        Self {
            config: MarketConfig::default(),
            store: None,
            clock: None,
        }
    }
}

impl MarketplaceBuilder {
    /// Replace the whole configuration. Call before the single-field setters.
    pub fn config(mut self, config: MarketConfig) -> Self {
        self.config = config;
        self
    }

    pub fn platform_fee_rate(mut self, rate: Decimal) -> Self {
        self.config.platform_fee_rate = rate;
        self
    }

    pub fn bid_increment_step(mut self, step: Decimal) -> Self {
        self.config.bid_increment_step = step;
        self
    }

    pub fn initial_bid_premium(mut self, premium: Decimal) -> Self {
        self.config.initial_bid_premium = premium;
        self
    }

    /// Refuse bids from traders without an approved verification.
    pub fn require_verified_bidders(mut self, required: bool) -> Self {
        self.config.require_verified_bidders = required;
        self
    }

    pub fn store(mut self, store: Arc<dyn MarketStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Marketplace, MarketError> {
        self.config.validate()?;
        Ok(Marketplace {
            config: self.config,
            store: self
                .store
                .unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            listing_locks: KeyedLocks::new(),
            transaction_locks: KeyedLocks::new(),
            dispute_locks: KeyedLocks::new(),
            trader_locks: KeyedLocks::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::bid::BidStatus;
    use crate::domain::dispute::{DisputeKind, DisputeStatus, Party, Priority};
    use crate::domain::listing::fixtures::{t0, wheat};
    use crate::domain::listing::ListingStatus;
    use crate::domain::trader::fixtures::application;
    use chrono::Duration;
    use futures_util::future::{join, join_all};

    fn market() -> (Marketplace, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(t0()));
        let market = Marketplace::builder()
            .clock(clock.clone())
            .build()
            .unwrap();
        (market, clock)
    }

    fn offer(trader: &str, amount: i64, quantity: i64) -> BidSubmission {
        BidSubmission {
            bidder_id: UserId::from(trader),
            bidder_name: None,
            amount: Decimal::from(amount),
            quantity: Decimal::from(quantity),
            message: None,
        }
    }

    #[test]
    fn test_builder_rejects_bad_fee_rate() {
        let result = Marketplace::builder()
            .platform_fee_rate(Decimal::from(2))
            .build();
        assert!(matches!(result, Err(MarketError::Config(_))));
    }

    #[test]
    fn test_builder_overrides_single_fields() {
        let market = Marketplace::builder()
            .config(MarketConfig::default())
            .bid_increment_step(Decimal::from(25))
            .initial_bid_premium(Decimal::from(10))
            .build()
            .unwrap();
        assert_eq!(market.config().bid_increment_step, Decimal::from(25));
        assert_eq!(market.config().initial_bid_premium, Decimal::from(10));
    }

    #[test]
    fn test_keyed_locks_release_slots_when_idle() {
        tokio_test::block_on(async {
            let locks: KeyedLocks<&str> = KeyedLocks::new();
            let a = locks.lock(&"a").await;
            let b = locks.lock(&"b").await;
            assert_eq!(locks.len(), 2);

            drop(a);
            assert_eq!(locks.len(), 1);
            drop(b);
            assert_eq!(locks.len(), 0);
        });
    }

    #[tokio::test]
    async fn test_keyed_locks_keep_slot_while_contended() {
        let locks: KeyedLocks<&str> = KeyedLocks::new();
        let held = locks.lock(&"a").await;

        let waiter = locks.lock(&"a");
        futures_util::pin_mut!(waiter);
        // registers as a waiter without acquiring
        assert!(futures_util::poll!(waiter.as_mut()).is_pending());

        drop(held);
        assert_eq!(locks.len(), 1);
        let second = waiter.await;
        assert_eq!(locks.len(), 1);
        drop(second);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn test_service_locks_do_not_accumulate() {
        let (market, _) = market();
        for _ in 0..5 {
            let listing = market.create_listing(wheat()).await.unwrap();
            market
                .place_bid(&listing.id, offer("trader_1", 2300, 10))
                .await
                .unwrap();
            market.expire_listing(&listing.id).await.unwrap();
        }
        assert_eq!(market.listing_locks.len(), 0);
    }

    #[tokio::test]
    async fn test_place_bid_assigns_id_and_time() {
        let (market, clock) = market();
        let listing = market.create_listing(wheat()).await.unwrap();
        assert!(listing.id.as_str().starts_with("lst_"));

        clock.advance(Duration::minutes(30));
        let bid = market
            .place_bid(&listing.id, offer("trader_1", 2300, 50))
            .await
            .unwrap();
        assert!(bid.id.as_str().starts_with("bid_"));
        assert_eq!(bid.submitted_at, t0() + Duration::minutes(30));
        assert_eq!(bid.status, BidStatus::Pending);

        let stored = market.listing(&listing.id).await.unwrap();
        assert_eq!(stored.status(), ListingStatus::Bidding);
        assert_eq!(stored.current_price(), Decimal::from(2300));
    }

    #[tokio::test]
    async fn test_rejected_bid_is_not_stored() {
        let (market, _) = market();
        let listing = market.create_listing(wheat()).await.unwrap();
        let err = market
            .place_bid(&listing.id, offer("trader_1", 2000, 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketError::InvalidBid(BidError::BelowBasePrice { .. })
        ));
        assert!(market.bids(&listing.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_listing_is_not_found() {
        let (market, _) = market();
        let missing = ListingId::from("lst_missing");
        assert_eq!(
            market.bid_summary(&missing).await.unwrap_err(),
            MarketError::not_found("listing", "lst_missing")
        );
        assert!(market
            .place_bid(&missing, offer("trader_1", 2300, 1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_concurrent_bids_are_all_recorded() {
        let (market, _) = market();
        let listing = market.create_listing(wheat()).await.unwrap();

        let results = join_all((0..20).map(|i| {
            market.place_bid(&listing.id, offer(&format!("trader_{i}"), 2200 + i * 10, 5))
        }))
        .await;
        assert!(results.iter().all(|r| r.is_ok()));

        let stored = market.listing(&listing.id).await.unwrap();
        assert_eq!(stored.bids().len(), 20);
        assert_eq!(stored.current_price(), Decimal::from(2390));
    }

    #[tokio::test]
    async fn test_concurrent_accepts_settle_once() {
        let (market, _) = market();
        let listing = market.create_listing(wheat()).await.unwrap();
        let a = market.place_bid(&listing.id, offer("t1", 2300, 50)).await.unwrap();
        let b = market.place_bid(&listing.id, offer("t2", 2250, 30)).await.unwrap();

        let results = join_all([
            market.accept_bid(&listing.id, &a.id, None),
            market.accept_bid(&listing.id, &b.id, Some(PaymentMethod::Upi)),
        ])
        .await;
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);

        let stored = market.listing(&listing.id).await.unwrap();
        assert_eq!(stored.status(), ListingStatus::Sold);
        let accepted = stored
            .bids()
            .iter()
            .filter(|b| b.status == BidStatus::Accepted)
            .count();
        assert_eq!(accepted, 1);
    }

    /// The late bid either lost the race (listing closed) or landed first
    /// and was rejected by the settlement.
    async fn assert_settled_once(
        market: &Marketplace,
        listing_id: &ListingId,
        late: Result<Bid, MarketError>,
    ) {
        let stored = market.listing(listing_id).await.unwrap();
        assert_eq!(stored.status(), ListingStatus::Sold);
        let accepted: Vec<_> = stored
            .bids()
            .iter()
            .filter(|b| b.status == BidStatus::Accepted)
            .collect();
        assert_eq!(accepted.len(), 1);

        match late {
            Err(err) => assert_eq!(
                err,
                MarketError::InvalidBid(BidError::ListingClosed("sold".to_string()))
            ),
            Ok(bid) => assert_eq!(
                stored.bid(&bid.id).map(|b| b.status),
                Some(BidStatus::Rejected)
            ),
        }
    }

    #[tokio::test]
    async fn test_bid_racing_settlement() {
        let (market, _) = market();

        // settlement polled first
        let listing = market.create_listing(wheat()).await.unwrap();
        let a = market.place_bid(&listing.id, offer("t1", 2300, 50)).await.unwrap();
        let (settled, late) = join(
            market.accept_bid(&listing.id, &a.id, None),
            market.place_bid(&listing.id, offer("t2", 2400, 20)),
        )
        .await;
        assert!(settled.is_ok());
        assert_settled_once(&market, &listing.id, late).await;

        // bid polled first
        let listing = market.create_listing(wheat()).await.unwrap();
        let a = market.place_bid(&listing.id, offer("t1", 2300, 50)).await.unwrap();
        let (late, settled) = join(
            market.place_bid(&listing.id, offer("t2", 2400, 20)),
            market.accept_bid(&listing.id, &a.id, None),
        )
        .await;
        assert!(settled.is_ok());
        assert_settled_once(&market, &listing.id, late).await;
    }

    #[tokio::test]
    async fn test_concurrent_bids_and_settlement_via_join_all() {
        let (market, _) = market();
        let listing = market.create_listing(wheat()).await.unwrap();
        let a = market.place_bid(&listing.id, offer("t1", 2300, 50)).await.unwrap();

        let bids = join_all((0..5).map(|i| {
            market.place_bid(&listing.id, offer(&format!("late_{i}"), 2400 + i, 5))
        }));
        let (late, settled) = join(bids, market.accept_bid(&listing.id, &a.id, None)).await;
        assert!(settled.is_ok());
        for outcome in late {
            assert_settled_once(&market, &listing.id, outcome).await;
        }
    }

    #[tokio::test]
    async fn test_large_amounts_are_errors_not_panics() {
        let (market, _) = market();
        let listing = market.create_listing(wheat()).await.unwrap();

        let mut overflowing = offer("t1", 0, 50);
        overflowing.amount = Decimal::from_i128_with_scale(10_i128.pow(28), 0);
        assert!(matches!(
            market.place_bid(&listing.id, overflowing).await.unwrap_err(),
            MarketError::InvalidBid(BidError::AmountTooLarge { .. })
        ));

        let mut top = offer("t2", 0, 1);
        top.amount = Decimal::MAX;
        market.place_bid(&listing.id, top).await.unwrap();
        assert_eq!(
            market.suggested_next_bid(&listing.id).await.unwrap_err(),
            MarketError::Overflow("suggested next bid")
        );
        assert!(market.bid_summary(&listing.id).await.is_err());
    }

    #[tokio::test]
    async fn test_accept_bid_persists_deal_and_transaction() {
        let (market, _) = market();
        let listing = market.create_listing(wheat()).await.unwrap();
        let bid = market.place_bid(&listing.id, offer("t1", 2300, 50)).await.unwrap();

        let settlement = market.accept_bid(&listing.id, &bid.id, None).await.unwrap();
        assert_eq!(settlement.deal.payment_method, PaymentMethod::BankTransfer);
        assert_eq!(market.deal(&settlement.deal.id).await.unwrap(), settlement.deal);
        assert_eq!(
            market.transaction(&settlement.transaction.id).await.unwrap(),
            settlement.transaction
        );
        assert!(market.place_bid(&listing.id, offer("t3", 2400, 1)).await.is_err());
    }

    #[tokio::test]
    async fn test_dispute_workflow_through_service() {
        let (market, clock) = market();
        let listing = market.create_listing(wheat()).await.unwrap();
        let bid = market.place_bid(&listing.id, offer("t1", 2300, 50)).await.unwrap();
        let txn = market
            .accept_bid(&listing.id, &bid.id, None)
            .await
            .unwrap()
            .transaction;

        let request = |priority| RaiseDispute {
            transaction_id: txn.id.clone(),
            raised_by: Party::Trader,
            kind: DisputeKind::Quality,
            priority,
            subject: "Moisture above agreed level".to_string(),
            description: String::new(),
            amount: Decimal::from(20_000),
            evidence: Vec::new(),
        };
        let low = market.raise_dispute(request(Priority::Low)).await.unwrap();
        clock.advance(Duration::minutes(1));
        let urgent = market.raise_dispute(request(Priority::Urgent)).await.unwrap();

        let queue = market.dispute_queue(DisputeFilter::All).await.unwrap();
        let order: Vec<_> = queue.iter().map(|d| d.id.clone()).collect();
        assert_eq!(order, [urgent.id.clone(), low.id.clone()]);

        market
            .investigate_dispute(&urgent.id, Some("Requested lab report".to_string()))
            .await
            .unwrap();
        market.annotate_dispute(&urgent.id, "Report received").await.unwrap();
        let resolved = market
            .resolve_dispute(&urgent.id, Resolution::Partial, None)
            .await
            .unwrap();
        assert_eq!(resolved.status(), DisputeStatus::Resolved);
        assert_eq!(resolved.admin_notes().len(), 2);

        market.close_dispute(&low.id).await.unwrap();
        let open = market
            .dispute_queue(DisputeFilter::Status(DisputeStatus::Open))
            .await
            .unwrap();
        assert!(open.is_empty());

        market.cancel_transaction(&txn.id, "withdrawn").await.unwrap();
        assert!(market.raise_dispute(request(Priority::High)).await.is_err());
    }

    #[tokio::test]
    async fn test_raise_dispute_on_unknown_transaction() {
        let (market, _) = market();
        let err = market
            .raise_dispute(RaiseDispute {
                transaction_id: TransactionId::from("txn_missing"),
                raised_by: Party::Farmer,
                kind: DisputeKind::Payment,
                priority: Priority::High,
                subject: "Payment not received".to_string(),
                description: String::new(),
                amount: Decimal::from(100),
                evidence: Vec::new(),
            })
            .await
            .unwrap_err();
        assert_eq!(err, MarketError::not_found("transaction", "txn_missing"));
    }

    async fn approved(market: &Marketplace, trader: &str) -> TraderVerification {
        let trader_id = UserId::from(trader);
        market.submit_verification(application(trader)).await.unwrap();
        market.start_verification_review(&trader_id).await.unwrap();
        for check in VerificationCheck::ALL {
            market
                .record_verification_check(&trader_id, check, true)
                .await
                .unwrap();
        }
        market.approve_trader(&trader_id).await.unwrap()
    }

    #[tokio::test]
    async fn test_verification_workflow_through_service() {
        let (market, clock) = market();
        let approved = approved(&market, "trader_1").await;
        assert!(approved.is_approved());
        assert_eq!(approved.decided_at(), Some(t0()));

        clock.advance(Duration::minutes(5));
        market.submit_verification(application("trader_2")).await.unwrap();
        let queue = market
            .verification_queue(VerificationFilter::default())
            .await
            .unwrap();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].trader_id, UserId::from("trader_2"));

        let rejected = market
            .reject_trader(&UserId::from("trader_2"), "GST certificate unreadable")
            .await
            .unwrap();
        assert_eq!(rejected.status(), VerificationStatus::Rejected);
        assert_eq!(
            market
                .verification_queue(VerificationFilter::All)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn test_reapply_only_after_rejection() {
        let (market, _) = market();
        market.submit_verification(application("trader_1")).await.unwrap();
        let err = market
            .submit_verification(application("trader_1"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketError::InvalidState(ref m) if m.contains("pending")));

        let trader_id = UserId::from("trader_1");
        market.reject_trader(&trader_id, "incomplete").await.unwrap();
        let again = market.submit_verification(application("trader_1")).await.unwrap();
        assert_eq!(again.status(), VerificationStatus::Pending);
        assert_eq!(again.rejection_reason(), None);
    }

    #[tokio::test]
    async fn test_unknown_trader_verification_is_not_found() {
        let (market, _) = market();
        let err = market
            .approve_trader(&UserId::from("nobody"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MarketError::NotFound {
                entity: "verification",
                id: "nobody".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_verified_bidders_required_when_configured() {
        let market = Marketplace::builder()
            .clock(Arc::new(ManualClock::new(t0())))
            .require_verified_bidders(true)
            .build()
            .unwrap();
        let listing = market.create_listing(wheat()).await.unwrap();

        let err = market
            .place_bid(&listing.id, offer("stranger", 2300, 10))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            MarketError::InvalidBid(BidError::UnverifiedBidder("stranger".to_string()))
        );

        market.submit_verification(application("reviewing")).await.unwrap();
        assert!(market
            .place_bid(&listing.id, offer("reviewing", 2300, 10))
            .await
            .is_err());

        approved(&market, "trader_1").await;
        let bid = market
            .place_bid(&listing.id, offer("trader_1", 2300, 10))
            .await
            .unwrap();
        assert_eq!(bid.status, BidStatus::Pending);
        assert_eq!(market.bids(&listing.id).await.unwrap().len(), 1);
    }
}
