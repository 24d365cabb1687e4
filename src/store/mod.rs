//! Persistence port.
//!
//! The marketplace core talks to its data store only through [`MarketStore`].
//! Loads hand back owned snapshots; the service mutates them and saves the
//! result while holding the per-key writer lock.

use crate::domain::deal::Deal;
use crate::domain::dispute::Dispute;
use crate::domain::listing::wire::ListingRecord;
use crate::domain::listing::Listing;
use crate::domain::trader::TraderVerification;
use crate::domain::transaction::Transaction;
use crate::error::StoreError;
use crate::shared::{DealId, DisputeId, ListingId, TransactionId, UserId};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub trait MarketStore: Send + Sync {
    fn load_listing(&self, id: &ListingId) -> Result<Listing, StoreError>;

    fn save_listing(&self, listing: &Listing) -> Result<(), StoreError>;

    fn load_deal(&self, id: &DealId) -> Result<Deal, StoreError>;

    fn load_transaction(&self, id: &TransactionId) -> Result<Transaction, StoreError>;

    fn save_transaction(&self, transaction: &Transaction) -> Result<(), StoreError>;

    /// Persist the sold listing, the new deal and its transaction together.
    ///
    /// Implementations must apply all three or none.
    fn commit_settlement(
        &self,
        listing: &Listing,
        deal: &Deal,
        transaction: &Transaction,
    ) -> Result<(), StoreError>;

    fn load_dispute(&self, id: &DisputeId) -> Result<Dispute, StoreError>;

    fn save_dispute(&self, dispute: &Dispute) -> Result<(), StoreError>;

    fn list_disputes(&self) -> Result<Vec<Dispute>, StoreError>;

    fn load_verification(&self, trader_id: &UserId) -> Result<TraderVerification, StoreError>;

    fn save_verification(&self, verification: &TraderVerification) -> Result<(), StoreError>;

    fn list_verifications(&self) -> Result<Vec<TraderVerification>, StoreError>;
}

// ─── InMemoryStore ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Tables {
    listings: HashMap<ListingId, Listing>,
    deals: HashMap<DealId, Deal>,
    transactions: HashMap<TransactionId, Transaction>,
    disputes: HashMap<DisputeId, Dispute>,
    verifications: HashMap<UserId, TraderVerification>,
}

/// Process-local store backed by hash maps.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from a JSON array of listing rows.
    ///
    /// Every row is validated; the first invalid row aborts the load.
    pub fn from_json_snapshot(json: &str) -> Result<Self, StoreError> {
        let records: Vec<ListingRecord> = serde_json::from_str(json)
            .map_err(|e| StoreError::Backend(format!("malformed snapshot: {}", e)))?;

        let mut tables = Tables::default();
        for record in records {
            let listing = Listing::try_from(record)
                .map_err(|e| StoreError::Backend(format!("invalid snapshot row: {}", e)))?;
            tables.listings.insert(listing.id.clone(), listing);
        }
        tracing::debug!(listings = tables.listings.len(), "seeded in-memory store");

        Ok(Self {
            tables: RwLock::new(tables),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|_| StoreError::Backend("store lock poisoned".to_string()))
    }
}

fn missing(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

impl MarketStore for InMemoryStore {
    fn load_listing(&self, id: &ListingId) -> Result<Listing, StoreError> {
        self.read()?
            .listings
            .get(id)
            .cloned()
            .ok_or_else(|| missing("listing", id))
    }

    fn save_listing(&self, listing: &Listing) -> Result<(), StoreError> {
        self.write()?
            .listings
            .insert(listing.id.clone(), listing.clone());
        Ok(())
    }

    fn load_deal(&self, id: &DealId) -> Result<Deal, StoreError> {
        self.read()?
            .deals
            .get(id)
            .cloned()
            .ok_or_else(|| missing("deal", id))
    }

    fn load_transaction(&self, id: &TransactionId) -> Result<Transaction, StoreError> {
        self.read()?
            .transactions
            .get(id)
            .cloned()
            .ok_or_else(|| missing("transaction", id))
    }

    fn save_transaction(&self, transaction: &Transaction) -> Result<(), StoreError> {
        self.write()?
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    fn commit_settlement(
        &self,
        listing: &Listing,
        deal: &Deal,
        transaction: &Transaction,
    ) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        tables.listings.insert(listing.id.clone(), listing.clone());
        tables.deals.insert(deal.id.clone(), deal.clone());
        tables
            .transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    fn load_dispute(&self, id: &DisputeId) -> Result<Dispute, StoreError> {
        self.read()?
            .disputes
            .get(id)
            .cloned()
            .ok_or_else(|| missing("dispute", id))
    }

    fn save_dispute(&self, dispute: &Dispute) -> Result<(), StoreError> {
        self.write()?
            .disputes
            .insert(dispute.id.clone(), dispute.clone());
        Ok(())
    }

    fn list_disputes(&self) -> Result<Vec<Dispute>, StoreError> {
        Ok(self.read()?.disputes.values().cloned().collect())
    }

    fn load_verification(&self, trader_id: &UserId) -> Result<TraderVerification, StoreError> {
        self.read()?
            .verifications
            .get(trader_id)
            .cloned()
            .ok_or_else(|| missing("verification", trader_id))
    }

    fn save_verification(&self, verification: &TraderVerification) -> Result<(), StoreError> {
        self.write()?
            .verifications
            .insert(verification.trader_id.clone(), verification.clone());
        Ok(())
    }

    fn list_verifications(&self) -> Result<Vec<TraderVerification>, StoreError> {
        Ok(self.read()?.verifications.values().cloned().collect())
    }
}
