//! # Agri Market
//!
//! Core of a farmer–trader produce marketplace: the bid book, bid ranking,
//! deal settlement, fulfillment tracking, dispute handling and trader
//! verification.
//!
//! ## Architecture
//!
//! The crate is organized in layers:
//!
//! 1. **Core**: Shared newtypes and domain slices (pure, no I/O)
//! 2. **Ports**: `Clock` and `MarketStore`, injected into the service
//! 3. **Service**: `Marketplace` with per-key writer serialization
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use agri_market::prelude::*;
//!
//! let market = Marketplace::builder()
//!     .platform_fee_rate(Decimal::new(3, 2))
//!     .build()?;
//!
//! let listing = market.create_listing(new_listing).await?;
//! let bid = market.place_bid(&listing.id, submission).await?;
//! let settlement = market.accept_bid(&listing.id, &bid.id, None).await?;
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes and money helpers used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire records, conversions, state.
pub mod domain;

/// Unified marketplace error types.
pub mod error;

/// Fee and bid-suggestion configuration.
pub mod config;

// ── Layer 2: Ports ───────────────────────────────────────────────────────────

/// Injected time source.
pub mod clock;

/// Persistence port and the in-memory store.
pub mod store;

// ── Layer 3: Service ─────────────────────────────────────────────────────────

/// `Marketplace`: the primary entry point.
pub mod marketplace;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{
        BidId, DealId, DisputeId, ListingId, TransactionId, Unit, UserId,
    };
    pub use rust_decimal::Decimal;

    // Domain types: listing
    pub use crate::domain::listing::{Listing, ListingStatus, NewListing};

    // Domain types: bid (includes ranking)
    pub use crate::domain::bid::{
        average_bid, highest_bid, rank_bids, suggested_next_bid, Bid, BidStatus, BidSubmission,
        BidSummary,
    };

    // Domain types: deal, transaction
    pub use crate::domain::deal::{Deal, PaymentMethod, Settlement};
    pub use crate::domain::transaction::{
        DeliveryDetails, StatusChange, StatusDisplay, TimelineStep, Transaction,
        TransactionStatus,
    };

    // Domain types: dispute
    pub use crate::domain::dispute::{
        Dispute, DisputeFilter, DisputeKind, DisputeStatus, Party, Priority, RaiseDispute,
        Resolution,
    };

    // Domain types: trader verification
    pub use crate::domain::trader::{
        BusinessDetails, DocumentKind, TraderApplication, TraderVerification, VerificationCheck,
        VerificationFilter, VerificationStatus,
    };

    // Errors
    pub use crate::error::{BidError, MarketError, StoreError};

    // Config, ports, service
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{BidIncrements, MarketConfig};
    pub use crate::marketplace::{Marketplace, MarketplaceBuilder};
    pub use crate::store::{InMemoryStore, MarketStore};
}
