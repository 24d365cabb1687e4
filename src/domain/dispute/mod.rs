//! Dispute domain: complaints raised against a transaction and their
//! resolution by the admin back office.

pub mod state;

use crate::domain::deal::Deal;
use crate::domain::transaction::{Transaction, TransactionStatus};
use crate::error::MarketError;
use crate::shared::{DisputeId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Which side of the deal raised the dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Party {
    Farmer,
    Trader,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeKind {
    Quality,
    Payment,
    Delivery,
    Quantity,
    Other,
}

/// Triage priority. Ordered so that `Urgent` is the greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisputeStatus {
    Open,
    Investigating,
    Resolved,
    Closed,
}

impl DisputeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeStatus::Open => "open",
            DisputeStatus::Investigating => "investigating",
            DisputeStatus::Resolved => "resolved",
            DisputeStatus::Closed => "closed",
        }
    }

    pub fn can_move_to(&self, next: DisputeStatus) -> bool {
        use DisputeStatus::*;
        matches!(
            (self, next),
            (Open, Investigating)
                | (Open, Resolved)
                | (Investigating, Resolved)
                | (Open, Closed)
                | (Investigating, Closed)
                | (Resolved, Closed)
        )
    }
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome an admin decides on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    FavorFarmer,
    FavorTrader,
    Partial,
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminNote {
    pub note: String,
    pub at: DateTime<Utc>,
}

/// What a farmer or trader files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaiseDispute {
    pub transaction_id: TransactionId,
    pub raised_by: Party,
    pub kind: DisputeKind,
    pub priority: Priority,
    pub subject: String,
    pub description: String,
    /// Amount in contention.
    pub amount: Decimal,
    #[serde(default)]
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub transaction_id: TransactionId,
    pub raised_by: Party,
    pub kind: DisputeKind,
    pub priority: Priority,
    pub subject: String,
    pub description: String,
    pub amount: Decimal,
    pub evidence: Vec<String>,
    pub(crate) status: DisputeStatus,
    pub(crate) admin_notes: Vec<AdminNote>,
    pub(crate) resolution: Option<Resolution>,
    pub raised_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Dispute {
    /// Open a dispute against `transaction`, which must belong to `deal`.
    pub fn raise(
        id: DisputeId,
        request: RaiseDispute,
        deal: &Deal,
        transaction: &Transaction,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        if request.transaction_id != transaction.id || transaction.deal_id != deal.id {
            return Err(MarketError::invalid_state(format!(
                "transaction {} does not belong to deal {}",
                request.transaction_id, deal.id
            )));
        }
        if transaction.status() == TransactionStatus::Cancelled {
            return Err(MarketError::invalid_state(format!(
                "transaction {} is cancelled",
                transaction.id
            )));
        }
        if request.subject.trim().is_empty() {
            return Err(MarketError::invalid_state("dispute subject is required"));
        }
        if request.amount <= Decimal::ZERO || request.amount > deal.gross_amount {
            return Err(MarketError::invalid_state(format!(
                "disputed amount {} must be positive and at most {}",
                request.amount, deal.gross_amount
            )));
        }

        Ok(Self {
            id,
            transaction_id: request.transaction_id,
            raised_by: request.raised_by,
            kind: request.kind,
            priority: request.priority,
            subject: request.subject.trim().to_string(),
            description: request.description,
            amount: request.amount,
            evidence: request.evidence,
            status: DisputeStatus::Open,
            admin_notes: Vec::new(),
            resolution: None,
            raised_at: now,
            updated_at: now,
        })
    }

    pub fn status(&self) -> DisputeStatus {
        self.status
    }

    pub fn admin_notes(&self) -> &[AdminNote] {
        &self.admin_notes
    }

    pub fn resolution(&self) -> Option<Resolution> {
        self.resolution
    }
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisputeFilter {
    #[default]
    All,
    Status(DisputeStatus),
}

impl DisputeFilter {
    pub fn matches(&self, dispute: &Dispute) -> bool {
        match self {
            DisputeFilter::All => true,
            DisputeFilter::Status(status) => dispute.status == *status,
        }
    }
}

/// Admin work queue: most urgent first, then oldest first.
pub fn queue(disputes: &[Dispute], filter: DisputeFilter) -> Vec<&Dispute> {
    let mut selected: Vec<&Dispute> = disputes.iter().filter(|d| filter.matches(d)).collect();
    selected.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.raised_at.cmp(&b.raised_at))
    });
    selected
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::domain::bid::fixtures::bid;
    use crate::domain::deal::{settle, SettlementIds, SettlementTerms};
    use crate::domain::listing::fixtures::{t0, wheat_listing};
    use crate::shared::{BidId, DealId};

    pub fn settled() -> (Deal, Transaction) {
        let mut listing = wheat_listing();
        listing.add_bid(bid("a", 2300, 50, 0)).unwrap();
        let settlement = settle(
            &mut listing,
            &BidId::from("a"),
            &SettlementTerms {
                fee_rate: Decimal::new(3, 2),
                currency_decimals: 2,
                payment_method: Default::default(),
            },
            SettlementIds {
                deal_id: DealId::from("deal_1"),
                transaction_id: TransactionId::from("txn_1"),
            },
            t0(),
        )
        .unwrap();
        (settlement.deal, settlement.transaction)
    }

    pub fn request(priority: Priority) -> RaiseDispute {
        RaiseDispute {
            transaction_id: TransactionId::from("txn_1"),
            raised_by: Party::Trader,
            kind: DisputeKind::Quality,
            priority,
            subject: "Poor quality wheat delivered".to_string(),
            description: "Too much moisture and foreign particles".to_string(),
            amount: Decimal::from(115_000),
            evidence: vec!["moisture_test_report.pdf".to_string()],
        }
    }
}
