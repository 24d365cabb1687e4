//! Transaction domain: physical and financial fulfillment of a deal.

pub mod state;

use crate::shared::{DealId, TransactionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use state::StatusChange;

// ─── TransactionStatus ───────────────────────────────────────────────────────

/// Fulfillment status.
///
/// The forward states form a strict chain; `Cancelled` is an auxiliary
/// terminal reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    Pending,
    DealAccepted,
    ProduceCollected,
    PaymentInitiated,
    PaymentCompleted,
    Completed,
    Cancelled,
}

const FORWARD: [TransactionStatus; 6] = [
    TransactionStatus::Pending,
    TransactionStatus::DealAccepted,
    TransactionStatus::ProduceCollected,
    TransactionStatus::PaymentInitiated,
    TransactionStatus::PaymentCompleted,
    TransactionStatus::Completed,
];

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::DealAccepted => "dealAccepted",
            TransactionStatus::ProduceCollected => "produceCollected",
            TransactionStatus::PaymentInitiated => "paymentInitiated",
            TransactionStatus::PaymentCompleted => "paymentCompleted",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        FORWARD
            .iter()
            .chain(std::iter::once(&TransactionStatus::Cancelled))
            .find(|status| status.as_str() == s)
            .copied()
    }

    /// The forward states in order, `Pending` through `Completed`.
    pub fn timeline() -> &'static [TransactionStatus] {
        &FORWARD
    }

    /// Position in the forward chain; `None` for `Cancelled`.
    pub fn rank(&self) -> Option<usize> {
        FORWARD.iter().position(|s| s == self)
    }

    /// The only state a single-step advance may move to.
    pub fn successor(&self) -> Option<TransactionStatus> {
        self.rank().and_then(|i| FORWARD.get(i + 1)).copied()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Completed | TransactionStatus::Cancelled
        )
    }

    pub fn display(&self) -> StatusDisplay {
        let (label, icon, progress_pct) = match self {
            TransactionStatus::Pending => ("Pending", "clock", 10),
            TransactionStatus::DealAccepted => ("Deal Accepted", "check-circle", 25),
            TransactionStatus::ProduceCollected => ("Produce Collected", "package", 45),
            TransactionStatus::PaymentInitiated => ("Payment Initiated", "credit-card", 70),
            TransactionStatus::PaymentCompleted => ("Payment Completed", "shield", 90),
            TransactionStatus::Completed => ("Completed", "badge-check", 100),
            TransactionStatus::Cancelled => ("Cancelled", "x-circle", 0),
        };
        StatusDisplay {
            label,
            icon,
            progress_pct,
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Presentation metadata for a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub label: &'static str,
    pub icon: &'static str,
    pub progress_pct: u8,
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: TransactionStatus,
    pub at: DateTime<Utc>,
}

/// Logistics for moving produce from farm to buyer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub vehicle_id: Option<String>,
    pub driver_name: Option<String>,
    pub driver_contact: Option<String>,
    pub pickup_location: Option<String>,
    pub destination: Option<String>,
    pub eta: Option<DateTime<Utc>>,
}

/// One row of a tracking view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineStep {
    pub status: TransactionStatus,
    pub display: StatusDisplay,
    pub completed: bool,
    pub reached_at: Option<DateTime<Utc>>,
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// Fulfillment tracker for a deal.
///
/// `status_history` is append-only and only grows through the operations in
/// [`state`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub deal_id: DealId,
    pub(crate) status: TransactionStatus,
    pub(crate) status_history: Vec<StatusEntry>,
    pub(crate) delivery_details: Option<DeliveryDetails>,
    pub(crate) cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    /// A new transaction in `Pending`, history seeded with that entry.
    pub fn open(id: TransactionId, deal_id: DealId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            deal_id,
            status: TransactionStatus::Pending,
            status_history: vec![StatusEntry {
                status: TransactionStatus::Pending,
                at: now,
            }],
            delivery_details: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn status_history(&self) -> &[StatusEntry] {
        &self.status_history
    }

    pub fn delivery_details(&self) -> Option<&DeliveryDetails> {
        self.delivery_details.as_ref()
    }

    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    pub fn display(&self) -> StatusDisplay {
        self.status.display()
    }

    /// When `status` was entered, if it ever was.
    pub fn reached_at(&self, status: TransactionStatus) -> Option<DateTime<Utc>> {
        self.status_history
            .iter()
            .find(|entry| entry.status == status)
            .map(|entry| entry.at)
    }

    pub fn timeline(&self) -> Vec<TimelineStep> {
        TransactionStatus::timeline()
            .iter()
            .map(|&status| {
                let reached_at = self.reached_at(status);
                TimelineStep {
                    status,
                    display: status.display(),
                    completed: reached_at.is_some(),
                    reached_at,
                }
            })
            .collect()
    }
}
