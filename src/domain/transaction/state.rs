//! Transaction status machine.
//!
//! Moves are externally triggered and never retried here. Re-reporting the
//! current status is a no-op so callers can reconcile after a timeout; any
//! other illegal move is an error and leaves the history untouched.

use super::{DeliveryDetails, StatusEntry, Transaction, TransactionStatus};
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a status report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusChange {
    Applied,
    AlreadyCurrent,
}

impl Transaction {
    /// Move to `target`, which must be the immediate successor or `Cancelled`.
    pub fn advance(
        &mut self,
        target: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, MarketError> {
        if target == self.status {
            return Ok(StatusChange::AlreadyCurrent);
        }
        if target == TransactionStatus::Cancelled && !self.status.is_terminal() {
            self.record(TransactionStatus::Cancelled, now);
            return Ok(StatusChange::Applied);
        }
        if self.status.successor() != Some(target) {
            return Err(MarketError::InvalidTransition {
                entity: "transaction",
                from: self.status.to_string(),
                to: target.to_string(),
            });
        }

        self.record(target, now);
        Ok(StatusChange::Applied)
    }

    /// Cancel from any state except `Completed` or `Cancelled`.
    pub fn cancel(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        if self.status.is_terminal() {
            return Err(MarketError::invalid_state(format!(
                "transaction {} is already {}",
                self.id, self.status
            )));
        }
        let reason = reason.into();
        self.cancellation_reason = Some(reason).filter(|r| !r.trim().is_empty());
        self.record(TransactionStatus::Cancelled, now);
        Ok(())
    }

    /// Attach or replace logistics details while the transaction is live.
    pub fn set_delivery_details(
        &mut self,
        details: DeliveryDetails,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        if self.status.is_terminal() {
            return Err(MarketError::invalid_state(format!(
                "transaction {} is {}",
                self.id, self.status
            )));
        }
        self.delivery_details = Some(details);
        self.updated_at = now;
        Ok(())
    }

    fn record(&mut self, status: TransactionStatus, now: DateTime<Utc>) {
        // history stays ordered even if the injected clock goes backwards
        let at = self
            .status_history
            .last()
            .map_or(now, |last| last.at.max(now));
        self.status = status;
        self.status_history.push(StatusEntry { status, at });
        self.updated_at = at;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::listing::fixtures::t0;
    use crate::domain::transaction::TransactionStatus::*;
    use crate::shared::{DealId, TransactionId};
    use chrono::Duration;

    const FORWARD: [TransactionStatus; 5] = [
        DealAccepted,
        ProduceCollected,
        PaymentInitiated,
        PaymentCompleted,
        Completed,
    ];

    fn txn() -> Transaction {
        Transaction::open(TransactionId::from("t1"), DealId::from("d1"), t0())
    }

    fn minutes(m: i64) -> DateTime<Utc> {
        t0() + Duration::minutes(m)
    }

    #[test]
    fn test_full_forward_walk() {
        let mut t = txn();
        for (i, target) in FORWARD.into_iter().enumerate() {
            assert_eq!(
                t.advance(target, minutes(i as i64 + 1)).unwrap(),
                StatusChange::Applied
            );
            assert_eq!(t.status(), target);
        }
        let history: Vec<_> = t.status_history().iter().map(|e| e.status).collect();
        assert_eq!(history, TransactionStatus::timeline());
        assert_eq!(t.display().progress_pct, 100);
        assert!(t.timeline().iter().all(|step| step.completed));
    }

    #[test]
    fn test_skip_is_rejected_and_history_unchanged() {
        let mut t = txn();
        let before = t.status_history().to_vec();

        let err = t.advance(PaymentCompleted, minutes(1)).unwrap_err();
        assert_eq!(
            err,
            MarketError::InvalidTransition {
                entity: "transaction",
                from: "pending".to_string(),
                to: "paymentCompleted".to_string(),
            }
        );
        assert!(t.advance(ProduceCollected, minutes(1)).is_err());
        assert_eq!(t.status(), Pending);
        assert_eq!(t.status_history(), before.as_slice());
    }

    #[test]
    fn test_backwards_move_is_rejected() {
        let mut t = txn();
        t.advance(DealAccepted, minutes(1)).unwrap();
        t.advance(ProduceCollected, minutes(2)).unwrap();
        assert!(matches!(
            t.advance(DealAccepted, minutes(3)).unwrap_err(),
            MarketError::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_reporting_current_status_is_noop() {
        let mut t = txn();
        t.advance(DealAccepted, minutes(1)).unwrap();
        assert_eq!(
            t.advance(DealAccepted, minutes(2)).unwrap(),
            StatusChange::AlreadyCurrent
        );
        assert_eq!(t.status_history().len(), 2);
        assert_eq!(t.reached_at(DealAccepted), Some(minutes(1)));
    }

    #[test]
    fn test_completed_is_immutable() {
        let mut t = txn();
        for target in FORWARD {
            t.advance(target, minutes(1)).unwrap();
        }
        assert!(t.advance(Cancelled, minutes(2)).is_err());
        assert!(matches!(
            t.cancel("late", minutes(2)).unwrap_err(),
            MarketError::InvalidState(_)
        ));
        assert_eq!(t.advance(Completed, minutes(3)).unwrap(), StatusChange::AlreadyCurrent);
        assert_eq!(t.status(), Completed);
    }

    #[test]
    fn test_cancel_from_mid_flow() {
        let mut t = txn();
        t.advance(DealAccepted, minutes(1)).unwrap();
        t.cancel("quality dispute", minutes(5)).unwrap();
        assert_eq!(t.status(), Cancelled);
        assert_eq!(t.cancellation_reason(), Some("quality dispute"));
        assert_eq!(t.display().progress_pct, 0);

        // second cancel is an error, re-reporting the status is not
        assert!(t.cancel("again", minutes(6)).is_err());
        assert_eq!(t.advance(Cancelled, minutes(6)).unwrap(), StatusChange::AlreadyCurrent);
        assert!(t.advance(ProduceCollected, minutes(6)).is_err());

        let done: Vec<_> = t
            .timeline()
            .into_iter()
            .filter(|step| step.completed)
            .map(|step| step.status)
            .collect();
        assert_eq!(done, [Pending, DealAccepted]);
    }

    #[test]
    fn test_advance_to_cancelled_without_reason() {
        let mut t = txn();
        assert_eq!(t.advance(Cancelled, minutes(1)).unwrap(), StatusChange::Applied);
        assert_eq!(t.cancellation_reason(), None);
    }

    #[test]
    fn test_history_timestamps_never_go_backwards() {
        let mut t = txn();
        t.advance(DealAccepted, t0() - Duration::hours(1)).unwrap();
        let history = t.status_history();
        assert!(history[1].at >= history[0].at);
    }

    #[test]
    fn test_delivery_details_only_while_live() {
        let mut t = txn();
        let details = DeliveryDetails {
            vehicle_id: Some("MH12AB1234".to_string()),
            driver_contact: Some("+91-9876543210".to_string()),
            ..DeliveryDetails::default()
        };
        t.set_delivery_details(details.clone(), minutes(1)).unwrap();
        assert_eq!(t.delivery_details(), Some(&details));

        t.cancel("", minutes(2)).unwrap();
        assert_eq!(t.cancellation_reason(), None);
        assert!(t.set_delivery_details(details, minutes(3)).is_err());
    }
}
