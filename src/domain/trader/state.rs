//! Review operations on a trader verification case.

use super::{TraderVerification, VerificationCheck, VerificationStatus};
use crate::error::MarketError;
use chrono::{DateTime, Utc};

impl TraderVerification {
    pub fn start_review(&mut self, now: DateTime<Utc>) -> Result<(), MarketError> {
        self.check_move(VerificationStatus::UnderReview)?;
        self.status = VerificationStatus::UnderReview;
        self.updated_at = now;
        Ok(())
    }

    /// Record the outcome of one reviewer check. Only while under review.
    pub fn record_check(
        &mut self,
        check: VerificationCheck,
        passed: bool,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        if self.status != VerificationStatus::UnderReview {
            return Err(MarketError::invalid_state(format!(
                "verification for {} is {}, not under review",
                self.trader_id, self.status
            )));
        }
        self.checks.insert(check, passed);
        self.updated_at = now;
        Ok(())
    }

    /// Approve once every required document is on file and every check
    /// has passed.
    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), MarketError> {
        self.check_move(VerificationStatus::Approved)?;
        let missing = self.missing_documents();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|d| d.as_str()).collect();
            return Err(MarketError::invalid_state(format!(
                "missing documents: {}",
                names.join(", ")
            )));
        }
        let outstanding = self.outstanding_checks();
        if !outstanding.is_empty() {
            return Err(MarketError::invalid_state(format!(
                "{} verification checks outstanding: {:?}",
                outstanding.len(),
                outstanding
            )));
        }

        self.status = VerificationStatus::Approved;
        self.decided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Reject with a reason the trader will be told.
    pub fn reject(
        &mut self,
        reason: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        self.check_move(VerificationStatus::Rejected)?;
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(MarketError::invalid_state("rejection reason is required"));
        }

        self.status = VerificationStatus::Rejected;
        self.rejection_reason = Some(reason.trim().to_string());
        self.decided_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn check_move(&self, next: VerificationStatus) -> Result<(), MarketError> {
        if self.status.can_move_to(next) {
            Ok(())
        } else {
            Err(MarketError::InvalidTransition {
                entity: "verification",
                from: self.status.to_string(),
                to: next.to_string(),
            })
        }
    }
}
