//! Trader domain: the verification a trader passes before bidding.
//!
//! A trader applies with identity and business documents. An admin moves the
//! application into review, ticks off the checks and approves or rejects it.

pub mod state;

use crate::error::MarketError;
use crate::shared::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Documents an application carries, by the file name uploaded for each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Aadhaar,
    Pan,
    Gst,
    /// Market-yard trading license.
    Apmc,
    BankStatement,
}

impl DocumentKind {
    pub const REQUIRED: [DocumentKind; 5] = [
        DocumentKind::Aadhaar,
        DocumentKind::Pan,
        DocumentKind::Gst,
        DocumentKind::Apmc,
        DocumentKind::BankStatement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Aadhaar => "aadhaar",
            DocumentKind::Pan => "pan",
            DocumentKind::Gst => "gst",
            DocumentKind::Apmc => "apmc",
            DocumentKind::BankStatement => "bank_statement",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the reviewing admin confirms before approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationCheck {
    BusinessRegistration,
    ApmcLicense,
    References,
    Background,
}

impl VerificationCheck {
    pub const ALL: [VerificationCheck; 4] = [
        VerificationCheck::BusinessRegistration,
        VerificationCheck::ApmcLicense,
        VerificationCheck::References,
        VerificationCheck::Background,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    UnderReview,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::UnderReview => "under_review",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }

    /// Approval needs a review first; rejection is allowed straight from
    /// `Pending` for applications that are plainly incomplete.
    pub fn can_move_to(&self, next: VerificationStatus) -> bool {
        use VerificationStatus::*;
        matches!(
            (self, next),
            (Pending, UnderReview)
                | (UnderReview, Approved)
                | (Pending, Rejected)
                | (UnderReview, Rejected)
        )
    }

    pub fn is_decided(&self) -> bool {
        matches!(self, VerificationStatus::Approved | VerificationStatus::Rejected)
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BusinessDetails {
    /// e.g. "Wholesale Trading".
    pub business_type: String,
    pub years_of_experience: Option<u32>,
    /// Free-form, as declared by the applicant.
    pub annual_turnover: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

/// What a trader files to get verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraderApplication {
    pub trader_id: UserId,
    pub name: String,
    pub business_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub documents: BTreeMap<DocumentKind, String>,
    #[serde(default)]
    pub business: BusinessDetails,
}

/// A trader's verification case.
///
/// `status`, `checks` and the decision fields only change through the
/// operations in [`state`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraderVerification {
    pub trader_id: UserId,
    pub name: String,
    pub business_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub location: Option<String>,
    pub documents: BTreeMap<DocumentKind, String>,
    pub business: BusinessDetails,
    pub applied_at: DateTime<Utc>,
    pub(crate) status: VerificationStatus,
    pub(crate) checks: BTreeMap<VerificationCheck, bool>,
    pub(crate) rejection_reason: Option<String>,
    pub(crate) decided_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TraderVerification {
    /// Open a `Pending` case. Missing documents are allowed here and block
    /// approval later.
    pub fn submit(
        application: TraderApplication,
        now: DateTime<Utc>,
    ) -> Result<Self, MarketError> {
        if application.name.trim().is_empty() {
            return Err(MarketError::invalid_state("trader name is required"));
        }
        if application.business_name.trim().is_empty() {
            return Err(MarketError::invalid_state("business name is required"));
        }
        if application.phone.trim().is_empty() {
            return Err(MarketError::invalid_state("phone number is required"));
        }
        let documents = application
            .documents
            .into_iter()
            .filter(|(_, file)| !file.trim().is_empty())
            .collect();

        Ok(Self {
            trader_id: application.trader_id,
            name: application.name.trim().to_string(),
            business_name: application.business_name.trim().to_string(),
            phone: application.phone.trim().to_string(),
            email: application.email.filter(|e| !e.trim().is_empty()),
            location: application.location.filter(|l| !l.trim().is_empty()),
            documents,
            business: application.business,
            applied_at: now,
            status: VerificationStatus::Pending,
            checks: BTreeMap::new(),
            rejection_reason: None,
            decided_at: None,
            updated_at: now,
        })
    }

    pub fn status(&self) -> VerificationStatus {
        self.status
    }

    pub fn is_approved(&self) -> bool {
        self.status == VerificationStatus::Approved
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn decided_at(&self) -> Option<DateTime<Utc>> {
        self.decided_at
    }

    /// Required documents with no uploaded file.
    pub fn missing_documents(&self) -> Vec<DocumentKind> {
        DocumentKind::REQUIRED
            .into_iter()
            .filter(|kind| !self.documents.contains_key(kind))
            .collect()
    }

    /// Checks not yet confirmed by the reviewer.
    pub fn outstanding_checks(&self) -> Vec<VerificationCheck> {
        VerificationCheck::ALL
            .into_iter()
            .filter(|check| self.checks.get(check) != Some(&true))
            .collect()
    }
}

// ─── Queue ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerificationFilter {
    All,
    /// Pending or under review.
    #[default]
    Undecided,
    Status(VerificationStatus),
}

impl VerificationFilter {
    pub fn matches(&self, verification: &TraderVerification) -> bool {
        match self {
            VerificationFilter::All => true,
            VerificationFilter::Undecided => !verification.status.is_decided(),
            VerificationFilter::Status(status) => verification.status == *status,
        }
    }
}

/// Review queue, oldest application first.
pub fn queue(
    verifications: &[TraderVerification],
    filter: VerificationFilter,
) -> Vec<&TraderVerification> {
    let mut selected: Vec<&TraderVerification> =
        verifications.iter().filter(|v| filter.matches(v)).collect();
    selected.sort_by(|a, b| {
        a.applied_at
            .cmp(&b.applied_at)
            .then_with(|| a.trader_id.cmp(&b.trader_id))
    });
    selected
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn application(trader: &str) -> TraderApplication {
        let documents = DocumentKind::REQUIRED
            .into_iter()
            .map(|kind| (kind, format!("{}_{}.pdf", kind, trader)))
            .collect();
        TraderApplication {
            trader_id: UserId::from(trader),
            name: "Rajesh Kumar Gupta".to_string(),
            business_name: "Gupta Trading Company".to_string(),
            phone: "+91-9876543210".to_string(),
            email: Some("rajesh@guptatrading.com".to_string()),
            location: Some("Mumbai APMC, Maharashtra".to_string()),
            documents,
            business: BusinessDetails {
                business_type: "Wholesale Trading".to_string(),
                years_of_experience: Some(15),
                annual_turnover: None,
                references: vec!["Sharma Enterprises".to_string()],
            },
        }
    }
}
