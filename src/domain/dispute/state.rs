//! Dispute workflow operations for the admin back office.

use super::{AdminNote, Dispute, DisputeStatus, Resolution};
use crate::error::MarketError;
use chrono::{DateTime, Utc};

impl Dispute {
    pub fn start_investigation(
        &mut self,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        self.check_move(DisputeStatus::Investigating)?;
        self.status = DisputeStatus::Investigating;
        self.push_note(note, now);
        self.updated_at = now;
        Ok(())
    }

    /// Append an admin note without changing status.
    pub fn add_note(
        &mut self,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        if self.status == DisputeStatus::Closed {
            return Err(MarketError::invalid_state(format!(
                "dispute {} is closed",
                self.id
            )));
        }
        let note = note.into();
        if note.trim().is_empty() {
            return Err(MarketError::invalid_state("note is empty"));
        }
        self.push_note(Some(note), now);
        self.updated_at = now;
        Ok(())
    }

    pub fn resolve(
        &mut self,
        resolution: Resolution,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), MarketError> {
        self.check_move(DisputeStatus::Resolved)?;
        self.status = DisputeStatus::Resolved;
        self.resolution = Some(resolution);
        self.push_note(note, now);
        self.updated_at = now;
        Ok(())
    }

    /// Close the case. Closing without a resolution dismisses it.
    pub fn close(&mut self, now: DateTime<Utc>) -> Result<(), MarketError> {
        self.check_move(DisputeStatus::Closed)?;
        self.status = DisputeStatus::Closed;
        self.updated_at = now;
        Ok(())
    }

    fn check_move(&self, next: DisputeStatus) -> Result<(), MarketError> {
        if self.status.can_move_to(next) {
            Ok(())
        } else {
            Err(MarketError::InvalidTransition {
                entity: "dispute",
                from: self.status.to_string(),
                to: next.to_string(),
            })
        }
    }

    fn push_note(&mut self, note: Option<String>, now: DateTime<Utc>) {
        if let Some(note) = note.filter(|n| !n.trim().is_empty()) {
            self.admin_notes.push(AdminNote { note, at: now });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dispute::fixtures::{request, settled};
    use crate::domain::dispute::Priority;
    use crate::domain::listing::fixtures::t0;
    use crate::shared::DisputeId;

    fn open_dispute() -> Dispute {
        let (deal, txn) = settled();
        Dispute::raise(DisputeId::from("D001"), request(Priority::High), &deal, &txn, t0()).unwrap()
    }

    #[test]
    fn test_investigate_then_resolve_then_close() {
        let mut d = open_dispute();
        d.start_investigation(Some("Contacted trader".to_string()), t0())
            .unwrap();
        assert_eq!(d.status(), DisputeStatus::Investigating);

        d.resolve(Resolution::Partial, Some("Split the difference".to_string()), t0())
            .unwrap();
        assert_eq!(d.status(), DisputeStatus::Resolved);
        assert_eq!(d.resolution(), Some(Resolution::Partial));
        assert_eq!(d.admin_notes().len(), 2);

        d.close(t0()).unwrap();
        assert_eq!(d.status(), DisputeStatus::Closed);
    }

    #[test]
    fn test_resolve_directly_from_open() {
        let mut d = open_dispute();
        d.resolve(Resolution::FavorFarmer, None, t0()).unwrap();
        assert_eq!(d.resolution(), Some(Resolution::FavorFarmer));
        assert!(d.admin_notes().is_empty());
    }

    #[test]
    fn test_cannot_resolve_twice() {
        let mut d = open_dispute();
        d.resolve(Resolution::FavorTrader, None, t0()).unwrap();
        let err = d.resolve(Resolution::FavorFarmer, None, t0()).unwrap_err();
        assert_eq!(
            err,
            MarketError::InvalidTransition {
                entity: "dispute",
                from: "resolved".to_string(),
                to: "resolved".to_string(),
            }
        );
        assert_eq!(d.resolution(), Some(Resolution::FavorTrader));
    }

    #[test]
    fn test_closed_dispute_is_frozen() {
        let mut d = open_dispute();
        d.close(t0()).unwrap();
        assert!(d.add_note("late evidence", t0()).is_err());
        assert!(d.start_investigation(None, t0()).is_err());
        assert!(d.close(t0()).is_err());
        assert_eq!(d.resolution(), None);
    }

    #[test]
    fn test_add_note_rejects_blank() {
        let mut d = open_dispute();
        assert!(d.add_note("   ", t0()).is_err());
        d.add_note("Asked for moisture report", t0()).unwrap();
        assert_eq!(d.admin_notes()[0].note, "Asked for moisture report");
    }
}
