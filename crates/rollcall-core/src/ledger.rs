//! Session-scoped attendance ledger.
//!
//! Records are kept in first-seen order and keyed by identity id, so a
//! student can appear at most once per session.

use crate::types::{Identity, Outcome, PresenceRecord};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

#[derive(Debug, Default, Clone)]
pub struct AttendanceLedger {
    records: Vec<PresenceRecord>,
    seen: HashSet<String>,
}

impl AttendanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an identity to the ledger.
    ///
    /// Appends a record and returns [`Outcome::Accepted`] the first time an id
    /// is seen; any later offer for the same id leaves the ledger unchanged.
    pub fn record(&mut self, identity: Identity, timestamp: DateTime<Utc>) -> Outcome {
        if !self.seen.insert(identity.id.clone()) {
            tracing::debug!(id = %identity.id, "duplicate presence rejected");
            return Outcome::DuplicateRejected;
        }

        tracing::debug!(id = %identity.id, name = %identity.name, "presence recorded");
        self.records.push(PresenceRecord {
            identity,
            timestamp,
        });
        Outcome::Accepted
    }

    /// Clear every record.
    pub fn reset(&mut self) {
        self.records.clear();
        self.seen.clear();
    }

    /// Records in first-seen order.
    pub fn records(&self) -> &[PresenceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn student(id: &str) -> Identity {
        Identity::new(id, format!("Student {id}"))
    }

    #[test]
    fn test_first_record_accepted() {
        let mut ledger = AttendanceLedger::new();
        assert_eq!(ledger.record(student("ST001"), Utc::now()), Outcome::Accepted);
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("ST001"));
    }

    #[test]
    fn test_repeat_record_rejected() {
        let mut ledger = AttendanceLedger::new();
        let t0 = Utc::now();
        assert_eq!(ledger.record(student("ST001"), t0), Outcome::Accepted);
        assert_eq!(
            ledger.record(student("ST001"), t0 + Duration::seconds(5)),
            Outcome::DuplicateRejected
        );
        assert_eq!(ledger.len(), 1);
        // original timestamp kept
        assert_eq!(ledger.records()[0].timestamp, t0);
    }

    #[test]
    fn test_duplicate_keyed_by_id_not_name() {
        let mut ledger = AttendanceLedger::new();
        ledger.record(Identity::new("ST001", "John"), Utc::now());
        let outcome = ledger.record(Identity::new("ST001", "Johnny"), Utc::now());
        assert_eq!(outcome, Outcome::DuplicateRejected);
        assert_eq!(ledger.records()[0].identity.name, "John");
    }

    #[test]
    fn test_first_seen_order_preserved() {
        let mut ledger = AttendanceLedger::new();
        let t0 = Utc::now();
        // later timestamp recorded first
        ledger.record(student("ST003"), t0 + Duration::seconds(10));
        ledger.record(student("ST001"), t0);
        ledger.record(student("ST002"), t0 + Duration::seconds(5));
        let ids: Vec<&str> = ledger
            .records()
            .iter()
            .map(|r| r.identity.id.as_str())
            .collect();
        assert_eq!(ids, vec!["ST003", "ST001", "ST002"]);
    }

    #[test]
    fn test_never_holds_duplicate_ids() {
        let mut ledger = AttendanceLedger::new();
        let draws = ["ST002", "ST001", "ST002", "ST004", "ST001", "ST001", "ST003", "ST004"];
        for id in draws {
            ledger.record(student(id), Utc::now());
        }
        let unique: HashSet<&str> = ledger
            .records()
            .iter()
            .map(|r| r.identity.id.as_str())
            .collect();
        assert_eq!(unique.len(), ledger.len());
        assert_eq!(ledger.len(), 4);
    }

    #[test]
    fn test_reset_empties_and_is_idempotent() {
        let mut ledger = AttendanceLedger::new();
        ledger.record(student("ST001"), Utc::now());
        ledger.record(student("ST002"), Utc::now());
        ledger.reset();
        assert!(ledger.is_empty());
        assert!(!ledger.contains("ST001"));
        ledger.reset();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_accepts_again_after_reset() {
        let mut ledger = AttendanceLedger::new();
        ledger.record(student("ST001"), Utc::now());
        ledger.reset();
        assert_eq!(ledger.record(student("ST001"), Utc::now()), Outcome::Accepted);
    }
}
