//! Deduplicating accumulator for discovered entities
//!
//! Owned by exactly one collection session, so admission is a plain
//! synchronous method with no internal locking. Records are immutable once
//! admitted: a re-extraction of an already-seen id is dropped, not merged.

use std::collections::HashSet;

use tracing::trace;

use crate::domain::{EntityRecord, FilterCriteria};

#[derive(Debug, Default)]
pub struct Accumulator {
    records: Vec<EntityRecord>,
    seen: HashSet<String>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits `record` when its id is new and it passes `criteria`.
    /// Returns whether the record was stored; the caller owns progress
    /// notification.
    pub fn admit(&mut self, record: EntityRecord, criteria: &FilterCriteria) -> bool {
        if self.seen.contains(&record.id) {
            trace!(id = %record.id, "duplicate id rejected");
            return false;
        }
        if !criteria.accepts(&record) {
            trace!(id = %record.id, "record rejected by filter criteria");
            return false;
        }
        self.seen.insert(record.id.clone());
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EntityRecord] {
        &self.records
    }

    /// Drains the accumulated records, e.g. when a session hands its
    /// results back to the caller.
    pub fn take_records(&mut self) -> Vec<EntityRecord> {
        self.seen.clear();
        std::mem::take(&mut self.records)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.seen.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActivitySignals, EntityCategory};
    use chrono::Utc;

    fn record(id: &str, scale: u64) -> EntityRecord {
        EntityRecord {
            id: id.into(),
            display_name: id.into(),
            source_url: format!("https://social.example/groups/{id}/"),
            category: EntityCategory::Public,
            scale,
            activity: ActivitySignals::default(),
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn admission_is_idempotent_per_id() {
        let mut acc = Accumulator::new();
        let criteria = FilterCriteria::public_min_scale(0);

        assert!(acc.admit(record("g1", 10), &criteria));
        assert!(!acc.admit(record("g1", 9_999), &criteria));
        assert_eq!(acc.len(), 1);
        // The first admitted record wins; no merge happened.
        assert_eq!(acc.records()[0].scale, 10);
    }

    #[test]
    fn min_scale_100_admits_two_of_three() {
        let mut acc = Accumulator::new();
        let criteria = FilterCriteria::public_min_scale(100);

        let admitted: Vec<bool> = [("a", 50), ("b", 150), ("c", 500)]
            .into_iter()
            .map(|(id, scale)| acc.admit(record(id, scale), &criteria))
            .collect();

        assert_eq!(admitted, vec![false, true, true]);
        assert_eq!(acc.len(), 2);
    }

    #[test]
    fn take_records_drains_and_resets() {
        let mut acc = Accumulator::new();
        let criteria = FilterCriteria::public_min_scale(0);
        acc.admit(record("g1", 1), &criteria);

        let drained = acc.take_records();
        assert_eq!(drained.len(), 1);
        assert!(acc.is_empty());
        // After draining, the same id may be admitted again.
        assert!(acc.admit(record("g1", 1), &criteria));
    }
}
