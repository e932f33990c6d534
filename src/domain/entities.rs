//! Domain entities
//!
//! Contains the discovered-entity record, activity signals, and the
//! caller-supplied filter criteria applied at admission time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Visibility category of a discovered entity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntityCategory {
    Public,
    Private,
}

impl std::fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityCategory::Public => write!(f, "public"),
            EntityCategory::Private => write!(f, "private"),
        }
    }
}

/// Numeric activity estimates for one entity.
///
/// Every field is optional: extraction fills in whichever signals the
/// rendered text supported, and filter criteria reuse the same shape as
/// per-signal minimum thresholds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ActivitySignals {
    pub posts_per_day: Option<f64>,
    pub posts_per_month: Option<f64>,
    pub posts_per_year: Option<f64>,
}

impl ActivitySignals {
    /// True when no signal is defined.
    pub fn is_empty(&self) -> bool {
        self.posts_per_day.is_none()
            && self.posts_per_month.is_none()
            && self.posts_per_year.is_none()
    }

    /// True when at least one threshold defined in `thresholds` is met or
    /// exceeded by the corresponding signal of `self`. A signal missing on
    /// `self` never satisfies a defined threshold.
    pub fn meets_any(&self, thresholds: &ActivitySignals) -> bool {
        let pairs = [
            (self.posts_per_day, thresholds.posts_per_day),
            (self.posts_per_month, thresholds.posts_per_month),
            (self.posts_per_year, thresholds.posts_per_year),
        ];
        pairs
            .iter()
            .any(|(value, min)| match (value, min) {
                (Some(v), Some(m)) => v >= m,
                _ => false,
            })
    }
}

/// One discovered item (group, profile, or member).
///
/// `id` is the dedupe key, derived from the canonical link path segment.
/// Records are immutable once admitted; re-extraction of the same id is
/// dropped by the accumulator, never merged.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRecord {
    pub id: String,
    pub display_name: String,
    pub source_url: String,
    pub category: EntityCategory,
    /// Size of the entity (e.g. member count), parsed from abbreviated
    /// text such as "1.2K members".
    pub scale: u64,
    pub activity: ActivitySignals,
    pub discovered_at: DateTime<Utc>,
}

/// Caller-supplied admission predicate for a collection session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Category allow-set. Must be non-empty.
    pub categories: Vec<EntityCategory>,
    /// Hard minimum scale, always enforced.
    pub min_scale: u64,
    /// Optional per-signal minimums. Soft requirement: a record passes if
    /// at least one defined threshold is met; with none defined the clause
    /// is vacuously satisfied.
    pub min_activity: ActivitySignals,
}

impl FilterCriteria {
    /// Criteria admitting every public entity of at least `min_scale`.
    pub fn public_min_scale(min_scale: u64) -> Self {
        Self {
            categories: vec![EntityCategory::Public],
            min_scale,
            min_activity: ActivitySignals::default(),
        }
    }

    /// Validates structural requirements before a session starts.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.categories.is_empty() {
            return Err(EngineError::InvalidCriteria(
                "at least one category must be enabled".into(),
            ));
        }
        Ok(())
    }

    /// Full admission predicate, dedupe excluded (that is the
    /// accumulator's job).
    pub fn accepts(&self, record: &EntityRecord) -> bool {
        if !self.categories.contains(&record.category) {
            return false;
        }
        if record.scale < self.min_scale {
            return false;
        }
        if self.min_activity.is_empty() {
            return true;
        }
        record.activity.meets_any(&self.min_activity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(category: EntityCategory, scale: u64, activity: ActivitySignals) -> EntityRecord {
        EntityRecord {
            id: "g1".into(),
            display_name: "Group".into(),
            source_url: "https://example.com/groups/g1".into(),
            category,
            scale,
            activity,
            discovered_at: Utc::now(),
        }
    }

    #[test]
    fn empty_category_set_is_invalid() {
        let criteria = FilterCriteria {
            categories: vec![],
            min_scale: 0,
            min_activity: ActivitySignals::default(),
        };
        assert!(criteria.validate().is_err());
    }

    #[test]
    fn min_scale_is_a_hard_requirement() {
        let criteria = FilterCriteria::public_min_scale(100);
        assert!(!criteria.accepts(&record(
            EntityCategory::Public,
            50,
            ActivitySignals::default()
        )));
        assert!(criteria.accepts(&record(
            EntityCategory::Public,
            150,
            ActivitySignals::default()
        )));
    }

    #[test]
    fn category_outside_allow_set_is_rejected() {
        let criteria = FilterCriteria::public_min_scale(0);
        assert!(!criteria.accepts(&record(
            EntityCategory::Private,
            10,
            ActivitySignals::default()
        )));
    }

    #[test]
    fn activity_clause_is_vacuous_without_thresholds() {
        let criteria = FilterCriteria::public_min_scale(0);
        assert!(criteria.accepts(&record(
            EntityCategory::Public,
            10,
            ActivitySignals::default()
        )));
    }

    #[test]
    fn any_single_activity_threshold_suffices() {
        let mut criteria = FilterCriteria::public_min_scale(0);
        criteria.min_activity = ActivitySignals {
            posts_per_day: Some(5.0),
            posts_per_month: Some(100.0),
            posts_per_year: None,
        };

        // Meets the monthly threshold only.
        let activity = ActivitySignals {
            posts_per_day: Some(1.0),
            posts_per_month: Some(120.0),
            posts_per_year: None,
        };
        assert!(criteria.accepts(&record(EntityCategory::Public, 10, activity)));

        // Meets neither.
        let activity = ActivitySignals {
            posts_per_day: Some(1.0),
            posts_per_month: Some(10.0),
            posts_per_year: None,
        };
        assert!(!criteria.accepts(&record(EntityCategory::Public, 10, activity)));

        // Defined threshold, missing signal: not met.
        assert!(!criteria.accepts(&record(
            EntityCategory::Public,
            10,
            ActivitySignals::default()
        )));
    }
}
