//! Shared defaults and heuristic thresholds
//!
//! Collected here so sessions, parsers, and stores agree on one set of
//! numbers and tests can reference them instead of repeating literals.

/// Default delay between growth steps of a collection session.
pub const DEFAULT_STEP_DELAY_MS: u64 = 1_500;

/// Default upper bound on growth steps per collection session.
pub const DEFAULT_STEP_LIMIT: u32 = 40;

/// Consecutive fruitless steps before a collection session concludes the
/// page has stopped growing.
pub const DEFAULT_NO_GROWTH_LIMIT: u32 = 3;

/// Steps with zero admitted records before a `RedirectSuggested` event is
/// emitted (the session is probably scanning the wrong view).
pub const DEFAULT_REDIRECT_PROBE_STEPS: u32 = 5;

/// Default delay between engaged items of an interaction session.
pub const DEFAULT_ITEM_DELAY_MS: u64 = 4_000;

/// Fraction of a configured delay applied as random jitter, both directions.
pub const DELAY_JITTER_RATIO: f64 = 0.25;

/// Upper bound on retained processed-log entries per target. Truncation
/// drops the oldest entries and never touches `last_index`.
pub const PROCESSED_LOG_CAP: usize = 500;

/// Fallback activity estimate when no activity keyword matches: posts per
/// month proportional to the entity's scale.
pub const ACTIVITY_SCALE_FALLBACK_RATIO: f64 = 0.01;

/// Minimum subtree text length for a synthesized fallback container.
/// A detached snapshot has no bounding boxes; text mass stands in for size.
pub const MIN_CONTAINER_TEXT_LEN: usize = 40;

/// Minimum descendant element count for a synthesized fallback container.
pub const MIN_CONTAINER_DESCENDANTS: usize = 3;

/// Default rate policy caps.
pub const DEFAULT_DAILY_LIMIT: u32 = 20;
pub const DEFAULT_HOURLY_LIMIT: u32 = 5;
pub const DEFAULT_COOLDOWN_SECS: i64 = 120;

/// Persistence keys. All cursors live under one key so a paired
/// `last_index` + log update is a single-key atomic write.
pub const KEY_CURSORS: &str = "cursors";
pub const KEY_RATE_COUNTERS: &str = "rate_counters";
