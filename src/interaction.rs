//! Interaction layer: sequential automation over collected items
//!
//! A frozen queue of records is walked strictly in order, each item passing
//! the rate gate and then the pluggable engage step. Confirmed commits
//! advance a persisted resume cursor so an interrupted run can pick up
//! where it left off, across process restarts.

pub mod cursor_store;
pub mod engage;
pub mod rate_policy;
pub mod session;

pub use cursor_store::{CursorRecord, CursorSnapshot, CursorStore, ProcessedEntry};
pub use engage::{AccessGuard, EngageOutcome, EngageStep, FnStep, GatedStep, InstrumentedStep};
pub use rate_policy::{ActiveHours, RateCounters, RatePolicy, can_proceed};
pub use session::{
    Disposition, InteractionConfig, InteractionReport, InteractionSession, InteractionStatus,
    InteractionStatusSnapshot, ItemOutcome,
};
