//! Domain module - entities, events, and shared constants
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod constants;
pub mod entities;
pub mod events;
pub(crate) mod pacing;

// Re-export commonly used items for convenience
pub use entities::{ActivitySignals, EntityCategory, EntityRecord, FilterCriteria};
pub use events::{
    ChannelSink, CompletionReason, DenyReason, EngineEvent, EventSink, NullSink,
};
