//! Collection layer - growth-driven discovery of matching entities
//!
//! One accumulator per session, one session active at a time. The session
//! composes the page collaborators with the extraction pipeline and owns
//! start/pause/resume/stop plus progress reporting.

pub mod accumulator;
pub mod session;

// Re-export commonly used items
pub use accumulator::Accumulator;
pub use session::{
    CollectionConfig, CollectionSession, CollectionStatus, CollectionStatusSnapshot,
};
