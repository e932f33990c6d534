//! Infrastructure layer - collaborator traits and their stock implementations
//!
//! Everything the engine needs from the outside world crosses one of these
//! seams: key-value persistence, the rendered page, and telemetry setup.

pub mod kv_store;
pub mod page;
pub mod telemetry;

// Re-export commonly used items
pub use kv_store::{JsonFileKvStore, KvStore, MemoryKvStore};
pub use page::{FixturePage, GrowthTrigger, PageView};
