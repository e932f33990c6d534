//! Extraction layer - probes and field parsers for render-tree snapshots
//!
//! Resilience to a loosely-structured, frequently-changing page comes from
//! an explicit, ordered probe list instead of inline selector cascades;
//! every probe and every field parser is independently testable against
//! fixture markup.

pub mod parse;
pub mod probes;

// Re-export commonly used items
pub use probes::{ExtractionPipeline, ExtractionRules};
