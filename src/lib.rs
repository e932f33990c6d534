//! scrollscout: incremental collection and automated interaction engine
//!
//! Two cooperating async state machines over a host-provided page surface.
//! The collection session repeatedly snapshots a scroll-driven view,
//! extracts structured records through a prioritized probe cascade with a
//! structural fallback, deduplicates and filters them, and triggers view
//! growth until a stop condition fires. The interaction session then walks
//! a frozen queue of collected records under rate and schedule gates,
//! advancing a persisted resume cursor on every confirmed commit.
//!
//! The engine owns no browser, no network, and no UI. Hosts supply the
//! collaborators: a [`PageView`] and [`GrowthTrigger`] for the surface, an
//! [`EngageStep`] for the per-item action, a [`KvStore`] for persistence,
//! and an [`EventSink`] for progress.
//!
//! [`PageView`]: infrastructure::PageView
//! [`GrowthTrigger`]: infrastructure::GrowthTrigger
//! [`EngageStep`]: interaction::EngageStep
//! [`KvStore`]: infrastructure::KvStore
//! [`EventSink`]: domain::EventSink

pub mod collection;
pub mod domain;
pub mod error;
pub mod extraction;
pub mod infrastructure;
pub mod interaction;

pub use collection::{CollectionConfig, CollectionSession, CollectionStatus};
pub use domain::{
    ChannelSink, CompletionReason, DenyReason, EngineEvent, EntityCategory, EntityRecord,
    EventSink, FilterCriteria, NullSink,
};
pub use error::EngineError;
pub use extraction::{ExtractionPipeline, ExtractionRules};
pub use infrastructure::{JsonFileKvStore, KvStore, MemoryKvStore};
pub use interaction::{
    CursorStore, EngageOutcome, EngageStep, InteractionConfig, InteractionReport,
    InteractionSession, RatePolicy,
};
