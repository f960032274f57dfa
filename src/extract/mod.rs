//! Store information extraction engine.
//!
//! Pages are handled by a catalogued [`SiteRule`] when one matches the host,
//! and by the confidence-scored [`FieldExtractor`] otherwise.

pub mod fields;
pub mod metadata;
pub mod orchestrator;
pub mod patterns;
pub mod sites;
pub mod structure;

pub use fields::{FieldEngine, FieldExtractor};
pub use orchestrator::ExtractionOrchestrator;
pub use sites::{SiteRule, SiteRuleRegistry};
