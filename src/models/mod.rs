// src/models/mod.rs

//! Domain models for the crawler application.
//!
//! This module contains the data structures shared by the extraction
//! engine, the crawl services and the exporters.

mod config;
mod link;
mod record;

// Re-export all public types
pub use config::{Config, CrawlerConfig, OutputConfig};
pub use link::{LinkCandidate, LinkClassification};
pub use record::{ExtractionCandidate, ExtractionStrategy, Field, FieldConfidences, StoreRecord};
