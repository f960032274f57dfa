//! Service layer for the crawler application.
//!
//! This module contains the business logic for:
//! - Listing page detection (`LinkClassifier`)
//! - Store crawling (`StoreCrawler`)
//! - Store image detection and download (`ImageDetector`, `ImageCollector`)

mod images;
mod links;
mod stores;

pub use images::{DownloadReport, ImageCollector, ImageDetector, filter_image_urls};
pub use links::LinkClassifier;
pub use stores::{CrawlOutcome, ProgressEvent, StoreCrawler, looks_like_listing_name};
