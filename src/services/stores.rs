// src/services/stores.rs

//! Store crawl service.
//!
//! Fetches one page, extracts its record and, when the page lists branch
//! pages, fetches and extracts each of them in turn.

use std::time::Duration;

use reqwest::Client;
use scraper::Html;
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::error::Result;
use crate::extract::ExtractionOrchestrator;
use crate::models::{CrawlerConfig, LinkClassification, StoreRecord};
use crate::services::LinkClassifier;
use crate::utils::http::{create_async_client, fetch_html};

/// Progress of a crawl, sent as it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// The top-level page was fetched
    PageLoaded { url: String },
    /// The page is a listing with `total` branch links
    ListingDetected { total: usize },
    /// Fetching branch page `index` (1-based) of `total`
    DetailStarted {
        index: usize,
        total: usize,
        url: String,
        label: String,
    },
    /// A branch page could not be fetched and was skipped
    DetailFailed { url: String, error: String },
    /// A record was kept; `count` records so far
    RecordAdded { count: usize },
    /// The crawl completed with `records` records
    Finished { records: usize },
}

/// Result of crawling one URL.
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    pub records: Vec<StoreRecord>,
    pub is_listing: bool,
    /// Branch pages attempted
    pub detail_total: usize,
    /// Branch pages skipped after a fetch failure
    pub detail_failures: usize,
}

/// Two-level store crawler: a page and, for listings, its branch pages.
pub struct StoreCrawler {
    client: Client,
    orchestrator: ExtractionOrchestrator,
    classifier: LinkClassifier,
    request_delay: Duration,
    progress: Option<UnboundedSender<ProgressEvent>>,
}

impl StoreCrawler {
    /// Create a crawler with the built-in extraction rules.
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            orchestrator: ExtractionOrchestrator::new(),
            classifier: LinkClassifier::new(),
            request_delay: Duration::from_millis(config.request_delay_ms),
            progress: None,
        })
    }

    /// Report progress events to `sender`.
    pub fn with_progress(mut self, sender: UnboundedSender<ProgressEvent>) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Crawl `url` and return the records found.
    ///
    /// An invalid `url` or a failure to fetch it is returned as an error;
    /// failures on branch pages are logged, counted and skipped.
    pub async fn crawl(&self, url: &str) -> Result<CrawlOutcome> {
        Url::parse(url)?;
        let body = fetch_html(&self.client, url).await?;
        log::info!("Loaded {}", url);
        self.emit(ProgressEvent::PageLoaded {
            url: url.to_string(),
        });

        let (page_record, links) = self.analyze_page(&body, url);
        let mut outcome = CrawlOutcome::default();

        if page_record.passes_quality() && !looks_like_listing_name(&page_record.name) {
            self.keep(&mut outcome, page_record);
        }

        if links.is_listing {
            let total = links.candidates.len();
            log::info!("Listing page with {} store links", total);
            self.emit(ProgressEvent::ListingDetected { total });
            outcome.is_listing = true;
            outcome.detail_total = total;

            for (i, link) in links.candidates.iter().enumerate() {
                if i > 0 && !self.request_delay.is_zero() {
                    tokio::time::sleep(self.request_delay).await;
                }
                log::info!("[{}/{}] {}", i + 1, total, link.anchor_text);
                self.emit(ProgressEvent::DetailStarted {
                    index: i + 1,
                    total,
                    url: link.absolute_url.clone(),
                    label: link.anchor_text.clone(),
                });

                let body = match fetch_html(&self.client, &link.absolute_url).await {
                    Ok(body) => body,
                    Err(e) => {
                        log::warn!("Skipping {}: {}", link.absolute_url, e);
                        outcome.detail_failures += 1;
                        self.emit(ProgressEvent::DetailFailed {
                            url: link.absolute_url.clone(),
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                let record = self.extract_page(&body, &link.absolute_url, &link.anchor_text);
                if record.name.is_empty() {
                    log::debug!("No store name on {}", link.absolute_url);
                    continue;
                }
                self.keep(&mut outcome, record);
            }
        }

        log::info!(
            "Crawl finished: {} records ({} of {} branch pages failed)",
            outcome.records.len(),
            outcome.detail_failures,
            outcome.detail_total
        );
        self.emit(ProgressEvent::Finished {
            records: outcome.records.len(),
        });
        Ok(outcome)
    }

    /// Record of the page plus its link classification.
    pub fn analyze_page(&self, body: &str, url: &str) -> (StoreRecord, LinkClassification) {
        let document = Html::parse_document(body);
        let record = self.orchestrator.extract(&document, url, "");
        let links = self.classifier.classify(&document, url);
        (record, links)
    }

    fn extract_page(&self, body: &str, url: &str, fallback_name: &str) -> StoreRecord {
        let document = Html::parse_document(body);
        self.orchestrator.extract(&document, url, fallback_name)
    }

    fn keep(&self, outcome: &mut CrawlOutcome, record: StoreRecord) {
        log::debug!("Record: {} / {} / {}", record.name, record.address, record.access);
        outcome.records.push(record);
        self.emit(ProgressEvent::RecordAdded {
            count: outcome.records.len(),
        });
    }

    fn emit(&self, event: ProgressEvent) {
        if let Some(sender) = &self.progress {
            // A dropped receiver only means nobody is watching.
            let _ = sender.send(event);
        }
    }
}

/// Whether a page name marks a listing rather than a store.
///
/// A literal check for "一覧" or "list"; names of stores that happen to
/// contain either word are misclassified.
pub fn looks_like_listing_name(name: &str) -> bool {
    name.contains("一覧") || name.to_lowercase().contains("list")
}
