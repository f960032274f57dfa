// src/extract/orchestrator.rs

//! Top-level store extraction: site rules first, then the generic engine.

use scraper::Html;

use crate::extract::fields::{FieldEngine, FieldExtractor};
use crate::extract::sites::SiteRuleRegistry;
use crate::extract::structure::find_info_sections;
use crate::models::{ExtractionCandidate, Field, StoreRecord};
use crate::utils::get_domain;

/// Records scoring below this overall confidence are re-extracted per section.
const RESCAN_THRESHOLD: f64 = 70.0;
/// Number of keyword-dense sections re-extracted for a weak record.
const RESCAN_SECTIONS: usize = 3;

/// Chooses between site rules and the generic engine for each page.
pub struct ExtractionOrchestrator<E = FieldExtractor> {
    registry: SiteRuleRegistry,
    engine: E,
}

impl ExtractionOrchestrator {
    /// Built-in site rules over the generic field extractor.
    pub fn new() -> Self {
        Self::with_parts(SiteRuleRegistry::builtin(), FieldExtractor::new())
    }
}

impl Default for ExtractionOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: FieldEngine> ExtractionOrchestrator<E> {
    pub fn with_parts(registry: SiteRuleRegistry, engine: E) -> Self {
        Self { registry, engine }
    }

    pub fn registry(&self) -> &SiteRuleRegistry {
        &self.registry
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Extract the store record of one page.
    ///
    /// A matching site rule wins when its record has a name and an address
    /// or access line. Otherwise the generic engine runs; `fallback_name`
    /// (usually the anchor text that led to the page) fills a missing name,
    /// and weak records are improved from the page's keyword-dense sections.
    pub fn extract(&self, document: &Html, url: &str, fallback_name: &str) -> StoreRecord {
        let domain = get_domain(url).unwrap_or_default();

        if let Some(rule) = self.registry.lookup(&domain) {
            let record = rule.extract(document, url, fallback_name);
            if record.passes_quality() {
                log::debug!("Site rule '{}' accepted for {}", rule.name(), url);
                return record;
            }
            log::debug!(
                "Site rule '{}' incomplete for {}, using generic extraction",
                rule.name(),
                url
            );
        }

        let mut record = self.engine.extract_all(document, url);

        let fallback_name = fallback_name.trim();
        if record.name.is_empty() && !fallback_name.is_empty() {
            // The link text is a hint, not evidence: it keeps zero confidence.
            record.set_field(Field::Name, ExtractionCandidate::new(fallback_name, 0));
        }

        if record.overall_confidence() < RESCAN_THRESHOLD {
            self.rescan_sections(document, url, &mut record);
        }

        record
    }

    fn rescan_sections(&self, document: &Html, url: &str, record: &mut StoreRecord) {
        for section in find_info_sections(document).into_iter().take(RESCAN_SECTIONS) {
            let fragment = Html::parse_fragment(&section.element.html());
            let sub = self.engine.extract_all(&fragment, url);

            for field in Field::ALL {
                if sub.confidence(field) > record.confidence(field) {
                    record.set_field(
                        field,
                        ExtractionCandidate::new(sub.value(field), sub.confidence(field)),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::models::ExtractionStrategy;

    /// Counts calls and returns a weak record first, stronger ones after.
    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
    }

    impl FieldEngine for CountingEngine {
        fn extract_all(&self, _document: &Html, url: &str) -> StoreRecord {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let mut record = StoreRecord::empty(url);
            if call == 0 {
                record.set_field(Field::Address, ExtractionCandidate::new("東京都", 10));
            } else {
                record.set_field(
                    Field::Address,
                    ExtractionCandidate::new(format!("東京都新宿区1-{call}"), 80),
                );
            }
            record
        }
    }

    #[test]
    fn test_accepted_site_rule_skips_generic_engine() {
        let orchestrator =
            ExtractionOrchestrator::with_parts(SiteRuleRegistry::builtin(), CountingEngine::default());
        let html = Html::parse_document(
            "<h2 class='clinic-name'>DIO 梅田院</h2><div class='address'>大阪府大阪市北区1-1</div>",
        );
        let record = orchestrator.extract(&html, "https://dioclinic.jp/clinic/umeda/", "");
        assert_eq!(orchestrator.engine().calls.load(Ordering::SeqCst), 0);
        assert_eq!(record.strategy, ExtractionStrategy::SiteRule("dio".to_string()));
        assert_eq!(record.name, "DIO 梅田院");
    }

    #[test]
    fn test_incomplete_site_rule_falls_through() {
        let orchestrator =
            ExtractionOrchestrator::with_parts(SiteRuleRegistry::builtin(), CountingEngine::default());
        let html = Html::parse_document("<h2 class='clinic-name'>DIO 梅田院</h2>");
        let record = orchestrator.extract(&html, "https://dioclinic.jp/clinic/umeda/", "");
        assert_eq!(orchestrator.engine().calls.load(Ordering::SeqCst), 1);
        assert_eq!(record.strategy, ExtractionStrategy::Generic);
    }

    #[test]
    fn test_fallback_name_has_zero_confidence() {
        let orchestrator =
            ExtractionOrchestrator::with_parts(SiteRuleRegistry::new(), CountingEngine::default());
        let html = Html::parse_document("<p>nothing here</p>");
        let record = orchestrator.extract(&html, "https://example.com/a/", " 梅田院 ");
        assert_eq!(record.name, "梅田院");
        assert_eq!(record.confidence(Field::Name), 0);
    }

    #[test]
    fn test_weak_record_is_rescanned_by_section() {
        let orchestrator =
            ExtractionOrchestrator::with_parts(SiteRuleRegistry::new(), CountingEngine::default());
        let html = Html::parse_document(
            "<div>住所 アクセス</div><div>店舗 住所 電話</div>\
             <div>所在地 交通</div><div>営業 TEL</div>",
        );
        let record = orchestrator.extract(&html, "https://example.com/a/", "");

        // One full pass plus the top three sections.
        assert_eq!(orchestrator.engine().calls.load(Ordering::SeqCst), 4);
        // Later sections only replace a field when strictly more confident.
        assert_eq!(record.address, "東京都新宿区1-1");
        assert_eq!(record.confidence(Field::Address), 80);
    }

    #[test]
    fn test_generic_extraction_end_to_end() {
        let orchestrator = ExtractionOrchestrator::new();
        let html = Html::parse_document(
            "<html><head><title>サンプルクリニック</title></head><body>\
             <h1>サンプルクリニック 渋谷院</h1>\
             <table><tr><th>住所</th><td>〒150-0041 東京都渋谷区神南1-2-3</td></tr>\
             <tr><th>電話番号</th><td>03-1234-5678</td></tr>\
             <tr><th>診療時間</th><td>10:00〜19:00</td></tr></table>\
             <p>渋谷駅から徒歩5分</p></body></html>",
        );
        let record = orchestrator.extract(&html, "https://example.com/clinic/shibuya/", "");
        assert_eq!(record.name, "サンプルクリニック 渋谷院");
        assert_eq!(record.address, "〒150-0041 東京都渋谷区神南1-2-3");
        assert_eq!(record.access, "渋谷駅から徒歩約5分");
        assert_eq!(record.phone.as_deref(), Some("03-1234-5678"));
        assert_eq!(record.hours.as_deref(), Some("10:00〜19:00"));
        assert_eq!(record.strategy, ExtractionStrategy::Generic);
    }
}
