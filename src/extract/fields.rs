// src/extract/fields.rs

//! Per-field extraction for the generic engine.
//!
//! Each field gathers candidates from three sources: the pattern library run
//! over the page's visible text, table and definition-list rows whose header
//! names the field, and embedded JSON-LD metadata. [`select_best`] reduces
//! the candidates to one value.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::extract::metadata::{BusinessMetadata, parse_json_ld};
use crate::extract::patterns::{self, PatternMatch};
use crate::extract::structure::{self, DefinitionList, InfoTable, KeyValue};
use crate::models::{ExtractionCandidate, Field, StoreRecord};
use crate::utils::text::{collapse_whitespace, fold_width, normalize_key, strip_text, visible_text};

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static H2: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h2").expect("valid selector"));
static OG_SITE_NAME: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"meta[property="og:site_name"]"#).expect("valid selector")
});
/// Station name without a leading label or list separator.
static STATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^「」\s：:、，,。]+(?:駅|停留場)").expect("valid regex"));

const TITLE_KEYWORDS: &[&str] = &["店", "院", "クリニック", "店舗", "ストア", "ショップ"];
const H1_KEYWORDS: &[&str] = &["店", "院", "クリニック", "店舗"];
const H2_KEYWORDS: &[&str] = &["店", "院", "クリニック", "店舗", "ストア"];

const ADDRESS_HEADERS: &[&str] = &["住所", "所在地", "Address", "Location"];
const ACCESS_HEADERS: &[&str] = &["アクセス", "交通", "Access", "最寄り駅"];
const PHONE_HEADERS: &[&str] = &["電話", "TEL", "Tel", "Phone"];
const HOURS_HEADERS: &[&str] = &["営業時間", "診療時間", "受付時間", "Hours"];

/// Headings at least this long are treated as prose, not names.
const MAX_HEADING_CHARS: usize = 100;
const MIN_PHONE_SYMBOLS: usize = 10;
/// Penalty for a station mention without a walking time.
const STATION_ONLY_PENALTY: u8 = 20;

/// Extracts a full record from a parsed document.
///
/// The orchestrator only talks to the generic engine through this trait.
pub trait FieldEngine: Send + Sync {
    fn extract_all(&self, document: &Html, url: &str) -> StoreRecord;
}

/// Everything the field extractors read from one document, computed once.
struct PageContext<'a> {
    document: &'a Html,
    text: String,
    tables: Vec<InfoTable<'a>>,
    lists: Vec<DefinitionList<'a>>,
    metadata: Vec<BusinessMetadata>,
}

impl<'a> PageContext<'a> {
    fn new(document: &'a Html) -> Self {
        Self {
            document,
            text: visible_text(document),
            tables: structure::find_info_tables(document),
            lists: structure::find_definition_lists(document),
            metadata: parse_json_ld(document),
        }
    }

    fn rows(&self) -> impl Iterator<Item = &KeyValue> {
        self.tables
            .iter()
            .flat_map(|t| t.rows.iter())
            .chain(self.lists.iter().flat_map(|l| l.items.iter()))
    }

    /// Values of rows whose header contains one of `keywords`.
    fn header_candidates(&self, keywords: &[&str], confidence: u8) -> Vec<ExtractionCandidate> {
        self.rows()
            .filter(|row| contains_any(&row.header, keywords))
            .map(|row| ExtractionCandidate::new(row.value.clone(), confidence))
            .collect()
    }
}

/// The generic pattern, structure and metadata based extractor.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldExtractor;

impl FieldExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract_name(&self, document: &Html) -> ExtractionCandidate {
        name(&PageContext::new(document))
    }

    pub fn extract_address(&self, document: &Html) -> ExtractionCandidate {
        address(&PageContext::new(document))
    }

    pub fn extract_access(&self, document: &Html) -> ExtractionCandidate {
        access(&PageContext::new(document))
    }

    pub fn extract_phone(&self, document: &Html) -> ExtractionCandidate {
        phone(&PageContext::new(document))
    }

    pub fn extract_hours(&self, document: &Html) -> ExtractionCandidate {
        hours(&PageContext::new(document))
    }
}

impl FieldEngine for FieldExtractor {
    fn extract_all(&self, document: &Html, url: &str) -> StoreRecord {
        let context = PageContext::new(document);
        let mut record = StoreRecord::empty(url);
        for field in Field::ALL {
            let candidate = match field {
                Field::Name => name(&context),
                Field::Address => address(&context),
                Field::Access => access(&context),
                Field::Phone => phone(&context),
                Field::Hours => hours(&context),
            };
            record.set_field(field, candidate);
        }
        record
    }
}

fn name(context: &PageContext<'_>) -> ExtractionCandidate {
    let document = context.document;
    let mut candidates = Vec::new();

    if let Some(title) = document.select(&TITLE).next() {
        let title = strip_text(title);
        if contains_any(&title, TITLE_KEYWORDS) {
            let first = title.split('|').next().unwrap_or_default().trim();
            candidates.push(ExtractionCandidate::new(first, 85));
        }
    }

    for h1 in document.select(&H1).map(strip_text) {
        if h1.is_empty() || h1.chars().count() >= MAX_HEADING_CHARS {
            continue;
        }
        let confidence = if contains_any(&h1, H1_KEYWORDS) { 95 } else { 90 };
        candidates.push(ExtractionCandidate::new(h1, confidence));
    }

    candidates.extend(
        document
            .select(&H2)
            .map(strip_text)
            .filter(|h2| contains_any(h2, H2_KEYWORDS))
            .map(|h2| ExtractionCandidate::new(h2, 80)),
    );

    candidates.extend(
        document
            .select(&OG_SITE_NAME)
            .filter_map(|meta| meta.value().attr("content"))
            .map(|content| ExtractionCandidate::new(content, 75)),
    );

    for item in &context.metadata {
        if let Some(name) = &item.name {
            let confidence = if item.is_business() { 100 } else { 70 };
            candidates.push(ExtractionCandidate::new(name.clone(), confidence));
        }
    }

    select_best(candidates)
}

fn address(context: &PageContext<'_>) -> ExtractionCandidate {
    let mut candidates = patterns::extract_with_confidence(&context.text, &patterns::ADDRESS);
    candidates.extend(context.header_candidates(ADDRESS_HEADERS, 95));
    candidates.extend(
        context
            .metadata
            .iter()
            .filter_map(|item| item.address.clone())
            .map(|address| ExtractionCandidate::new(address, 100)),
    );
    select_best(candidates)
}

fn access(context: &PageContext<'_>) -> ExtractionCandidate {
    let matches = patterns::matches(&context.text, &patterns::ACCESS);
    let mut candidates = nearest_station(&matches).into_iter().collect::<Vec<_>>();
    candidates.extend(context.header_candidates(ACCESS_HEADERS, 90));
    select_best(candidates)
}

fn phone(context: &PageContext<'_>) -> ExtractionCandidate {
    let mut candidates = patterns::extract_with_confidence(&context.text, &patterns::PHONE);
    candidates.extend(context.header_candidates(PHONE_HEADERS, 95));
    candidates.extend(
        context
            .metadata
            .iter()
            .filter_map(|item| item.telephone.clone())
            .map(|phone| ExtractionCandidate::new(phone, 100)),
    );
    candidates.retain(|c| phone_symbol_count(&c.value) >= MIN_PHONE_SYMBOLS);
    select_best(candidates)
}

fn hours(context: &PageContext<'_>) -> ExtractionCandidate {
    let mut candidates = patterns::extract_with_confidence(&context.text, &patterns::HOURS);
    candidates.extend(context.header_candidates(HOURS_HEADERS, 95));
    candidates.extend(
        context
            .metadata
            .iter()
            .filter_map(|item| item.opening_hours.clone())
            .map(|hours| ExtractionCandidate::new(hours, 100)),
    );
    select_best(candidates)
}

fn phone_symbol_count(value: &str) -> usize {
    fold_width(value)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .count()
}

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| text.contains(k))
}

#[derive(Debug)]
struct StationHit {
    station: String,
    minutes: Option<u32>,
    confidence: u8,
}

/// Reduce access pattern matches to the nearest station.
///
/// Per station the highest-confidence match is kept. The station with the
/// fewest walking minutes wins; without any walking time the best plain
/// mention is returned as "<station>最寄り" with a lower confidence.
fn nearest_station(matches: &[PatternMatch]) -> Option<ExtractionCandidate> {
    let mut hits: Vec<StationHit> = Vec::new();

    for m in matches {
        let Some(station) = m
            .groups
            .iter()
            .find_map(|g| STATION.find(g).map(|s| s.as_str().to_string()))
        else {
            continue;
        };
        let minutes = m
            .groups
            .iter()
            .find_map(|g| fold_width(g).parse::<u32>().ok());

        match hits.iter_mut().find(|h| h.station == station) {
            Some(hit) if m.confidence > hit.confidence => {
                hit.minutes = minutes;
                hit.confidence = m.confidence;
            }
            Some(_) => {}
            None => hits.push(StationHit {
                station,
                minutes,
                confidence: m.confidence,
            }),
        }
    }

    let mut nearest: Option<(&StationHit, u32)> = None;
    for hit in &hits {
        let Some(minutes) = hit.minutes else {
            continue;
        };
        let closer = match nearest {
            None => true,
            Some((best, best_minutes)) => {
                minutes < best_minutes
                    || (minutes == best_minutes && hit.confidence > best.confidence)
            }
        };
        if closer {
            nearest = Some((hit, minutes));
        }
    }
    if let Some((hit, minutes)) = nearest {
        return Some(ExtractionCandidate::new(
            format!("{}から徒歩約{}分", hit.station, minutes),
            hit.confidence,
        ));
    }

    let mut mentioned: Option<&StationHit> = None;
    for hit in &hits {
        if mentioned.is_none_or(|best| hit.confidence > best.confidence) {
            mentioned = Some(hit);
        }
    }
    mentioned.map(|hit| {
        ExtractionCandidate::new(
            format!("{}最寄り", hit.station),
            hit.confidence.saturating_sub(STATION_ONLY_PENALTY),
        )
    })
}

/// Pick the winning candidate.
///
/// Values are whitespace-collapsed and deduplicated by their width-folded
/// form, keeping the highest confidence per distinct value. The winner has
/// the highest confidence, then the longest value; remaining ties go to the
/// first-seen candidate.
pub fn select_best(candidates: Vec<ExtractionCandidate>) -> ExtractionCandidate {
    let mut distinct: Vec<(String, ExtractionCandidate)> = Vec::new();
    for candidate in candidates {
        let value = collapse_whitespace(&candidate.value);
        if value.is_empty() {
            continue;
        }
        let key = normalize_key(&value);
        match distinct.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                existing.confidence = existing.confidence.max(candidate.confidence);
            }
            None => distinct.push((key, ExtractionCandidate::new(value, candidate.confidence))),
        }
    }

    let mut best: Option<ExtractionCandidate> = None;
    for (_, candidate) in distinct {
        let better = match &best {
            None => true,
            Some(current) => {
                (candidate.confidence, candidate.value.chars().count())
                    > (current.confidence, current.value.chars().count())
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best.unwrap_or_else(ExtractionCandidate::empty)
}

/// Text of the first element matching `selector`, if any.
pub(crate) fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector)
        .next()
        .map(strip_text)
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(body: &str) -> Html {
        Html::parse_document(&format!("<html><head></head><body>{body}</body></html>"))
    }

    #[test]
    fn test_address_from_table_header() {
        let html = page(
            "<h1>新宿院</h1><table><tr><th>住所</th><td>東京都新宿区西新宿1-2-3 新宿ビル5F</td></tr></table>",
        );
        let address = FieldExtractor.extract_address(&html);
        assert_eq!(address.value, "東京都新宿区西新宿1-2-3 新宿ビル5F");
        assert!(address.confidence >= 90);
    }

    #[test]
    fn test_address_from_definition_list() {
        let html = page("<dl><dt>所在地</dt><dd>大阪府大阪市北区梅田1-1-1</dd></dl>");
        let address = FieldExtractor.extract_address(&html);
        assert_eq!(address.value, "大阪府大阪市北区梅田1-1-1");
        assert_eq!(address.confidence, 95);
    }

    #[test]
    fn test_postal_address_starts_with_postal_code() {
        let html = page("<p>〒150-0041 東京都渋谷区神南1-2-3 渋谷ビル3F</p>");
        let address = FieldExtractor.extract_address(&html);
        assert!(address.value.starts_with("〒150-0041"));
        assert!(address.confidence >= 95);
    }

    #[test]
    fn test_nearest_station_wins() {
        let html = page("<p>渋谷駅 徒歩5分</p><p>原宿駅 徒歩12分</p>");
        let access = FieldExtractor.extract_access(&html);
        assert_eq!(access.value, "渋谷駅から徒歩約5分");
        assert_eq!(access.confidence, 100);
    }

    #[test]
    fn test_station_name_drops_labels_and_separators() {
        let html = page("<p>アクセス：渋谷駅 徒歩5分</p>");
        assert_eq!(FieldExtractor.extract_access(&html).value, "渋谷駅から徒歩約5分");

        let html = page("<p>原宿駅 徒歩12分、渋谷駅 徒歩5分</p>");
        assert_eq!(FieldExtractor.extract_access(&html).value, "渋谷駅から徒歩約5分");
    }

    #[test]
    fn test_station_without_minutes_is_penalized() {
        let html = page("<p>最寄駅：渋谷駅</p>");
        let access = FieldExtractor.extract_access(&html);
        assert_eq!(access.value, "渋谷駅最寄り");
        assert_eq!(access.confidence, 50);
    }

    #[test]
    fn test_name_priority() {
        let html = Html::parse_document(
            "<html><head><title>渋谷院 | サンプルクリニック</title>\
             <meta property=\"og:site_name\" content=\"サンプル\"></head>\
             <body><h1>サンプルクリニック 渋谷院</h1><h2>渋谷院のご案内</h2></body></html>",
        );
        let name = FieldExtractor.extract_name(&html);
        assert_eq!(name.value, "サンプルクリニック 渋谷院");
        assert_eq!(name.confidence, 95);
    }

    #[test]
    fn test_json_ld_business_name_beats_headings() {
        let html = Html::parse_document(
            r#"<html><head><script type="application/ld+json">
               {"@type": "Dentist", "name": "さくら歯科 池袋院", "telephone": "03-0000-1111"}
               </script></head><body><h1>ようこそ</h1></body></html>"#,
        );
        let record = FieldExtractor.extract_all(&html, "https://example.com/");
        assert_eq!(record.name, "さくら歯科 池袋院");
        assert_eq!(record.confidence(Field::Name), 100);
        assert_eq!(record.phone.as_deref(), Some("03-0000-1111"));
    }

    #[test]
    fn test_short_phone_numbers_are_dropped() {
        let html = page("<table><tr><th>TEL</th><td>内線123</td></tr></table>");
        let phone = FieldExtractor.extract_phone(&html);
        assert_eq!(phone, ExtractionCandidate::empty());
    }

    #[test]
    fn test_hours_from_label() {
        let html = page("<p>診療時間：10:00〜19:00</p>");
        let hours = FieldExtractor.extract_hours(&html);
        assert_eq!(hours.value, "10:00〜19:00");
        assert_eq!(hours.confidence, 100);
    }

    #[test]
    fn test_extract_all_is_idempotent() {
        let html = page(
            "<h1>新宿院</h1><table><tr><th>住所</th><td>東京都新宿区1-2-3</td></tr>\
             <tr><th>アクセス</th><td>新宿駅から徒歩3分</td></tr></table>",
        );
        let first = FieldExtractor.extract_all(&html, "https://example.com/shinjuku/");
        let second = FieldExtractor.extract_all(&html, "https://example.com/shinjuku/");
        assert_eq!(first, second);
        assert!(first.passes_quality());
    }

    #[test]
    fn test_select_best_dedups_full_width_and_prefers_longer() {
        let best = select_best(vec![
            ExtractionCandidate::new("渋谷区１－２", 80),
            ExtractionCandidate::new("渋谷区1-2", 95),
            ExtractionCandidate::new("渋谷区1-2 3F", 95),
        ]);
        assert_eq!(best.value, "渋谷区1-2 3F");

        let merged = select_best(vec![
            ExtractionCandidate::new("渋谷区１－２", 80),
            ExtractionCandidate::new("渋谷区1-2", 95),
        ]);
        assert_eq!(merged, ExtractionCandidate::new("渋谷区１－２", 95));
    }

    #[test]
    fn test_empty_document_yields_empty_fields() {
        let record = FieldExtractor.extract_all(&page(""), "https://example.com/");
        assert_eq!(record.name, "");
        assert_eq!(record.overall_confidence(), 0.0);
        assert_eq!(record.phone, None);
    }
}
