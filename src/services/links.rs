//! Store link discovery and listing-page classification.
//!
//! Scores the same-site links of a page by URL path, anchor wording and
//! length, and decides whether the page is a listing of branch pages.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use unicode_segmentation::UnicodeSegmentation;
use url::Url;

use crate::models::{LinkCandidate, LinkClassification};
use crate::utils::text::collapse_whitespace;
use crate::utils::url_key;

static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

/// URL paths of individual store pages.
static STORE_PATHS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"/clinic/[^/]+/?$",
        r"/store/[^/]+/?$",
        r"/shop/[^/]+/?$",
        r"/access/[^/]+/?$",
        r"/locations/[^/]+/?$",
        r"/branch/[^/]+/?$",
        r"/clinic/branch/[^/]+/?$",
        r"/hifuka/[^/]+/?$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid path pattern"))
    .collect()
});

const STORE_KEYWORDS: &[&str] = &["院", "店", "クリニック", "店舗", "医院", "ストア", "ショップ"];
const STORE_KEYWORDS_LATIN: &[&str] = &["clinic", "store", "shop", "branch"];
const LOCATION_UNITS: &[&str] = &["駅", "都", "道", "府", "県", "市", "区", "町", "村", "丁目"];

const PATH_SCORE: u8 = 50;
const KEYWORD_SCORE: u8 = 30;
const SHORT_TEXT_SCORE: u8 = 10;
const LOCATION_SCORE: u8 = 10;
const SHORT_TEXT_GRAPHEMES: usize = 50;

/// Minimum score of a kept candidate, and the score given to template links.
const MIN_SCORE: u8 = 40;
/// Below this many candidates, repeated path templates are tried as well.
const TEMPLATE_FALLBACK_BELOW: usize = 3;
const MIN_TEMPLATE_GROUP: usize = 3;
/// A page with more candidates than this is a listing page.
const LISTING_THRESHOLD: usize = 3;

/// A same-site link and its score, before filtering.
struct ScoredLink {
    url: Url,
    key: String,
    anchor_text: String,
    score: u8,
}

impl ScoredLink {
    fn to_candidate(&self, score: u8) -> LinkCandidate {
        LinkCandidate {
            absolute_url: self.url.to_string(),
            anchor_text: self.anchor_text.clone(),
            confidence_score: score,
        }
    }
}

/// Candidates deduplicated by URL key; a higher score replaces the entry in place.
#[derive(Default)]
struct CandidateSet {
    candidates: Vec<LinkCandidate>,
    index: HashMap<String, usize>,
}

impl CandidateSet {
    fn insert(&mut self, key: &str, candidate: LinkCandidate) {
        match self.index.get(key) {
            Some(&i) => {
                if candidate.confidence_score > self.candidates[i].confidence_score {
                    self.candidates[i] = candidate;
                }
            }
            None => {
                self.index.insert(key.to_string(), self.candidates.len());
                self.candidates.push(candidate);
            }
        }
    }

    fn len(&self) -> usize {
        self.candidates.len()
    }
}

/// Classifies the links of a page.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkClassifier;

impl LinkClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Links on `base_url`'s site that likely lead to individual store pages.
    pub fn find_candidate_links(&self, document: &Html, base_url: &str) -> Vec<LinkCandidate> {
        let Ok(base) = Url::parse(base_url) else {
            log::warn!("Cannot classify links of invalid URL: {}", base_url);
            return Vec::new();
        };
        let links = same_site_links(document, &base);

        let mut set = CandidateSet::default();
        for link in links.iter().filter(|l| l.score >= MIN_SCORE) {
            set.insert(&link.key, link.to_candidate(link.score));
        }

        if set.len() < TEMPLATE_FALLBACK_BELOW {
            for group in template_groups(&links) {
                log::debug!("Repeated link template with {} members", group.len());
                for link in group {
                    set.insert(&link.key, link.to_candidate(link.score.max(MIN_SCORE)));
                }
            }
        }

        set.candidates
    }

    /// Candidate links and whether the page is a listing page.
    pub fn classify(&self, document: &Html, base_url: &str) -> LinkClassification {
        let candidates = self.find_candidate_links(document, base_url);
        let is_listing = Self::is_listing(&candidates);
        LinkClassification {
            candidates,
            is_listing,
        }
    }

    /// More than three candidates make a listing page.
    pub fn is_listing(candidates: &[LinkCandidate]) -> bool {
        candidates.len() > LISTING_THRESHOLD
    }
}

/// Score every http(s) link on the base page's host, except the page itself.
fn same_site_links(document: &Html, base: &Url) -> Vec<ScoredLink> {
    let base_key = url_key(base);
    let mut links = Vec::new();

    for anchor in document.select(&ANCHOR) {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') || is_non_navigational(href) {
            continue;
        }
        let Ok(mut url) = base.join(href) else {
            continue;
        };
        url.set_fragment(None);
        if !matches!(url.scheme(), "http" | "https") || url.host_str() != base.host_str() {
            continue;
        }
        let key = url_key(&url);
        if key == base_key {
            continue;
        }

        let anchor_text = collapse_whitespace(&anchor.text().collect::<String>());
        let score = score_link(&url, &anchor_text);
        links.push(ScoredLink {
            url,
            key,
            anchor_text,
            score,
        });
    }

    links
}

fn is_non_navigational(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    ["javascript:", "mailto:", "tel:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

fn score_link(url: &Url, anchor_text: &str) -> u8 {
    let mut score = 0;
    if STORE_PATHS.iter().any(|re| re.is_match(url.path())) {
        score += PATH_SCORE;
    }
    let lower = anchor_text.to_lowercase();
    if STORE_KEYWORDS.iter().any(|k| anchor_text.contains(k))
        || STORE_KEYWORDS_LATIN.iter().any(|k| lower.contains(k))
    {
        score += KEYWORD_SCORE;
    }
    if anchor_text.graphemes(true).count() < SHORT_TEXT_GRAPHEMES {
        score += SHORT_TEXT_SCORE;
    }
    if LOCATION_UNITS.iter().any(|u| anchor_text.contains(u)) {
        score += LOCATION_SCORE;
    }
    score
}

/// Groups of at least three distinct links sharing a parent path.
///
/// Links directly under the site root have no parent path and never group.
fn template_groups(links: &[ScoredLink]) -> Vec<Vec<&ScoredLink>> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&ScoredLink>> = HashMap::new();

    for link in links {
        let Some(prefix) = parent_path(&link.url) else {
            continue;
        };
        let group = groups.entry(prefix.clone()).or_insert_with(|| {
            order.push(prefix);
            Vec::new()
        });
        if !group.iter().any(|l| l.key == link.key) {
            group.push(link);
        }
    }

    order
        .into_iter()
        .filter_map(|prefix| groups.remove(&prefix))
        .filter(|group| group.len() >= MIN_TEMPLATE_GROUP)
        .collect()
}

fn parent_path(url: &Url) -> Option<String> {
    let segments = url
        .path()
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    match segments.split_last() {
        Some((_, parent)) if !parent.is_empty() => Some(parent.join("/")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://example.com/clinic/";

    fn clinic_page(names: &[&str]) -> Html {
        let links = names
            .iter()
            .map(|n| format!(r#"<a href="/clinic/{n}/">{n}</a>"#))
            .collect::<String>();
        Html::parse_document(&format!("<html><body>{links}</body></html>"))
    }

    #[test]
    fn test_listing_threshold() {
        let classifier = LinkClassifier::new();

        let four = classifier.classify(&clinic_page(&["shibuya", "shinjuku", "ikebukuro", "ginza"]), BASE);
        assert_eq!(four.candidates.len(), 4);
        assert!(four.is_listing);

        let three = classifier.classify(&clinic_page(&["shibuya", "shinjuku", "ikebukuro"]), BASE);
        assert_eq!(three.candidates.len(), 3);
        assert!(!three.is_listing);
    }

    #[test]
    fn test_trailing_slash_duplicates_collapse() {
        let html = Html::parse_document(
            r#"<a href="/clinic/shibuya">渋谷</a><a href="/clinic/shibuya/">渋谷院</a>"#,
        );
        let candidates = LinkClassifier.find_candidate_links(&html, BASE);
        assert_eq!(candidates.len(), 1);
        // The higher-scoring anchor wins, in first-seen position.
        assert_eq!(candidates[0].anchor_text, "渋谷院");
        assert_eq!(candidates[0].confidence_score, 90);
    }

    #[test]
    fn test_scoring_components() {
        let html = Html::parse_document(
            r#"<a href="/clinic/umeda/">梅田院（大阪府大阪市）</a>
               <a href="/news/1">お知らせ</a>
               <a href="https://other.example.com/clinic/x/">他サイトのクリニック</a>
               <a href="mailto:info@example.com">mail</a>
               <a href="/clinic/">一覧</a>"#,
        );
        let candidates = LinkClassifier.find_candidate_links(&html, BASE);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].absolute_url, "https://example.com/clinic/umeda/");
        assert_eq!(candidates[0].confidence_score, 100);
    }

    #[test]
    fn test_keyword_without_path_match() {
        let html = Html::parse_document(r#"<a href="/info/ginza.html">Ginza Clinic</a>"#);
        let candidates = LinkClassifier.find_candidate_links(&html, BASE);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].confidence_score, 40);
    }

    #[test]
    fn test_repeated_template_fallback() {
        let html = Html::parse_document(
            r#"<a href="/salon/list/a.html">A</a>
               <a href="/salon/list/b.html">B</a>
               <a href="/salon/list/c.html">C</a>
               <a href="/salon/list/c.html#map">C map</a>
               <a href="/about">About</a>
               <a href="/news">News</a>
               <a href="/recruit">Recruit</a>"#,
        );
        let candidates = LinkClassifier.find_candidate_links(&html, "https://example.com/");
        let urls = candidates
            .iter()
            .map(|c| c.absolute_url.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            urls,
            vec![
                "https://example.com/salon/list/a.html",
                "https://example.com/salon/list/b.html",
                "https://example.com/salon/list/c.html",
            ]
        );
        assert!(candidates.iter().all(|c| c.confidence_score == 40));
    }
}
