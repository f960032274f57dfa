// src/extract/sites.rs

//! Hand-written extraction rules for catalogued clinic chains.
//!
//! A rule is chosen by a substring of the page's host. Rules only need to
//! produce a name and either an address or an access line; anything less
//! sends the page on to the generic engine.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::extract::fields::first_text;
use crate::models::StoreRecord;
use crate::utils::parse_selector;
use crate::utils::text::{collapse_whitespace, strip_text, visible_text};

static H1: LazyLock<Selector> = LazyLock::new(|| Selector::parse("h1").expect("valid selector"));
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").expect("valid selector"));
static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static TH: LazyLock<Selector> = LazyLock::new(|| Selector::parse("th").expect("valid selector"));
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").expect("valid selector"));

fn compile(sources: &[&str]) -> Vec<Regex> {
    sources
        .iter()
        .map(|source| Regex::new(source).expect("valid site rule pattern"))
        .collect()
}

/// Address lines tried in order; the first match wins.
static TEXT_ADDRESS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"〒\d{3}-\d{4}\s*[^\n]*?(?:市|区|町|村)[^\n]*?(?:丁目|番地|[0-9]+F?)",
        r"〒\d{3}-\d{4}[^\n]*",
        r"(?:東京都|大阪府|京都府|北海道|.*?県)[^\n]*?(?:市|区|町|村)[^\n]*?[0-9]",
    ])
});

static WALK_FROM_STATION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"([^\s]+駅)[^\n]*?(?:から|より)[^\n]*?(?:徒歩|歩いて)[^\n]*?(\d+)分",
        r"([^\s]+駅)[^\n]*?(?:徒歩|歩いて)[^\n]*?(\d+)分",
        r"アクセス[^\n]*?([^\s]+駅)[^\n]*?(\d+)分",
    ])
});

static WALK_FROM_QUOTED_STOP: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"「([^\s]+駅)」[^\n]*?(?:徒歩|歩いて)[^\n]*?(\d+)分",
        r"「([^\s]+停留場)」[^\n]*?(?:徒歩|歩いて)[^\n]*?(\d+)分",
        r"([^\s]+駅)[^\n]*?(?:徒歩|歩いて)[^\n]*?(\d+)分",
    ])
});

static STATION_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\s]+駅)").expect("valid regex"));

/// A domain-keyed extraction strategy.
pub trait SiteRule: Send + Sync {
    /// Short identifier recorded on the records the rule produces.
    fn name(&self) -> &str;

    /// Host substring the rule applies to.
    fn domain(&self) -> &str;

    /// Extract a record; `fallback_name` is used when the page names nothing.
    fn extract(&self, document: &Html, url: &str, fallback_name: &str) -> StoreRecord;
}

/// Registered site rules, consulted in registration order.
pub struct SiteRuleRegistry {
    rules: Vec<Box<dyn SiteRule>>,
}

impl SiteRuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The registry of catalogued clinic chains.
    pub fn builtin() -> Self {
        Self::new()
            .with_rule(SelectorRule {
                name: "dio",
                domain: "dioclinic",
                name_selector: "h2.clinic-name",
                address_selector: "div.address",
                access_selector: "div.access",
            })
            .with_rule(TableRule {
                name: "eminal",
                domain: "eminal-clinic",
                name_header: Some("院名"),
                address_header: "住所",
                access_header: "アクセス",
            })
            .with_rule(TableRule {
                name: "freya",
                domain: "frey-a",
                name_header: None,
                address_header: "所在地",
                access_header: "アクセス",
            })
            .with_rule(PageTextRule {
                name: "seishin",
                domain: "seishin-biyou",
                title_fallback: false,
                address: AddressSource::TextPatterns,
                stations: &WALK_FROM_STATION,
                station_only_fallback: true,
            })
            .with_rule(PageTextRule {
                name: "sbc",
                domain: "s-b-c.net",
                title_fallback: true,
                address: AddressSource::TextPatterns,
                stations: &WALK_FROM_STATION,
                station_only_fallback: true,
            })
            .with_rule(PageTextRule {
                name: "rize",
                domain: "rizeclinic",
                title_fallback: false,
                address: AddressSource::FirstTableRow("住所"),
                stations: &WALK_FROM_QUOTED_STOP,
                station_only_fallback: false,
            })
    }

    /// Add a rule after the existing ones.
    pub fn with_rule(mut self, rule: impl SiteRule + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    /// First rule whose domain substring occurs in `domain`.
    pub fn lookup(&self, domain: &str) -> Option<&dyn SiteRule> {
        self.rules
            .iter()
            .find(|rule| domain.contains(rule.domain()))
            .map(|rule| rule.as_ref())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for SiteRuleRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Name, address and access each read from a CSS selector.
#[derive(Debug, Clone)]
pub struct SelectorRule {
    pub name: &'static str,
    pub domain: &'static str,
    pub name_selector: &'static str,
    pub address_selector: &'static str,
    pub access_selector: &'static str,
}

impl SelectorRule {
    fn text_of(&self, document: &Html, selector: &str) -> Option<String> {
        match parse_selector(selector) {
            Ok(selector) => first_text(document.root_element(), &selector),
            Err(e) => {
                log::warn!("Site rule '{}' skipped a selector: {}", self.name, e);
                None
            }
        }
    }
}

impl SiteRule for SelectorRule {
    fn name(&self) -> &str {
        self.name
    }

    fn domain(&self) -> &str {
        self.domain
    }

    fn extract(&self, document: &Html, url: &str, fallback_name: &str) -> StoreRecord {
        let name = self
            .text_of(document, self.name_selector)
            .unwrap_or_else(|| fallback_name.to_string());
        let address = self
            .text_of(document, self.address_selector)
            .unwrap_or_default();
        let access = self
            .text_of(document, self.access_selector)
            .unwrap_or_default();
        StoreRecord::from_site_rule(self.name, url, name, address, access)
    }
}

/// Fields read from `th`/`td` rows by header keyword.
///
/// Without a name header the first `h1` names the store.
#[derive(Debug, Clone)]
pub struct TableRule {
    pub name: &'static str,
    pub domain: &'static str,
    pub name_header: Option<&'static str>,
    pub address_header: &'static str,
    pub access_header: &'static str,
}

impl SiteRule for TableRule {
    fn name(&self) -> &str {
        self.name
    }

    fn domain(&self) -> &str {
        self.domain
    }

    fn extract(&self, document: &Html, url: &str, fallback_name: &str) -> StoreRecord {
        let mut name = match self.name_header {
            Some(_) => None,
            None => first_text(document.root_element(), &H1),
        };
        let mut address = String::new();
        let mut access = String::new();

        for (header, value) in header_rows(document.root_element()) {
            if self.name_header.is_some_and(|h| header.contains(h)) {
                name = Some(value);
            } else if header.contains(self.address_header) {
                address = value;
            } else if header.contains(self.access_header) {
                access = value;
            }
        }

        let name = name.unwrap_or_else(|| fallback_name.to_string());
        StoreRecord::from_site_rule(self.name, url, name, address, access)
    }
}

/// Where a [`PageTextRule`] reads the address from.
#[derive(Debug, Clone, Copy)]
pub enum AddressSource {
    /// First match of the address line patterns over the page text
    TextPatterns,
    /// Row with this header in the first table of the page
    FirstTableRow(&'static str),
}

/// Name from the first `h1`, address and nearest station from page text.
pub struct PageTextRule {
    pub name: &'static str,
    pub domain: &'static str,
    /// Use a `<title>` mentioning 院 or クリニック when there is no `h1`
    pub title_fallback: bool,
    pub address: AddressSource,
    /// Patterns capturing (station, walking minutes)
    pub stations: &'static LazyLock<Vec<Regex>>,
    /// Fall back to "<station>最寄り" for the first station mentioned
    pub station_only_fallback: bool,
}

impl PageTextRule {
    fn heading_name(&self, document: &Html) -> Option<String> {
        first_text(document.root_element(), &H1).or_else(|| {
            if !self.title_fallback {
                return None;
            }
            first_text(document.root_element(), &TITLE)
                .filter(|title| title.contains('院') || title.contains("クリニック"))
        })
    }

    fn address(&self, document: &Html, text: &str) -> String {
        match self.address {
            AddressSource::TextPatterns => TEXT_ADDRESS
                .iter()
                .find_map(|re| re.find(text))
                .map(|m| collapse_whitespace(m.as_str()))
                .unwrap_or_default(),
            AddressSource::FirstTableRow(wanted) => document
                .select(&TABLE)
                .next()
                .and_then(|table| {
                    header_rows(table)
                        .into_iter()
                        .filter(|(header, _)| header.contains(wanted))
                        .map(|(_, value)| value)
                        .last()
                })
                .unwrap_or_default(),
        }
    }

    fn access(&self, text: &str) -> String {
        if let Some(nearest) = nearest_walk(self.stations, text) {
            return nearest;
        }
        if self.station_only_fallback {
            if let Some(station) = STATION_MENTION.captures(text).and_then(|c| c.get(1)) {
                return format!("{}最寄り", station.as_str());
            }
        }
        String::new()
    }
}

impl SiteRule for PageTextRule {
    fn name(&self) -> &str {
        self.name
    }

    fn domain(&self) -> &str {
        self.domain
    }

    fn extract(&self, document: &Html, url: &str, fallback_name: &str) -> StoreRecord {
        let text = visible_text(document);
        let name = self
            .heading_name(document)
            .unwrap_or_else(|| fallback_name.to_string());
        let address = self.address(document, &text);
        let access = self.access(&text);
        StoreRecord::from_site_rule(self.name, url, name, address, access)
    }
}

/// `(th, td)` text pairs of every row under `root`.
fn header_rows(root: ElementRef<'_>) -> Vec<(String, String)> {
    root.select(&ROW)
        .filter_map(|row| {
            let header = row.select(&TH).next()?;
            let value = row.select(&TD).next()?;
            Some((strip_text(header), strip_text(value)))
        })
        .collect()
}

/// The station with the fewest walking minutes, first found on ties.
fn nearest_walk(patterns: &[Regex], text: &str) -> Option<String> {
    let mut nearest: Option<(u32, String)> = None;
    for re in patterns {
        for captures in re.captures_iter(text) {
            let (Some(station), Some(minutes)) = (captures.get(1), captures.get(2)) else {
                continue;
            };
            let Ok(minutes) = minutes.as_str().parse::<u32>() else {
                continue;
            };
            if nearest.as_ref().is_none_or(|(best, _)| minutes < *best) {
                nearest = Some((minutes, station.as_str().to_string()));
            }
        }
    }
    nearest.map(|(minutes, station)| format!("{station}から徒歩約{minutes}分"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionStrategy;

    #[test]
    fn test_lookup_by_domain_substring() {
        let registry = SiteRuleRegistry::builtin();
        assert_eq!(registry.len(), 6);
        assert_eq!(registry.lookup("www.rizeclinic.com").map(|r| r.name()), Some("rize"));
        assert_eq!(registry.lookup("s-b-c.net").map(|r| r.name()), Some("sbc"));
        assert!(registry.lookup("example.com").is_none());
        assert!(SiteRuleRegistry::new().lookup("dioclinic.jp").is_none());
    }

    #[test]
    fn test_selector_rule() {
        let html = Html::parse_document(
            "<h2 class='clinic-name'>DIO 銀座院</h2>\
             <div class='address'>東京都中央区銀座1-1-1</div>\
             <div class='access'>銀座駅から徒歩2分</div>",
        );
        let registry = SiteRuleRegistry::builtin();
        let record = registry
            .lookup("dioclinic.jp")
            .unwrap()
            .extract(&html, "https://dioclinic.jp/clinic/ginza/", "");
        assert_eq!(record.name, "DIO 銀座院");
        assert_eq!(record.address, "東京都中央区銀座1-1-1");
        assert_eq!(record.access, "銀座駅から徒歩2分");
        assert_eq!(record.strategy, ExtractionStrategy::SiteRule("dio".to_string()));
        assert!(record.passes_quality());
    }

    #[test]
    fn test_invalid_selector_yields_empty_field() {
        let rule = SelectorRule {
            name: "broken",
            domain: "broken.example",
            name_selector: "h1",
            address_selector: "div[",
            access_selector: "div.access",
        };
        let html = Html::parse_document("<h1>A院</h1>");
        let record = rule.extract(&html, "https://broken.example/", "");
        assert_eq!(record.name, "A院");
        assert_eq!(record.address, "");
        assert!(!record.passes_quality());
    }

    #[test]
    fn test_table_rule_with_name_row() {
        let html = Html::parse_document(
            "<table><tr><th>院名</th><td>エミナル新宿院</td></tr>\
             <tr><th>住所</th><td>東京都新宿区新宿3-1-1</td></tr>\
             <tr><th>アクセス</th><td>新宿三丁目駅 徒歩1分</td></tr></table>",
        );
        let registry = SiteRuleRegistry::builtin();
        let record = registry
            .lookup("eminal-clinic.jp")
            .unwrap()
            .extract(&html, "https://eminal-clinic.jp/clinic/shinjuku/", "fallback");
        assert_eq!(record.name, "エミナル新宿院");
        assert_eq!(record.address, "東京都新宿区新宿3-1-1");
        assert_eq!(record.access, "新宿三丁目駅 徒歩1分");
    }

    #[test]
    fn test_page_text_rule_picks_nearest_station() {
        let html = Html::parse_document(
            "<h1>聖心美容クリニック 東京院</h1>\
             <p>〒106-0032 東京都港区六本木6-1-1 六本木ビル5F</p>\
             <p>六本木駅から徒歩6分</p><p>乃木坂駅より徒歩4分</p>",
        );
        let registry = SiteRuleRegistry::builtin();
        let record = registry
            .lookup("www.seishin-biyou.jp")
            .unwrap()
            .extract(&html, "https://www.seishin-biyou.jp/tokyo/", "");
        assert_eq!(record.name, "聖心美容クリニック 東京院");
        assert!(record.address.starts_with("〒106-0032 東京都港区"));
        assert_eq!(record.access, "乃木坂駅から徒歩約4分");
    }

    #[test]
    fn test_page_text_rule_fallbacks() {
        let html = Html::parse_document(
            "<html><head><title>湘南美容クリニック 横浜院</title></head>\
             <body><p>横浜駅 きた西口すぐ</p></body></html>",
        );
        let registry = SiteRuleRegistry::builtin();
        let record = registry
            .lookup("www.s-b-c.net")
            .unwrap()
            .extract(&html, "https://www.s-b-c.net/clinic/yokohama/", "");
        assert_eq!(record.name, "湘南美容クリニック 横浜院");
        assert_eq!(record.access, "横浜駅最寄り");
        assert!(record.passes_quality());
    }

    #[test]
    fn test_rize_reads_first_table_and_quoted_stops() {
        let html = Html::parse_document(
            "<h1>リゼクリニック 広島院</h1>\
             <table><tr><th>住所</th><td>広島県広島市中区1-2-3</td></tr></table>\
             <p>「紙屋町東停留場」より徒歩3分</p><p>「広島駅」から徒歩15分</p>",
        );
        let registry = SiteRuleRegistry::builtin();
        let record = registry
            .lookup("www.rizeclinic.com")
            .unwrap()
            .extract(&html, "https://www.rizeclinic.com/locations/hiroshima/", "");
        assert_eq!(record.address, "広島県広島市中区1-2-3");
        assert_eq!(record.access, "紙屋町東停留場から徒歩約3分");
    }
}
