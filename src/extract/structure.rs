// src/extract/structure.rs

//! Structural analysis: key/value tables, definition lists and
//! keyword-dense containers.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use crate::utils::text::strip_text;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static DL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dl").expect("valid selector"));
static DT: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dt").expect("valid selector"));
static DD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("dd").expect("valid selector"));
static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div, section, article").expect("valid selector"));

/// Words that mark a container as holding store information.
const SECTION_KEYWORDS: &[&str] = &[
    "店舗", "住所", "アクセス", "所在地", "交通", "営業", "電話", "TEL", "Address", "Access",
    "Location",
];

/// Tables with more key/value rows than this are scored as genuine info tables.
const TABLE_ROW_THRESHOLD: usize = 3;
const SECTION_LIMIT: usize = 10;

/// A (header, value) pair read from a table row or definition list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub header: String,
    pub value: String,
}

/// A table containing header/value rows.
#[derive(Debug, Clone)]
pub struct InfoTable<'a> {
    pub element: ElementRef<'a>,
    pub rows: Vec<KeyValue>,
    pub confidence: u8,
}

/// A definition list with positionally paired `dt`/`dd` items.
#[derive(Debug, Clone)]
pub struct DefinitionList<'a> {
    pub element: ElementRef<'a>,
    pub items: Vec<KeyValue>,
    pub confidence: u8,
}

/// A container mentioning several store-information keywords.
#[derive(Debug, Clone)]
pub struct InfoSection<'a> {
    pub element: ElementRef<'a>,
    pub keyword_count: usize,
    pub confidence: u8,
}

/// Find tables where at least one row is exactly a header cell and a value cell.
pub fn find_info_tables(document: &Html) -> Vec<InfoTable<'_>> {
    document
        .select(&TABLE)
        .filter_map(|table| {
            let rows = table.select(&ROW).filter_map(key_value_row).collect::<Vec<_>>();
            if rows.is_empty() {
                return None;
            }
            let confidence = if rows.len() > TABLE_ROW_THRESHOLD { 100 } else { 80 };
            Some(InfoTable {
                element: table,
                rows,
                confidence,
            })
        })
        .collect()
}

fn key_value_row(row: ElementRef<'_>) -> Option<KeyValue> {
    let cells = row
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|cell| matches!(cell.value().name(), "th" | "td"))
        .collect::<Vec<_>>();
    let [header, value] = cells.as_slice() else {
        return None;
    };
    let value = strip_text(*value);
    if value.is_empty() {
        return None;
    }
    Some(KeyValue {
        header: strip_text(*header),
        value,
    })
}

/// Find definition lists, pairing `dt` and `dd` elements by position.
pub fn find_definition_lists(document: &Html) -> Vec<DefinitionList<'_>> {
    document
        .select(&DL)
        .filter_map(|dl| {
            let items = dl
                .select(&DT)
                .zip(dl.select(&DD))
                .map(|(dt, dd)| KeyValue {
                    header: strip_text(dt),
                    value: strip_text(dd),
                })
                .filter(|kv| !kv.value.is_empty())
                .collect::<Vec<_>>();
            (!items.is_empty()).then_some(DefinitionList {
                element: dl,
                items,
                confidence: 95,
            })
        })
        .collect()
}

/// Find containers mentioning at least two store-information keywords.
///
/// Returns at most ten sections, highest confidence first, ties in document
/// order.
pub fn find_info_sections(document: &Html) -> Vec<InfoSection<'_>> {
    let mut sections = document
        .select(&CONTAINER)
        .filter_map(|element| {
            let text = element.text().collect::<String>();
            let keyword_count = SECTION_KEYWORDS
                .iter()
                .filter(|keyword| text.contains(*keyword))
                .count();
            (keyword_count >= 2).then(|| InfoSection {
                element,
                keyword_count,
                confidence: (60 + 10 * keyword_count).min(100) as u8,
            })
        })
        .collect::<Vec<_>>();

    sections.sort_by(|a, b| b.confidence.cmp(&a.confidence));
    sections.truncate(SECTION_LIMIT);
    sections
}
