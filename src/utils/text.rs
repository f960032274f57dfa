//! Text helpers shared by the extractors.

use scraper::{ElementRef, Html, Node};
use unicode_normalization::UnicodeNormalization;

/// Elements whose text never reaches the reader.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that end a line in the flattened page text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr",
    "li", "main", "nav", "ol", "option", "p", "pre", "section", "table", "tbody", "tfoot",
    "thead", "title", "tr", "ul",
];

/// Collapse runs of whitespace into single spaces and trim.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// NFKC-normalize: full-width ASCII, half-width katakana and the
/// ideographic space fold to their canonical forms.
pub fn fold_width(s: &str) -> String {
    s.nfkc().collect()
}

/// Comparison key for candidate values: width-folded, whitespace-collapsed.
pub fn normalize_key(s: &str) -> String {
    collapse_whitespace(&fold_width(s))
}

/// Text of an element with every text node trimmed and concatenated.
pub fn strip_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(collapse_whitespace)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

/// Reader-visible text of a whole document, one line per block element.
pub fn visible_text(document: &Html) -> String {
    let mut out = String::new();
    push_visible(document.root_element(), &mut out);
    out
}

fn push_visible(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if HIDDEN_ELEMENTS.contains(&name) {
        return;
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            push_visible(child_element, out);
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }

    match name {
        "td" | "th" => out.push(' '),
        _ if BLOCK_ELEMENTS.contains(&name) => out.push('\n'),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  東京都\n  渋谷区\t1-2 "), "東京都 渋谷区 1-2");
    }

    #[test]
    fn test_normalize_key_folds_full_width() {
        assert_eq!(normalize_key("渋谷区１－２"), normalize_key("渋谷区1-2"));
        assert_eq!(normalize_key("ＡＢＣ\u{3000}ビル"), "ABC ビル");
        assert_eq!(normalize_key("ｸﾘﾆｯｸ新宿院"), normalize_key("クリニック新宿院"));
        assert_eq!(fold_width("１２分"), "12分");
    }

    #[test]
    fn test_visible_text_skips_scripts_and_breaks_blocks() {
        let html = Html::parse_document(
            "<html><body><p>新宿駅から<strong>徒歩3分</strong></p>\
             <script>var x = '渋谷駅 徒歩1分';</script>\
             <table><tr><th>住所</th><td>東京都新宿区1-2-3</td></tr></table></body></html>",
        );
        let text = visible_text(&html);
        assert!(text.contains("新宿駅から徒歩3分\n"));
        assert!(text.contains("住所 東京都新宿区1-2-3"));
        assert!(!text.contains("渋谷駅"));
    }

    #[test]
    fn test_strip_text_trims_nodes() {
        let html = Html::parse_fragment("<h1>\n  リゼクリニック <span> 新宿院 </span></h1>");
        let selector = scraper::Selector::parse("h1").unwrap();
        let h1 = html.select(&selector).next().unwrap();
        assert_eq!(strip_text(h1), "リゼクリニック新宿院");
    }
}
