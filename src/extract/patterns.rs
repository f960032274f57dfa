// src/extract/patterns.rs

//! Ranked regular expressions for address, access, phone and hours text.
//!
//! Every pattern carries a base confidence. All patterns of a list run over
//! the full text; the caller picks among the resulting candidates, so the
//! order of a list has no effect on the outcome.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::ExtractionCandidate;

/// A compiled pattern and the confidence of its matches.
#[derive(Debug)]
pub struct Pattern {
    regex: Regex,
    confidence: u8,
}

impl Pattern {
    /// Compile `source` as a case-insensitive, multi-line pattern.
    fn compile(source: &str, confidence: u8) -> Self {
        let regex = Regex::new(&format!("(?im){source}")).expect("valid field pattern");
        Self { regex, confidence }
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// One match of a pattern, with its non-empty capture groups in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternMatch {
    pub groups: Vec<String>,
    pub confidence: u8,
}

impl PatternMatch {
    /// Groups joined by a single space, trimmed.
    pub fn joined(&self) -> String {
        self.groups.join(" ").trim().to_string()
    }
}

fn compile_all(sources: &[(&str, u8)]) -> Vec<Pattern> {
    sources
        .iter()
        .map(|&(source, confidence)| Pattern::compile(source, confidence))
        .collect()
}

/// Postal code, prefecture/ward/block and building/floor addresses.
pub static ADDRESS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    compile_all(&[
        (r"(〒\s*\d{3}[-ー－]\d{4})\s*([^\n\r]{1,100})", 100),
        (r"(〒\s*\d{7})\s*([^\n\r]{1,100})", 95),
        (
            r"((?:東京都|大阪府|京都府|北海道|[^\s]{2,4}県)[^\n\r]*?(?:市|区|町|村)[^\n\r]*?(?:\d+(?:[-ー－]\d+)*(?:番地?)?|[一二三四五六七八九十]+丁目)[^\n\r]*)",
            90,
        ),
        (
            r"((?:東京都|大阪府|京都府|北海道|[^\s]{2,4}県)[^\n\r]*?[市区町村][^\n\r]*?\d+[-ー－]\d+[-ー－]\d+)",
            85,
        ),
        (
            r"([^\n\r]*?(?:ビル|ビルディング|タワー|センター|プラザ|[^\s]+館)[^\n\r]*?(?:\d+階|[一二三四五六七八九十]+階|B\d+F?|\d+F))",
            70,
        ),
    ])
});

/// Station names with walking minutes, line names and access labels.
pub static ACCESS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    compile_all(&[
        (
            r"「?([^「」\s]+(?:駅|停留場))」?\s*(?:から|より)?\s*(?:徒歩|歩いて)?\s*(?:約)?\s*(\d+)\s*分",
            100,
        ),
        (
            r"([^「」\s]+(?:駅|停留場))\s*(?:徒歩|歩いて)\s*(?:約)?\s*(\d+)\s*分",
            95,
        ),
        (r"(?:最寄り?駅?[:：]?\s*)([^「」\s]+駅)[^\n\r]*?(\d+)\s*分", 90),
        (r"(?:最寄り?駅?[:：]?\s*)「?([^「」\s]+駅)」?", 70),
        (r"(?:アクセス|交通)[^\n\r]*?「?([^「」\s]+駅)」?", 65),
        (r"([^「」\s]+線)\s*「?([^「」\s]+駅)」?", 80),
    ])
});

/// Labelled and bare telephone numbers.
pub static PHONE: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    compile_all(&[
        (r"(?:TEL|Tel|tel|電話|☎|📞)\s*[:：]?\s*([\d\-\(\)]{10,})", 100),
        (r"(\d{2,4}[-ー－]\d{2,4}[-ー－]\d{3,4})", 90),
        (r"(\d{10,11})", 70),
    ])
});

/// Labelled business hours and bare time ranges.
pub static HOURS: LazyLock<Vec<Pattern>> = LazyLock::new(|| {
    compile_all(&[
        (r"(?:営業時間|受付時間|診療時間)[^\n\r]*?[:：]?\s*([^\n\r]+)", 100),
        (
            r"(\d{1,2}[:：]\d{2}\s*[~〜～ー－-]\s*\d{1,2}[:：]\d{2})",
            90,
        ),
        (
            r"(?:平日|月.金)\s*[:：]?\s*(\d{1,2}[:：]\d{2}\s*[~〜～ー－-]\s*\d{1,2}[:：]\d{2})",
            85,
        ),
    ])
});

/// Run every pattern over `text` and return each match with its groups.
pub fn matches(text: &str, patterns: &[Pattern]) -> Vec<PatternMatch> {
    let mut found = Vec::new();
    for pattern in patterns {
        for captures in pattern.regex.captures_iter(text) {
            let groups = captures
                .iter()
                .skip(1)
                .flatten()
                .map(|m| m.as_str().trim().to_string())
                .filter(|g| !g.is_empty())
                .collect::<Vec<_>>();
            if groups.is_empty() {
                continue;
            }
            found.push(PatternMatch {
                groups,
                confidence: pattern.confidence,
            });
        }
    }
    found
}

/// Run every pattern over `text` and flatten each match into a candidate.
///
/// Multi-group matches are joined with a single space; empty results are
/// discarded.
pub fn extract_with_confidence(text: &str, patterns: &[Pattern]) -> Vec<ExtractionCandidate> {
    matches(text, patterns)
        .into_iter()
        .map(|m| ExtractionCandidate::new(m.joined(), m.confidence))
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postal_address_keeps_marker_in_value() {
        let candidates =
            extract_with_confidence("〒150-0041 東京都渋谷区神南1-2-3", &ADDRESS);
        let best = candidates.iter().max_by_key(|c| c.confidence).unwrap();
        assert_eq!(best.confidence, 100);
        assert_eq!(best.value, "〒150-0041 東京都渋谷区神南1-2-3");
    }

    #[test]
    fn test_station_access_groups() {
        let found = matches("渋谷駅から徒歩5分", &ACCESS);
        let best = found.iter().max_by_key(|m| m.confidence).unwrap();
        assert_eq!(best.confidence, 100);
        assert_eq!(best.groups, vec!["渋谷駅".to_string(), "5".to_string()]);
    }

    #[test]
    fn test_phone_patterns() {
        let candidates = extract_with_confidence("TEL: 03-1234-5678", &PHONE);
        assert!(
            candidates
                .iter()
                .any(|c| c.value == "03-1234-5678" && c.confidence == 100)
        );
        assert!(candidates.iter().any(|c| c.confidence == 90));
    }

    #[test]
    fn test_labelled_hours() {
        let candidates = extract_with_confidence("診療時間：10:00〜19:00\n休診日：不定休", &HOURS);
        assert!(
            candidates
                .iter()
                .any(|c| c.confidence == 100 && c.value.contains("10:00〜19:00"))
        );
        assert!(candidates.iter().all(|c| !c.value.contains("休診日")));
    }

    #[test]
    fn test_no_match_yields_nothing() {
        assert!(extract_with_confidence("こんにちは", &ADDRESS).is_empty());
        assert!(extract_with_confidence("", &PHONE).is_empty());
    }
}
