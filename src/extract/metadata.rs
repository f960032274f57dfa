//! Embedded schema.org JSON-LD metadata.

use std::sync::LazyLock;

use scraper::{Html, Selector};
use serde_json::Value;

static JSON_LD: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"script[type="application/ld+json"]"#).expect("valid selector")
});

/// schema.org types describing a physical store or clinic.
const BUSINESS_TYPES: &[&str] = &[
    "Store",
    "LocalBusiness",
    "MedicalClinic",
    "MedicalBusiness",
    "Dentist",
    "Physician",
    "HealthAndBeautyBusiness",
    "BeautySalon",
    "DaySpa",
];

/// The fields of one JSON-LD object that matter for store extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BusinessMetadata {
    pub type_names: Vec<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub telephone: Option<String>,
    pub opening_hours: Option<String>,
}

impl BusinessMetadata {
    /// Whether any `@type` names a store or clinic.
    pub fn is_business(&self) -> bool {
        self.type_names
            .iter()
            .any(|t| BUSINESS_TYPES.iter().any(|b| t.eq_ignore_ascii_case(b)))
    }
}

/// Parse every JSON-LD block of the document.
///
/// Accepts a top-level object, an array, or a `@graph` container. Blocks that
/// are not valid JSON are skipped.
pub fn parse_json_ld(document: &Html) -> Vec<BusinessMetadata> {
    let mut results = Vec::new();

    for script in document.select(&JSON_LD) {
        let json_text = script.text().collect::<String>();
        let value: Value = match serde_json::from_str(json_text.trim()) {
            Ok(v) => v,
            Err(e) => {
                log::debug!("Skipping malformed JSON-LD block: {e}");
                continue;
            }
        };

        let mut items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        let graph = items
            .iter()
            .filter_map(|item| item.get("@graph").and_then(Value::as_array))
            .flatten()
            .cloned()
            .collect::<Vec<_>>();
        items.extend(graph);

        results.extend(items.iter().filter(|item| item.is_object()).map(to_metadata));
    }

    results
}

fn to_metadata(item: &Value) -> BusinessMetadata {
    let type_names = match item.get("@type") {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(types)) => types
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    };

    BusinessMetadata {
        type_names,
        name: item.get("name").and_then(scalar_text),
        address: item.get("address").and_then(flatten_address),
        telephone: item.get("telephone").and_then(scalar_text),
        opening_hours: item.get("openingHours").and_then(|v| match v {
            Value::Array(parts) => {
                let joined = parts
                    .iter()
                    .filter_map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(", ");
                (!joined.is_empty()).then_some(joined)
            }
            other => scalar_text(other),
        }),
    }
}

/// A postal address object becomes "〒postal region locality street".
fn flatten_address(address: &Value) -> Option<String> {
    if address.is_object() {
        let mut parts = Vec::new();
        if let Some(postal) = address.get("postalCode").and_then(scalar_text) {
            parts.push(format!("〒{postal}"));
        }
        for key in ["addressRegion", "addressLocality", "streetAddress"] {
            if let Some(part) = address.get(key).and_then(scalar_text) {
                parts.push(part);
            }
        }
        return (!parts.is_empty()).then(|| parts.join(" "));
    }
    scalar_text(address)
}

// Strings and numbers in the wild; empty strings count as absent.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
