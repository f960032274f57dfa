// src/models/record.rs

//! Extraction result structures.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A field of a store record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Address,
    Access,
    Phone,
    Hours,
}

impl Field {
    /// All fields in record order.
    pub const ALL: [Field; 5] = [
        Field::Name,
        Field::Address,
        Field::Access,
        Field::Phone,
        Field::Hours,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Address => "address",
            Field::Access => "access",
            Field::Phone => "phone",
            Field::Hours => "hours",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-field confidence scores (0-100).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConfidences {
    pub name: u8,
    pub address: u8,
    pub access: u8,
    pub phone: u8,
    pub hours: u8,
}

impl FieldConfidences {
    pub fn get(&self, field: Field) -> u8 {
        match field {
            Field::Name => self.name,
            Field::Address => self.address,
            Field::Access => self.access,
            Field::Phone => self.phone,
            Field::Hours => self.hours,
        }
    }

    pub fn set(&mut self, field: Field, confidence: u8) {
        let slot = match field {
            Field::Name => &mut self.name,
            Field::Address => &mut self.address,
            Field::Access => &mut self.access,
            Field::Phone => &mut self.phone,
            Field::Hours => &mut self.hours,
        };
        *slot = confidence;
    }

    /// Mean of the name, address and access confidences.
    ///
    /// Phone and hours are optional and never count toward the overall score.
    pub fn overall(&self) -> f64 {
        (f64::from(self.name) + f64::from(self.address) + f64::from(self.access)) / 3.0
    }
}

/// A candidate value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionCandidate {
    pub value: String,
    pub confidence: u8,
}

impl ExtractionCandidate {
    pub fn new(value: impl Into<String>, confidence: u8) -> Self {
        Self {
            value: value.into(),
            confidence,
        }
    }

    /// The "nothing found" result: empty value, zero confidence.
    pub fn empty() -> Self {
        Self::new(String::new(), 0)
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// How a record was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rule", rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// The generic pattern/structure engine
    Generic,
    /// A hand-written rule for a catalogued site
    SiteRule(String),
}

/// Location information extracted from one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRecord {
    /// Store or clinic name
    pub name: String,

    /// Postal address
    pub address: String,

    /// Nearest-station access description
    pub access: String,

    /// Telephone number, when found
    pub phone: Option<String>,

    /// Business hours, when found
    pub hours: Option<String>,

    /// Page the record was extracted from
    pub source_url: String,

    /// Confidence of each field
    pub field_confidences: FieldConfidences,

    /// Extraction strategy that produced the record
    pub strategy: ExtractionStrategy,
}

impl StoreRecord {
    /// An empty generic record for the given page.
    pub fn empty(source_url: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            address: String::new(),
            access: String::new(),
            phone: None,
            hours: None,
            source_url: source_url.into(),
            field_confidences: FieldConfidences::default(),
            strategy: ExtractionStrategy::Generic,
        }
    }

    /// A record produced by a site rule.
    ///
    /// Present fields carry confidence 100, absent ones 0.
    pub fn from_site_rule(
        rule_name: &str,
        source_url: impl Into<String>,
        name: impl Into<String>,
        address: impl Into<String>,
        access: impl Into<String>,
    ) -> Self {
        let mut record = Self::empty(source_url);
        record.strategy = ExtractionStrategy::SiteRule(rule_name.to_string());
        record.set_field(Field::Name, ExtractionCandidate::new(name, 100));
        record.set_field(Field::Address, ExtractionCandidate::new(address, 100));
        record.set_field(Field::Access, ExtractionCandidate::new(access, 100));
        record
    }

    /// Name present and at least one of address or access present.
    pub fn passes_quality(&self) -> bool {
        !self.name.is_empty() && (!self.address.is_empty() || !self.access.is_empty())
    }

    pub fn overall_confidence(&self) -> f64 {
        self.field_confidences.overall()
    }

    /// Current value of a field; absent optional fields read as "".
    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Name => &self.name,
            Field::Address => &self.address,
            Field::Access => &self.access,
            Field::Phone => self.phone.as_deref().unwrap_or(""),
            Field::Hours => self.hours.as_deref().unwrap_or(""),
        }
    }

    pub fn confidence(&self, field: Field) -> u8 {
        self.field_confidences.get(field)
    }

    /// Store a candidate, keeping value and confidence consistent:
    /// an empty value always carries confidence 0.
    pub(crate) fn set_field(&mut self, field: Field, candidate: ExtractionCandidate) {
        let ExtractionCandidate { value, confidence } = candidate;
        let confidence = if value.is_empty() { 0 } else { confidence };
        match field {
            Field::Name => self.name = value,
            Field::Address => self.address = value,
            Field::Access => self.access = value,
            Field::Phone => self.phone = (!value.is_empty()).then_some(value),
            Field::Hours => self.hours = (!value.is_empty()).then_some(value),
        }
        self.field_confidences.set(field, confidence);
    }
}
