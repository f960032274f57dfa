//! Outbound link structures.

use serde::Serialize;

/// A link that may point at an individual store page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkCandidate {
    /// Absolute URL of the link target
    pub absolute_url: String,

    /// Trimmed anchor text
    pub anchor_text: String,

    /// Heuristic score (0-100)
    pub confidence_score: u8,
}

/// Link candidates of a page and whether it is a listing page.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LinkClassification {
    pub candidates: Vec<LinkCandidate>,
    pub is_listing: bool,
}
