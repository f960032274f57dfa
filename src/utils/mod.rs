//! Utility functions and helpers.

pub mod http;
pub mod text;

use scraper::Selector;
use url::Url;

use crate::error::{AppError, Result};

/// Parse a CSS selector, reporting failures as [`AppError::Selector`].
pub fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| AppError::selector(selector, format!("{e:?}")))
}

/// Extract the domain from a URL string.
pub fn get_domain(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_lowercase()))
}

/// Dedup key for a URL: the serialized URL without fragment or trailing slashes.
pub fn url_key(url: &Url) -> String {
    let mut url = url.clone();
    url.set_fragment(None);
    url.as_str().trim_end_matches('/').to_string()
}

/// Domain used for output naming, with a leading `www.` removed.
pub fn display_domain(url_str: &str) -> Option<String> {
    get_domain(url_str).map(|d| d.strip_prefix("www.").map(str::to_string).unwrap_or(d))
}
