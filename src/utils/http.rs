// src/utils/http.rs

//! HTTP client utilities.

use std::sync::LazyLock;
use std::time::Duration;

use encoding_rs::{Encoding, UTF_8};
use regex::Regex;
use reqwest::header::CONTENT_TYPE;

use crate::error::{AppError, FetchFailure, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Fetch a page body as text.
///
/// Every failure (timeout, non-success status, transport) is reported as
/// [`AppError::Fetch`] so callers can tell it apart from processing errors.
/// The body is decoded with the charset from the `Content-Type` header or,
/// failing that, from a `<meta>` declaration; UTF-8 otherwise.
pub async fn fetch_html(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = send(client, url).await?;
    let header_charset = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(charset_param);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::fetch(url, FetchFailure::from(&e)))?;
    Ok(decode_html(&bytes, header_charset.as_deref()))
}

/// Bytes searched for a `<meta>` charset declaration.
const META_SNIFF_LIMIT: usize = 2048;

static META_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+charset\s*=\s*["']?([a-z0-9_:.\-]+)"#).expect("valid regex")
});

/// `charset` parameter of a `Content-Type` value.
fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(['"', '\'']).to_string())
    })
}

/// Decode an HTML body.
///
/// A byte order mark wins, then `header_charset`, then a `<meta charset>` or
/// `http-equiv` declaration near the top of the document. Unknown labels fall
/// through to the next source; the default is UTF-8.
pub fn decode_html(bytes: &[u8], header_charset: Option<&str>) -> String {
    let encoding = header_charset
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .or_else(|| meta_charset(bytes))
        .unwrap_or(UTF_8);
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        log::debug!("Malformed {} sequences replaced while decoding", used.name());
    }
    text.into_owned()
}

fn meta_charset(bytes: &[u8]) -> Option<&'static Encoding> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(META_SNIFF_LIMIT)]);
    META_CHARSET
        .captures(&head)
        .and_then(|caps| Encoding::for_label(caps[1].as_bytes()))
}

/// Fetch a resource body as raw bytes.
pub async fn fetch_bytes(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    let response = send(client, url).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::fetch(url, FetchFailure::from(&e)))?;
    Ok(bytes.to_vec())
}

async fn send(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| AppError::fetch(url, FetchFailure::from(&e)))
}
