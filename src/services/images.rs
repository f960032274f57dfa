//! Store image detection and download.
//!
//! Catalogued sites are checked first with their own markup rules, then the
//! common clinic card layouts, then class and path keyword heuristics.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;
use crate::utils::http::{create_async_client, fetch_bytes, fetch_html};
use crate::utils::text::strip_text;
use crate::utils::{display_domain, get_domain};

static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").expect("valid selector"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));
static LAZY_IMG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[data-src]").expect("valid selector"));
static ALT_ENDS_WITH_BRANCH: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(r#"img[alt$="院"]"#).expect("valid selector"));
static CARD_DIV_IMG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div.p-clinic__item--img").expect("valid selector"));
static CARD_IMG: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("img.p-clinic__clinic-card-img").expect("valid selector"));
static LIETO_SLIDERS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    (1..=3)
        .map(|i| {
            Selector::parse(&format!(".js-clinic-mainslick_0{i}")).expect("valid selector")
        })
        .collect()
});
static CLINIC_DETAIL_HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*/clinic/[^/]+/?$").expect("valid regex"));

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".webp"];
const CLASS_KEYWORDS: &[&str] = &[
    "clinic", "store", "shop", "店舗", "facility", "interior", "exterior",
];
const SRC_KEYWORDS: &[&str] = &["clinic", "store", "shop", "facility"];
const CLASS_EXCLUDES: &[&str] = &["icon", "logo", "button", "arrow", "banner"];
const SRC_EXCLUDES: &[&str] = &["logo", "icon", "banner", "line"];

/// Image URLs in first-seen order without duplicates.
#[derive(Default)]
struct ImageSet {
    urls: Vec<String>,
    seen: HashSet<String>,
}

impl ImageSet {
    fn add(&mut self, url: String) {
        if self.seen.insert(url.clone()) {
            self.urls.push(url);
        }
    }

    fn add_src(&mut self, page: &Url, src: &str) {
        if let Some(url) = absolute(page, src) {
            self.add(url);
        }
    }

    fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

fn absolute(page: &Url, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    page.join(src).ok().map(|u| u.to_string())
}

fn img_src(img: ElementRef<'_>) -> Option<&str> {
    img.value().attr("src").filter(|s| !s.trim().is_empty())
}

type SiteDetector = fn(&Html, &Url, &mut ImageSet);

/// Host substrings with their own image markup.
const SITE_DETECTORS: &[(&str, SiteDetector)] = &[
    ("drskinclinic", detect_drskin),
    ("frey-a", detect_freya),
    ("lietoclinic", detect_lieto),
    ("rizeclinic", detect_rize),
    ("beautyskinclinic", detect_beautyskin),
];

fn detect_drskin(document: &Html, page: &Url, images: &mut ImageSet) {
    for img in document.select(&ALT_ENDS_WITH_BRANCH) {
        if let Some(src) = img_src(img) {
            images.add_src(page, src);
        }
    }
}

fn detect_freya(document: &Html, page: &Url, images: &mut ImageSet) {
    for img in document.select(&IMG) {
        let alt = img.value().attr("alt").unwrap_or_default();
        if alt.contains("フレイアクリニック") && alt.contains("院の院内風景") {
            if let Some(src) = img_src(img) {
                images.add_src(page, src);
            }
        }
    }
    for img in document.select(&IMG) {
        if let Some(src) = img_src(img).filter(|s| s.contains("400x265") && s.contains("media.frey-a.jp")) {
            images.add_src(page, src);
        }
    }
}

fn detect_lieto(document: &Html, page: &Url, images: &mut ImageSet) {
    for slider in LIETO_SLIDERS.iter() {
        let first = document
            .select(slider)
            .next()
            .and_then(|s| s.select(&IMG).next())
            .and_then(img_src);
        if let Some(src) = first {
            images.add_src(page, src);
        }
    }
}

fn detect_rize(document: &Html, page: &Url, images: &mut ImageSet) {
    for img in document.select(&IMG) {
        if let Some(src) =
            img_src(img).filter(|s| s.contains("/assets/img/locations/") && s.contains("img_gallery01.jpg"))
        {
            images.add_src(page, src);
        }
    }
}

fn detect_beautyskin(document: &Html, page: &Url, images: &mut ImageSet) {
    for img in document.select(&IMG) {
        let alt = img.value().attr("alt").unwrap_or_default();
        if !(alt.contains("ビューティースキンクリニック") && alt.contains('院')) {
            continue;
        }
        if let Some(src) = img_src(img).filter(|s| s.ends_with(".webp")) {
            images.add_src(page, src);
        }
    }
}

fn detect_cards(document: &Html, page: &Url, images: &mut ImageSet) {
    for div in document.select(&CARD_DIV_IMG) {
        let Some(src) = div.select(&IMG).next().and_then(img_src) else {
            continue;
        };
        if let Some(url) = absolute(page, src).filter(|u| u.contains("/wp-content/uploads/")) {
            images.add(url);
        }
    }
    for img in document.select(&CARD_IMG) {
        if let Some(src) = img_src(img) {
            images.add_src(page, src);
        }
    }
}

fn class_text(element: ElementRef<'_>) -> String {
    element.value().classes().collect::<Vec<_>>().join(" ").to_lowercase()
}

fn has_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

fn detect_generic(document: &Html, page: &Url, images: &mut ImageSet) {
    for img in document.select(&IMG) {
        let own = class_text(img);
        let parent = img
            .parent()
            .and_then(ElementRef::wrap)
            .map(class_text)
            .unwrap_or_default();
        if !(has_any(&own, CLASS_KEYWORDS) || has_any(&parent, CLASS_KEYWORDS)) {
            continue;
        }
        if let Some(url) = img_src(img)
            .and_then(|s| absolute(page, s))
            .filter(|u| !has_any(u, CLASS_EXCLUDES))
        {
            images.add(url);
        }
    }

    for img in document.select(&IMG) {
        let Some(src) = img_src(img) else {
            continue;
        };
        if !has_any(&src.to_lowercase(), SRC_KEYWORDS) {
            continue;
        }
        if let Some(url) = absolute(page, src).filter(|u| !has_any(u, SRC_EXCLUDES)) {
            images.add(url);
        }
    }

    for element in document.select(&LAZY_IMG) {
        let Some(url) = element
            .value()
            .attr("data-src")
            .and_then(|s| absolute(page, s))
        else {
            continue;
        };
        if has_any(&url.to_lowercase(), CLASS_KEYWORDS) && !has_any(&url, CLASS_EXCLUDES) {
            images.add(url);
        }
    }
}

/// Keep only URLs whose path ends in a raster image extension.
pub fn filter_image_urls(urls: impl IntoIterator<Item = String>) -> Vec<String> {
    urls.into_iter()
        .filter(|url| {
            let path = Url::parse(url)
                .map(|u| u.path().to_lowercase())
                .unwrap_or_else(|_| url.to_lowercase());
            IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        })
        .collect()
}

/// Finds store images on a page.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDetector;

impl ImageDetector {
    pub fn new() -> Self {
        Self
    }

    /// Store image URLs of the page, in document order.
    pub fn detect(&self, document: &Html, page_url: &str) -> Vec<String> {
        let Ok(page) = Url::parse(page_url) else {
            return Vec::new();
        };
        let domain = page.host_str().unwrap_or_default().to_lowercase();

        let mut images = ImageSet::default();
        for (site, detector) in SITE_DETECTORS {
            if domain.contains(site) {
                detector(document, &page, &mut images);
                if !images.is_empty() {
                    log::debug!("Images found by the {} rule", site);
                    return filter_image_urls(images.urls);
                }
            }
        }

        detect_cards(document, &page, &mut images);
        if images.is_empty() {
            detect_generic(document, &page, &mut images);
        }
        filter_image_urls(images.urls)
    }

    /// Branch detail pages to search when a listing page shows no images.
    pub fn detail_page_urls(&self, document: &Html, page_url: &str) -> Vec<String> {
        let Ok(page) = Url::parse(page_url) else {
            return Vec::new();
        };
        let mens_life = is_mens_life(page_url);

        let mut urls = ImageSet::default();
        for anchor in document.select(&ANCHOR) {
            let href = anchor.value().attr("href").unwrap_or_default();
            let wanted = if mens_life {
                href.starts_with("/clinic/") && strip_text(anchor).contains("詳細")
            } else {
                CLINIC_DETAIL_HREF.is_match(href)
            };
            if !wanted {
                continue;
            }
            if let Some(url) = absolute(&page, href).filter(|u| u != page_url) {
                urls.add(url);
            }
        }
        urls.urls
    }

    /// Main image of a branch detail page.
    pub fn detail_page_image(&self, document: &Html, page_url: &str) -> Option<String> {
        if is_mens_life(page_url) {
            let page = Url::parse(page_url).ok()?;
            return document
                .select(&IMG)
                .filter_map(img_src)
                .filter(|s| s.contains("/uploads/clinic/"))
                .find_map(|s| absolute(&page, s));
        }
        self.detect(document, page_url).into_iter().next()
    }
}

fn is_mens_life(url: &str) -> bool {
    get_domain(url).is_some_and(|d| d.contains("mens-life-clinic"))
}

/// Files written by [`ImageCollector::download`].
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    pub directory: PathBuf,
    pub saved: Vec<PathBuf>,
    pub failed: usize,
}

/// Collects and downloads store images of a site.
pub struct ImageCollector {
    client: Client,
    detector: ImageDetector,
    delay: Duration,
}

impl ImageCollector {
    pub fn new(config: &CrawlerConfig) -> Result<Self> {
        Ok(Self {
            client: create_async_client(config)?,
            detector: ImageDetector::new(),
            delay: Duration::from_millis(config.image_delay_ms),
        })
    }

    /// Image URLs of `url`, falling back to its branch detail pages.
    pub async fn collect(&self, url: &str) -> Result<Vec<String>> {
        Url::parse(url)?;
        let body = fetch_html(&self.client, url).await?;
        let (images, detail_urls) = {
            let document = Html::parse_document(&body);
            let images = self.detector.detect(&document, url);
            let detail_urls = if images.is_empty() {
                self.detector.detail_page_urls(&document, url)
            } else {
                Vec::new()
            };
            (images, detail_urls)
        };

        log::info!("{} images on the main page", images.len());
        if !images.is_empty() {
            return Ok(images);
        }

        log::info!("Searching {} detail pages", detail_urls.len());
        let mut found = Vec::new();
        for (i, detail_url) in detail_urls.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            log::info!("[{}/{}] {}", i + 1, detail_urls.len(), detail_url);
            match fetch_html(&self.client, detail_url).await {
                Ok(body) => {
                    let document = Html::parse_document(&body);
                    if let Some(image) = self.detector.detail_page_image(&document, detail_url) {
                        found.push(image);
                    }
                }
                Err(e) => log::warn!("Skipping {}: {}", detail_url, e),
            }
        }
        Ok(found)
    }

    /// Download `urls` into `<output_dir>/<domain of page_url>/`.
    ///
    /// Files are named `clinic_image_NNN.<ext>`; failed downloads are skipped.
    pub async fn download(
        &self,
        urls: &[String],
        output_dir: &Path,
        page_url: &str,
    ) -> Result<DownloadReport> {
        let domain = display_domain(page_url)
            .ok_or_else(|| AppError::validation(format!("URL has no host: {page_url}")))?;
        let directory = output_dir.join(domain);
        tokio::fs::create_dir_all(&directory).await?;

        let mut report = DownloadReport {
            directory: directory.clone(),
            ..DownloadReport::default()
        };
        for (i, url) in urls.iter().enumerate() {
            if i > 0 {
                self.pause().await;
            }
            let path = directory.join(format!("clinic_image_{:03}{}", i + 1, extension_of(url)));
            let bytes = match fetch_bytes(&self.client, url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    log::warn!("Download failed for {}: {}", url, e);
                    report.failed += 1;
                    continue;
                }
            };
            match tokio::fs::write(&path, bytes).await {
                Ok(()) => {
                    log::info!("Saved {}", path.display());
                    report.saved.push(path);
                }
                Err(e) => {
                    log::warn!("Could not write {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

/// File extension of the URL path including the dot, `.jpg` when missing.
fn extension_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            Path::new(u.path())
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| format!(".{e}"))
        })
        .unwrap_or_else(|| ".jpg".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detect(url: &str, body: &str) -> Vec<String> {
        ImageDetector.detect(&Html::parse_document(body), url)
    }

    #[test]
    fn test_site_rule_short_circuits() {
        let images = detect(
            "https://www.drskinclinic.jp/clinic/",
            r#"<img src="/img/shinjuku.jpg" alt="新宿院">
               <img src="/img/logo.png" alt="ロゴ">
               <img class="clinic-photo" src="/img/other.jpg">"#,
        );
        assert_eq!(images, vec!["https://www.drskinclinic.jp/img/shinjuku.jpg"]);
    }

    #[test]
    fn test_rize_gallery_images() {
        let images = detect(
            "https://www.rizeclinic.com/locations/",
            r#"<img src="/assets/img/locations/sapporo/img_gallery01.jpg">
               <img src="/assets/img/locations/sapporo/img_gallery02.jpg">"#,
        );
        assert_eq!(
            images,
            vec!["https://www.rizeclinic.com/assets/img/locations/sapporo/img_gallery01.jpg"]
        );
    }

    #[test]
    fn test_card_layout() {
        let images = detect(
            "https://dioclinic.jp/clinic/",
            r#"<div class="p-clinic__item--img"><img src="/wp-content/uploads/ginza.jpg"></div>
               <div class="p-clinic__item--img"><img src="/static/placeholder.jpg"></div>
               <img class="store-photo" src="/img/store.jpg">"#,
        );
        assert_eq!(images, vec!["https://dioclinic.jp/wp-content/uploads/ginza.jpg"]);
    }

    #[test]
    fn test_generic_rules_and_filters() {
        let images = detect(
            "https://example.com/",
            r#"<div class="clinic-gallery"><img src="/a/photo1.png"></div>
               <img class="store-icon" src="/a/icon.png">
               <img src="/images/shop/front.webp">
               <img src="/images/shop/line-banner.jpg">
               <img src="/images/clinic/map.svg">
               <img data-src="/lazy/clinic-interior.jpeg">"#,
        );
        assert_eq!(
            images,
            vec![
                "https://example.com/a/photo1.png",
                "https://example.com/images/shop/front.webp",
                "https://example.com/lazy/clinic-interior.jpeg",
            ]
        );
    }

    #[test]
    fn test_detail_page_urls() {
        let html = Html::parse_document(
            r#"<a href="/clinic/ginza/">銀座</a><a href="/clinic/ginza/">銀座院</a>
               <a href="/clinic/">一覧</a><a href="/news/1/">news</a>"#,
        );
        let urls = ImageDetector.detail_page_urls(&html, "https://example.com/clinic/");
        assert_eq!(urls, vec!["https://example.com/clinic/ginza/"]);

        let mens = Html::parse_document(
            r#"<a href="/clinic/shinjuku/">詳細はこちら</a><a href="/clinic/ueno/">上野院</a>"#,
        );
        let urls = ImageDetector.detail_page_urls(&mens, "https://www.mens-life-clinic.com/clinic/");
        assert_eq!(urls, vec!["https://www.mens-life-clinic.com/clinic/shinjuku/"]);
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("https://a.jp/x/photo.webp?v=2"), ".webp");
        assert_eq!(extension_of("https://a.jp/x/photo"), ".jpg");
    }
}
