//! # soundboar-extractor
//!
//! Fetches web pages to read their Open Graph `<meta>` tags and downloads
//! the audio files those tags point to.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use bytes::Bytes;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use soundboar_core::{Error, Result};
use tracing::{debug, warn};
use url::Url;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Many sites refuse requests without a browser-like agent.
const BROWSER_AGENT: &str = "Mozilla/5.0";

#[allow(clippy::expect_used)] // Literal patterns
static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid meta pattern"));

#[allow(clippy::expect_used)]
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+))"#)
        .expect("valid attribute pattern")
});

/// Meta tags of a page, by `property` name. A tag that is absent maps to
/// `None`.
pub type MetaTags = HashMap<String, Option<String>>;

/// HTTP client for page scraping and downloads.
#[derive(Debug, Clone)]
pub struct MetaExtractor {
    http: reqwest::Client,
}

impl MetaExtractor {
    pub fn new() -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_AGENT));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { http })
    }

    /// Fetch `website` and read the requested `property` meta tags.
    pub async fn extract_meta(&self, website: &str, properties: &[&str]) -> Result<MetaTags> {
        let url = parse_url(website)?;
        let body = self.get(url).await?;
        let html = String::from_utf8_lossy(&body);
        let tags = parse_meta(&html, properties);
        debug!("Meta tags of {website}: {tags:?}");
        Ok(tags)
    }

    /// Download a file into memory.
    pub async fn download(&self, location: &str) -> Result<Bytes> {
        let url = parse_url(location)?;
        let data = self.get(url).await?;
        debug!("Downloaded {} bytes from {location}", data.len());
        Ok(data)
    }

    async fn get(&self, url: Url) -> Result<Bytes> {
        let response = self.http.get(url.clone()).send().await.map_err(|e| {
            warn!("Request to {url} failed: {e}");
            Error::Network(format!("Failed to fetch {url}: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("Fetching {url} returned HTTP {status}")));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("Failed to read response body: {e}")))
    }
}

fn parse_url(website: &str) -> Result<Url> {
    let url = Url::parse(website)
        .map_err(|e| Error::InvalidArgument(format!("Invalid URL {website}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(Error::InvalidArgument(format!("Unsupported URL scheme: {scheme}"))),
    }
}

/// Read `content` of the first `<meta property=...>` tag for each of
/// `properties`.
pub fn parse_meta(html: &str, properties: &[&str]) -> MetaTags {
    let mut tags: MetaTags = properties.iter().map(|p| ((*p).to_string(), None)).collect();

    for tag in META_TAG.find_iter(html) {
        let mut property = None;
        let mut content = None;
        for attribute in ATTRIBUTE.captures_iter(tag.as_str()) {
            let value = attribute
                .get(2)
                .or_else(|| attribute.get(3))
                .or_else(|| attribute.get(4))
                .map_or("", |m| m.as_str());
            match attribute[1].to_ascii_lowercase().as_str() {
                "property" => property = Some(value),
                "content" => content = Some(value),
                _ => {}
            }
        }

        if let (Some(property), Some(content)) = (property, content) {
            match tags.get_mut(property) {
                Some(slot) if slot.is_none() => *slot = Some(unescape(content)),
                _ => {}
            }
        }
    }

    tags
}

fn unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}
