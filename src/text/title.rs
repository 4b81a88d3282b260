//! Page title resolution for URL labels.
//!
//! A printed message replaces each link with a short label. The label is the
//! page's `<title>` when the page can be fetched, and the URL itself when it
//! can't. Resolution never fails: every error path yields `None` and the
//! caller falls back to the URL.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Result, TegamiError};

/// Upper bound on one title fetch, connect through body.
pub const TITLE_TIMEOUT: Duration = Duration::from_secs(5);

static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title\s*>").expect("title regex is valid")
});

/// Looks up a human-readable title for a URL.
#[async_trait]
pub trait TitleResolver: Send + Sync {
    /// The page title, or `None` when it cannot be determined.
    async fn resolve(&self, url: &str) -> Option<String>;
}

/// Fetches the page over HTTP and reads its `<title>` element.
#[derive(Debug, Clone)]
pub struct HttpTitleResolver {
    client: reqwest::Client,
}

impl HttpTitleResolver {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("tegami/0.1")
            .timeout(TITLE_TIMEOUT)
            .build()
            .map_err(|e| TegamiError::Config(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> std::result::Result<String, String> {
        let response = self
            .client
            .get(url)
            .timeout(TITLE_TIMEOUT)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !response.status().is_success() {
            return Err(format!("HTTP {}", response.status()));
        }
        response.text().await.map_err(|e| e.to_string())
    }
}

#[async_trait]
impl TitleResolver for HttpTitleResolver {
    async fn resolve(&self, url: &str) -> Option<String> {
        match self.fetch(url).await {
            Ok(html) => {
                let title = extract_title(&html);
                debug!(url, title = ?title, "resolved page title");
                title
            }
            Err(e) => {
                warn!(url, error = %e, "failed to fetch page title");
                None
            }
        }
    }
}

/// Resolver that never finds a title, so every label is the URL.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTitles;

#[async_trait]
impl TitleResolver for NoTitles {
    async fn resolve(&self, _url: &str) -> Option<String> {
        None
    }
}

/// Resolver backed by a fixed table; unknown URLs have no title.
#[derive(Debug, Clone, Default)]
pub struct StaticTitles(pub HashMap<String, String>);

impl StaticTitles {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self(entries.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[async_trait]
impl TitleResolver for StaticTitles {
    async fn resolve(&self, url: &str) -> Option<String> {
        self.0.get(url).cloned()
    }
}

/// Pull the text of the first `<title>` element out of an HTML document.
///
/// Whitespace runs collapse to single spaces and HTML character references,
/// named or numeric, are decoded. An empty title counts as no title.
pub fn extract_title(html: &str) -> Option<String> {
    let raw = TITLE_RE.captures(html)?.get(1)?.as_str();
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let title = html_escape::decode_html_entities(&collapsed).into_owned();
    if title.is_empty() { None } else { Some(title) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_title() {
        let html = "<html><head><TITLE lang=\"ja\">\n  Example   Domain \n</TITLE></head></html>";
        assert_eq!(extract_title(html), Some("Example Domain".to_string()));
    }

    #[test]
    fn test_extract_title_missing_or_empty() {
        assert_eq!(extract_title("<html><body>no title</body></html>"), None);
        assert_eq!(extract_title("<title>   </title>"), None);
    }

    #[test]
    fn test_extract_title_decodes_entities() {
        let html = "<title>Tom &amp; Jerry &#8211; &#x30C6;&lt;3 &bogus; &</title>";
        assert_eq!(
            extract_title(html),
            Some("Tom & Jerry \u{2013} テ<3 &bogus; &".to_string())
        );
    }

    #[test]
    fn test_extract_title_decodes_named_entities() {
        let html = "<title>News &mdash; Today&hellip; &rsquo;s &copy; 2025</title>";
        assert_eq!(
            extract_title(html),
            Some("News \u{2014} Today\u{2026} \u{2019}s \u{a9} 2025".to_string())
        );
    }

    #[tokio::test]
    async fn test_static_titles() {
        let resolver = StaticTitles::new([("https://a.example/", "A page")]);
        assert_eq!(resolver.resolve("https://a.example/").await, Some("A page".to_string()));
        assert_eq!(resolver.resolve("https://b.example/").await, None);
        assert_eq!(NoTitles.resolve("https://a.example/").await, None);
    }

    #[tokio::test]
    async fn test_http_resolver_unreachable_is_none() {
        let resolver = HttpTitleResolver::new().unwrap();
        // Port 9 on loopback: connection refused, no network needed
        assert_eq!(resolver.resolve("http://127.0.0.1:9/").await, None);
    }
}
