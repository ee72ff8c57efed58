//! Best-effort video titles.
//!
//! Titles come from an ordered chain of [`TitleStrategy`]s. The first strategy
//! that yields a non-empty title wins; when every strategy fails the video id
//! is used instead, so title lookup never fails a load.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

use super::watch_url;
use crate::orchestrator::Reporter;
use crate::utils::decode_html_entities;
use crate::{Result, TranscriptorError};

static PLAYER_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""videoDetails"\s*:\s*\{[^{}]*?"title"\s*:\s*"((?:[^"\\]|\\.)*)""#).unwrap()
});
static TITLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<title[^>]*>([^<]+)</title>").unwrap());
static OG_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)property="og:title"\s+content="([^"]+)""#).unwrap());

/// Response of a raw page fetch
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub body: String,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetches a web page as text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<PageResponse>;
}

/// One way of finding a video's title
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TitleStrategy: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &'static str;

    async fn lookup(&self, video_id: &str) -> Result<String>;
}

/// Ordered title strategies with the video id as the final fallback
pub struct TitleChain {
    strategies: Vec<Box<dyn TitleStrategy>>,
}

impl TitleChain {
    pub fn new(strategies: Vec<Box<dyn TitleStrategy>>) -> Self {
        Self { strategies }
    }

    /// Chain that always answers with the video id
    pub fn id_only() -> Self {
        Self::new(Vec::new())
    }

    /// Resolve a title, degrading to the video id
    pub async fn resolve(&self, video_id: &str, reporter: &Reporter) -> String {
        for strategy in &self.strategies {
            match strategy.lookup(video_id).await {
                Ok(title) if !title.trim().is_empty() => return title.trim().to_string(),
                Ok(_) => {
                    tracing::debug!("{} returned an empty title for {}", strategy.name(), video_id);
                }
                Err(e) => {
                    let err = TranscriptorError::MetadataUnavailable {
                        video_id: video_id.to_string(),
                        reason: format!("{}: {}", strategy.name(), e),
                    };
                    tracing::debug!("{} lookup failed: {:#}", strategy.name(), e);
                    reporter.log(format!("  Warning: {}", err));
                }
            }
        }

        video_id.to_string()
    }
}

/// Title scraped from the raw watch page
pub struct PageTitle {
    fetcher: Arc<dyn PageFetcher>,
    base_url: String,
}

impl PageTitle {
    pub fn new(fetcher: Arc<dyn PageFetcher>, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TitleStrategy for PageTitle {
    fn name(&self) -> &'static str {
        "page"
    }

    async fn lookup(&self, video_id: &str) -> Result<String> {
        let page = self.fetcher.fetch_page(&watch_url(&self.base_url, video_id)).await?;
        if !page.is_success() {
            anyhow::bail!("HTTP {}", page.status);
        }

        extract_page_title(&page.body).ok_or_else(|| anyhow::anyhow!("no title markup found"))
    }
}

/// Pull a title out of the player response, `<title>` or `og:title` markup
pub fn extract_page_title(html: &str) -> Option<String> {
    let from_player = PLAYER_TITLE
        .captures(html)
        .and_then(|caps| serde_json::from_str::<String>(&format!("\"{}\"", &caps[1])).ok());
    let from_markup = [&*TITLE_TAG, &*OG_TITLE]
        .into_iter()
        .filter_map(|pattern| pattern.captures(html))
        .map(|caps| caps[1].to_string());

    from_player
        .into_iter()
        .chain(from_markup)
        .map(|raw| clean_title(&raw))
        .find(|title| !title.is_empty() && title != "YouTube")
}

fn clean_title(raw: &str) -> String {
    let decoded = decode_html_entities(raw.trim());
    decoded
        .strip_suffix(" - YouTube")
        .unwrap_or(&decoded)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failing(name: &'static str) -> Box<dyn TitleStrategy> {
        let mut strategy = MockTitleStrategy::new();
        strategy
            .expect_lookup()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("HTTP 429")));
        strategy.expect_name().return_const(name);
        Box::new(strategy)
    }

    fn answering(title: &'static str) -> Box<dyn TitleStrategy> {
        let mut strategy = MockTitleStrategy::new();
        strategy
            .expect_lookup()
            .times(1)
            .returning(move |_| Ok(title.to_string()));
        strategy.expect_name().return_const("answering");
        Box::new(strategy)
    }

    fn never_called() -> Box<dyn TitleStrategy> {
        let mut strategy = MockTitleStrategy::new();
        strategy.expect_lookup().never();
        strategy.expect_name().return_const("unused");
        Box::new(strategy)
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let chain = TitleChain::new(vec![answering("First"), never_called()]);
        let title = chain.resolve("id1", &Reporter::silent()).await;
        assert_eq!(title, "First");
    }

    #[tokio::test]
    async fn test_falls_through_failures() {
        let chain = TitleChain::new(vec![failing("oembed"), answering("From page")]);
        let title = chain.resolve("id1", &Reporter::silent()).await;
        assert_eq!(title, "From page");
    }

    #[tokio::test]
    async fn test_empty_title_falls_through() {
        let chain = TitleChain::new(vec![answering("   "), answering("Second")]);
        let title = chain.resolve("id1", &Reporter::silent()).await;
        assert_eq!(title, "Second");
    }

    #[tokio::test]
    async fn test_all_failures_fall_back_to_id() {
        let chain = TitleChain::new(vec![failing("oembed"), failing("page")]);
        let title = chain.resolve("id1", &Reporter::silent()).await;
        assert_eq!(title, "id1");
        assert_eq!(TitleChain::id_only().resolve("id2", &Reporter::silent()).await, "id2");
    }

    #[tokio::test]
    async fn test_page_title_strategy() {
        let mut fetcher = MockPageFetcher::new();
        fetcher
            .expect_fetch_page()
            .withf(|url| url == "https://www.youtube.com/watch?v=id1")
            .returning(|_| {
                Ok(PageResponse {
                    status: 200,
                    body: "<html><head><title>Rust &amp; You - YouTube</title></head></html>".to_string(),
                })
            });

        let strategy = PageTitle::new(Arc::new(fetcher), "https://www.youtube.com");
        let title = strategy.lookup("id1").await.unwrap();
        assert_eq!(title, "Rust & You");
    }

    #[tokio::test]
    async fn test_page_title_strategy_http_error() {
        let mut fetcher = MockPageFetcher::new();
        fetcher.expect_fetch_page().returning(|_| {
            Ok(PageResponse {
                status: 429,
                body: String::new(),
            })
        });

        let strategy = PageTitle::new(Arc::new(fetcher), "https://www.youtube.com");
        assert!(strategy.lookup("id1").await.is_err());
    }

    #[test]
    fn test_extract_page_title_og_fallback() {
        let html = r#"<title>YouTube</title><meta property="og:title" content="Lecture 4: Traits">"#;
        assert_eq!(extract_page_title(html), Some("Lecture 4: Traits".to_string()));
    }

    #[test]
    fn test_extract_page_title_prefers_player_response() {
        let html = r#"<title>Something else - YouTube</title><script>var ytInitialPlayerResponse = {"videoDetails":{"videoId":"id1","title":"Rock & Roll \"Live\"","lengthSeconds":"60"}};</script>"#;
        assert_eq!(extract_page_title(html), Some("Rock & Roll \"Live\"".to_string()));
    }

    #[test]
    fn test_extract_page_title_missing() {
        assert_eq!(extract_page_title("<html><body>nothing</body></html>"), None);
    }
}
