use anyhow::Context;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use super::metadata::{PageFetcher, PageResponse, PageTitle, TitleChain, TitleStrategy};
use super::{watch_url, PlaylistLister};
use crate::config::HttpConfig;
use crate::transcribe::processor::{self, CaptionTrack};
use crate::transcribe::{TranscriptFetcher, TranscriptResult};
use crate::utils::parse_lenient_url;
use crate::{Result, TranscriptorError};

static PLAYLIST_ENTRY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""playlistVideoRenderer"\s*:\s*\{\s*"videoId"\s*:\s*"([A-Za-z0-9_-]{11})""#).unwrap()
});
static CONTINUATION_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""continuationCommand"\s*:\s*\{\s*"token"\s*:\s*"([^"]+)""#).unwrap()
});
static API_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).unwrap());
static CLIENT_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""INNERTUBE_CLIENT_VERSION"\s*:\s*"([^"]+)""#).unwrap());

/// Upper bound on continuation requests for one playlist
const MAX_PLAYLIST_PAGES: usize = 500;
const DEFAULT_CLIENT_VERSION: &str = "2.20240101.00.00";

/// oEmbed response, only the field we use
#[derive(Debug, Deserialize)]
struct OEmbed {
    title: String,
}

/// HTTP client for every YouTube capability the downloader needs
pub struct YoutubeClient {
    client: Client,
    base_url: String,
    languages: Vec<String>,
}

impl YoutubeClient {
    pub fn new(http: &HttpConfig, languages: Vec<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&http.user_agent)
            .timeout(Duration::from_secs(http.timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: http.base_url.trim_end_matches('/').to_string(),
            languages,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Default title chain: oEmbed first, then the watch page markup
    pub fn title_chain(self: &Arc<Self>) -> TitleChain {
        TitleChain::new(vec![
            Box::new(OEmbedTitle { client: Arc::clone(self) }),
            Box::new(PageTitle::new(
                Arc::clone(self) as Arc<dyn PageFetcher>,
                self.base_url.clone(),
            )),
        ])
    }

    async fn get_text(&self, url: &str) -> Result<(StatusCode, String)> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;
        Ok((status, body))
    }

    /// Rewrite any URL carrying `list=` to the playlist page on our base URL
    fn playlist_page_url(&self, playlist_url: &str) -> Result<String> {
        let parsed = parse_lenient_url(playlist_url)?;
        let list_id = parsed
            .query_pairs()
            .find(|(k, _)| k == "list")
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| TranscriptorError::UnresolvableUrl(playlist_url.to_string()))?;

        Ok(format!(
            "{}/playlist?list={}",
            self.base_url,
            urlencoding::encode(&list_id)
        ))
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<(StatusCode, String)> {
        tracing::debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;
        Ok((status, body))
    }

    /// Fetch the remaining playlist batches after the first page
    async fn fetch_continuations(&self, first_page: &str, ids: &mut Vec<String>) -> Result<()> {
        let Some(mut token) = continuation_token(first_page) else {
            return Ok(());
        };

        let key = API_KEY
            .captures(first_page)
            .map(|caps| caps[1].to_string())
            .context("Playlist has more videos but the page carries no API key")?;
        let client_version = CLIENT_VERSION
            .captures(first_page)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| DEFAULT_CLIENT_VERSION.to_string());
        let url = format!(
            "{}/youtubei/v1/browse?key={}",
            self.base_url,
            urlencoding::encode(&key)
        );

        for page in 2..=MAX_PLAYLIST_PAGES {
            let request = serde_json::json!({
                "context": { "client": { "clientName": "WEB", "clientVersion": client_version } },
                "continuation": token,
            });

            let (status, body) = self.post_json(&url, &request).await?;
            check_listing_response(status, &body, "playlist continuation")
                .with_context(|| format!("Failed to fetch playlist page {}", page))?;

            let before = ids.len();
            push_unique_ids(ids, &PLAYLIST_ENTRY, &body);
            tracing::debug!("Playlist page {} added {} videos", page, ids.len() - before);

            match continuation_token(&body) {
                Some(next) if next == token => {
                    anyhow::bail!("Playlist continuation did not advance on page {}", page)
                }
                Some(next) => token = next,
                None => return Ok(()),
            }
        }

        anyhow::bail!("Playlist has more than {} pages", MAX_PLAYLIST_PAGES)
    }

    async fn fetch_watch_page(&self, video_id: &str) -> Result<String> {
        let url = watch_url(&self.base_url, video_id);
        let (status, body) = self.get_text(&url).await?;

        if status == StatusCode::TOO_MANY_REQUESTS || processor::is_captcha_page(&body) {
            return Err(TranscriptorError::UpstreamBlocked(format!("watch page returned {}", status)).into());
        }
        if !status.is_success() {
            return Err(TranscriptorError::TranscriptUnavailable {
                video_id: video_id.to_string(),
                reason: format!("watch page returned HTTP {}", status),
            }
            .into());
        }

        Ok(body)
    }

    async fn fetch_timed_text(&self, video_id: &str, track: &CaptionTrack) -> Result<String> {
        let (status, body) = self.get_text(&track.base_url).await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(TranscriptorError::UpstreamBlocked("timed text returned 429".to_string()).into());
        }
        if !status.is_success() || body.trim().is_empty() {
            return Err(TranscriptorError::TranscriptUnavailable {
                video_id: video_id.to_string(),
                reason: format!("timed text request returned HTTP {} with {} bytes", status, body.len()),
            }
            .into());
        }

        Ok(body)
    }
}

#[async_trait]
impl PageFetcher for YoutubeClient {
    async fn fetch_page(&self, url: &str) -> Result<PageResponse> {
        let (status, body) = self.get_text(url).await?;
        Ok(PageResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PlaylistLister for YoutubeClient {
    async fn list_video_urls(&self, playlist_url: &str) -> Result<Vec<String>> {
        let page_url = self.playlist_page_url(playlist_url)?;
        let (status, body) = self.get_text(&page_url).await?;
        check_listing_response(status, &body, "playlist page")?;

        let mut ids = playlist_video_ids(&body);
        if ids.is_empty() {
            anyhow::bail!("No videos found in playlist");
        }
        self.fetch_continuations(&body, &mut ids).await?;

        Ok(ids.iter().map(|id| watch_url(&self.base_url, id)).collect())
    }
}

#[async_trait]
impl TranscriptFetcher for YoutubeClient {
    async fn fetch(&self, video_id: &str) -> Result<TranscriptResult> {
        let html = self.fetch_watch_page(video_id).await?;

        let tracks = processor::extract_caption_tracks(&html).map_err(|reason| {
            TranscriptorError::TranscriptUnavailable {
                video_id: video_id.to_string(),
                reason,
            }
        })?;

        let track = processor::select_track(&tracks, &self.languages)
            .ok_or_else(|| TranscriptorError::TranscriptUnavailable {
                video_id: video_id.to_string(),
                reason: "no caption tracks".to_string(),
            })?;
        tracing::debug!("Using caption track {} for {}", track.language_code, video_id);

        let xml = self.fetch_timed_text(video_id, track).await?;
        let snippets = processor::parse_timed_text(&xml);
        if snippets.is_empty() {
            return Err(TranscriptorError::TranscriptUnavailable {
                video_id: video_id.to_string(),
                reason: "transcript contains no text".to_string(),
            }
            .into());
        }

        Ok(TranscriptResult {
            language: track.language_name(),
            language_code: track.language_code.clone(),
            snippets,
        })
    }
}

/// Video-info lookup through YouTube's oEmbed endpoint
pub struct OEmbedTitle {
    client: Arc<YoutubeClient>,
}

#[async_trait]
impl TitleStrategy for OEmbedTitle {
    fn name(&self) -> &'static str {
        "oembed"
    }

    async fn lookup(&self, video_id: &str) -> Result<String> {
        let target = watch_url("https://www.youtube.com", video_id);
        let url = format!(
            "{}/oembed?url={}&format=json",
            self.client.base_url,
            urlencoding::encode(&target)
        );

        let (status, body) = self.client.get_text(&url).await?;
        if !status.is_success() {
            anyhow::bail!("HTTP {}", status);
        }

        let info: OEmbed = serde_json::from_str(&body).context("Invalid oEmbed response")?;
        Ok(info.title)
    }
}

fn check_listing_response(status: StatusCode, body: &str, what: &str) -> Result<()> {
    if status == StatusCode::TOO_MANY_REQUESTS || processor::is_captcha_page(body) {
        return Err(TranscriptorError::UpstreamBlocked(format!("{} returned {}", what, status)).into());
    }
    if !status.is_success() {
        anyhow::bail!("Failed to fetch {}: HTTP {}", what, status);
    }
    Ok(())
}

/// Video ids of playlist entries on one page, deduplicated, in page order
pub fn playlist_video_ids(html: &str) -> Vec<String> {
    let mut ids = Vec::new();
    push_unique_ids(&mut ids, &PLAYLIST_ENTRY, html);
    ids
}

/// Token for the next batch of playlist entries, if the page has one
pub fn continuation_token(page: &str) -> Option<String> {
    CONTINUATION_TOKEN.captures(page).map(|caps| caps[1].to_string())
}

fn push_unique_ids(ids: &mut Vec<String>, pattern: &Regex, html: &str) {
    for caps in pattern.captures_iter(html) {
        let id = caps[1].to_string();
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
}
