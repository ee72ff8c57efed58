use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub mod metadata;
pub mod youtube;

use crate::orchestrator::Reporter;
use crate::utils::{extract_domain, parse_lenient_url};
use crate::{Result, TranscriptorError};
use metadata::TitleChain;

/// A single video queued for download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRef {
    /// Canonical YouTube video identifier
    pub id: String,

    /// Display title, the id itself when no title could be fetched
    pub title: String,

    /// Source or canonical watch URL
    pub url: String,

    /// 1-based number used in the output filename
    pub index: usize,
}

/// Numbering applied to playlist entries when some cannot be resolved
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IndexPolicy {
    /// Number the surviving entries 1..n
    #[default]
    Renumber,
    /// Keep each entry's position in the upstream playlist
    #[serde(rename = "preserve")]
    #[value(name = "preserve")]
    PreserveSource,
}

impl fmt::Display for IndexPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexPolicy::Renumber => write!(f, "renumber"),
            IndexPolicy::PreserveSource => write!(f, "preserve"),
        }
    }
}

/// Kind of input URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Video,
    Playlist,
}

/// Videos produced by one load step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedSource {
    pub kind: SourceKind,
    pub videos: Vec<VideoRef>,
}

/// Enumerates the member video URLs of a playlist, in playlist order
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaylistLister: Send + Sync {
    async fn list_video_urls(&self, playlist_url: &str) -> Result<Vec<String>>;
}

/// True when the URL carries a `list=` query parameter, even an empty one
pub fn is_playlist(url: &str) -> bool {
    match parse_lenient_url(url) {
        Ok(parsed) => parsed.query_pairs().any(|(k, _)| k == "list"),
        Err(_) => false,
    }
}

/// Extract the video id from a watch URL or a `youtu.be` short link
pub fn extract_video_id(url: &str) -> Option<String> {
    let parsed = parse_lenient_url(url).ok()?;

    if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
        let id = v.trim();
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }

    if extract_domain(&parsed).as_deref() == Some("youtu.be") {
        let segment = parsed.path_segments()?.next()?.trim();
        if !segment.is_empty() {
            return Some(segment.to_string());
        }
    }

    None
}

/// Canonical watch URL for a video id
pub fn watch_url(base_url: &str, video_id: &str) -> String {
    format!("{}/watch?v={}", base_url.trim_end_matches('/'), video_id)
}

/// Turns an input URL into the list of videos to download
pub struct UrlResolver {
    lister: Arc<dyn PlaylistLister>,
    titles: TitleChain,
    policy: IndexPolicy,
}

impl UrlResolver {
    pub fn new(lister: Arc<dyn PlaylistLister>, titles: TitleChain, policy: IndexPolicy) -> Self {
        Self { lister, titles, policy }
    }

    /// Resolve a video or playlist URL, fetching a title for every video
    pub async fn load(&self, url: &str, reporter: &Reporter) -> Result<LoadedSource> {
        let url = url.trim();

        if is_playlist(url) {
            let videos = self.load_playlist(url, reporter).await?;
            Ok(LoadedSource { kind: SourceKind::Playlist, videos })
        } else {
            let video = self.load_single(url, reporter).await?;
            Ok(LoadedSource { kind: SourceKind::Video, videos: vec![video] })
        }
    }

    async fn load_single(&self, url: &str, reporter: &Reporter) -> Result<VideoRef> {
        let id = extract_video_id(url)
            .ok_or_else(|| TranscriptorError::UnresolvableUrl(url.to_string()))?;

        reporter.log("Loading video information...");
        let title = self.titles.resolve(&id, reporter).await;

        Ok(VideoRef {
            id,
            title,
            url: url.to_string(),
            index: 1,
        })
    }

    async fn load_playlist(&self, url: &str, reporter: &Reporter) -> Result<Vec<VideoRef>> {
        reporter.log("Loading playlist...");
        let member_urls = self.lister.list_video_urls(url).await?;
        let total = member_urls.len();
        tracing::debug!("Playlist lists {} videos", total);

        let mut videos = Vec::with_capacity(total);
        for (position, member_url) in member_urls.iter().enumerate() {
            let source_index = position + 1;
            reporter.load_progress(source_index, total);

            let Some(id) = extract_video_id(member_url) else {
                tracing::debug!("Dropping unresolvable playlist entry {}: {}", source_index, member_url);
                continue;
            };

            let title = self.titles.resolve(&id, reporter).await;
            let index = match self.policy {
                IndexPolicy::Renumber => videos.len() + 1,
                IndexPolicy::PreserveSource => source_index,
            };

            videos.push(VideoRef {
                id,
                title,
                url: member_url.clone(),
                index,
            });
        }

        reporter.log(format!("Found {} videos in playlist", videos.len()));
        Ok(videos)
    }
}
