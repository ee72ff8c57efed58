use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub mod processor;

/// One timed fragment of a transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    /// Caption text
    pub text: String,

    /// Start time in seconds
    pub start: f64,

    /// Duration in seconds
    pub duration: f64,
}

/// Transcript of one video, snippets in source order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    /// Human readable language name, e.g. "English (auto-generated)"
    pub language: String,

    /// Language code, e.g. "en"
    pub language_code: String,

    pub snippets: Vec<Snippet>,
}

impl TranscriptResult {
    /// Snippet texts joined by single spaces
    pub fn full_text(&self) -> String {
        self.snippets
            .iter()
            .map(|snippet| snippet.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// How the orchestrator reacts to a failed transcript fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Upstream refuses our address; stop the whole batch
    Blocked,
    /// Anything else; skip this video and continue
    Other,
}

/// Classify a transcript failure by its message.
///
/// A message containing `blocked` in any case (this covers `IpBlocked` and
/// `RequestBlocked`) means the upstream service is refusing our address.
/// Every other failure only affects the current video.
pub fn classify_failure(message: &str) -> FailureKind {
    if message.to_lowercase().contains("blocked") {
        FailureKind::Blocked
    } else {
        FailureKind::Other
    }
}

/// Retrieves the transcript of a single video
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptFetcher: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<TranscriptResult>;
}
