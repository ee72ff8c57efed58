//! yt-transcripts - download transcripts for YouTube videos and playlists
//!
//! The crate resolves a video or playlist URL into [`VideoRef`]s, fetches each
//! transcript one at a time with a courtesy delay, and writes the results as
//! text files or as entries of a single zip archive.

pub mod cli;
pub mod config;
pub mod extractors;
pub mod orchestrator;
pub mod output;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use extractors::{IndexPolicy, PlaylistLister, UrlResolver, VideoRef};
pub use orchestrator::{
    CancelToken, DownloadOutcome, Orchestrator, OrchestratorEvent, Reporter, RunReport, RunState,
};
pub use output::{DirectorySink, MemorySink, TranscriptSink};
pub use transcribe::{classify_failure, FailureKind, Snippet, TranscriptFetcher, TranscriptResult};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the transcript downloader
#[derive(thiserror::Error, Debug)]
pub enum TranscriptorError {
    #[error("Unrecognized YouTube URL: {0}")]
    UnresolvableUrl(String),

    #[error("Could not fetch title for {video_id}: {reason}")]
    MetadataUnavailable { video_id: String, reason: String },

    #[error("Transcript unavailable for {video_id}: {reason}")]
    TranscriptUnavailable { video_id: String, reason: String },

    #[error("IpBlocked: YouTube is blocking requests from your IP ({0})")]
    UpstreamBlocked(String),

    #[error("File operation failed: {0}")]
    Filesystem(String),

    #[error("Archive export failed: {0}")]
    Archive(String),

    #[error("Invalid output target: {0}")]
    InvalidOutput(String),
}
