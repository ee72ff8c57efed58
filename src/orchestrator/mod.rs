//! Sequential download of a resolved video list.
//!
//! Videos are attempted strictly one at a time with a courtesy delay before
//! every transcript request. The run ends when the list is exhausted, when the
//! front end sets the [`CancelToken`], or when the upstream service reports
//! that it is blocking us.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

mod events;

pub use events::{CancelToken, OrchestratorEvent, Reporter};

use crate::extractors::VideoRef;
use crate::output::{render_transcript, transcript_filename, TranscriptSink};
use crate::transcribe::{classify_failure, FailureKind, TranscriptFetcher};

/// Lifecycle of one orchestrator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Cancelled,
    StoppedOnBlock,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Cancelled | RunState::StoppedOnBlock)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Running => write!(f, "running"),
            RunState::Completed => write!(f, "completed"),
            RunState::Cancelled => write!(f, "cancelled"),
            RunState::StoppedOnBlock => write!(f, "stopped (blocked)"),
        }
    }
}

/// Result of one attempted video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadOutcome {
    pub video: VideoRef,
    pub success: bool,
    pub filename: Option<String>,
    pub content: Option<String>,
    pub error: Option<String>,
}

impl DownloadOutcome {
    fn succeeded(video: &VideoRef, filename: String, content: String) -> Self {
        Self {
            video: video.clone(),
            success: true,
            filename: Some(filename),
            content: Some(content),
            error: None,
        }
    }

    fn failed(video: &VideoRef, error: String) -> Self {
        Self {
            video: video.clone(),
            success: false,
            filename: None,
            content: None,
            error: Some(error),
        }
    }
}

/// Everything a finished run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub state: RunState,
    pub outcomes: Vec<DownloadOutcome>,
    pub succeeded: usize,
    pub failed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives transcript fetches over a video list
pub struct Orchestrator {
    fetcher: Arc<dyn TranscriptFetcher>,
    delay: Duration,
    cancel: CancelToken,
    state: RunState,
}

impl Orchestrator {
    pub fn new(fetcher: Arc<dyn TranscriptFetcher>, delay: Duration, cancel: CancelToken) -> Self {
        Self {
            fetcher,
            delay,
            cancel,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Attempt `videos[start..]` in order, storing successes in `sink`
    pub async fn run(
        &mut self,
        videos: &[VideoRef],
        start: usize,
        sink: &mut dyn TranscriptSink,
        reporter: &Reporter,
    ) -> RunReport {
        self.state = RunState::Running;
        let started_at = Utc::now();
        let total = videos.len();
        let to_attempt = total.saturating_sub(start);

        tracing::info!(
            "Downloading {} of {} videos with a {:?} delay",
            to_attempt,
            total,
            self.delay
        );
        reporter.send(OrchestratorEvent::Started { total: to_attempt });

        let mut outcomes = Vec::with_capacity(to_attempt);
        let mut succeeded = 0;
        let mut failed = 0;

        for (position, video) in videos.iter().enumerate().skip(start) {
            if self.cancel.is_cancelled() {
                self.state = RunState::Cancelled;
                break;
            }

            reporter.log(format!("[{}/{}] Processing: {}", position + 1, total, video.title));

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
                if self.cancel.is_cancelled() {
                    self.state = RunState::Cancelled;
                    break;
                }
            }

            let (outcome, failure) = self.attempt(video, sink).await;

            if outcome.success {
                succeeded += 1;
                if let Some(filename) = &outcome.filename {
                    reporter.log(format!("  ✓ Saved: {}", filename));
                }
            } else {
                failed += 1;
                let error = outcome.error.as_deref().unwrap_or("unknown error");
                tracing::debug!("{} failed: {}", video.id, error);
                reporter.log(format!("  ✗ Error: {}", error));
            }

            outcomes.push(outcome.clone());
            reporter.send(OrchestratorEvent::Outcome(outcome));
            reporter.send(OrchestratorEvent::Progress {
                attempted: outcomes.len(),
                total: to_attempt,
                succeeded,
                failed,
            });

            if failure == Some(FailureKind::Blocked) {
                reporter.log("⚠ YouTube is blocking requests from your IP. Stopping download.");
                reporter.log("Please wait a while before trying again, or use a VPN/proxy.");
                self.state = RunState::StoppedOnBlock;
                break;
            }
        }

        if self.state == RunState::Running {
            self.state = RunState::Completed;
        }
        if self.state == RunState::Cancelled {
            reporter.log("Download cancelled");
        }

        let summary = format!(
            "Download {}: {} successful, {} failed",
            self.state, succeeded, failed
        );
        tracing::debug!("{}", summary);
        reporter.log(summary);
        reporter.send(OrchestratorEvent::Finished {
            state: self.state,
            succeeded,
            failed,
        });

        RunReport {
            state: self.state,
            outcomes,
            succeeded,
            failed,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Fetch, render and store one video; the kind is set for fetch failures only
    async fn attempt(
        &self,
        video: &VideoRef,
        sink: &mut dyn TranscriptSink,
    ) -> (DownloadOutcome, Option<FailureKind>) {
        let transcript = match self.fetcher.fetch(&video.id).await {
            Ok(transcript) => transcript,
            Err(e) => {
                let message = format!("{:#}", e);
                let kind = classify_failure(&message);
                return (DownloadOutcome::failed(video, message), Some(kind));
            }
        };

        let filename = transcript_filename(video.index, &video.title);
        let content = render_transcript(video, &transcript);

        match sink.store(&filename, &content) {
            Ok(_) => (DownloadOutcome::succeeded(video, filename, content), None),
            Err(e) => (DownloadOutcome::failed(video, format!("{:#}", e)), None),
        }
    }
}
