use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{DownloadOutcome, RunState};

/// Messages sent from the worker to the front end
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    /// Human readable log line
    Log(String),

    /// A playlist entry is being resolved
    LoadProgress { current: usize, total: usize },

    /// Downloading begins with this many videos to attempt
    Started { total: usize },

    /// One video was attempted
    Outcome(DownloadOutcome),

    /// Running tally after each attempt
    Progress {
        attempted: usize,
        total: usize,
        succeeded: usize,
        failed: usize,
    },

    /// The run reached a terminal state
    Finished {
        state: RunState,
        succeeded: usize,
        failed: usize,
    },
}

/// Sending half of the event channel.
///
/// Sends never fail: a front end that stopped listening does not stop the
/// worker.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    tx: Option<UnboundedSender<OrchestratorEvent>>,
}

impl Reporter {
    pub fn channel() -> (Self, UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Reporter that drops every event
    pub fn silent() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, event: OrchestratorEvent) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(event);
        }
    }

    pub fn log(&self, line: impl Into<String>) {
        self.send(OrchestratorEvent::Log(line.into()));
    }

    pub fn load_progress(&self, current: usize, total: usize) {
        self.send(OrchestratorEvent::LoadProgress { current, total });
    }
}

/// Cooperative cancellation flag, set by the front end and polled by the worker
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let worker_view = token.clone();
        assert!(!worker_view.is_cancelled());

        token.cancel();
        assert!(worker_view.is_cancelled());
    }

    #[tokio::test]
    async fn test_reporter_survives_closed_receiver() {
        let (reporter, rx) = Reporter::channel();
        drop(rx);
        reporter.log("nobody listens");
        Reporter::silent().load_progress(1, 2);
    }

    #[tokio::test]
    async fn test_reporter_delivers_in_order() {
        let (reporter, mut rx) = Reporter::channel();
        reporter.log("first");
        reporter.load_progress(1, 3);
        drop(reporter);

        assert!(matches!(rx.recv().await, Some(OrchestratorEvent::Log(line)) if line == "first"));
        assert!(matches!(
            rx.recv().await,
            Some(OrchestratorEvent::LoadProgress { current: 1, total: 3 })
        ));
        assert!(rx.recv().await.is_none());
    }
}
