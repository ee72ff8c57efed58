use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::orchestrator::{OrchestratorEvent, RunState};

/// Renders worker events on the terminal.
///
/// Log lines go through the progress bar so they do not tear it.
pub struct ConsoleView {
    quiet: bool,
    bar: Option<ProgressBar>,
}

impl ConsoleView {
    pub fn new(quiet: bool) -> Self {
        Self { quiet, bar: None }
    }

    /// Consume events until the worker drops its reporter
    pub async fn drain(mut self, mut rx: UnboundedReceiver<OrchestratorEvent>) {
        while let Some(event) = rx.recv().await {
            self.handle(event);
        }
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn handle(&mut self, event: OrchestratorEvent) {
        match event {
            OrchestratorEvent::Log(line) => self.println(&line),
            OrchestratorEvent::LoadProgress { current, total } => {
                let bar = self.bar_for(total as u64, "Loading");
                if let Some(bar) = bar {
                    bar.set_position(current as u64);
                    bar.set_message(format!("Loading video {}/{}...", current, total));
                }
            }
            OrchestratorEvent::Started { total } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                self.bar_for(total as u64, "Downloading");
            }
            OrchestratorEvent::Outcome(_) => {}
            OrchestratorEvent::Progress { attempted, total, succeeded, failed } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(attempted as u64);
                    bar.set_message(format!("{}/{} ({} ok, {} failed)", attempted, total, succeeded, failed));
                }
            }
            OrchestratorEvent::Finished { state, succeeded, failed } => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_and_clear();
                }
                let line = format!("{} successful, {} failed", succeeded, failed);
                let styled = match state {
                    RunState::Completed if failed == 0 => style(line).green(),
                    RunState::Completed => style(line).yellow(),
                    _ => style(line).red(),
                };
                println!("{}", "=".repeat(60));
                println!("{}: {}", state, styled);
                println!("{}", "=".repeat(60));
            }
        }
    }

    fn bar_for(&mut self, len: u64, prefix: &'static str) -> Option<&ProgressBar> {
        if self.quiet {
            return None;
        }

        if self.bar.is_none() {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );
            bar.set_prefix(prefix);
            self.bar = Some(bar);
        }

        self.bar.as_ref()
    }

    fn println(&self, line: &str) {
        match &self.bar {
            Some(bar) => bar.println(line),
            None => println!("{}", line),
        }
    }
}
