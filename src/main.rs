use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use yt_transcripts::cli::{Cli, Commands, ConsoleView};
use yt_transcripts::config::Config;
use yt_transcripts::extractors::youtube::YoutubeClient;
use yt_transcripts::extractors::{LoadedSource, UrlResolver};
use yt_transcripts::orchestrator::{CancelToken, Orchestrator, Reporter, RunReport};
use yt_transcripts::output::{self, DirectorySink, MemorySink, TranscriptSink};
use yt_transcripts::utils::format_duration;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "yt_transcripts=debug"
    } else {
        "yt_transcripts=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // --init creates the file, so it must not be required to exist
    let mut config = match cli.command {
        Commands::Config { init: true, .. } => Config::default(),
        _ => Config::load(cli.config.as_deref())?,
    };

    match cli.command {
        Commands::List { url, index_policy } => {
            if let Some(policy) = index_policy {
                config.download.index_policy = policy;
            }
            let loaded = load_videos(&config, &url, cli.quiet).await?;

            for video in &loaded.videos {
                println!("{:>3}. {}  {}", video.index, video.id, video.title);
            }
            println!("{} video(s)", loaded.videos.len());
        }
        Commands::Download {
            url,
            output,
            zip,
            start,
            delay,
            index_policy,
            languages,
        } => {
            if let Some(delay) = delay {
                config.download.delay_secs = delay;
            }
            if let Some(policy) = index_policy {
                config.download.index_policy = policy;
            }
            if !languages.is_empty() {
                config.download.languages = languages;
            }
            config.validate()?;

            let target = match zip {
                Some(path) => Target::Zip(path),
                None => Target::Directory(output.unwrap_or_else(|| config.download.output_dir.clone())),
            };

            download(config, url, target, start as usize - 1, cli.quiet).await?;
        }
        Commands::Config { show, init } => {
            if init {
                let path = cli.config.clone().map(Ok).unwrap_or_else(Config::user_config_path)?;
                Config::default().save(&path)?;
                println!("Wrote default configuration to {}", path.display());
            } else if show {
                config.display();
            } else {
                println!("Configuration is read from --config, ./config.yaml or:");
                println!("  {}", Config::user_config_path()?.display());
                println!("Run with --show to print it or --init to create it.");
            }
        }
    }

    Ok(())
}

/// Where finished transcripts go
enum Target {
    Directory(PathBuf),
    Zip(PathBuf),
}

fn build_resolver(config: &Config) -> Result<(Arc<YoutubeClient>, UrlResolver)> {
    let client = Arc::new(YoutubeClient::new(&config.http, config.download.languages.clone())?);
    let resolver = UrlResolver::new(
        client.clone(),
        client.title_chain(),
        config.download.index_policy,
    );
    Ok((client, resolver))
}

async fn load_videos(config: &Config, url: &str, quiet: bool) -> Result<LoadedSource> {
    let (_, resolver) = build_resolver(config)?;
    let (reporter, rx) = Reporter::channel();
    let view = tokio::spawn(ConsoleView::new(quiet).drain(rx));

    let loaded = resolver.load(url, &reporter).await;
    drop(reporter);
    view.await.context("Console task failed")?;

    loaded
}

async fn download(config: Config, url: String, target: Target, start: usize, quiet: bool) -> Result<()> {
    match target {
        Target::Directory(dir) => {
            // Invalid output directories are reported before anything is fetched
            let sink = DirectorySink::create(&dir)?;
            let (report, sink) = run_worker(&config, url, start, quiet, sink).await?;
            println!("Transcripts saved in {} ({})", sink.describe(), elapsed(&report));
            finish(&report)
        }
        Target::Zip(path) => {
            output::check_zip_target(&path)?;
            let (report, sink) = run_worker(&config, url, start, quiet, MemorySink::new()).await?;
            output::write_zip(&path, sink.entries())?;
            println!(
                "Saved {} transcripts to {} ({})",
                sink.entries().len(),
                path.display(),
                elapsed(&report)
            );
            finish(&report)
        }
    }
}

/// Load and download on a worker task while the console renders its events
async fn run_worker<S>(config: &Config, url: String, start: usize, quiet: bool, mut sink: S) -> Result<(RunReport, S)>
where
    S: TranscriptSink + 'static,
{
    let (client, resolver) = build_resolver(config)?;
    let cancel = CancelToken::new();
    let (reporter, rx) = Reporter::channel();

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested, stopping after the current video");
            ctrl_c.cancel();
        }
    });

    let delay = config.delay()?;
    let worker = tokio::spawn(async move {
        let loaded = resolver.load(&url, &reporter).await?;
        if loaded.videos.is_empty() {
            anyhow::bail!("No videos found for {}", url);
        }
        if start >= loaded.videos.len() {
            anyhow::bail!(
                "Start position {} is past the last video ({})",
                start + 1,
                loaded.videos.len()
            );
        }

        let mut orchestrator = Orchestrator::new(client, delay, cancel);
        let report = orchestrator
            .run(&loaded.videos, start, &mut sink, &reporter)
            .await;
        Ok::<_, anyhow::Error>((report, sink))
    });

    ConsoleView::new(quiet).drain(rx).await;
    worker.await.context("Download worker panicked")?
}

fn elapsed(report: &RunReport) -> String {
    let millis = (report.finished_at - report.started_at).num_milliseconds();
    format_duration(millis as f64 / 1000.0)
}

fn finish(report: &RunReport) -> Result<()> {
    if report.succeeded == 0 && report.failed > 0 {
        anyhow::bail!("No transcripts could be downloaded");
    }
    Ok(())
}
