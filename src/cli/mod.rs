use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::extractors::IndexPolicy;

pub mod progress;

pub use progress::ConsoleView;

#[derive(Parser)]
#[command(
    name = "yt-transcripts",
    about = "Download transcripts for YouTube videos and playlists",
    version,
    long_about = "Fetches the transcript of a single YouTube video or of every video in a playlist and saves them as text files or as a single zip archive. Requests are made one at a time with a configurable delay to avoid being blocked."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(long, global = true, value_name = "FILE", env = "YT_TRANSCRIPTS_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a video or playlist URL and list the videos it contains
    List {
        /// YouTube video or playlist URL
        #[arg(value_name = "URL")]
        url: String,

        /// Numbering of playlist entries when some cannot be resolved
        #[arg(long, value_enum)]
        index_policy: Option<IndexPolicy>,
    },

    /// Download transcripts for a video or playlist
    Download {
        /// YouTube video or playlist URL
        #[arg(value_name = "URL")]
        url: String,

        /// Output directory (defaults to the configured directory)
        #[arg(short, long, value_name = "DIR", conflicts_with = "zip")]
        output: Option<PathBuf>,

        /// Bundle all transcripts into this zip file instead of a directory
        #[arg(long, value_name = "FILE")]
        zip: Option<PathBuf>,

        /// 1-based number of the first video to download
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
        start: u32,

        /// Seconds to wait before each transcript request
        #[arg(long, value_name = "SECS", env = "YT_TRANSCRIPTS_DELAY")]
        delay: Option<f64>,

        /// Numbering of playlist entries when some cannot be resolved
        #[arg(long, value_enum)]
        index_policy: Option<IndexPolicy>,

        /// Preferred transcript language, repeatable (e.g. --lang de --lang en)
        #[arg(short, long = "lang", value_name = "CODE")]
        languages: Vec<String>,
    },

    /// Show or initialise the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,

        /// Write the default configuration to the user config directory
        #[arg(long, conflicts_with = "show")]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_download_arguments() {
        let cli = Cli::try_parse_from([
            "yt-transcripts",
            "download",
            "https://youtu.be/abc",
            "--zip",
            "out.zip",
            "--start",
            "3",
            "--delay",
            "1.5",
            "--index-policy",
            "preserve",
            "--lang",
            "de",
            "--lang",
            "en",
        ])
        .unwrap();

        match cli.command {
            Commands::Download { url, output, zip, start, delay, index_policy, languages } => {
                assert_eq!(url, "https://youtu.be/abc");
                assert!(output.is_none());
                assert_eq!(zip, Some(PathBuf::from("out.zip")));
                assert_eq!(start, 3);
                assert_eq!(delay, Some(1.5));
                assert_eq!(index_policy, Some(IndexPolicy::PreserveSource));
                assert_eq!(languages, vec!["de".to_string(), "en".to_string()]);
            }
            _ => panic!("expected download command"),
        }
    }

    #[test]
    fn test_output_and_zip_conflict() {
        let result = Cli::try_parse_from([
            "yt-transcripts",
            "download",
            "https://youtu.be/abc",
            "-o",
            "dir",
            "--zip",
            "out.zip",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_start_must_be_positive() {
        let result = Cli::try_parse_from(["yt-transcripts", "download", "https://youtu.be/abc", "--start", "0"]);
        assert!(result.is_err());
    }
}
