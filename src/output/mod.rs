use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::extractors::VideoRef;
use crate::transcribe::TranscriptResult;
use crate::utils::{check_output_dir, sanitize_filename};
use crate::TranscriptorError;

pub mod archive;

pub use archive::{build_zip, check_zip_target, write_zip, ArchiveEntry};

const SEPARATOR_WIDTH: usize = 80;

/// Metadata recovered from the header of a rendered transcript
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptHeader {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub language: String,
    pub language_code: String,
}

/// Render a transcript with its metadata header
pub fn render_transcript(video: &VideoRef, transcript: &TranscriptResult) -> String {
    format!(
        "Video ID: {}\nTitle: {}\nURL: {}\nLanguage: {} ({})\n{}\n\n{}",
        video.id,
        video.title,
        video.url,
        transcript.language,
        transcript.language_code,
        "-".repeat(SEPARATOR_WIDTH),
        transcript.full_text()
    )
}

/// `NN_Title.txt`, the index zero-padded to two digits
pub fn transcript_filename(index: usize, title: &str) -> String {
    format!("{:02}_{}.txt", index, sanitize_filename(title))
}

/// Parse the header written by [`render_transcript`]
pub fn parse_header(blob: &str) -> Option<TranscriptHeader> {
    let mut lines = blob.lines();

    let video_id = lines.next()?.strip_prefix("Video ID: ")?.to_string();
    let title = lines.next()?.strip_prefix("Title: ")?.to_string();
    let url = lines.next()?.strip_prefix("URL: ")?.to_string();
    let language_line = lines.next()?.strip_prefix("Language: ")?;

    let (language, code) = language_line.rsplit_once(" (")?;
    let language_code = code.strip_suffix(')')?.to_string();

    let separator = lines.next()?;
    if separator.len() != SEPARATOR_WIDTH || !separator.chars().all(|c| c == '-') {
        return None;
    }

    Some(TranscriptHeader {
        video_id,
        title,
        url,
        language: language.to_string(),
        language_code,
    })
}

/// Destination for rendered transcripts
pub trait TranscriptSink: Send {
    /// Store one transcript; returns the path written, if any
    fn store(&mut self, filename: &str, content: &str) -> Result<Option<PathBuf>>;

    /// Where transcripts end up, for summary lines
    fn describe(&self) -> String;
}

/// Writes each transcript to its own file in a directory
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Create the output directory if needed
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        check_output_dir(&dir)
            .map_err(|e| TranscriptorError::InvalidOutput(e.to_string()))?;

        fs_err::create_dir_all(&dir)
            .map_err(|e| TranscriptorError::InvalidOutput(e.to_string()))?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TranscriptSink for DirectorySink {
    fn store(&mut self, filename: &str, content: &str) -> Result<Option<PathBuf>> {
        let path = self.dir.join(filename);
        fs_err::write(&path, content)
            .map_err(|e| TranscriptorError::Filesystem(e.to_string()))
            .with_context(|| format!("Failed to save {}", filename))?;
        Ok(Some(path))
    }

    fn describe(&self) -> String {
        format!("'{}' folder", self.dir.display())
    }
}

/// Keeps transcripts in memory for a later zip export
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Vec<ArchiveEntry>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ArchiveEntry> {
        self.entries
    }
}

impl TranscriptSink for MemorySink {
    fn store(&mut self, filename: &str, content: &str) -> Result<Option<PathBuf>> {
        self.entries.push(ArchiveEntry {
            filename: filename.to_string(),
            content: content.to_string(),
        });
        Ok(None)
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::Snippet;

    fn video() -> VideoRef {
        VideoRef {
            id: "ABC123".to_string(),
            title: "Intro: Traits & Generics".to_string(),
            url: "https://www.youtube.com/watch?v=ABC123".to_string(),
            index: 3,
        }
    }

    fn transcript() -> TranscriptResult {
        TranscriptResult {
            language: "English (auto-generated)".to_string(),
            language_code: "en".to_string(),
            snippets: vec![
                Snippet { text: "first line".to_string(), start: 0.0, duration: 1.0 },
                Snippet { text: "second line".to_string(), start: 1.0, duration: 2.0 },
            ],
        }
    }

    #[test]
    fn test_render_layout() {
        let blob = render_transcript(&video(), &transcript());
        let expected = format!(
            "Video ID: ABC123\n\
             Title: Intro: Traits & Generics\n\
             URL: https://www.youtube.com/watch?v=ABC123\n\
             Language: English (auto-generated) (en)\n\
             {}\n\
             \n\
             first line second line",
            "-".repeat(80)
        );
        assert_eq!(blob, expected);
    }

    #[test]
    fn test_header_round_trip() {
        let blob = render_transcript(&video(), &transcript());
        let header = parse_header(&blob).unwrap();

        assert_eq!(
            header,
            TranscriptHeader {
                video_id: "ABC123".to_string(),
                title: "Intro: Traits & Generics".to_string(),
                url: "https://www.youtube.com/watch?v=ABC123".to_string(),
                language: "English (auto-generated)".to_string(),
                language_code: "en".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_header_rejects_other_text() {
        assert!(parse_header("just some text").is_none());
        assert!(parse_header("Video ID: a\nTitle: b\nURL: c\nLanguage: English\n----").is_none());
    }

    #[test]
    fn test_transcript_filename() {
        assert_eq!(transcript_filename(1, "Intro: Traits?"), "01_Intro Traits.txt");
        assert_eq!(transcript_filename(12, "a/b\\c"), "12_abc.txt");
        assert_eq!(transcript_filename(123, "Long"), "123_Long.txt");
    }

    #[test]
    fn test_directory_sink_creates_dir_and_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("out").join("nested");

        let mut sink = DirectorySink::create(&dir).unwrap();
        let path = sink.store("01_a.txt", "hello").unwrap().unwrap();

        assert_eq!(path, dir.join("01_a.txt"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello");
    }

    #[test]
    fn test_directory_sink_rejects_file_path() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("taken");
        std::fs::write(&file, "x").unwrap();

        let err = DirectorySink::create(&file).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::InvalidOutput(_))
        ));
    }

    #[test]
    fn test_memory_sink_keeps_order() {
        let mut sink = MemorySink::new();
        assert!(sink.store("01_a.txt", "one").unwrap().is_none());
        sink.store("02_b.txt", "two").unwrap();

        let names: Vec<_> = sink.entries().iter().map(|e| e.filename.as_str()).collect();
        assert_eq!(names, vec!["01_a.txt", "02_b.txt"]);
    }
}
