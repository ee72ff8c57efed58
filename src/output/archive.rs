use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::TranscriptorError;

/// One file inside an exported archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub filename: String,
    pub content: String,
}

/// Bundle entries into a deflate-compressed zip held in memory
pub fn build_zip(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        writer
            .start_file(entry.filename.as_str(), options)
            .map_err(|e| TranscriptorError::Archive(e.to_string()))?;
        writer
            .write_all(entry.content.as_bytes())
            .map_err(|e| TranscriptorError::Archive(e.to_string()))?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| TranscriptorError::Archive(e.to_string()))?;

    Ok(cursor.into_inner())
}

/// Check that an archive can later be written to `path`.
///
/// Runs before any download so a bad target never costs a fetched playlist.
pub fn check_zip_target(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(TranscriptorError::InvalidOutput("empty archive path".to_string()).into());
    }
    if path.is_dir() {
        return Err(TranscriptorError::InvalidOutput(format!(
            "archive path is a directory: {}",
            path.display()
        ))
        .into());
    }

    // The closest existing ancestor decides whether the parents can be created
    let existing = path
        .ancestors()
        .skip(1)
        .filter(|ancestor| !ancestor.as_os_str().is_empty())
        .find(|ancestor| ancestor.exists());
    if let Some(ancestor) = existing {
        if !ancestor.is_dir() {
            return Err(TranscriptorError::InvalidOutput(format!(
                "{} is not a directory",
                ancestor.display()
            ))
            .into());
        }
    }

    Ok(())
}

/// Write the archive to disk, creating parent directories
pub fn write_zip(path: &Path, entries: &[ArchiveEntry]) -> Result<()> {
    let bytes = build_zip(entries)?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }

    fs_err::write(path, bytes)
        .with_context(|| format!("Failed to write archive {}", path.display()))?;

    tracing::debug!("Wrote {} transcripts to {}", entries.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use zip::ZipArchive;

    fn entry(filename: &str, content: &str) -> ArchiveEntry {
        ArchiveEntry {
            filename: filename.to_string(),
            content: content.to_string(),
        }
    }

    fn read_all(bytes: Vec<u8>) -> Vec<(String, String)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = String::new();
                file.read_to_string(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    #[test]
    fn test_zip_contains_exactly_the_entries() {
        let bytes = build_zip(&[entry("a.txt", "hello"), entry("b.txt", "world")]).unwrap();

        assert_eq!(
            read_all(bytes),
            vec![
                ("a.txt".to_string(), "hello".to_string()),
                ("b.txt".to_string(), "world".to_string()),
            ]
        );
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let bytes = build_zip(&[]).unwrap();
        assert!(read_all(bytes).is_empty());
    }

    #[test]
    fn test_zip_target_checks() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("taken");
        std::fs::write(&file, "x").unwrap();

        assert!(check_zip_target(&tmp.path().join("out.zip")).is_ok());
        assert!(check_zip_target(&tmp.path().join("new").join("dir").join("out.zip")).is_ok());
        assert!(check_zip_target(Path::new("relative.zip")).is_ok());

        let err = check_zip_target(tmp.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TranscriptorError>(),
            Some(TranscriptorError::InvalidOutput(_))
        ));
        assert!(check_zip_target(&file.join("out.zip")).is_err());
        assert!(check_zip_target(&file.join("nested").join("out.zip")).is_err());
    }

    #[test]
    fn test_write_zip_to_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("exports").join("transcripts.zip");

        write_zip(&path, &[entry("01_Intro.txt", "Video ID: abc")]).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(
            read_all(bytes),
            vec![("01_Intro.txt".to_string(), "Video ID: abc".to_string())]
        );
    }
}
