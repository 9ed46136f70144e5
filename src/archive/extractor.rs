use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::{Result, SqzipError};
use crate::io::ReadAt;

use super::collector::hash_bytes;
use super::compress::inflate;
use super::parser::ArchiveParser;
use super::structures::Entry;

/// Totals reported after extracting or verifying an archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    pub files: usize,
    pub directories: usize,
    pub bytes: u64,
}

/// SQZIP archive extractor
pub struct ArchiveExtractor<R: ReadAt> {
    parser: ArchiveParser<R>,
}

impl<R: ReadAt> ArchiveExtractor<R> {
    pub fn new(reader: R) -> Self {
        Self {
            parser: ArchiveParser::new(reader),
        }
    }

    /// List all entries in the archive
    pub fn list_files(&self) -> Result<Vec<Entry>> {
        self.parser.list_files()
    }

    /// Recover a file's original bytes and check them against its hash
    pub fn extract_to_memory(&self, entry: &Entry) -> Result<Vec<u8>> {
        let stored = self.parser.read_stored(entry)?;

        let data = if entry.is_compressed {
            // One byte past the expected size is enough to detect overlong output.
            inflate(&stored, entry.original_size.saturating_add(1)).map_err(|e| {
                SqzipError::Integrity {
                    path: entry.path.clone(),
                    reason: format!("cannot inflate stored data: {e}"),
                }
            })?
        } else {
            stored
        };

        if data.len() as u64 != entry.original_size {
            return Err(SqzipError::Integrity {
                path: entry.path.clone(),
                reason: format!(
                    "recovered {} bytes, expected {}",
                    data.len(),
                    entry.original_size
                ),
            });
        }

        if hash_bytes(&data) != entry.content_hash {
            return Err(SqzipError::Integrity {
                path: entry.path.clone(),
                reason: "hash mismatch".into(),
            });
        }

        Ok(data)
    }

    /// Extract file to disk, creating parent directories as needed
    pub fn extract_to_file(&self, entry: &Entry, output_path: &Path) -> Result<()> {
        let data = self.extract_to_memory(entry)?;

        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(output_path, &data)?;

        Ok(())
    }

    /// Rebuild the whole tree under `destination`.
    ///
    /// Every path is checked before anything is written. Directories are
    /// created first, then files in table order. The first error stops
    /// extraction and leaves already-written files in place.
    pub fn extract_all(&self, destination: &Path) -> Result<ExtractSummary> {
        let entries = self.list_files()?;
        let targets = entries
            .iter()
            .map(|entry| -> Result<(&Entry, PathBuf)> {
                Ok((entry, destination.join(safe_relative_path(&entry.path)?)))
            })
            .collect::<Result<Vec<_>>>()?;

        fs::create_dir_all(destination)?;
        let mut summary = ExtractSummary::default();

        for (entry, target) in targets.iter().filter(|(e, _)| e.is_directory) {
            debug!(path = %entry.path, "creating directory");
            fs::create_dir_all(target)?;
            summary.directories += 1;
        }

        for (entry, target) in targets.iter().filter(|(e, _)| !e.is_directory) {
            debug!(path = %entry.path, size = entry.original_size, "extracting");
            self.extract_to_file(entry, target)?;
            summary.files += 1;
            summary.bytes += entry.original_size;
        }

        Ok(summary)
    }

    /// Recover and hash-check every file without writing anything.
    pub fn verify_all(&self) -> Result<ExtractSummary> {
        let mut summary = ExtractSummary::default();

        for entry in self.list_files()? {
            safe_relative_path(&entry.path)?;
            if entry.is_directory {
                summary.directories += 1;
                continue;
            }
            self.extract_to_memory(&entry)?;
            debug!(path = %entry.path, "verified");
            summary.files += 1;
            summary.bytes += entry.original_size;
        }

        Ok(summary)
    }
}

/// Convert an archive path into a relative filesystem path that cannot
/// escape the destination directory.
pub fn safe_relative_path(path: &str) -> Result<PathBuf> {
    let unsafe_path = |reason: &str| -> Result<PathBuf> {
        Err(SqzipError::Format(format!("unsafe path {path:?}: {reason}")))
    };

    let trimmed = path.strip_suffix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return unsafe_path("empty");
    }
    if trimmed.starts_with('/') {
        return unsafe_path("absolute");
    }
    if trimmed.contains('\0') {
        return unsafe_path("contains NUL");
    }

    let mut out = PathBuf::new();
    for part in trimmed.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return unsafe_path("empty, '.' or '..' component");
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => out.push(part),
            _ => return unsafe_path("not a plain file name"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::collector::collect_tree;
    use crate::archive::writer::ArchiveWriter;
    use crate::io::MemoryReader;
    use std::io::Cursor;

    fn build(root: &Path) -> Vec<u8> {
        let entries = collect_tree(root).unwrap();
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        writer.write_tree(root, &entries).unwrap();
        writer.into_inner().into_inner()
    }

    #[test]
    fn extracts_to_memory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "abc".repeat(100)).unwrap();

        let extractor = ArchiveExtractor::new(MemoryReader::new(build(dir.path())));
        let entries = extractor.list_files().unwrap();
        assert!(entries[0].is_compressed);
        let data = extractor.extract_to_memory(&entries[0]).unwrap();
        assert_eq!(data, "abc".repeat(100).into_bytes());
    }

    #[test]
    fn verify_counts_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("d")).unwrap();
        fs::write(dir.path().join("d/x"), b"12345").unwrap();

        let extractor = ArchiveExtractor::new(MemoryReader::new(build(dir.path())));
        let summary = extractor.verify_all().unwrap();
        assert_eq!(
            summary,
            ExtractSummary {
                files: 1,
                directories: 1,
                bytes: 5
            }
        );
    }

    #[test]
    fn corrupted_raw_data_fails_integrity() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();

        let mut archive = build(dir.path());
        let last = archive.len() - 1;
        archive[last] ^= 0xFF;

        let extractor = ArchiveExtractor::new(MemoryReader::new(archive));
        let err = extractor.verify_all().unwrap_err();
        match err {
            SqzipError::Integrity { path, .. } => assert_eq!(path, "a.txt"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn accepts_plain_paths() {
        assert_eq!(safe_relative_path("docs/").unwrap(), PathBuf::from("docs"));
        assert_eq!(
            safe_relative_path("docs/a.txt").unwrap(),
            Path::new("docs").join("a.txt")
        );
    }

    #[test]
    fn rejects_escaping_paths() {
        for path in ["../x", "a/../../x", "/etc/passwd", "a//b", "./a", "a\0b", "/"] {
            assert!(
                safe_relative_path(path).unwrap_err().is_format(),
                "{path} should be rejected"
            );
        }
    }

    #[cfg(unix)]
    #[test]
    fn backslash_is_part_of_unix_name() {
        assert_eq!(
            safe_relative_path("a\\b.txt").unwrap(),
            PathBuf::from("a\\b.txt")
        );
        assert_eq!(
            safe_relative_path("..\\x").unwrap(),
            PathBuf::from("..\\x")
        );
    }

    #[cfg(windows)]
    #[test]
    fn backslash_separator_is_rejected_on_windows() {
        for path in ["a\\b.txt", "..\\x", "C:\\x"] {
            assert!(safe_relative_path(path).unwrap_err().is_format(), "{path}");
        }
    }
}
