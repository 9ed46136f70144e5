//! SQZIP archive creation, parsing and extraction.
//!
//! ## Architecture
//!
//! - [`structures`]: header constants and the [`Entry`] record
//! - [`codec`]: table record encoding and bounded decoding
//! - [`collector`]: deterministic directory walk with content hashing
//! - [`compress`]: per-file deflate-or-store decision
//! - [`writer`]: two-pass writer with table back-patch
//! - [`parser`]: header/table validation
//! - [`extractor`]: data recovery, integrity checks and tree rebuild
//!
//! ## Format Overview
//!
//! ```text
//! offset 0   8 bytes  magic "SQZIPV01"
//! offset 8   i32      entry count
//! offset 12  i32      region length (table + data, from offset 16)
//! offset 16  table    one record per entry, sorted by path
//! ...        data     stored bytes of each file, in table order
//! ```
//!
//! ## Limitations
//!
//! - Each file is held in memory whole while it is compressed or recovered
//! - The region length field is an i32, so archives are limited to 2 GiB
//! - Writing is not atomic; a failed create leaves a partial file behind
//! - Extraction stops at the first error without removing written files

pub mod codec;
pub mod collector;
pub mod compress;
mod extractor;
mod parser;
mod structures;
mod writer;

pub use extractor::{ArchiveExtractor, ExtractSummary, safe_relative_path};
pub use parser::ArchiveParser;
pub use structures::*;
pub use writer::{ArchiveSummary, ArchiveWriter};

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::io::LocalFileReader;

/// Pack the tree under `source` into a new archive at `destination`.
///
/// When `destination` lies inside `source`, a file already at that path is
/// not archived.
pub fn create_archive(source: &Path, destination: &Path) -> Result<ArchiveSummary> {
    let exclude = destination_in_source(source, destination)?;
    let entries = collector::collect_tree_excluding(source, exclude.as_deref())?;
    let out = BufWriter::new(File::create(destination)?);

    let mut writer = ArchiveWriter::new(out);
    let summary = writer.write_tree(source, &entries)?;

    info!(
        archive = %destination.display(),
        files = summary.files,
        directories = summary.directories,
        bytes = summary.archive_len,
        "created archive"
    );
    Ok(summary)
}

/// Relative path of `destination` inside `source`, if it is there.
fn destination_in_source(source: &Path, destination: &Path) -> Result<Option<String>> {
    let source = fs::canonicalize(source)?;
    let Some(name) = destination.file_name() else {
        return Ok(None);
    };
    let parent = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let destination = fs::canonicalize(parent)?.join(name);

    if destination != source && destination.starts_with(&source) {
        collector::normalize_rel_path(&source, &destination).map(Some)
    } else {
        Ok(None)
    }
}

/// Rebuild the tree stored in `archive` under `destination`.
pub fn extract_archive(archive: &Path, destination: &Path) -> Result<ExtractSummary> {
    let extractor = ArchiveExtractor::new(LocalFileReader::new(archive)?);
    let summary = extractor.extract_all(destination)?;

    info!(
        archive = %archive.display(),
        files = summary.files,
        directories = summary.directories,
        "extracted archive"
    );
    Ok(summary)
}

/// Decode the table of `archive` without touching file data.
pub fn list_archive(archive: &Path) -> Result<Vec<Entry>> {
    ArchiveExtractor::new(LocalFileReader::new(archive)?).list_files()
}

/// Recover and hash-check every file in `archive` without writing anything.
pub fn verify_archive(archive: &Path) -> Result<ExtractSummary> {
    ArchiveExtractor::new(LocalFileReader::new(archive)?).verify_all()
}
