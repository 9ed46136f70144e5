//! Two-pass archive writer.
//!
//! The first pass writes the header with zeroed counts and a provisional
//! table whose placement fields are zero. The second pass appends every
//! file's stored bytes, then seeks back to rewrite the table and header
//! with the final values. Record sizes do not depend on placement, so the
//! rewritten table occupies exactly the reserved bytes.

use byteorder::{LittleEndian, WriteBytesExt};
use std::fs;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

use crate::error::{Result, SqzipError};

use super::codec::encode_table;
use super::collector::hash_bytes;
use super::compress::compress_policy;
use super::structures::{Entry, Header, MAGIC};

/// Totals reported after an archive is written.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: usize,
    pub directories: usize,
    pub compressed_files: usize,
    pub original_bytes: u64,
    pub stored_bytes: u64,
    pub archive_len: u64,
}

/// Where one file's stored bytes ended up.
#[derive(Debug, Clone, Copy)]
struct Placement {
    index: usize,
    data_offset: u64,
    stored_size: u64,
    is_compressed: bool,
}

/// Header and provisional table already on disk.
struct Plan {
    entries: Vec<Entry>,
    table_len: usize,
}

/// Writes an archive from offset 0 of `out`.
pub struct ArchiveWriter<W: Write + Seek> {
    out: W,
}

impl<W: Write + Seek> ArchiveWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write `entries` (already path-sorted) whose file contents live
    /// under `root`.
    pub fn write_tree(&mut self, root: &Path, entries: &[Entry]) -> Result<ArchiveSummary> {
        let plan = self.plan(entries)?;
        let placements = self.write_data(root, &plan.entries)?;
        self.commit(plan, &placements)
    }

    fn plan(&mut self, entries: &[Entry]) -> Result<Plan> {
        let provisional: Vec<Entry> = entries.iter().map(Entry::provisional).collect();
        let table = encode_table(&provisional)?;

        self.out.seek(SeekFrom::Start(0))?;
        self.out.write_all(MAGIC)?;
        self.out.write_i32::<LittleEndian>(0)?;
        self.out.write_i32::<LittleEndian>(0)?;
        self.out.write_all(&table)?;

        Ok(Plan {
            entries: entries.to_vec(),
            table_len: table.len(),
        })
    }

    fn write_data(&mut self, root: &Path, entries: &[Entry]) -> Result<Vec<Placement>> {
        let mut placements = Vec::new();

        for (index, entry) in entries.iter().enumerate() {
            if entry.is_directory {
                continue;
            }

            let raw = fs::read(root.join(&entry.path))?;
            if raw.len() as u64 != entry.original_size || hash_bytes(&raw) != entry.content_hash {
                return Err(SqzipError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("{} changed while the archive was being written", entry.path),
                )));
            }

            let stored = compress_policy(&raw)?;
            let data_offset = self.out.stream_position()?;
            self.out.write_all(&stored.bytes)?;

            debug!(
                path = %entry.path,
                original = raw.len(),
                stored = stored.bytes.len(),
                compressed = stored.is_compressed,
                "stored file"
            );

            placements.push(Placement {
                index,
                data_offset,
                stored_size: stored.bytes.len() as u64,
                is_compressed: stored.is_compressed,
            });
        }

        Ok(placements)
    }

    fn commit(&mut self, plan: Plan, placements: &[Placement]) -> Result<ArchiveSummary> {
        let data_end = self.out.stream_position()?;
        let table_start = Header::SIZE as u64;

        let mut entries = plan.entries;
        for p in placements {
            let entry = &mut entries[p.index];
            entry.data_offset = p.data_offset;
            entry.stored_size = p.stored_size;
            entry.is_compressed = p.is_compressed;
        }

        let table = encode_table(&entries)?;
        if table.len() != plan.table_len {
            return Err(SqzipError::Format(format!(
                "final table is {} bytes but {} were reserved",
                table.len(),
                plan.table_len
            )));
        }

        let entry_count = i32::try_from(entries.len()).map_err(|_| SqzipError::TooLarge {
            what: "entry count",
            value: entries.len() as u64,
        })?;
        let region_len = data_end - table_start;
        let region_len = i32::try_from(region_len).map_err(|_| SqzipError::TooLarge {
            what: "table region length",
            value: region_len,
        })?;

        self.out.seek(SeekFrom::Start(table_start))?;
        self.out.write_all(&table)?;

        self.out.seek(SeekFrom::Start(Header::ENTRY_COUNT_OFFSET))?;
        self.out.write_i32::<LittleEndian>(entry_count)?;
        self.out.write_i32::<LittleEndian>(region_len)?;

        self.out.seek(SeekFrom::Start(data_end))?;
        self.out.flush()?;

        let mut summary = ArchiveSummary {
            archive_len: data_end,
            ..Default::default()
        };
        for entry in &entries {
            if entry.is_directory {
                summary.directories += 1;
            } else {
                summary.files += 1;
                summary.original_bytes += entry.original_size;
                summary.stored_bytes += entry.stored_size;
                summary.compressed_files += entry.is_compressed as usize;
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::codec::TableCursor;
    use crate::archive::collector::collect_tree;
    use crate::archive::structures::HASH_SIZE;
    use crate::io::MemoryReader;
    use std::io::Cursor;

    fn write(root: &Path) -> (Vec<u8>, ArchiveSummary) {
        let entries = collect_tree(root).unwrap();
        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        let summary = writer.write_tree(root, &entries).unwrap();
        (writer.into_inner().into_inner(), summary)
    }

    #[test]
    fn patches_header_and_table() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("docs")).unwrap();
        fs::write(dir.path().join("docs/a.txt"), b"0123456789").unwrap();

        let (archive, summary) = write(dir.path());
        assert_eq!(summary.files, 1);
        assert_eq!(summary.directories, 1);
        assert_eq!(summary.archive_len, archive.len() as u64);

        let header = Header::from_bytes(&archive).unwrap();
        assert_eq!(header.entry_count, 2);
        assert_eq!(
            header.table_region_length as usize,
            archive.len() - Header::SIZE
        );

        let len = archive.len() as u64;
        let reader = MemoryReader::new(archive);
        let entries = TableCursor::new(&reader, Header::SIZE as u64, len)
            .decode_table(2)
            .unwrap();

        assert_eq!(entries[0].path, "docs/");
        assert_eq!(entries[0].data_offset, 0);
        assert_eq!(entries[0].content_hash, [0; HASH_SIZE]);

        let file = &entries[1];
        assert_eq!(file.path, "docs/a.txt");
        assert_eq!(file.original_size, 10);
        assert!(!file.is_compressed);
        assert_eq!(file.stored_size, 10);
        assert_eq!(file.data_offset, 16 + 65 + 70);
        assert_eq!(file.content_hash, hash_bytes(b"0123456789"));
    }

    #[test]
    fn empty_tree_has_empty_region() {
        let dir = tempfile::tempdir().unwrap();
        let (archive, summary) = write(dir.path());
        assert_eq!(archive.len(), Header::SIZE);
        assert_eq!(summary, ArchiveSummary { archive_len: 16, ..Default::default() });
        let header = Header::from_bytes(&archive).unwrap();
        assert_eq!(header.entry_count, 0);
        assert_eq!(header.table_region_length, 0);
    }

    #[test]
    fn compressible_file_is_deflated() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("big.txt"), "hello world\n".repeat(500)).unwrap();

        let (_, summary) = write(dir.path());
        assert_eq!(summary.compressed_files, 1);
        assert!(summary.stored_bytes < summary.original_bytes);
    }

    #[test]
    fn changed_source_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), b"before").unwrap();
        let entries = collect_tree(dir.path()).unwrap();
        fs::write(dir.path().join("a.txt"), b"after!").unwrap();

        let mut writer = ArchiveWriter::new(Cursor::new(Vec::new()));
        let err = writer.write_tree(dir.path(), &entries).unwrap_err();
        assert!(matches!(err, SqzipError::Io(_)));
    }
}
