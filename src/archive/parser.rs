//! Header and table parsing.
//!
//! ## Parsing Strategy
//!
//! 1. Check the archive length and the 8-byte signature
//! 2. Read the entry count and the table region length, and make sure the
//!    region fits inside the archive
//! 3. Decode every record through a bounded [`TableCursor`]
//! 4. Validate each record's placement against the end of the decoded
//!    table and the archive length
//!
//! The region length in the header spans the table and the data region
//! together, so it only gives a loose bound while decoding. The tight
//! check is step 4: no file's data may start before the table ends.

use crate::error::{Result, SqzipError};
use crate::io::ReadAt;

use super::codec::TableCursor;
use super::structures::{Entry, HASH_SIZE, Header};

/// Low-level archive parser.
///
/// Typically used through [`ArchiveExtractor`](super::ArchiveExtractor)
/// rather than directly.
pub struct ArchiveParser<R: ReadAt> {
    /// The underlying data source
    reader: R,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ArchiveParser<R> {
    pub fn new(reader: R) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read and validate the 16-byte header.
    pub fn read_header(&self) -> Result<Header> {
        if self.size < Header::SIZE as u64 {
            return Err(SqzipError::Format(format!(
                "file too small: {} bytes",
                self.size
            )));
        }

        let mut buf = [0u8; Header::SIZE];
        self.reader.read_exact_at(0, &mut buf)?;
        let header = Header::from_bytes(&buf)?;

        let remaining = self.size - Header::SIZE as u64;
        if header.table_region_length as u64 > remaining {
            return Err(SqzipError::Format(format!(
                "table region length {} exceeds the {} bytes after the header",
                header.table_region_length, remaining
            )));
        }
        // An empty region is only meaningful for an empty archive.
        if header.table_region_length == 0 && header.entry_count > 0 {
            return Err(SqzipError::Format(format!(
                "empty table region for {} entries",
                header.entry_count
            )));
        }

        Ok(header)
    }

    /// Decode and validate every table record.
    pub fn list_files(&self) -> Result<Vec<Entry>> {
        let header = self.read_header()?;
        let start = Header::SIZE as u64;
        let end = start + header.table_region_length as u64;

        let mut cursor = TableCursor::new(&self.reader, start, end);
        let entries = cursor.decode_table(header.entry_count as usize)?;
        let table_end = cursor.position();

        for (index, entry) in entries.iter().enumerate() {
            self.check_entry(index, entry, table_end)?;
        }

        Ok(entries)
    }

    fn check_entry(&self, index: usize, entry: &Entry, table_end: u64) -> Result<()> {
        let invalid = |reason: String| -> Result<()> {
            Err(SqzipError::Format(format!(
                "record {index} ({}): {reason}",
                entry.path
            )))
        };

        if entry.is_directory {
            if entry.original_size != 0
                || entry.stored_size != 0
                || entry.data_offset != 0
                || entry.is_compressed
                || entry.content_hash != [0; HASH_SIZE]
            {
                return invalid("directory carries size, offset or hash".into());
            }
            return Ok(());
        }

        if entry.data_offset < table_end {
            return invalid(format!(
                "data offset {} lies inside the table ending at {table_end}",
                entry.data_offset
            ));
        }
        match entry.data_end() {
            Some(data_end) if data_end <= self.size => {}
            _ => {
                return invalid(format!(
                    "{} stored bytes at offset {} exceed archive length {}",
                    entry.stored_size, entry.data_offset, self.size
                ));
            }
        }

        if entry.is_compressed && entry.stored_size >= entry.original_size {
            return invalid(format!(
                "compressed size {} is not smaller than original size {}",
                entry.stored_size, entry.original_size
            ));
        }
        if !entry.is_compressed && entry.stored_size != entry.original_size {
            return invalid(format!(
                "stored size {} differs from original size {} for raw data",
                entry.stored_size, entry.original_size
            ));
        }

        Ok(())
    }

    /// Read exactly the stored bytes of a file entry.
    pub fn read_stored(&self, entry: &Entry) -> Result<Vec<u8>> {
        match entry.data_end() {
            Some(data_end) if data_end <= self.size => {}
            _ => {
                return Err(SqzipError::Format(format!(
                    "data for {} extends past the end of the archive",
                    entry.path
                )));
            }
        }

        let mut buf = vec![0u8; entry.stored_size as usize];
        self.reader.read_exact_at(entry.data_offset, &mut buf)?;
        Ok(buf)
    }
}
