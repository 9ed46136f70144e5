//! Table record encoding and bounds-checked decoding.
//!
//! Record layout (little-endian):
//!
//! ```text
//! u16 path_len | path (UTF-8) | i64 original_size | i64 stored_size |
//! i64 data_offset | u8 is_compressed | u8 is_directory | [u8; 32] hash
//! ```
//!
//! Decoding goes through a [`TableCursor`] that knows where the table
//! region ends; every field is checked against that end before it is read.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io::Write;

use crate::error::{Result, SqzipError};
use crate::io::ReadAt;

use super::structures::{Entry, HASH_SIZE, RECORD_FIXED_SIZE};

/// Append one record to `out`.
pub fn encode_record<W: Write>(out: &mut W, entry: &Entry) -> Result<()> {
    let path = entry.path.as_bytes();
    if path.is_empty() {
        return Err(SqzipError::Format("entry with empty path".into()));
    }
    let path_len = u16::try_from(path.len()).map_err(|_| SqzipError::TooLarge {
        what: "path length",
        value: path.len() as u64,
    })?;

    out.write_u16::<LittleEndian>(path_len)?;
    out.write_all(path)?;
    out.write_i64::<LittleEndian>(signed("original size", entry.original_size)?)?;
    out.write_i64::<LittleEndian>(signed("stored size", entry.stored_size)?)?;
    out.write_i64::<LittleEndian>(signed("data offset", entry.data_offset)?)?;
    out.write_u8(entry.is_compressed as u8)?;
    out.write_u8(entry.is_directory as u8)?;
    out.write_all(&entry.content_hash)?;
    Ok(())
}

/// Encode all records in order into one buffer.
pub fn encode_table(entries: &[Entry]) -> Result<Vec<u8>> {
    let len = entries.iter().map(Entry::record_len).sum();
    let mut buf = Vec::with_capacity(len);
    for entry in entries {
        encode_record(&mut buf, entry)?;
    }
    Ok(buf)
}

fn signed(what: &'static str, value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| SqzipError::TooLarge { what, value })
}

/// Read position inside the table region with a hard end boundary.
pub struct TableCursor<'a, R: ReadAt + ?Sized> {
    reader: &'a R,
    pos: u64,
    end: u64,
}

impl<'a, R: ReadAt + ?Sized> TableCursor<'a, R> {
    /// `end` must not exceed `reader.size()`.
    pub fn new(reader: &'a R, start: u64, end: u64) -> Self {
        Self {
            reader,
            pos: start,
            end,
        }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    fn take(&mut self, len: usize, index: usize, field: &'static str) -> Result<Vec<u8>> {
        let next = self
            .pos
            .checked_add(len as u64)
            .filter(|&next| next <= self.end)
            .ok_or_else(|| SqzipError::Record {
                index,
                field,
                reason: format!(
                    "needs {len} bytes at offset {} but table region ends at {}",
                    self.pos, self.end
                ),
            })?;

        let mut buf = vec![0u8; len];
        self.reader.read_exact_at(self.pos, &mut buf)?;
        self.pos = next;
        Ok(buf)
    }

    fn read_u16(&mut self, index: usize, field: &'static str) -> Result<u16> {
        Ok(LittleEndian::read_u16(&self.take(2, index, field)?))
    }

    fn read_size(&mut self, index: usize, field: &'static str) -> Result<u64> {
        let value = LittleEndian::read_i64(&self.take(8, index, field)?);
        u64::try_from(value).map_err(|_| SqzipError::Record {
            index,
            field,
            reason: format!("is negative ({value})"),
        })
    }

    fn read_flag(&mut self, index: usize, field: &'static str) -> Result<bool> {
        match self.take(1, index, field)?[0] {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(SqzipError::Record {
                index,
                field,
                reason: format!("has invalid value {other}"),
            }),
        }
    }

    /// Decode the record at the current position.
    pub fn decode_record(&mut self, index: usize) -> Result<Entry> {
        let path_len = self.read_u16(index, "path length")?;
        if path_len == 0 {
            return Err(SqzipError::Record {
                index,
                field: "path length",
                reason: "is zero".into(),
            });
        }

        let path = String::from_utf8(self.take(path_len as usize, index, "path")?).map_err(
            |_| SqzipError::Record {
                index,
                field: "path",
                reason: "is not valid UTF-8".into(),
            },
        )?;

        let original_size = self.read_size(index, "original size")?;
        let stored_size = self.read_size(index, "stored size")?;
        let data_offset = self.read_size(index, "data offset")?;
        let is_compressed = self.read_flag(index, "compressed flag")?;
        let is_directory = self.read_flag(index, "directory flag")?;

        let mut content_hash = [0u8; HASH_SIZE];
        content_hash.copy_from_slice(&self.take(HASH_SIZE, index, "content hash")?);

        Ok(Entry {
            path,
            original_size,
            stored_size,
            data_offset,
            is_compressed,
            is_directory,
            content_hash,
        })
    }

    /// Decode `count` consecutive records.
    pub fn decode_table(&mut self, count: usize) -> Result<Vec<Entry>> {
        // The count comes from the header; do not let it size the allocation.
        let fits = (self.end.saturating_sub(self.pos) / RECORD_FIXED_SIZE as u64) as usize;
        let mut entries = Vec::with_capacity(count.min(fits));
        for index in 0..count {
            entries.push(self.decode_record(index)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;

    fn sample() -> Vec<Entry> {
        let mut file = Entry::file("docs/a.txt", 10, [7; HASH_SIZE]);
        file.stored_size = 10;
        file.data_offset = 200;
        vec![Entry::directory("docs/"), file]
    }

    #[test]
    fn record_layout() {
        let entry = &sample()[1];
        let mut buf = Vec::new();
        encode_record(&mut buf, entry).unwrap();

        assert_eq!(buf.len(), entry.record_len());
        assert_eq!(&buf[0..2], &10u16.to_le_bytes());
        assert_eq!(&buf[2..12], b"docs/a.txt");
        assert_eq!(&buf[12..20], &10i64.to_le_bytes());
        assert_eq!(&buf[20..28], &10i64.to_le_bytes());
        assert_eq!(&buf[28..36], &200i64.to_le_bytes());
        assert_eq!(buf[36], 0);
        assert_eq!(buf[37], 0);
        assert_eq!(&buf[38..], &[7; HASH_SIZE]);
    }

    #[test]
    fn decodes_encoded_table() {
        let entries = sample();
        let table = encode_table(&entries).unwrap();
        let len = table.len() as u64;
        let reader = MemoryReader::new(table);

        let mut cursor = TableCursor::new(&reader, 0, len);
        assert_eq!(cursor.decode_table(2).unwrap(), entries);
        assert_eq!(cursor.position(), len);
    }

    #[test]
    fn rejects_empty_path_on_encode() {
        let entry = Entry::file("", 0, [0; HASH_SIZE]);
        assert!(encode_table(&[entry]).unwrap_err().is_format());
    }

    #[test]
    fn rejects_oversized_path_on_encode() {
        let entry = Entry::file("x".repeat(u16::MAX as usize + 1), 0, [0; HASH_SIZE]);
        assert!(matches!(
            encode_table(&[entry]),
            Err(SqzipError::TooLarge { what: "path length", .. })
        ));
    }

    #[test]
    fn zero_path_length_names_record() {
        let mut table = encode_table(&sample()).unwrap();
        let second = sample()[0].record_len();
        table[second] = 0;
        table[second + 1] = 0;
        let len = table.len() as u64;
        let reader = MemoryReader::new(table);

        let err = TableCursor::new(&reader, 0, len).decode_table(2).unwrap_err();
        match err {
            SqzipError::Record { index, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(field, "path length");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn truncated_record_names_field() {
        let table = encode_table(&sample()).unwrap();
        let first = sample()[0].record_len() as u64;
        let reader = MemoryReader::new(table);

        // End the region 10 bytes into the second record's hash.
        let end = first + 2 + 10 + 24 + 2 + 10;
        let err = TableCursor::new(&reader, 0, end).decode_table(2).unwrap_err();
        match err {
            SqzipError::Record { index, field, .. } => {
                assert_eq!(index, 1);
                assert_eq!(field, "content hash");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_negative_size() {
        let mut table = encode_table(&sample()[1..]).unwrap();
        table[20..28].copy_from_slice(&(-1i64).to_le_bytes());
        let len = table.len() as u64;
        let reader = MemoryReader::new(table);

        let err = TableCursor::new(&reader, 0, len).decode_record(0).unwrap_err();
        assert!(matches!(err, SqzipError::Record { field: "stored size", .. }));
    }

    #[test]
    fn rejects_invalid_flag() {
        let mut table = encode_table(&sample()[1..]).unwrap();
        table[36] = 2;
        let len = table.len() as u64;
        let reader = MemoryReader::new(table);

        let err = TableCursor::new(&reader, 0, len).decode_record(0).unwrap_err();
        assert!(matches!(err, SqzipError::Record { field: "compressed flag", .. }));
    }

    #[test]
    fn huge_count_does_not_preallocate() {
        let reader = MemoryReader::new(Vec::new());
        let err = TableCursor::new(&reader, 0, 0)
            .decode_table(i32::MAX as usize)
            .unwrap_err();
        assert!(err.is_format());
    }
}
