use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

use crate::error::{Result, SqzipError};

/// Format signature at offset 0
pub const MAGIC: &[u8; 8] = b"SQZIPV01";

/// SHA-256 digest length
pub const HASH_SIZE: usize = 32;

/// Record bytes excluding the variable-length path:
/// path length (2) + three 64-bit fields (24) + two flags (2) + hash (32)
pub const RECORD_FIXED_SIZE: usize = 2 + 8 + 8 + 8 + 1 + 1 + HASH_SIZE;

/// Archive header - 16 bytes
///
/// `table_region_length` covers the table *and* the data region, counted
/// from the end of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub entry_count: u32,
    pub table_region_length: u32,
}

impl Header {
    pub const SIZE: usize = 16;
    pub const ENTRY_COUNT_OFFSET: u64 = 8;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(SqzipError::Format(format!(
                "file too small: {} bytes",
                data.len()
            )));
        }

        if &data[0..8] != MAGIC {
            return Err(SqzipError::Format("bad signature".into()));
        }

        let mut cursor = Cursor::new(&data[8..Self::SIZE]);
        let entry_count = cursor.read_i32::<LittleEndian>()?;
        let table_region_length = cursor.read_i32::<LittleEndian>()?;

        if entry_count < 0 {
            return Err(SqzipError::Format(format!(
                "invalid entry count: {entry_count}"
            )));
        }
        if table_region_length < 0 {
            return Err(SqzipError::Format(format!(
                "invalid table region length: {table_region_length}"
            )));
        }

        Ok(Self {
            entry_count: entry_count as u32,
            table_region_length: table_region_length as u32,
        })
    }
}

/// One archive member, file or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Relative, `/`-separated path; directories end with `/`
    pub path: String,
    pub original_size: u64,
    pub stored_size: u64,
    /// Absolute offset of the stored bytes, 0 for directories
    pub data_offset: u64,
    pub is_compressed: bool,
    pub is_directory: bool,
    /// SHA-256 of the uncompressed content, all zero for directories
    pub content_hash: [u8; HASH_SIZE],
}

impl Entry {
    pub fn directory(path: impl Into<String>) -> Self {
        let mut path = path.into();
        if !path.ends_with('/') {
            path.push('/');
        }
        Self {
            path,
            original_size: 0,
            stored_size: 0,
            data_offset: 0,
            is_compressed: false,
            is_directory: true,
            content_hash: [0; HASH_SIZE],
        }
    }

    pub fn file(path: impl Into<String>, original_size: u64, content_hash: [u8; HASH_SIZE]) -> Self {
        Self {
            path: path.into(),
            original_size,
            stored_size: 0,
            data_offset: 0,
            is_compressed: false,
            is_directory: false,
            content_hash,
        }
    }

    /// Copy with placement fields cleared, as written before the data pass
    pub fn provisional(&self) -> Self {
        Self {
            stored_size: 0,
            data_offset: 0,
            is_compressed: false,
            ..self.clone()
        }
    }

    /// Encoded length of this entry's table record
    pub fn record_len(&self) -> usize {
        RECORD_FIXED_SIZE + self.path.len()
    }

    /// End offset of the stored bytes, `None` on overflow
    pub fn data_end(&self) -> Option<u64> {
        self.data_offset.checked_add(self.stored_size)
    }

    /// Lowercase hex of the content hash
    pub fn hash_hex(&self) -> String {
        hex::encode(self.content_hash)
    }
}
