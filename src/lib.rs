//! # sqzip
//!
//! A single-file archive format for directory trees.
//!
//! An archive holds a path-sorted table of entries followed by the stored
//! bytes of every file. Each file is deflated only when that makes it
//! smaller, and carries the SHA-256 of its original content, which is
//! checked when the file is extracted.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! fn main() -> sqzip::Result<()> {
//!     sqzip::create_archive(Path::new("assets"), Path::new("assets.sqz"))?;
//!
//!     for entry in sqzip::list_archive(Path::new("assets.sqz"))? {
//!         println!("{}", entry.path);
//!     }
//!
//!     sqzip::extract_archive(Path::new("assets.sqz"), Path::new("out"))?;
//!     Ok(())
//! }
//! ```

pub mod archive;
pub mod cli;
pub mod error;
pub mod io;

pub use archive::{
    ArchiveExtractor, ArchiveSummary, ArchiveWriter, Entry, ExtractSummary, create_archive,
    extract_archive, list_archive, verify_archive,
};
pub use cli::Cli;
pub use error::{Result, SqzipError};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
