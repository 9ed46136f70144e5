use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{Result, SqzipError};

use super::structures::{Entry, HASH_SIZE};

/// Walk `root` and return one entry per directory and regular file below
/// it, sorted by path bytes.
///
/// Files are hashed here by streaming them once; their size is the number
/// of bytes hashed. Symlinks and special files are skipped.
pub fn collect_tree(root: &Path) -> Result<Vec<Entry>> {
    collect_tree_excluding(root, None)
}

/// Like [`collect_tree`], but leaves out the file at relative path
/// `exclude`, which is the archive itself when it is written into `root`.
pub fn collect_tree_excluding(root: &Path, exclude: Option<&str>) -> Result<Vec<Entry>> {
    let mut entries = Vec::new();

    for ent in WalkDir::new(root).min_depth(1).follow_links(false) {
        let ent = ent.map_err(walk_error)?;
        let file_type = ent.file_type();
        let rel = normalize_rel_path(root, ent.path())?;

        if file_type.is_file() && exclude == Some(rel.as_str()) {
            debug!(path = %rel, "skipping destination archive");
            continue;
        }

        if file_type.is_dir() {
            entries.push(Entry::directory(rel));
        } else if file_type.is_file() {
            let (original_size, content_hash) = hash_file(ent.path())?;
            debug!(path = %rel, size = original_size, "collected file");
            entries.push(Entry::file(rel, original_size, content_hash));
        } else {
            warn!(path = %ent.path().display(), "skipping non-regular file");
        }
    }

    entries.sort_by(|a, b| a.path.as_bytes().cmp(b.path.as_bytes()));
    Ok(entries)
}

/// SHA-256 and byte length of a file's content.
pub fn hash_file(path: &Path) -> Result<(u64, [u8; HASH_SIZE])> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let size = io::copy(&mut file, &mut hasher)?;
    let mut hash = [0u8; HASH_SIZE];
    hash.copy_from_slice(&hasher.finalize());
    Ok((size, hash))
}

pub fn hash_bytes(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut hash = [0u8; HASH_SIZE];
    hash.copy_from_slice(&Sha256::digest(data));
    hash
}

fn walk_error(e: walkdir::Error) -> SqzipError {
    let msg = e.to_string();
    let io = e
        .into_io_error()
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, msg));
    SqzipError::Io(io)
}

/// Path of `path` relative to `root`, joined with `/`.
pub fn normalize_rel_path(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| SqzipError::Format(format!("{} is outside {}", path.display(), root.display())))?;

    let mut parts = Vec::new();
    for comp in rel.components() {
        let part = comp
            .as_os_str()
            .to_str()
            .ok_or_else(|| SqzipError::NonUtf8Path(path.to_path_buf()))?;
        parts.push(part);
    }

    if parts.is_empty() {
        return Err(SqzipError::Format(format!(
            "empty relative path for {}",
            path.display()
        )));
    }

    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn collects_sorted_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("b/c/z.txt"), b"zz").unwrap();
        fs::write(dir.path().join("a.txt"), b"0123456789").unwrap();
        fs::write(dir.path().join("b.txt"), b"").unwrap();

        let entries = collect_tree(dir.path()).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["a.txt", "b.txt", "b/", "b/c/", "b/c/z.txt"]);

        let a = &entries[0];
        assert!(!a.is_directory);
        assert_eq!(a.original_size, 10);
        assert_eq!(a.content_hash, hash_bytes(b"0123456789"));

        let b = &entries[2];
        assert!(b.is_directory);
        assert_eq!(b.content_hash, [0; HASH_SIZE]);
    }

    #[test]
    fn excluded_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out/self.sqz"), b"old").unwrap();
        fs::write(dir.path().join("keep.txt"), b"keep").unwrap();

        let entries = collect_tree_excluding(dir.path(), Some("out/self.sqz")).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["keep.txt", "out/"]);
    }

    #[test]
    fn empty_root_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect_tree(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn missing_root_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_tree(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, SqzipError::Io(_)));
    }

    #[test]
    fn normalizes_nested_path() {
        let root = Path::new("/src");
        let rel = normalize_rel_path(root, &root.join("a").join("b.txt")).unwrap();
        assert_eq!(rel, "a/b.txt");
    }
}
