//! Main entry point for the sqzip CLI application.
//!
//! Creates, lists, tests and extracts SQZIP archives.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;

use sqzip::{Cli, Entry};

/// Application entry point.
///
/// Parses command-line arguments, installs the log subscriber and
/// dispatches to the requested mode.
fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(std::io::stderr)
        .init();

    let archive = Path::new(&cli.archive);

    if let Some(ref source) = cli.create {
        return create(Path::new(source), archive, &cli);
    }

    if cli.list || cli.verbose {
        let entries = sqzip::list_archive(archive)
            .with_context(|| format!("cannot read {}", archive.display()))?;
        list_files(&entries, cli.verbose);
        return Ok(());
    }

    if cli.test {
        let summary = sqzip::verify_archive(archive)
            .with_context(|| format!("test of {} failed", archive.display()))?;
        if !cli.is_very_quiet() {
            println!(
                "No errors detected in {} ({} files, {})",
                archive.display(),
                summary.files,
                format_size(summary.bytes)
            );
        }
        return Ok(());
    }

    let destination = Path::new(cli.extract_dir.as_deref().unwrap_or("."));
    let summary = sqzip::extract_archive(archive, destination)
        .with_context(|| format!("cannot extract {}", archive.display()))?;
    if !cli.is_quiet() {
        println!(
            "  extracted {} files and {} directories ({}) into {}",
            summary.files,
            summary.directories,
            format_size(summary.bytes),
            destination.display()
        );
    }

    Ok(())
}

/// Pack `source` into `archive` and report the totals.
fn create(source: &Path, archive: &Path, cli: &Cli) -> Result<()> {
    let summary = sqzip::create_archive(source, archive)
        .with_context(|| format!("cannot create {}", archive.display()))?;

    if !cli.is_quiet() {
        println!(
            "  packed {} files and {} directories: {} -> {} ({})",
            summary.files,
            summary.directories,
            format_size(summary.original_bytes),
            format_size(summary.archive_len),
            ratio(summary.original_bytes, summary.stored_bytes)
        );
    }
    Ok(())
}

/// List entries in the archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): Just paths, one per line
/// - Verbose format (`-v`): Table with sizes, ratio, storage method and hash prefix
fn list_files(entries: &[Entry], verbose: bool) {
    if !verbose {
        for entry in entries {
            println!("{}", entry.path);
        }
        return;
    }

    println!(
        "{:>10}  {:>10}  {:>5}  {:<7}  {:<16}  Name",
        "Length", "Size", "Cmpr", "Method", "SHA-256"
    );
    println!("{}", "-".repeat(70));

    let mut total_original = 0u64;
    let mut total_stored = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let (method, hash) = if entry.is_directory {
            ("Dir", String::new())
        } else if entry.is_compressed {
            ("Deflate", entry.hash_hex()[..16].to_string())
        } else {
            ("Stored", entry.hash_hex()[..16].to_string())
        };

        println!(
            "{:>10}  {:>10}  {}  {:<7}  {:<16}  {}",
            entry.original_size,
            entry.stored_size,
            ratio(entry.original_size, entry.stored_size),
            method,
            hash,
            entry.path
        );

        if !entry.is_directory {
            total_original += entry.original_size;
            total_stored += entry.stored_size;
            file_count += 1;
        }
    }

    println!("{}", "-".repeat(70));
    println!(
        "{:>10}  {:>10}  {}  {:>25}  {} files",
        total_original,
        total_stored,
        ratio(total_original, total_stored),
        "",
        file_count
    );
}

/// Percentage saved by storage, right-aligned to five columns.
fn ratio(original: u64, stored: u64) -> String {
    if original > 0 {
        format!("{:>4}%", 100 - (stored.min(original) * 100 / original))
    } else {
        "   0%".to_string()
    }
}

/// Format a byte size into a human-readable string.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(format_size(500), "500 bytes");
/// assert_eq!(format_size(1536), "1.50 KB");
/// assert_eq!(format_size(1048576), "1.00 MB");
/// ```
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
