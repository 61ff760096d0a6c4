//! Dump file discovery and listing text.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::warn;

/// File name pattern for crash dumps (`.dmp`, `.mdmp`, `.hdmp`, ...).
pub const DUMP_PATTERN: &str = "*.*dmp";

/// Number of dumps listed in the open-dump guidance text.
pub const GUIDANCE_LIMIT: usize = 10;

/// A dump file found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFile {
    /// Path as produced by the glob.
    pub path: PathBuf,
    /// Size in bytes, when it could be read.
    pub size_bytes: Option<u64>,
    /// Last modification time, when it could be read.
    pub modified: Option<DateTime<Local>>,
}

impl DumpFile {
    fn stat(path: PathBuf) -> Self {
        let metadata = fs::metadata(&path).ok();
        Self {
            size_bytes: metadata.as_ref().map(fs::Metadata::len),
            modified: metadata
                .and_then(|meta| meta.modified().ok())
                .map(DateTime::<Local>::from),
            path,
        }
    }

    /// Size in MB rounded to two decimals, or `unknown`.
    #[must_use]
    pub fn size_label(&self) -> String {
        self.size_bytes
            .map_or_else(|| "unknown".to_owned(), format_size_mb)
    }

    /// Modification time as `YYYY-MM-DD HH:MM:SS`, or `unknown`.
    #[must_use]
    pub fn modified_label(&self) -> String {
        self.modified.map_or_else(
            || "unknown".to_owned(),
            |time| time.format("%Y-%m-%d %H:%M:%S").to_string(),
        )
    }
}

/// Find dump files directly inside `dir`, sorted by path.
///
/// A missing or unreadable directory yields an empty list.
#[must_use]
pub fn find_dumps(dir: &Path) -> Vec<DumpFile> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join(DUMP_PATTERN);

    // Windows file names are case-insensitive, so `MEMORY.DMP` must match.
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::new()
    };
    let paths = match glob::glob_with(&pattern.to_string_lossy(), options) {
        Ok(paths) => paths,
        Err(err) => {
            warn!(dir = %dir.display(), %err, "invalid dump search pattern");
            return Vec::new();
        }
    };

    let mut found: Vec<PathBuf> = paths
        .filter_map(|entry| match entry {
            Ok(path) if path.is_file() => Some(path),
            Ok(_) => None,
            Err(err) => {
                warn!(%err, "skipping unreadable dump entry");
                None
            }
        })
        .collect();
    found.sort();
    found.into_iter().map(DumpFile::stat).collect()
}

/// Format a byte count as megabytes rounded to two decimals, always with a
/// fractional part: 1 048 576 bytes is `1.0`, 1 572 864 bytes is `1.5`.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Dump sizes are far below 2^52 bytes.
pub fn format_size_mb(bytes: u64) -> String {
    let megabytes = bytes as f64 / (1024.0 * 1024.0);
    let rounded = (megabytes * 100.0).round_ties_even() / 100.0;
    let mut text = format!("{rounded}");
    if !text.contains('.') {
        text.push_str(".0");
    }
    text
}

/// Text returned by `open_windbg_dump` when no dump path was given.
#[must_use]
pub fn open_guidance(dir: Option<&Path>, dumps: &[DumpFile]) -> String {
    let mut found = String::new();

    if let Some(dir) = dir.filter(|_| !dumps.is_empty()) {
        let _ = write!(
            found,
            "\n\nI found {} crash dump(s) in {}:\n\n",
            dumps.len(),
            dir.display()
        );
        for (index, dump) in dumps.iter().take(GUIDANCE_LIMIT).enumerate() {
            let _ = writeln!(
                found,
                "{}. {} ({} MB)",
                index + 1,
                dump.path.display(),
                dump.size_label()
            );
        }
        if dumps.len() > GUIDANCE_LIMIT {
            let _ = writeln!(
                found,
                "\n... and {} more dump files.",
                dumps.len() - GUIDANCE_LIMIT
            );
        }
        found.push_str("\nYou can analyze one of these dumps by specifying its path.");
    }

    format!(
        "Please provide a path to a crash dump file to analyze.{found}\n\n\
         You can use the 'list_windbg_dumps' tool to discover available crash dumps."
    )
}

/// Text returned by `list_windbg_dumps`.
#[must_use]
pub fn listing(dir: &Path, dumps: &[DumpFile]) -> String {
    if dumps.is_empty() {
        return format!("No crash dump files found in {}", dir.display());
    }

    let mut text = format!("Found {} crash dump(s) in {}:\n\n", dumps.len(), dir.display());
    for (index, dump) in dumps.iter().enumerate() {
        let _ = writeln!(
            text,
            "{}. {} ({} MB, modified: {})",
            index + 1,
            dump.path.display(),
            dump.size_label(),
            dump.modified_label()
        );
    }
    text
}
