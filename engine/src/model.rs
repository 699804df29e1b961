//! Core data model for backup runs.
//!
//! - SourceRoot / RunPolicy: what to back up and how
//! - ScanResult: pre-count totals used to size progress
//! - FileReport, FileState, Verification: per-file outcome
//! - TreeStatus, RunOutcome: terminal states

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksums::ChecksumAlgorithm;

/// Maximum number of source roots in one working set.
pub const MAX_SOURCES: usize = 64;

/// A top-level directory selected for backup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRoot {
    path: PathBuf,
}

impl SourceRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SourceRoot { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path up to and excluding the final segment.
    ///
    /// Destination paths are computed relative to this.
    pub fn parent(&self) -> Option<&Path> {
        self.path.parent()
    }

    /// Final path segment, the directory name recreated under the destination.
    pub fn name(&self) -> Option<&OsStr> {
        self.path.file_name()
    }

    /// True if the root currently exists as a directory.
    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }
}

impl From<PathBuf> for SourceRoot {
    fn from(path: PathBuf) -> Self {
        SourceRoot::new(path)
    }
}

impl From<&Path> for SourceRoot {
    fn from(path: &Path) -> Self {
        SourceRoot::new(path)
    }
}

/// Policy applied to every file in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunPolicy {
    /// Replace files that already exist at the destination
    pub overwrite: bool,
    /// Compare digests after each overwrite copy (re-copy once on mismatch)
    pub verify_hash: bool,
    /// Digest used for verification
    pub digest: ChecksumAlgorithm,
}

impl Default for RunPolicy {
    fn default() -> Self {
        RunPolicy {
            overwrite: true,
            verify_hash: false,
            digest: ChecksumAlgorithm::Sha256,
        }
    }
}

/// File count and byte total for one or more source roots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanResult {
    pub file_count: u64,
    pub total_bytes: u64,
}

impl ScanResult {
    pub fn record_file(&mut self, size: u64) {
        self.file_count += 1;
        self.total_bytes = self.total_bytes.saturating_add(size);
    }

    pub fn add(&mut self, other: ScanResult) {
        self.file_count = self.file_count.saturating_add(other.file_count);
        self.total_bytes = self.total_bytes.saturating_add(other.total_bytes);
    }

    /// Subtract, flooring both fields at zero.
    pub fn subtract(&mut self, other: ScanResult) {
        self.file_count = self.file_count.saturating_sub(other.file_count);
        self.total_bytes = self.total_bytes.saturating_sub(other.total_bytes);
    }
}

/// Final state of a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    /// Copied to the destination
    Done,
    /// Left alone because the destination already had it
    Skipped,
    /// Error occurred; file not copied
    Failed,
}

/// Result of post-copy digest verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// Verification disabled or not applicable
    NotChecked,
    /// Digests matched on the first comparison
    Passed,
    /// First comparison failed, the re-copy matched
    PassedAfterRetry,
    /// Digests still differ after the re-copy
    Mismatch,
}

/// Outcome of one file visited by the copy engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    /// Size seen during enumeration
    pub file_size: u64,
    pub state: FileState,
    pub verification: Verification,
    pub error_message: Option<String>,
}

impl FileReport {
    pub(crate) fn new(source_path: PathBuf, destination_path: PathBuf, file_size: u64) -> Self {
        FileReport {
            source_path,
            destination_path,
            file_size,
            state: FileState::Done,
            verification: Verification::NotChecked,
            error_message: None,
        }
    }
}

/// Terminal status of one tree walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStatus {
    Completed,
    Cancelled,
}

/// Terminal event of a backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed {
        elapsed: Duration,
        processed: u64,
    },
    Cancelled {
        elapsed: Duration,
        processed: u64,
        /// Progress at the moment of cancellation, e.g. "42.5%"
        progress_label: String,
    },
}

impl RunOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            RunOutcome::Completed { elapsed, .. } | RunOutcome::Cancelled { elapsed, .. } => {
                *elapsed
            }
        }
    }

    pub fn processed(&self) -> u64 {
        match self {
            RunOutcome::Completed { processed, .. } | RunOutcome::Cancelled { processed, .. } => {
                *processed
            }
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunOutcome::Cancelled { .. })
    }

    /// One-line summary for the user.
    pub fn summary(&self) -> String {
        match self {
            RunOutcome::Completed { elapsed, .. } => {
                format!("Backup done in {}", format_elapsed(elapsed.as_secs()))
            }
            RunOutcome::Cancelled { progress_label, .. } => {
                format!("Backup cancelled at {}", progress_label)
            }
        }
    }
}

/// Format whole seconds as "H hours M minutes S seconds", omitting leading
/// units that are zero.
pub fn format_elapsed(secs: u64) -> String {
    if secs < 60 {
        return format!("{} seconds", secs);
    }
    let seconds = secs % 60;
    let minutes_total = secs / 60;
    if minutes_total < 60 {
        return format!("{} minutes {} seconds", minutes_total, seconds);
    }
    format!(
        "{} hours {} minutes {} seconds",
        minutes_total / 60,
        minutes_total % 60,
        seconds
    )
}

/// Label describing how far a run got, as a percentage of the expected file
/// count when one is known.
pub fn progress_label(processed: u64, expected: Option<u64>) -> String {
    match expected {
        Some(total) if total > 0 => {
            let percent = processed as f64 / total as f64 * 100.0;
            format!("{}%", (percent * 10.0).round() / 10.0)
        }
        _ => format!("{} files", processed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0), "0 seconds");
        assert_eq!(format_elapsed(45), "45 seconds");
        assert_eq!(format_elapsed(60), "1 minutes 0 seconds");
        assert_eq!(format_elapsed(125), "2 minutes 5 seconds");
        assert_eq!(format_elapsed(192), "3 minutes 12 seconds");
        assert_eq!(format_elapsed(3605), "1 hours 0 minutes 5 seconds");
        assert_eq!(format_elapsed(3725), "1 hours 2 minutes 5 seconds");
    }

    #[test]
    fn test_progress_label() {
        assert_eq!(progress_label(1, Some(2)), "50%");
        assert_eq!(progress_label(17, Some(40)), "42.5%");
        assert_eq!(progress_label(1, Some(3)), "33.3%");
        assert_eq!(progress_label(7, None), "7 files");
        assert_eq!(progress_label(0, Some(0)), "0 files");
    }

    #[test]
    fn test_scan_result_subtract_floors_at_zero() {
        let mut totals = ScanResult {
            file_count: 3,
            total_bytes: 100,
        };
        totals.subtract(ScanResult {
            file_count: 5,
            total_bytes: 40,
        });
        assert_eq!(totals.file_count, 0);
        assert_eq!(totals.total_bytes, 60);
    }

    #[test]
    fn test_source_root_parent_and_name() {
        let root = SourceRoot::new("/home/user/docs");
        assert_eq!(root.parent(), Some(Path::new("/home/user")));
        assert_eq!(root.name(), Some(OsStr::new("docs")));
    }

    #[test]
    fn test_default_policy() {
        let policy = RunPolicy::default();
        assert!(policy.overwrite);
        assert!(!policy.verify_hash);
        assert_eq!(policy.digest, ChecksumAlgorithm::Sha256);
    }

    #[test]
    fn test_outcome_summary() {
        let done = RunOutcome::Completed {
            elapsed: Duration::from_secs(125),
            processed: 4,
        };
        assert_eq!(done.summary(), "Backup done in 2 minutes 5 seconds");

        let cancelled = RunOutcome::Cancelled {
            elapsed: Duration::from_secs(1),
            processed: 1,
            progress_label: "50%".to_string(),
        };
        assert!(cancelled.is_cancelled());
        assert_eq!(cancelled.summary(), "Backup cancelled at 50%");
    }
}
