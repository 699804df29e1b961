//! Error types for the backup engine.
//!
//! `EngineError` covers per-entry and enumeration failures. The copy engine
//! recovers from these locally (log and continue); only a failure on a source
//! root itself is handed back to the session.
//!
//! `SessionError` covers the preconditions that stop a run before any copying
//! starts, and `SourceSetError` the reasons a directory cannot be registered
//! as a source.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while touching the filesystem for a single entry.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to read from a source file
    #[error("Failed to read file {}: {source}", .path.display())]
    ReadError { path: PathBuf, source: io::Error },

    /// Failed to write to a destination file
    #[error("Failed to write file {}: {source}", .path.display())]
    WriteError { path: PathBuf, source: io::Error },

    /// Failed to enumerate a directory
    #[error("Failed to enumerate directory {}: {source}", .path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Failed to create a destination directory
    #[error("Failed to create directory {}: {source}", .path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },
}

impl EngineError {
    /// Path of the entry the error concerns.
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::ReadError { path, .. }
            | Self::WriteError { path, .. }
            | Self::EnumerationFailed { path, .. }
            | Self::DirectoryCreationFailed { path, .. } => path,
        }
    }

    /// Underlying I/O error.
    pub fn io_error(&self) -> &io::Error {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. } => source,
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<u32> {
        self.io_error().raw_os_error().map(|e| e as u32)
    }

    /// True when the OS refused access to the entry.
    pub fn is_access_denied(&self) -> bool {
        self.io_error().kind() == io::ErrorKind::PermissionDenied
    }
}

/// Reasons a backup run refuses to start.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Destination root is missing or not a directory
    #[error("Destination directory does not exist: {}", .path.display())]
    DestinationMissing { path: PathBuf },

    /// Every configured source root vanished (or none were given)
    #[error("No valid source directories to back up ({missing} missing)")]
    NoValidSources { missing: usize },

    /// The background worker panicked before reporting an outcome
    #[error("Backup worker terminated unexpectedly")]
    WorkerPanicked,
}

/// Reasons a directory cannot be added to a [`crate::sources::SourceSet`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceSetError {
    #[error("Given path does not exist: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Given path is not a directory: {}", .path.display())]
    NotADirectory { path: PathBuf },

    #[error("Given path is already in the list: {}", .path.display())]
    Duplicate { path: PathBuf },

    #[error("Limit of paths to copy is reached (max. {limit})")]
    LimitReached { limit: usize },
}
