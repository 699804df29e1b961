//! # EZ Backup Engine - Directory Tree Backup Library
//!
//! A headless engine that mirrors one or more source directories into a
//! destination directory. Designed as the foundation for multiple front ends
//! (CLI, GUI, automation).
//!
//! ## Overview
//!
//! - Files first, then subdirectories, depth-first, names sorted
//! - Skip-existing or overwrite policies, with optional digest verification
//! - Per-file error isolation: one failure never stops the run
//! - Cooperative cancellation polled before every entry
//! - Progress and log events via the [`ProgressSink`] trait
//! - Background pre-counting of source trees
//!
//! ## Basic Usage
//!
//! ```no_run
//! use engine::{BackupSession, NullSink, RunPolicy, SessionConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SessionConfig::new(
//!     ["/home/user/docs", "/home/user/photos"],
//!     "/mnt/backup",
//!     RunPolicy::default(),
//! );
//!
//! let outcome = BackupSession::new(config).run(&NullSink)?;
//! println!("{}", outcome.summary());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (SourceRoot, RunPolicy, FileReport, RunOutcome)
//! - **error**: Error types and handling
//! - **fs_ops**: Low-level filesystem operations
//! - **mapping**: Source-to-destination path mapping
//! - **checksums**: File digests and content comparison
//! - **counter**: Pre-copy file counting
//! - **copier**: Recursive copy of one source root
//! - **session**: Multi-root run orchestration and cancellation
//! - **sources**: Editable set of source roots with background recounts
//! - **progress**: Progress sink trait
//! - **log**: Categorized log events

pub mod checksums;
pub mod copier;
pub mod counter;
pub mod error;
pub mod fs_ops;
pub mod log;
pub mod mapping;
pub mod model;
pub mod progress;
pub mod session;
pub mod sources;

// Re-export main types and functions
pub use checksums::{compare_files, content_equals, digest, ChecksumAlgorithm, Digest};
pub use copier::CopyEngine;
pub use counter::{scan, spawn_scan, ScanDirection, ScanTotals};
pub use error::{EngineError, SessionError, SourceSetError};
pub use log::{EventLog, LogCategory, LogEvent, Severity};
pub use mapping::PathMapping;
pub use model::{
    format_elapsed, progress_label, FileReport, FileState, RunOutcome, RunPolicy, ScanResult,
    SourceRoot, TreeStatus, Verification, MAX_SOURCES,
};
pub use progress::{ChannelSink, NullSink, ProgressSink, SessionEvent};
pub use session::{BackupSession, CancelHandle, SessionConfig, SessionHandle};
pub use sources::SourceSet;
