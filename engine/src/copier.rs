//! Tree copy.
//!
//! `CopyEngine::copy_tree` mirrors one source root under a destination root.
//! Each directory's files are visited before its subdirectories, depth-first,
//! names in sorted order. Cancellation is polled before every entry; a file
//! that has started copying is allowed to finish.
//!
//! Per-entry failures are logged and skipped. Only a root that cannot be
//! listed at the source or created at the destination is returned as an
//! error. A directory is listed before its destination is created, so an
//! unreadable one leaves nothing behind.

use std::path::{Path, PathBuf};

use crate::checksums;
use crate::error::EngineError;
use crate::fs_ops::{self, CopyOutcome, Entry, Listing};
use crate::log::{EventLog, LogCategory};
use crate::mapping::PathMapping;
use crate::model::{FileReport, FileState, RunPolicy, SourceRoot, TreeStatus, Verification};

/// Copies source trees according to a fixed [`RunPolicy`].
pub struct CopyEngine<'a> {
    policy: RunPolicy,
    log: EventLog<'a>,
}

impl<'a> CopyEngine<'a> {
    pub fn new(policy: RunPolicy, log: EventLog<'a>) -> Self {
        CopyEngine { policy, log }
    }

    pub fn policy(&self) -> &RunPolicy {
        &self.policy
    }

    /// Mirror `source_root` under `destination_root`.
    ///
    /// `on_file_done` runs exactly once per file visited, whatever happened to
    /// it. `should_cancel` is polled before each entry.
    ///
    /// # Errors
    /// Returns `EngineError` only if the root's destination directory cannot
    /// be created or the root itself cannot be listed.
    pub fn copy_tree(
        &self,
        source_root: &SourceRoot,
        destination_root: &Path,
        on_file_done: &mut dyn FnMut(&FileReport),
        should_cancel: &dyn Fn() -> bool,
    ) -> Result<TreeStatus, EngineError> {
        if should_cancel() {
            return Ok(TreeStatus::Cancelled);
        }

        let listing = fs_ops::list_dir(source_root.path())?;
        let mapping = PathMapping::new(source_root, destination_root);
        let root_relative = mapping.root_relative();
        fs_ops::ensure_dir(&mapping.destination_for(&root_relative))?;

        Ok(self.walk_listing(
            &mapping,
            listing,
            &root_relative,
            on_file_done,
            should_cancel,
        ))
    }

    fn walk_listing(
        &self,
        mapping: &PathMapping,
        listing: Listing,
        relative: &Path,
        on_file_done: &mut dyn FnMut(&FileReport),
        should_cancel: &dyn Fn() -> bool,
    ) -> TreeStatus {
        for file in &listing.files {
            if should_cancel() {
                return TreeStatus::Cancelled;
            }
            let destination = mapping.destination_for(&relative.join(&file.name));
            let report = self.copy_entry(file, destination);
            on_file_done(&report);
        }

        for dir in &listing.dirs {
            if should_cancel() {
                return TreeStatus::Cancelled;
            }
            let dir_relative = relative.join(&dir.name);
            let destination = mapping.destination_for(&dir_relative);

            let sub_listing = match fs_ops::list_dir(&dir.path)
                .and_then(|listing| fs_ops::ensure_dir(&destination).map(|()| listing))
            {
                Ok(sub_listing) => sub_listing,
                Err(e) => {
                    self.report_dir_failure(&dir.path, &e);
                    continue;
                }
            };

            let status = self.walk_listing(
                mapping,
                sub_listing,
                &dir_relative,
                on_file_done,
                should_cancel,
            );
            if status == TreeStatus::Cancelled {
                return TreeStatus::Cancelled;
            }
        }

        TreeStatus::Completed
    }

    fn copy_entry(&self, source: &Entry, destination: PathBuf) -> FileReport {
        let mut report = FileReport::new(source.path.clone(), destination, source.size);
        let (src, dst) = (&report.source_path, &report.destination_path);

        match fs_ops::copy_file(src, dst, self.policy.overwrite) {
            Ok(CopyOutcome::Copied { .. }) => {
                report.state = FileState::Done;
                if self.policy.overwrite && self.policy.verify_hash {
                    report.verification = self.verify_copy(src, dst);
                    if report.verification == Verification::Mismatch {
                        report.error_message = Some(
                            "Checksum verification failed: source and destination differ"
                                .to_string(),
                        );
                    }
                }
            }
            Ok(CopyOutcome::DestinationExists) => {
                report.state = FileState::Skipped;
            }
            Err(e) => {
                self.report_file_failure(src, &e);
                report.state = FileState::Failed;
                report.error_message = Some(e.to_string());
            }
        }

        report
    }

    /// Compare source and destination digests, re-copying once on mismatch.
    ///
    /// Never fails: a persistent mismatch is logged and reported as
    /// `Verification::Mismatch`.
    pub fn verify_copy(&self, source: &Path, destination: &Path) -> Verification {
        let algorithm = self.policy.digest;
        if checksums::content_equals(source, destination, algorithm, &self.log) {
            return Verification::Passed;
        }

        self.log.warn(
            LogCategory::HashCompare,
            format!(
                "hash values of \"{}\" and \"{}\" do not match, copying file again",
                source.display(),
                destination.display()
            ),
        );

        if let Err(e) = fs_ops::copy_file(source, destination, true) {
            self.report_file_failure(source, &e);
            return Verification::Mismatch;
        }

        if checksums::content_equals(source, destination, algorithm, &self.log) {
            Verification::PassedAfterRetry
        } else {
            self.log.emit(
                LogCategory::HashCompare,
                format!(
                    "hash values of \"{}\" and \"{}\" do not match even after re-copying the file",
                    source.display(),
                    destination.display()
                ),
            );
            Verification::Mismatch
        }
    }

    fn report_file_failure(&self, path: &Path, error: &EngineError) {
        let detail = if error.is_access_denied() {
            format!(
                "access to file \"{}\" denied, could not copy this file ({})",
                path.display(),
                error
            )
        } else {
            format!("concerning file \"{}\": {}", path.display(), error)
        };
        self.log.emit(LogCategory::CopyFailed, detail);
    }

    fn report_dir_failure(&self, path: &Path, error: &EngineError) {
        let detail = if error.is_access_denied() {
            format!(
                "access to directory \"{}\" denied, could not copy this directory ({})",
                path.display(),
                error
            )
        } else {
            format!("concerning directory \"{}\": {}", path.display(), error)
        };
        self.log.emit(LogCategory::CopyFailed, detail);
    }
}
