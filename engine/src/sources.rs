//! The working set of source roots.
//!
//! Adding or removing a root kicks off a background recount so the expected
//! file total stays current while the user edits the list.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::counter::{self, ScanDirection, ScanTotals};
use crate::error::SourceSetError;
use crate::log::{EventLog, LogCategory};
use crate::model::{ScanResult, SourceRoot, MAX_SOURCES};
use crate::progress::ProgressSink;

pub struct SourceSet {
    roots: Vec<SourceRoot>,
    limit: usize,
    totals: ScanTotals,
    sink: Arc<dyn ProgressSink>,
    pending: Vec<JoinHandle<ScanResult>>,
}

impl SourceSet {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self::with_limit(sink, MAX_SOURCES)
    }

    pub fn with_limit(sink: Arc<dyn ProgressSink>, limit: usize) -> Self {
        SourceSet {
            roots: Vec::new(),
            limit,
            totals: ScanTotals::new(),
            sink,
            pending: Vec::new(),
        }
    }

    /// Register a directory and start counting it in the background.
    ///
    /// # Errors
    /// Rejects the path if the set is full, the path is missing or not a
    /// directory, or it is already registered. Each rejection is also logged.
    pub fn add(&mut self, path: impl Into<PathBuf>) -> Result<&SourceRoot, SourceSetError> {
        let path = path.into();
        let log = EventLog::new(self.sink.as_ref());

        if self.roots.len() >= self.limit {
            log.emit(LogCategory::SourceLimit, format!("max. {}", self.limit));
            return Err(SourceSetError::LimitReached { limit: self.limit });
        }
        if !path.exists() {
            log.emit(LogCategory::PathNotFound, path.display().to_string());
            return Err(SourceSetError::NotFound { path });
        }
        if !path.is_dir() {
            log.emit(LogCategory::PathNotFound, path.display().to_string());
            return Err(SourceSetError::NotADirectory { path });
        }
        if self.contains(&path) {
            log.emit(LogCategory::DuplicateSource, path.display().to_string());
            return Err(SourceSetError::Duplicate { path });
        }

        self.start_scan(path.clone(), ScanDirection::Add);
        self.roots.push(SourceRoot::new(path));
        Ok(&self.roots[self.roots.len() - 1])
    }

    /// Unregister a directory and subtract its count in the background.
    ///
    /// Returns false if the path was not registered.
    pub fn remove(&mut self, path: &Path) -> bool {
        let Some(index) = self.roots.iter().position(|r| r.path() == path) else {
            return false;
        };
        let root = self.roots.remove(index);
        self.start_scan(root.path().to_path_buf(), ScanDirection::Remove);
        true
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.roots.iter().any(|r| r.path() == path)
    }

    pub fn roots(&self) -> &[SourceRoot] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// True while any recount is still running.
    pub fn is_counting(&self) -> bool {
        self.pending.iter().any(|h| !h.is_finished())
    }

    /// Current totals; may lag behind while scans are running.
    pub fn totals(&self) -> ScanResult {
        self.totals.snapshot()
    }

    /// Block until every outstanding recount has been applied.
    pub fn wait_for_counts(&mut self) -> ScanResult {
        for handle in self.pending.drain(..) {
            if handle.join().is_err() {
                tracing::error!("file count worker panicked; totals may be low");
            }
        }
        self.totals.snapshot()
    }

    fn start_scan(&mut self, path: PathBuf, direction: ScanDirection) {
        self.pending.retain(|h| !h.is_finished());
        self.pending.push(counter::spawn_scan(
            path,
            direction,
            self.totals.clone(),
            Arc::clone(&self.sink),
        ));
    }
}
