//! Pre-copy tree counting.
//!
//! A scan walks a source root and totals its files and bytes. Totals only
//! size the progress bound; copying never depends on them. Scans of
//! different roots can run on their own threads and meet at a single
//! [`ScanTotals`] accumulator.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::fs_ops;
use crate::log::{EventLog, LogCategory};
use crate::model::ScanResult;
use crate::progress::ProgressSink;

/// Count files and bytes under `root`.
///
/// Directories that cannot be listed are reported to `log` and skipped;
/// their siblings are still counted.
pub fn scan(root: &Path, log: &EventLog<'_>) -> ScanResult {
    let mut result = ScanResult::default();
    scan_dir(root, &mut result, log);
    result
}

fn scan_dir(path: &Path, result: &mut ScanResult, log: &EventLog<'_>) {
    let listing = match fs_ops::list_dir(path) {
        Ok(listing) => listing,
        Err(e) if e.is_access_denied() => {
            log.emit(
                LogCategory::CountFailed,
                format!("access to directory \"{}\" denied", path.display()),
            );
            return;
        }
        Err(e) => {
            log.emit(
                LogCategory::CountFailed,
                format!("in directory \"{}\": {}", path.display(), e),
            );
            return;
        }
    };

    for file in &listing.files {
        result.record_file(file.size);
    }
    for dir in &listing.dirs {
        scan_dir(&dir.path, result, log);
    }
}

/// Whether a scan adds to or removes from the running totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanDirection {
    Add,
    Remove,
}

/// Running totals across all registered roots.
///
/// Cloning shares the same accumulator.
#[derive(Debug, Clone, Default)]
pub struct ScanTotals {
    inner: Arc<Mutex<ScanResult>>,
}

impl ScanTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one root's scan and return the new totals.
    ///
    /// Removal floors at zero.
    pub fn apply(&self, direction: ScanDirection, delta: ScanResult) -> ScanResult {
        let mut totals = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        match direction {
            ScanDirection::Add => totals.add(delta),
            ScanDirection::Remove => totals.subtract(delta),
        }
        *totals
    }

    pub fn snapshot(&self) -> ScanResult {
        *self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Scan `root` on a background thread and fold the result into `totals`.
///
/// The handle yields the totals as they stood right after this scan was
/// applied.
pub fn spawn_scan(
    root: PathBuf,
    direction: ScanDirection,
    totals: ScanTotals,
    sink: Arc<dyn ProgressSink>,
) -> JoinHandle<ScanResult> {
    thread::spawn(move || {
        let log = EventLog::new(sink.as_ref());
        let result = scan(&root, &log);
        tracing::debug!(
            root = %root.display(),
            files = result.file_count,
            bytes = result.total_bytes,
            ?direction,
            "scan finished"
        );
        totals.apply(direction, result)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogEvent;
    use crate::progress::NullSink;
    use std::fs;

    #[derive(Default)]
    struct Collect(Mutex<Vec<LogEvent>>);

    impl ProgressSink for Collect {
        fn on_log(&self, event: &LogEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn build_tree(root: &Path) {
        fs::create_dir_all(root.join("sub/deeper")).expect("Failed to create dirs");
        fs::write(root.join("x.txt"), "12345").expect("Failed to write x");
        fs::write(root.join("sub/y.txt"), "123").expect("Failed to write y");
        fs::write(root.join("sub/deeper/z.bin"), vec![0u8; 1000]).expect("Failed to write z");
        fs::create_dir(root.join("empty")).expect("Failed to create empty");
    }

    #[test]
    fn test_scan_counts_files_only() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        build_tree(temp_dir.path());

        let result = scan(temp_dir.path(), &EventLog::new(&NullSink));
        assert_eq!(result.file_count, 3);
        assert_eq!(result.total_bytes, 1008);
    }

    #[test]
    fn test_scan_missing_root_reports_and_returns_zero() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let sink = Collect::default();

        let result = scan(&temp_dir.path().join("gone"), &EventLog::new(&sink));
        assert_eq!(result, ScanResult::default());

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, LogCategory::CountFailed);
        assert!(events[0].detail.contains("gone"));
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_unreadable_subdirectory() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path();
        for (dir, file) in [("a", "one.txt"), ("b", "hidden.txt"), ("c", "three.txt")] {
            fs::create_dir(root.join(dir)).expect("Failed to create subdir");
            fs::write(root.join(dir).join(file), "1234").expect("Failed to write file");
        }

        let locked = root.join("b");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))
            .expect("Failed to lock subdir");
        if fs::read_dir(&locked).is_ok() {
            // Permission bits do not apply (running as root).
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))
                .expect("Failed to unlock subdir");
            return;
        }

        let sink = Collect::default();
        let result = scan(root, &EventLog::new(&sink));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))
            .expect("Failed to unlock subdir");

        assert_eq!(result.file_count, 2);
        assert_eq!(result.total_bytes, 8);
        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].category, LogCategory::CountFailed);
        assert!(events[0].detail.starts_with("access to directory"));
    }

    #[test]
    fn test_totals_add_then_remove() {
        let totals = ScanTotals::new();
        let one = ScanResult {
            file_count: 2,
            total_bytes: 10,
        };
        totals.apply(ScanDirection::Add, one);
        totals.apply(ScanDirection::Add, one);
        assert_eq!(totals.snapshot().file_count, 4);

        totals.apply(ScanDirection::Remove, one);
        totals.apply(ScanDirection::Remove, one);
        totals.apply(ScanDirection::Remove, one);
        assert_eq!(totals.snapshot(), ScanResult::default());
    }

    #[test]
    fn test_parallel_scans_accumulate_without_lost_updates() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut roots = Vec::new();
        for i in 0..4 {
            let root = temp_dir.path().join(format!("root{}", i));
            build_tree(&root);
            roots.push(root);
        }

        let totals = ScanTotals::new();
        let sink: Arc<dyn ProgressSink> = Arc::new(NullSink);
        let handles: Vec<_> = roots
            .into_iter()
            .map(|root| spawn_scan(root, ScanDirection::Add, totals.clone(), sink.clone()))
            .collect();
        for handle in handles {
            handle.join().expect("Scan thread panicked");
        }

        let snapshot = totals.snapshot();
        assert_eq!(snapshot.file_count, 12);
        assert_eq!(snapshot.total_bytes, 4032);
    }
}
