//! Backup session orchestration.
//!
//! A `BackupSession` owns one run across several source roots: it validates
//! the destination and sources, drives the copy engine over each root in
//! order, keeps the shared file counter and cancellation flag, and reports
//! exactly one terminal outcome.
//!
//! `run` consumes the session, so a finished session cannot be reused.

use crossbeam_channel::{unbounded, Receiver};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use uuid::Uuid;

use crate::copier::CopyEngine;
use crate::error::SessionError;
use crate::log::{EventLog, LogCategory};
use crate::model::{
    format_elapsed, progress_label, FileReport, RunOutcome, RunPolicy, SourceRoot, TreeStatus,
};
use crate::progress::{ChannelSink, ProgressSink, SessionEvent};

/// Everything a session needs, fixed at construction.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Roots in the order they are backed up
    pub sources: Vec<SourceRoot>,
    pub destination: PathBuf,
    pub policy: RunPolicy,
    /// Pre-counted file total, used for the cancellation progress label
    pub expected_files: Option<u64>,
}

impl SessionConfig {
    pub fn new<I, P>(sources: I, destination: impl Into<PathBuf>, policy: RunPolicy) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        SessionConfig {
            sources: sources.into_iter().map(SourceRoot::new).collect(),
            destination: destination.into(),
            policy,
            expected_files: None,
        }
    }

    pub fn with_expected_files(mut self, expected: u64) -> Self {
        self.expected_files = Some(expected);
        self
    }
}

/// Mutable state of a run, shared with observers.
///
/// The counter only grows; readers on other threads may see a slightly stale
/// value.
#[derive(Debug, Default)]
pub struct RunState {
    processed: AtomicU64,
    cancel_requested: AtomicBool,
    started: OnceLock<Instant>,
}

impl RunState {
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Returns true only for the call that actually set the flag.
    fn request_cancel(&self) -> bool {
        !self.cancel_requested.swap(true, Ordering::AcqRel)
    }

    fn increment(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn started(&self) -> Option<Instant> {
        self.started.get().copied()
    }

    fn mark_started(&self) -> Instant {
        *self.started.get_or_init(Instant::now)
    }
}

/// Cloneable handle for cancelling a run and reading its progress from
/// another thread.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<RunState>,
}

impl CancelHandle {
    /// Ask the run to stop at its next entry. Repeated calls are no-ops.
    pub fn request_cancel(&self) {
        if self.state.request_cancel() {
            tracing::info!("cancellation requested");
        }
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.state.is_cancel_requested()
    }

    pub fn processed(&self) -> u64 {
        self.state.processed()
    }
}

/// One backup run.
#[derive(Debug)]
pub struct BackupSession {
    id: Uuid,
    config: SessionConfig,
    state: Arc<RunState>,
}

impl BackupSession {
    pub fn new(config: SessionConfig) -> Self {
        BackupSession {
            id: Uuid::new_v4(),
            config,
            state: Arc::new(RunState::default()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            state: Arc::clone(&self.state),
        }
    }

    pub fn request_cancel(&self) {
        self.cancel_handle().request_cancel();
    }

    pub fn processed(&self) -> u64 {
        self.state.processed()
    }

    /// Run the backup on the calling thread.
    ///
    /// Per-file problems are logged through `sink` and never change the
    /// outcome; `sink.on_finished` is called exactly once on success.
    ///
    /// # Errors
    /// Fails before copying anything if the destination is missing or no
    /// source root exists.
    pub fn run(self, sink: &dyn ProgressSink) -> Result<RunOutcome, SessionError> {
        let _span = tracing::info_span!("backup", session = %self.id).entered();
        let log = EventLog::new(sink);
        let destination = self.config.destination.as_path();

        if !destination.is_dir() {
            log.emit(LogCategory::PathNotFound, destination.display().to_string());
            return Err(SessionError::DestinationMissing {
                path: destination.to_path_buf(),
            });
        }

        let roots = self.valid_roots(&log);
        if roots.is_empty() {
            return Err(SessionError::NoValidSources {
                missing: self.config.sources.len(),
            });
        }

        let started = self.state.mark_started();
        log.emit(LogCategory::DestinationSet, destination.display().to_string());
        log.emit(LogCategory::BackupStarted, "");
        tracing::info!(
            roots = roots.len(),
            destination = %destination.display(),
            overwrite = self.config.policy.overwrite,
            verify_hash = self.config.policy.verify_hash,
            "starting backup"
        );

        let status = self.copy_roots(&roots, destination, sink, log);

        let elapsed = started.elapsed();
        let processed = self.state.processed();
        let outcome = match status {
            TreeStatus::Completed => {
                log.emit(LogCategory::BackupDone, format_elapsed(elapsed.as_secs()));
                RunOutcome::Completed { elapsed, processed }
            }
            TreeStatus::Cancelled => {
                log.emit(LogCategory::Cancelled, "");
                RunOutcome::Cancelled {
                    elapsed,
                    processed,
                    progress_label: progress_label(processed, self.config.expected_files),
                }
            }
        };

        sink.on_finished(&outcome);
        Ok(outcome)
    }

    /// Run the backup on a dedicated worker thread.
    ///
    /// Events stream through the returned handle; the stream ends after the
    /// terminal event (or with no terminal event if the run fails to start).
    pub fn spawn(self) -> SessionHandle {
        let (sender, events) = unbounded();
        let cancel = self.cancel_handle();
        let worker = thread::spawn(move || {
            let sink = ChannelSink::new(sender);
            self.run(&sink)
        });

        SessionHandle {
            events,
            cancel,
            worker,
        }
    }

    fn valid_roots(&self, log: &EventLog<'_>) -> Vec<&SourceRoot> {
        self.config
            .sources
            .iter()
            .filter(|root| {
                if root.exists() {
                    true
                } else {
                    log.emit(LogCategory::PathNotFound, root.path().display().to_string());
                    false
                }
            })
            .collect()
    }

    fn copy_roots(
        &self,
        roots: &[&SourceRoot],
        destination: &Path,
        sink: &dyn ProgressSink,
        log: EventLog<'_>,
    ) -> TreeStatus {
        let engine = CopyEngine::new(self.config.policy, log);
        let state = &self.state;
        let mut on_file_done = |report: &FileReport| {
            let processed = state.increment();
            sink.on_file_done(report, processed);
        };
        let should_cancel = || state.is_cancel_requested();

        for root in roots {
            match engine.copy_tree(root, destination, &mut on_file_done, &should_cancel) {
                Ok(TreeStatus::Completed) => {}
                Ok(TreeStatus::Cancelled) => return TreeStatus::Cancelled,
                Err(e) => {
                    log.emit(
                        LogCategory::CopyFailed,
                        format!("source root \"{}\" skipped: {}", root.path().display(), e),
                    );
                }
            }
        }

        TreeStatus::Completed
    }
}

/// A session running on its own thread.
pub struct SessionHandle {
    events: Receiver<SessionEvent>,
    cancel: CancelHandle,
    worker: JoinHandle<Result<RunOutcome, SessionError>>,
}

impl SessionHandle {
    pub fn events(&self) -> &Receiver<SessionEvent> {
        &self.events
    }

    /// Blocking iterator over events; ends when the worker is done.
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, SessionEvent> {
        self.events.iter()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn request_cancel(&self) {
        self.cancel.request_cancel();
    }

    pub fn processed(&self) -> u64 {
        self.cancel.processed()
    }

    /// Wait for the worker and return its result.
    pub fn join(self) -> Result<RunOutcome, SessionError> {
        self.worker
            .join()
            .map_err(|_| SessionError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogEvent;
    use std::fs;
    use std::sync::Mutex;

    // Test helper: records every callback in order
    #[derive(Default)]
    struct TestSink {
        calls: Mutex<Vec<String>>,
        logs: Mutex<Vec<LogEvent>>,
    }

    impl TestSink {
        fn get_calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn categories(&self) -> Vec<LogCategory> {
            self.logs.lock().unwrap().iter().map(|e| e.category).collect()
        }
    }

    impl ProgressSink for TestSink {
        fn on_file_done(&self, report: &FileReport, processed: u64) {
            let name = report.source_path.file_name().unwrap().to_string_lossy().to_string();
            self.calls
                .lock()
                .unwrap()
                .push(format!("file_done({}, {})", name, processed));
        }

        fn on_log(&self, event: &LogEvent) {
            self.logs.lock().unwrap().push(event.clone());
        }

        fn on_finished(&self, outcome: &RunOutcome) {
            let kind = if outcome.is_cancelled() { "cancelled" } else { "completed" };
            self.calls.lock().unwrap().push(format!("finished({})", kind));
        }
    }

    fn make_root(parent: &Path, name: &str, files: &[&str]) -> PathBuf {
        let root = parent.join(name);
        fs::create_dir_all(&root).expect("Failed to create root");
        for file in files {
            let path = root.join(file);
            fs::create_dir_all(path.parent().unwrap()).expect("Failed to create parent");
            fs::write(&path, file.as_bytes()).expect("Failed to write file");
        }
        root
    }

    #[test]
    fn test_run_copies_all_roots_in_order() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let first = make_root(temp_dir.path(), "first", &["a.txt", "sub/b.txt"]);
        let second = make_root(temp_dir.path(), "second", &["c.txt"]);
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&dst).expect("Failed to create dst");

        let session = BackupSession::new(SessionConfig::new(
            [&first, &second],
            &dst,
            RunPolicy::default(),
        ));
        let sink = TestSink::default();
        let outcome = session.run(&sink).expect("Run should start");

        assert!(!outcome.is_cancelled());
        assert_eq!(outcome.processed(), 3);
        assert_eq!(
            sink.get_calls(),
            vec![
                "file_done(a.txt, 1)",
                "file_done(b.txt, 2)",
                "file_done(c.txt, 3)",
                "finished(completed)",
            ]
        );
        assert!(dst.join("first/sub/b.txt").exists());
        assert!(dst.join("second/c.txt").exists());
        assert_eq!(
            sink.categories(),
            vec![
                LogCategory::DestinationSet,
                LogCategory::BackupStarted,
                LogCategory::BackupDone
            ]
        );
    }

    #[test]
    fn test_missing_destination_fails_fast() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = make_root(temp_dir.path(), "src", &["a.txt"]);
        let dst = temp_dir.path().join("no-such-dst");

        let session = BackupSession::new(SessionConfig::new([&src], &dst, RunPolicy::default()));
        let sink = TestSink::default();
        let result = session.run(&sink);

        assert!(matches!(result, Err(SessionError::DestinationMissing { .. })));
        assert!(sink.get_calls().is_empty());
        assert!(!dst.exists(), "destination root must never be created");
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = make_root(temp_dir.path(), "src", &["a.txt"]);
        let gone = temp_dir.path().join("gone");
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&dst).expect("Failed to create dst");

        let session = BackupSession::new(SessionConfig::new(
            [&gone, &src],
            &dst,
            RunPolicy::default(),
        ));
        let sink = TestSink::default();
        let outcome = session.run(&sink).expect("Run should start");

        assert_eq!(outcome.processed(), 1);
        assert_eq!(sink.categories()[0], LogCategory::PathNotFound);
    }

    #[test]
    fn test_no_valid_sources_fails_fast() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&dst).expect("Failed to create dst");

        let session = BackupSession::new(SessionConfig::new(
            [temp_dir.path().join("x"), temp_dir.path().join("y")],
            &dst,
            RunPolicy::default(),
        ));
        let result = session.run(&TestSink::default());

        assert!(matches!(result, Err(SessionError::NoValidSources { missing: 2 })));
        assert_eq!(fs::read_dir(&dst).unwrap().count(), 0);
    }

    #[test]
    fn test_cancel_before_run() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = make_root(temp_dir.path(), "src", &["a.txt", "b.txt"]);
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&dst).expect("Failed to create dst");

        let session = BackupSession::new(
            SessionConfig::new([&src], &dst, RunPolicy::default()).with_expected_files(2),
        );
        session.request_cancel();
        session.request_cancel();
        let sink = TestSink::default();
        let outcome = session.run(&sink).expect("Run should start");

        assert!(outcome.is_cancelled());
        assert_eq!(outcome.processed(), 0);
        assert_eq!(sink.get_calls(), vec!["finished(cancelled)"]);
        assert_eq!(outcome.summary(), "Backup cancelled at 0%");
        assert!(sink.categories().contains(&LogCategory::Cancelled));
    }

    // Cancels from inside the progress callback after N files.
    struct CancelAfter {
        limit: u64,
        cancel: CancelHandle,
    }

    impl ProgressSink for CancelAfter {
        fn on_file_done(&self, _report: &FileReport, processed: u64) {
            if processed >= self.limit {
                self.cancel.request_cancel();
            }
        }
    }

    #[test]
    fn test_cancel_mid_run_stops_remaining_roots() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let first = make_root(temp_dir.path(), "first", &["a.txt", "b.txt", "c.txt"]);
        let second = make_root(temp_dir.path(), "second", &["d.txt"]);
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&dst).expect("Failed to create dst");

        let session = BackupSession::new(
            SessionConfig::new([&first, &second], &dst, RunPolicy::default())
                .with_expected_files(4),
        );
        let sink = CancelAfter {
            limit: 2,
            cancel: session.cancel_handle(),
        };
        let outcome = session.run(&sink).expect("Run should start");

        assert!(outcome.is_cancelled());
        assert_eq!(outcome.processed(), 2);
        assert_eq!(outcome.summary(), "Backup cancelled at 50%");
        assert!(!dst.join("first/c.txt").exists());
        assert!(!dst.join("second").exists());
    }

    #[test]
    fn test_spawned_session_streams_events() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = make_root(temp_dir.path(), "src", &["a.txt", "b/c.txt"]);
        let dst = temp_dir.path().join("dst");
        fs::create_dir(&dst).expect("Failed to create dst");

        let config = SessionConfig::new([&src], &dst, RunPolicy::default());
        let handle = BackupSession::new(config).spawn();
        let events: Vec<SessionEvent> = handle.iter().collect();
        let outcome = handle.join().expect("Run should start");

        let progress: Vec<u64> = events
            .iter()
            .filter_map(|e| match e {
                SessionEvent::FileDone { processed, .. } => Some(*processed),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![1, 2]);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert!(events.last().unwrap().is_terminal());
        assert_eq!(outcome.processed(), 2);
    }

    #[test]
    fn test_spawned_session_reports_start_failure() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let handle = BackupSession::new(SessionConfig::new(
            [temp_dir.path()],
            temp_dir.path().join("missing"),
            RunPolicy::default(),
        ))
        .spawn();

        let events: Vec<SessionEvent> = handle.iter().collect();
        assert!(events.iter().all(|e| !e.is_terminal()));
        assert!(matches!(handle.join(), Err(SessionError::DestinationMissing { .. })));
    }
}
