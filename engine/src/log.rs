//! Structured log events.
//!
//! Every event the engine reports carries a severity, a numeric category and
//! free-text detail. Category codes below 10 are errors, 10 and above are
//! informational; the codes are stable so external sinks (log files, UI
//! lists) can filter on them.
//!
//! Events go two ways: to the caller's [`ProgressSink`] and to `tracing`.

use chrono::{DateTime, Local};
use std::fmt;

use crate::progress::ProgressSink;

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Info,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Info => write!(f, "INFO"),
        }
    }
}

/// What a log event is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// A configured path does not exist
    PathNotFound,
    /// A file or directory could not be copied
    CopyFailed,
    /// Digest comparison failed or reported a mismatch
    HashCompare,
    /// A directory could not be counted
    CountFailed,
    /// The run was cancelled
    Cancelled,
    /// A source was already registered
    DuplicateSource,
    /// The source limit was hit
    SourceLimit,
    /// The run finished normally
    BackupDone,
    /// The run started
    BackupStarted,
    /// A destination was selected
    DestinationSet,
}

impl LogCategory {
    pub fn code(self) -> u8 {
        match self {
            LogCategory::PathNotFound => 0,
            LogCategory::CopyFailed => 5,
            LogCategory::HashCompare => 6,
            LogCategory::CountFailed => 7,
            LogCategory::Cancelled => 8,
            LogCategory::DuplicateSource => 11,
            LogCategory::SourceLimit => 12,
            LogCategory::BackupDone => 16,
            LogCategory::BackupStarted => 17,
            LogCategory::DestinationSet => 18,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => LogCategory::PathNotFound,
            5 => LogCategory::CopyFailed,
            6 => LogCategory::HashCompare,
            7 => LogCategory::CountFailed,
            8 => LogCategory::Cancelled,
            11 => LogCategory::DuplicateSource,
            12 => LogCategory::SourceLimit,
            16 => LogCategory::BackupDone,
            17 => LogCategory::BackupStarted,
            18 => LogCategory::DestinationSet,
            _ => return None,
        })
    }

    pub fn severity(self) -> Severity {
        if self.code() < 10 {
            Severity::Error
        } else {
            Severity::Info
        }
    }

    fn headline(self) -> &'static str {
        match self {
            LogCategory::PathNotFound => "Given path does not exist",
            LogCategory::CopyFailed => "Error when copying files",
            LogCategory::HashCompare => "Error while comparing hashes",
            LogCategory::CountFailed => "Error while counting files",
            LogCategory::Cancelled => "Backup canceled",
            LogCategory::DuplicateSource => "Given path is already in list",
            LogCategory::SourceLimit => "Limit of paths to copy is reached",
            LogCategory::BackupDone => "Backup done. Elapsed time",
            LogCategory::BackupStarted => "Backup process started",
            LogCategory::DestinationSet => "Destination directory set to",
        }
    }
}

/// A single structured log event.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEvent {
    pub timestamp: DateTime<Local>,
    pub category: LogCategory,
    pub detail: String,
}

impl LogEvent {
    pub fn new(category: LogCategory, detail: impl Into<String>) -> Self {
        LogEvent {
            timestamp: Local::now(),
            category,
            detail: detail.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.category.severity()
    }

    /// Human-readable message without timestamp.
    pub fn message(&self) -> String {
        if self.detail.is_empty() {
            self.category.headline().to_string()
        } else {
            format!("{}: {}", self.category.headline(), self.detail)
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.message()
        )
    }
}

/// Emits log events to a sink and mirrors them to `tracing`.
#[derive(Clone, Copy)]
pub struct EventLog<'a> {
    sink: &'a dyn ProgressSink,
}

impl<'a> EventLog<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        EventLog { sink }
    }

    /// Emit at the category's own severity.
    pub fn emit(&self, category: LogCategory, detail: impl Into<String>) {
        let event = LogEvent::new(category, detail);
        match event.severity() {
            Severity::Error => {
                tracing::error!(category = category.code(), "{}", event.message())
            }
            Severity::Info => {
                tracing::info!(category = category.code(), "{}", event.message())
            }
        }
        self.sink.on_log(&event);
    }

    /// Emit an error-category event that the run recovers from.
    pub fn warn(&self, category: LogCategory, detail: impl Into<String>) {
        let event = LogEvent::new(category, detail);
        tracing::warn!(category = category.code(), "{}", event.message());
        self.sink.on_log(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<LogEvent>>);

    impl ProgressSink for Collect {
        fn on_log(&self, event: &LogEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_codes_round_trip_and_split_severity() {
        for category in [
            LogCategory::PathNotFound,
            LogCategory::CopyFailed,
            LogCategory::HashCompare,
            LogCategory::CountFailed,
            LogCategory::Cancelled,
        ] {
            assert_eq!(LogCategory::from_code(category.code()), Some(category));
            assert_eq!(category.severity(), Severity::Error);
        }
        for category in [
            LogCategory::DuplicateSource,
            LogCategory::SourceLimit,
            LogCategory::BackupDone,
            LogCategory::BackupStarted,
            LogCategory::DestinationSet,
        ] {
            assert_eq!(LogCategory::from_code(category.code()), Some(category));
            assert_eq!(category.severity(), Severity::Info);
        }
        assert_eq!(LogCategory::from_code(99), None);
    }

    #[test]
    fn test_message_formatting() {
        let event = LogEvent::new(LogCategory::BackupDone, "45 seconds");
        assert_eq!(event.message(), "Backup done. Elapsed time: 45 seconds");

        let event = LogEvent::new(LogCategory::Cancelled, "");
        assert_eq!(event.message(), "Backup canceled");
        assert!(event.to_string().starts_with('['));
    }

    #[test]
    fn test_event_log_delivers_to_sink() {
        let sink = Collect::default();
        let log = EventLog::new(&sink);
        log.emit(LogCategory::BackupStarted, "");
        log.warn(LogCategory::HashCompare, "mismatch");

        let events = sink.0.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].category, LogCategory::BackupStarted);
        assert_eq!(events[1].severity(), Severity::Error);
        assert_eq!(events[1].detail, "mismatch");
    }
}
