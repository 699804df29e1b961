//! Progress reporting.
//!
//! `ProgressSink` decouples the engine from whatever presents progress. The
//! engine calls it synchronously from the worker thread; a presentation layer
//! with its own threading model can use [`ChannelSink`] and drain the events
//! wherever it likes.

use crossbeam_channel::Sender;

use crate::log::LogEvent;
use crate::model::{FileReport, RunOutcome};

/// Receives progress, log and completion events from a backup run.
///
/// Every method has an empty default so sinks only implement what they
/// display.
pub trait ProgressSink: Send + Sync {
    /// Called once per file visited (copied, skipped or failed).
    ///
    /// `processed` is the cumulative file count for the whole run.
    fn on_file_done(&self, _report: &FileReport, _processed: u64) {}

    /// Called for every log event.
    fn on_log(&self, _event: &LogEvent) {}

    /// Called exactly once when a run ends, completed or cancelled.
    fn on_finished(&self, _outcome: &RunOutcome) {}
}

/// Sink that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {}

/// Events forwarded by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    FileDone { report: FileReport, processed: u64 },
    Log(LogEvent),
    Finished(RunOutcome),
}

impl SessionEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::Finished(_))
    }
}

/// A ProgressSink implementation that sends events over a channel.
pub struct ChannelSink {
    sender: Sender<SessionEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<SessionEvent>) -> Self {
        ChannelSink { sender }
    }
}

// A disconnected receiver just means nobody is watching; the run carries on.
impl ProgressSink for ChannelSink {
    fn on_file_done(&self, report: &FileReport, processed: u64) {
        let _ = self.sender.send(SessionEvent::FileDone {
            report: report.clone(),
            processed,
        });
    }

    fn on_log(&self, event: &LogEvent) {
        let _ = self.sender.send(SessionEvent::Log(event.clone()));
    }

    fn on_finished(&self, outcome: &RunOutcome) {
        let _ = self.sender.send(SessionEvent::Finished(outcome.clone()));
    }
}
