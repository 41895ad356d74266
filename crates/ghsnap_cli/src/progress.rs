//! Progress reporting for download runs.
//!
//! This module provides two modes of progress reporting:
//! - Interactive mode (TTY): one spinner per traversal using indicatif
//! - Logging mode (non-TTY): structured logging using tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use ghsnap::{DownloadProgress, ProgressCallback};

pub(crate) use interactive::InteractiveReporter;
pub(crate) use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub(crate) enum ProgressReporter {
    /// Spinners for TTY.
    Interactive(InteractiveReporter),
    /// Structured logging for non-TTY (CI, pipes).
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stdout().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    pub fn handle(&self, event: DownloadProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn as_callback(self: &Arc<Self>) -> Arc<ProgressCallback> {
        let reporter = Arc::clone(self);
        Arc::new(Box::new(move |event| {
            reporter.handle(event);
        }))
    }

    /// Print a line without tearing the spinners.
    pub fn println(&self, line: &str) {
        match self {
            Self::Interactive(r) => r.println(line),
            Self::Logging(_) => tracing::info!("{line}"),
        }
    }

    /// Finish any spinner still running (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
