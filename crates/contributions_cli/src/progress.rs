//! Progress reporting for scans.
//!
//! Two modes:
//! - Interactive mode (stderr is a terminal): a single indicatif bar that
//!   advances once per scanned repository
//! - Logging mode (pipes, CI, or `--no-progress`): structured tracing events

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use contributions::progress::{ProgressCallback, ScanProgress};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    /// Progress bar on stderr.
    Interactive(InteractiveReporter),
    /// Structured logging.
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Pick a mode: the bar only when enabled and stderr is a terminal.
    pub fn new(enabled: bool) -> Self {
        if enabled && Term::stderr().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: ScanProgress) {
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

    /// Finish the progress bar (interactive mode only).
    pub fn finish(&self) {
        if let Self::Interactive(r) = self {
            r.finish();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_progress_always_logs() {
        assert!(matches!(
            ProgressReporter::new(false),
            ProgressReporter::Logging(_)
        ));
    }

    #[test]
    fn test_callback_forwards_events_to_the_reporter() {
        let reporter = Arc::new(ProgressReporter::Interactive(InteractiveReporter::hidden()));
        let callback = reporter.as_callback();

        callback(ScanProgress::ScanStarted { total: 2 });
        callback(ScanProgress::RepositoryScanned {
            owner: "acme".into(),
            name: "r1".into(),
            matched: true,
        });

        let ProgressReporter::Interactive(bar) = reporter.as_ref() else {
            panic!("expected interactive reporter");
        };
        assert_eq!(bar.position(), 1);
        reporter.finish();
    }
}
