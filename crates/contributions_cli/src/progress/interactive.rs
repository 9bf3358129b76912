use std::time::Duration;

use contributions::progress::ScanProgress;
use indicatif::{ProgressBar, ProgressStyle};

/// Interactive progress reporter using indicatif.
///
/// Starts as a spinner while repositories are discovered, then turns into
/// a bar once the number of stats tasks is known. Every finished task
/// advances the bar by one, including tasks that finish before discovery
/// is over.
pub struct InteractiveReporter {
    bar: ProgressBar,
}

impl InteractiveReporter {
    /// Create a new interactive reporter drawing to stderr.
    pub fn new() -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(Self::spinner_style());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_message("Discovering repositories...");
        Self { bar }
    }

    /// Reporter whose bar never draws.
    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::with_draw_target(None, indicatif::ProgressDrawTarget::hidden()),
        }
    }

    /// Handle a progress event.
    pub fn handle(&self, event: ScanProgress) {
        if event.is_tick() {
            self.bar.inc(1);
        }

        match event {
            ScanProgress::ResolvedUser { login } => {
                self.bar.set_prefix(login);
            }

            ScanProgress::ListingRepositories { owner } => {
                self.bar.set_message(format!("Listing {owner}..."));
            }

            ScanProgress::ScanStarted { total } => {
                self.bar.set_length(total as u64);
                self.bar.set_style(Self::bar_style());
                self.bar.set_message("");
            }

            ScanProgress::StatsPending { owner, name, .. } => {
                self.bar
                    .set_message(format!("waiting for {owner}/{name} stats"));
            }

            ScanProgress::RepositoryScanned {
                owner,
                name,
                matched: true,
            } => {
                self.bar.set_message(format!("{owner}/{name}"));
            }

            ScanProgress::RepositoryFailed { owner, name, error } => {
                self.bar.println(format!("failed: {owner}/{name}: {error}"));
            }

            ScanProgress::ScanComplete {
                scanned,
                matched,
                failed,
            } => {
                self.bar.finish_with_message(format!(
                    "{scanned} scanned, {matched} contributed, {failed} failed"
                ));
            }

            _ => {}
        }
    }

    /// Number of repositories scanned so far.
    #[cfg(test)]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish the bar if the scan ended without completing.
    pub fn finish(&self) {
        if !self.bar.is_finished() {
            self.bar.abandon();
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.cyan} {spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{prefix:.bold.cyan} [{bar:40.cyan/blue}] {pos:>3}/{len:3} {eta} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}
