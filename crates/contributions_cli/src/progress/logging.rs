use contributions::progress::ScanProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: ScanProgress) {
        match event {
            ScanProgress::ResolvedUser { login } => {
                tracing::info!(login = %login, "Resolved authenticated user");
            }

            ScanProgress::ListingRepositories { owner } => {
                tracing::info!(owner = %owner, "Listing repositories");
            }

            ScanProgress::RepositoriesListed { owner, count } => {
                tracing::info!(owner = %owner, count, "Listed repositories");
            }

            ScanProgress::ScanStarted { total } => {
                tracing::info!(total, "Fetching contributor stats");
            }

            ScanProgress::StatsPending {
                owner,
                name,
                attempt,
            } => {
                tracing::debug!(repo = %format!("{}/{}", owner, name), attempt, "Stats pending");
            }

            ScanProgress::RepositoryScanned {
                owner,
                name,
                matched,
            } => {
                tracing::debug!(repo = %format!("{}/{}", owner, name), matched, "Scanned");
            }

            ScanProgress::RepositoryFailed { owner, name, error } => {
                tracing::warn!(repo = %format!("{}/{}", owner, name), error = %error, "Failed to scan");
            }

            ScanProgress::ScanComplete {
                scanned,
                matched,
                failed,
            } => {
                tracing::info!(scanned, matched, failed, "Scan complete");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
