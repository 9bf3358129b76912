//! End-to-end scan: discover repositories, fan out stats fetches, and
//! aggregate the target user's entries.
//!
//! Discovery failures abort the scan and cancel the stats tasks already
//! running before the error is returned. Failures of individual stats tasks
//! are logged and the repository is left out of the report; the scan
//! always runs every scheduled task to completion.

use std::sync::Arc;
use std::time::Duration;

use crate::client::{ClientConfig, GitHubClient, StatsPolicy};
use crate::discovery::{affected_owners, repositories, viewer_login};
use crate::error::{Result, ScanError, short_error_message};
use crate::http::reqwest_transport::ReqwestTransport;
use crate::progress::{ProgressCallback, ScanProgress, emit};
use crate::scheduler::{StatsOutcome, StatsScheduler};
use crate::types::{
    DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_STATS_CONCURRENCY, RepoRef, ReportEntry,
};

/// Default per-request timeout for the production transport.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Inputs for [`list_contributions`].
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub base_url: String,
    /// Bearer token. Required.
    pub token: Option<String>,
    /// Target login; resolved from the token's identity when absent.
    pub username: Option<String>,
    /// Owners to scan instead of the user's organizations.
    pub owners: Vec<String>,
    pub concurrency: usize,
    pub stats_concurrency: usize,
    pub stats: StatsPolicy,
    pub request_timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: None,
            username: None,
            owners: Vec::new(),
            concurrency: DEFAULT_CONCURRENCY,
            stats_concurrency: DEFAULT_STATS_CONCURRENCY,
            stats: StatsPolicy::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ScanOptions {
    /// Check the options before any network activity and return the token.
    pub fn validate(&self) -> Result<&str> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(ScanError::configuration(
                "no GitHub token configured; set GITHUB_TOKEN",
            )),
        }
    }

    /// Client settings derived from these options.
    pub fn client_config(&self, token: &str) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url.clone(),
            token: token.to_string(),
            concurrency: self.concurrency,
            stats_concurrency: self.stats_concurrency,
            stats: self.stats.clone(),
        }
    }
}

/// Result of a scan.
#[derive(Debug, Default)]
pub struct ContributionReport {
    /// Repositories where the user has stats, in completion order. This is
    /// the output document.
    pub entries: Vec<ReportEntry>,
    /// Number of stats tasks that completed (successfully or not).
    pub scanned: usize,
    /// Repositories whose stats could not be fetched, with the reason.
    pub failures: Vec<(RepoRef, String)>,
}

/// Scan every repository reachable for the configured user over HTTPS.
pub async fn list_contributions(
    options: &ScanOptions,
    on_progress: Option<Arc<ProgressCallback>>,
) -> Result<ContributionReport> {
    let token = options.validate()?;
    let transport = ReqwestTransport::with_timeout(options.request_timeout)?;
    let client = GitHubClient::new(Arc::new(transport), options.client_config(token));

    let report = scan(
        &client,
        options.username.as_deref(),
        &options.owners,
        on_progress,
    )
    .await?;

    if let Some(limit) = client.rate_limit() {
        tracing::debug!(
            remaining = limit.remaining,
            limit = limit.limit,
            reset_at = %limit.reset_at,
            "Rate limit after scan"
        );
    }
    Ok(report)
}

/// Scan with an existing client.
///
/// Every owner's repositories are listed sequentially; one stats task is
/// spawned per repository as soon as it is discovered. Repositories
/// reachable through more than one owner are fetched once per owner.
pub async fn scan(
    client: &GitHubClient,
    username: Option<&str>,
    explicit_owners: &[String],
    on_progress: Option<Arc<ProgressCallback>>,
) -> Result<ContributionReport> {
    let progress = on_progress.as_deref();

    let user = match username {
        Some(user) => user.to_string(),
        None => {
            let login = viewer_login(client).await?;
            emit(
                progress,
                ScanProgress::ResolvedUser {
                    login: login.clone(),
                },
            );
            login
        }
    };

    let mut scheduler = StatsScheduler::new(client.clone(), on_progress.clone());

    if let Err(e) = discover(client, &user, explicit_owners, &mut scheduler, progress).await {
        tracing::error!(
            error = %short_error_message(&e),
            pending = scheduler.len(),
            "Discovery failed, cancelling stats tasks"
        );
        scheduler.shutdown().await;
        return Err(e);
    }

    tracing::info!(user = %user, total = scheduler.len(), "Fetching contributor stats");
    emit(
        progress,
        ScanProgress::ScanStarted {
            total: scheduler.len(),
        },
    );

    let report = aggregate(&user, &mut scheduler, progress).await;

    tracing::info!(
        scanned = report.scanned,
        matched = report.entries.len(),
        failed = report.failures.len(),
        "Scan complete"
    );
    emit(
        progress,
        ScanProgress::ScanComplete {
            scanned: report.scanned,
            matched: report.entries.len(),
            failed: report.failures.len(),
        },
    );
    Ok(report)
}

/// List every affected owner's repositories, spawning one stats task per
/// repository as it is discovered.
async fn discover(
    client: &GitHubClient,
    user: &str,
    explicit_owners: &[String],
    scheduler: &mut StatsScheduler,
    progress: Option<&ProgressCallback>,
) -> Result<()> {
    let mut owners = affected_owners(client, user, explicit_owners);
    while let Some(owner) = owners.next().await {
        let owner = owner?;
        emit(
            progress,
            ScanProgress::ListingRepositories {
                owner: owner.clone(),
            },
        );

        let mut repos = repositories(client, &owner);
        let mut count = 0usize;
        while let Some(repo) = repos.next().await {
            scheduler.spawn(&repo?);
            count += 1;
        }
        tracing::debug!(owner = %owner, count, "Listed repositories");
        emit(progress, ScanProgress::RepositoriesListed { owner, count });
    }
    Ok(())
}

/// Drain the scheduler first-completed-first-processed, keeping the
/// target user's entry for each repository.
pub async fn aggregate(
    user: &str,
    scheduler: &mut StatsScheduler,
    on_progress: Option<&ProgressCallback>,
) -> ContributionReport {
    let mut report = ContributionReport::default();

    while let Some(StatsOutcome { repo, result }) = scheduler.join_next().await {
        report.scanned += 1;
        match result {
            Ok(stats) => {
                let entry = stats.into_iter().find(|s| s.is_by(user));
                emit(
                    on_progress,
                    ScanProgress::RepositoryScanned {
                        owner: repo.owner.clone(),
                        name: repo.name.clone(),
                        matched: entry.is_some(),
                    },
                );
                if let Some(stats) = entry {
                    report.entries.push(ReportEntry { repo, stats });
                }
            }
            Err(e) => {
                let error = short_error_message(&e);
                tracing::error!(repo = %repo, error = %error, "Failed to get contributions");
                emit(
                    on_progress,
                    ScanProgress::RepositoryFailed {
                        owner: repo.owner.clone(),
                        name: repo.name.clone(),
                        error: error.clone(),
                    },
                );
                report.failures.push((repo, error));
            }
        }
    }

    report
}
