//! Bounded GitHub client.
//!
//! Every HTTP call runs under a process-wide request semaphore. Contributor
//! stats calls additionally run under a second, independent semaphore that
//! is held for the whole poll protocol, so slow stats polls cannot starve
//! the lightweight pagination queries sharing the request ceiling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Semaphore;

use crate::error::{Result, ScanError, short_error_message};
use crate::http::{HttpError, HttpMethod, HttpRequest, HttpResponse, HttpTransport};
use crate::progress::{ProgressCallback, ScanProgress, emit};
use crate::types::{
    ContributorStats, DEFAULT_BASE_URL, DEFAULT_CONCURRENCY, DEFAULT_STATS_CONCURRENCY,
    DEFAULT_STATS_DELAY_SECS, RateLimitInfo,
};

const USER_AGENT: &str = "contributions";

/// Retry policy for the asynchronous stats computation (HTTP 202).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsPolicy {
    /// Fixed delay between polls.
    pub delay: Duration,
    /// Total attempts before giving up; `None` polls until the server answers.
    pub max_attempts: Option<usize>,
}

impl Default for StatsPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(DEFAULT_STATS_DELAY_SECS),
            max_attempts: None,
        }
    }
}

impl StatsPolicy {
    /// Constant-delay backoff: no jitter, no growth.
    #[must_use]
    pub fn into_backoff(self) -> ConstantBuilder {
        let retries = match self.max_attempts {
            Some(attempts) => attempts.saturating_sub(1),
            None => usize::MAX,
        };
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(retries)
    }
}

/// Settings for [`GitHubClient::new`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, e.g. `https://api.github.com` or `https://ghe.example.com/api`.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: String,
    /// Maximum HTTP requests in flight.
    pub concurrency: usize,
    /// Maximum repositories inside the stats poll protocol at once.
    pub stats_concurrency: usize,
    pub stats: StatsPolicy,
}

impl ClientConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: token.into(),
            concurrency: DEFAULT_CONCURRENCY,
            stats_concurrency: DEFAULT_STATS_CONCURRENCY,
            stats: StatsPolicy::default(),
        }
    }
}

/// Outcome of a single stats request.
#[derive(Debug)]
enum StatsAttempt {
    /// 202: the server is still computing; poll again.
    Pending,
    Failed(ScanError),
}

/// Response envelope of the query endpoint.
#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

/// GitHub client with two-tier bounded concurrency.
///
/// Cloning is cheap and clones share both semaphores.
#[derive(Clone)]
pub struct GitHubClient {
    transport: Arc<dyn HttpTransport>,
    base_url: Arc<str>,
    token: Arc<str>,
    request_permits: Arc<Semaphore>,
    stats_permits: Arc<Semaphore>,
    stats: StatsPolicy,
    rate_limit: Arc<Mutex<Option<RateLimitInfo>>>,
}

impl GitHubClient {
    /// Create a client over the given transport. Capacities of zero are
    /// clamped to one.
    pub fn new(transport: Arc<dyn HttpTransport>, config: ClientConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            transport,
            base_url: base_url.into(),
            token: config.token.into(),
            request_permits: Arc::new(Semaphore::new(config.concurrency.max(1))),
            stats_permits: Arc::new(Semaphore::new(config.stats_concurrency.max(1))),
            stats: config.stats,
            rate_limit: Arc::new(Mutex::new(None)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether the client targets a GitHub Enterprise installation.
    pub fn is_enterprise(&self) -> bool {
        &*self.base_url != DEFAULT_BASE_URL
    }

    /// Most recent rate limit state seen in response headers.
    pub fn rate_limit(&self) -> Option<RateLimitInfo> {
        self.rate_limit
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Issue one HTTP request under the global request semaphore.
    ///
    /// Suspends until a permit is free; the permit is released when the
    /// response has been fully read or the request failed.
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<HttpResponse> {
        let _permit = self
            .request_permits
            .acquire()
            .await
            .map_err(|_| HttpError::Transport("request semaphore closed".to_string()))?;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(method = %method, url = %url, "Sending request");

        let mut request = HttpRequest::new(method, url)
            .header("Authorization", format!("bearer {}", self.token))
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }

        let response = self.transport.send(request).await?;
        self.observe_rate_limit(&response);
        Ok(response)
    }

    /// Run a query against the GraphQL endpoint and decode its `data`.
    ///
    /// Fails with [`ScanError::Protocol`] when the response carries no
    /// `data`; the message is the server's `errors` list, or the raw body
    /// when there is none.
    pub async fn graphql<T: DeserializeOwned>(&self, query: &str, variables: Value) -> Result<T> {
        let payload = json!({ "query": query, "variables": variables });
        let body = serde_json::to_vec(&payload)
            .map_err(|e| ScanError::decode("GraphQL payload", e))?;

        let response = self.request(HttpMethod::Post, "/graphql", Some(body)).await?;

        let envelope: Option<GraphQlEnvelope> = response.json().ok();
        let (data, errors) = match envelope {
            Some(env) => (env.data, env.errors),
            None => (None, None),
        };

        match data {
            Some(data) if !is_empty_data(&data) => serde_json::from_value(data)
                .map_err(|e| ScanError::decode("GraphQL response data", e)),
            _ => {
                let reason = match errors {
                    Some(errors) => errors.to_string(),
                    None => response.text(),
                };
                tracing::error!(status = response.status, reason = %reason, "GraphQL request failed");
                Err(ScanError::protocol(reason))
            }
        }
    }

    /// Fetch contributor statistics for one repository.
    ///
    /// Runs under the stats semaphore for the whole poll protocol:
    /// 200 returns the list, 202 sleeps the policy delay and retries,
    /// 204 and 403 return an empty list, anything else is a
    /// [`ScanError::Transport`].
    pub async fn contributor_stats(
        &self,
        owner: &str,
        name: &str,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<Vec<ContributorStats>> {
        let _permit = self
            .stats_permits
            .acquire()
            .await
            .map_err(|_| HttpError::Transport("stats semaphore closed".to_string()))?;

        let path = self.stats_path(owner, name);
        let attempt = AtomicUsize::new(0);

        let poll = || self.poll_stats_once(&path, owner, name, &attempt);

        let result = poll
            .retry(self.stats.clone().into_backoff())
            .sleep(tokio::time::sleep)
            .when(|e| matches!(e, StatsAttempt::Pending))
            .notify(|_, delay| {
                let current = attempt.load(Ordering::SeqCst);
                tracing::debug!(
                    repo = %format!("{}/{}", owner, name),
                    attempt = current,
                    retry_in = ?delay,
                    "Contributor stats are being computed"
                );
                emit(
                    on_progress,
                    ScanProgress::StatsPending {
                        owner: owner.to_string(),
                        name: name.to_string(),
                        attempt: current,
                    },
                );
            })
            .await;

        match result {
            Ok(stats) => Ok(stats),
            Err(StatsAttempt::Failed(e)) => Err(e),
            Err(StatsAttempt::Pending) => Err(ScanError::transport(
                202,
                format!(
                    "statistics still being computed after {} attempts",
                    attempt.load(Ordering::SeqCst)
                ),
            )),
        }
    }

    fn stats_path(&self, owner: &str, name: &str) -> String {
        let path = format!("/repos/{owner}/{name}/stats/contributors");
        if self.is_enterprise() {
            format!("/v3{path}")
        } else {
            path
        }
    }

    async fn poll_stats_once(
        &self,
        path: &str,
        owner: &str,
        name: &str,
        attempt: &AtomicUsize,
    ) -> std::result::Result<Vec<ContributorStats>, StatsAttempt> {
        attempt.fetch_add(1, Ordering::SeqCst);
        let response = self
            .request(HttpMethod::Get, path, None)
            .await
            .map_err(StatsAttempt::Failed)?;

        match response.status {
            200 => response.json().map_err(|e| {
                StatsAttempt::Failed(ScanError::decode(
                    format!("contributor stats for {owner}/{name}"),
                    e,
                ))
            }),
            202 => Err(StatsAttempt::Pending),
            204 => {
                tracing::debug!(repo = %format!("{}/{}", owner, name), "No contributions yet");
                Ok(Vec::new())
            }
            403 => {
                tracing::debug!(repo = %format!("{}/{}", owner, name), "No access to repository");
                Ok(Vec::new())
            }
            status => {
                let err = ScanError::transport(status, response.text());
                tracing::error!(
                    repo = %format!("{}/{}", owner, name),
                    error = %short_error_message(&err),
                    "Unexpected contributor stats response"
                );
                Err(StatsAttempt::Failed(err))
            }
        }
    }

    fn observe_rate_limit(&self, response: &HttpResponse) {
        let Some(info) = parse_rate_limit_headers(response) else {
            return;
        };
        if info.remaining == 0 {
            tracing::warn!(
                limit = info.limit,
                reset_at = %info.reset_at,
                "API rate limit exhausted"
            );
        }
        *self.rate_limit.lock().unwrap_or_else(|e| e.into_inner()) = Some(info);
    }
}

/// `data: {}` and `data: null` both count as missing, like an absent key.
fn is_empty_data(data: &Value) -> bool {
    match data {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Extract rate limit info from GitHub response headers.
fn parse_rate_limit_headers(response: &HttpResponse) -> Option<RateLimitInfo> {
    let limit = response
        .header("x-ratelimit-limit")
        .and_then(|v| v.parse::<usize>().ok())?;
    let remaining = response
        .header("x-ratelimit-remaining")
        .and_then(|v| v.parse::<usize>().ok())?;
    let reset_epoch = response
        .header("x-ratelimit-reset")
        .and_then(|v| v.parse::<i64>().ok())?;
    let reset_at = DateTime::<Utc>::from_timestamp(reset_epoch, 0).unwrap_or_else(Utc::now);
    Some(RateLimitInfo {
        limit,
        remaining,
        reset_at,
    })
}
