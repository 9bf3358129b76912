//! Fan-out of contributor stats fetches.
//!
//! [`StatsScheduler`] owns the set of in-flight stats tasks. Tasks start
//! running as soon as they are spawned and complete in any order; callers
//! fan in with [`StatsScheduler::join_next`], which yields whichever task
//! finished first. Dropping the scheduler aborts anything still running.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::task::{Id, JoinSet};

use crate::client::GitHubClient;
use crate::error::Result;
use crate::http::HttpError;
use crate::progress::ProgressCallback;
use crate::types::{ContributorStats, RepoRef, Repository};

/// A finished stats task.
#[derive(Debug)]
pub struct StatsOutcome {
    pub repo: RepoRef,
    pub result: Result<Vec<ContributorStats>>,
}

/// Explicitly owned executor for per-repository stats tasks.
pub struct StatsScheduler {
    client: GitHubClient,
    on_progress: Option<Arc<ProgressCallback>>,
    tasks: JoinSet<Result<Vec<ContributorStats>>>,
    in_flight: HashMap<Id, RepoRef>,
    spawned: usize,
}

impl StatsScheduler {
    pub fn new(client: GitHubClient, on_progress: Option<Arc<ProgressCallback>>) -> Self {
        Self {
            client,
            on_progress,
            tasks: JoinSet::new(),
            in_flight: HashMap::new(),
            spawned: 0,
        }
    }

    /// Start fetching stats for `repo` in the background.
    pub fn spawn(&mut self, repo: &Repository) {
        let client = self.client.clone();
        let on_progress = self.on_progress.clone();
        let (owner, name) = (repo.owner.clone(), repo.name.clone());

        let handle = self.tasks.spawn(async move {
            client
                .contributor_stats(&owner, &name, on_progress.as_deref())
                .await
        });
        self.in_flight.insert(handle.id(), repo.to_ref());
        self.spawned += 1;
    }

    /// Wait for the next task to finish, in completion order.
    ///
    /// Returns `None` once every spawned task has been joined. A task that
    /// panicked or was aborted is reported as an error outcome.
    pub async fn join_next(&mut self) -> Option<StatsOutcome> {
        let joined = self.tasks.join_next_with_id().await?;
        let outcome = match joined {
            Ok((id, result)) => StatsOutcome {
                repo: self.take_repo(id),
                result,
            },
            Err(e) => {
                let repo = self.take_repo(e.id());
                tracing::error!(repo = %repo, error = %e, "Stats task did not complete");
                StatsOutcome {
                    repo,
                    result: Err(HttpError::Transport(format!("task failed: {e}")).into()),
                }
            }
        };
        Some(outcome)
    }

    /// Wait for every task and return their outcomes in completion order.
    pub async fn drain(&mut self) -> Vec<StatsOutcome> {
        let mut outcomes = Vec::with_capacity(self.len());
        while let Some(outcome) = self.join_next().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Abort every outstanding task and wait for them to stop.
    pub async fn shutdown(&mut self) {
        self.tasks.shutdown().await;
        self.in_flight.clear();
    }

    /// Tasks spawned and not yet joined.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Tasks spawned over the scheduler's lifetime.
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    fn take_repo(&mut self, id: Id) -> RepoRef {
        self.in_flight.remove(&id).unwrap_or_else(|| RepoRef {
            owner: String::new(),
            name: String::new(),
        })
    }
}
