//! Progress events emitted during a scan.
//!
//! Events are purely observational: nothing the callback does feeds back
//! into scheduling.

/// Progress events emitted while discovering repositories and fetching stats.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScanProgress {
    /// The target login was resolved from the authenticated identity.
    ResolvedUser {
        /// Login of the authenticated user.
        login: String,
    },

    /// Starting to list an owner's repositories.
    ListingRepositories {
        /// User or organization login.
        owner: String,
    },

    /// Finished listing an owner's repositories.
    RepositoriesListed {
        /// User or organization login.
        owner: String,
        /// Number of repositories scheduled for this owner.
        count: usize,
    },

    /// Discovery finished; every stats task has been scheduled.
    ScanStarted {
        /// Total number of stats tasks.
        total: usize,
    },

    /// The stats endpoint answered 202 and the request will be retried.
    StatsPending {
        owner: String,
        name: String,
        /// Attempt number that came back pending (1-based).
        attempt: usize,
    },

    /// A stats task completed.
    RepositoryScanned {
        owner: String,
        name: String,
        /// Whether the target user appears among the contributors.
        matched: bool,
    },

    /// A stats task failed; the repository is left out of the report.
    RepositoryFailed {
        owner: String,
        name: String,
        error: String,
    },

    /// Every task has been drained.
    ScanComplete {
        scanned: usize,
        matched: usize,
        failed: usize,
    },
}

impl ScanProgress {
    /// Whether this event marks the completion of one stats task.
    pub fn is_tick(&self) -> bool {
        matches!(
            self,
            Self::RepositoryScanned { .. } | Self::RepositoryFailed { .. }
        )
    }
}

/// Callback type for progress reporting.
pub type ProgressCallback = Box<dyn Fn(ScanProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(callback: Option<&ProgressCallback>, event: ScanProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_emit_with_none_is_a_no_op() {
        emit(None, ScanProgress::ScanStarted { total: 3 });
    }

    #[test]
    fn test_emit_forwards_events_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let capture = Arc::clone(&seen);
        let cb: ProgressCallback = Box::new(move |event| {
            capture.lock().unwrap_or_else(|e| e.into_inner()).push(event);
        });

        emit(Some(&cb), ScanProgress::ScanStarted { total: 2 });
        emit(
            Some(&cb),
            ScanProgress::RepositoryScanned {
                owner: "acme".into(),
                name: "r1".into(),
                matched: true,
            },
        );

        let seen = seen.lock().unwrap_or_else(|e| e.into_inner());
        assert_eq!(seen.len(), 2);
        assert!(!seen[0].is_tick());
        assert!(seen[1].is_tick());
    }
}
