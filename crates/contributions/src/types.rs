//! Data structures shared by the client, discovery, and the scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Public GitHub API root.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// Default ceiling on concurrent HTTP requests.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Default ceiling on repositories concurrently inside the stats protocol.
pub const DEFAULT_STATS_CONCURRENCY: usize = 20;

/// Default delay between polls while stats are being computed.
pub const DEFAULT_STATS_DELAY_SECS: u64 = 5;

/// Page size requested from connection queries (GitHub's maximum).
pub const PAGE_SIZE: u32 = 100;

/// Cursor state returned with every page of a connection query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// One page of a cursor-paged query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_info: PageInfo,
}

/// A GraphQL connection (`edges { node }` + `pageInfo`).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Connection<N> {
    pub edges: Vec<Edge<N>>,
    pub page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Edge<N> {
    pub node: N,
}

impl<N> Connection<N> {
    pub(crate) fn into_page<T>(self, f: impl FnMut(N) -> T) -> Page<T> {
        Page {
            items: self.edges.into_iter().map(|e| e.node).map(f).collect(),
            page_info: self.page_info,
        }
    }
}

/// An organization node from the `organizations` connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Organization {
    pub login: String,
}

/// A repository node as returned by the `repositories` connection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RepositoryNode {
    pub id: String,
    pub name: String,
    pub name_with_owner: String,
}

/// A discovered repository, annotated with its owning login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// Opaque node identifier from the query API.
    pub id: String,
    pub owner: String,
    pub name: String,
}

impl Repository {
    /// The `(owner, name)` pair used in reports.
    pub fn to_ref(&self) -> RepoRef {
        RepoRef {
            owner: self.owner.clone(),
            name: self.name.clone(),
        }
    }
}

/// Repository coordinates as they appear in the report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Author of a contributor stats record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub login: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One contributor's aggregate for a repository.
///
/// Only `author.login` is interpreted; everything else the stats endpoint
/// returns is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributorStats {
    /// `null` for deleted accounts.
    pub author: Option<Author>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ContributorStats {
    pub fn author_login(&self) -> Option<&str> {
        self.author.as_ref().map(|a| a.login.as_str())
    }

    /// Exact, case-sensitive login match.
    pub fn is_by(&self, login: &str) -> bool {
        self.author_login() == Some(login)
    }
}

/// A repository where the target user has contributor stats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub repo: RepoRef,
    pub stats: ContributorStats,
}

/// Rate limit state observed from response headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub limit: usize,
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contributor_stats_round_trips_opaque_fields() {
        let raw = json!({
            "author": {"login": "alice", "id": 7},
            "total": 12,
            "weeks": [{"w": 1, "a": 2, "d": 0, "c": 1}]
        });
        let stats: ContributorStats = serde_json::from_value(raw.clone()).expect("decode");
        assert_eq!(stats.author_login(), Some("alice"));
        assert!(stats.is_by("alice"));
        assert!(!stats.is_by("Alice"));
        assert_eq!(serde_json::to_value(&stats).expect("encode"), raw);
    }

    #[test]
    fn test_null_author_never_matches() {
        let stats: ContributorStats =
            serde_json::from_value(json!({"author": null, "total": 1})).expect("decode");
        assert_eq!(stats.author_login(), None);
        assert!(!stats.is_by("alice"));
    }

    #[test]
    fn test_connection_flattens_edges_into_page() {
        let conn: Connection<Organization> = serde_json::from_value(json!({
            "edges": [{"node": {"login": "acme"}}, {"node": {"login": "globex"}}],
            "pageInfo": {"hasNextPage": true, "endCursor": "Y3Vyc29y"}
        }))
        .expect("decode");
        let page = conn.into_page(|org| org.login);
        assert_eq!(page.items, vec!["acme".to_string(), "globex".to_string()]);
        assert!(page.page_info.has_next_page);
        assert_eq!(page.page_info.end_cursor.as_deref(), Some("Y3Vyc29y"));
    }

    #[test]
    fn test_repo_ref_displays_as_slug() {
        let repo = Repository {
            id: "R_1".into(),
            owner: "acme".into(),
            name: "r1".into(),
        };
        assert_eq!(repo.to_ref().to_string(), "acme/r1");
    }
}
