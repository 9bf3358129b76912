//! Contributions - find every GitHub repository a user has contributed to.
//!
//! This library discovers the repositories owned by a user and by the
//! organizations they belong to, fetches contributor statistics for each
//! one concurrently, and keeps the entries that belong to the user.
//!
//! All HTTP traffic is bounded by two independent semaphores: one for every
//! request and one for repositories inside the contributor stats poll
//! protocol, which can take many polls while GitHub computes the data.
//!
//! # Example
//!
//! ```ignore
//! use contributions::{ScanOptions, list_contributions};
//!
//! let options = ScanOptions {
//!     token: Some(token),
//!     username: Some("alice".into()),
//!     ..ScanOptions::default()
//! };
//! let report = list_contributions(&options, None).await?;
//!
//! for entry in &report.entries {
//!     println!("{}", entry.repo);
//! }
//! ```

pub mod client;
pub mod discovery;
pub mod error;
pub mod http;
pub mod pagination;
pub mod progress;
pub mod scan;
pub mod scheduler;
pub mod types;

pub use client::{ClientConfig, GitHubClient, StatsPolicy};
pub use discovery::{AffectedOwners, affected_owners, organizations, repositories, viewer_login};
pub use error::{Result, ScanError};
pub use http::{HttpError, HttpTransport, reqwest_transport::ReqwestTransport};
pub use pagination::Paginator;
pub use progress::{ProgressCallback, ScanProgress};
pub use scan::{ContributionReport, ScanOptions, list_contributions, scan};
pub use scheduler::{StatsOutcome, StatsScheduler};
pub use types::{
    ContributorStats, Organization, Page, PageInfo, RateLimitInfo, RepoRef, ReportEntry,
    Repository,
};
