//! Owner and repository discovery through the GraphQL API.
//!
//! The owners to scan for a user are either the explicitly requested
//! logins or every organization the user belongs to, followed in both
//! cases by the user's own login.

use serde::Deserialize;
use serde_json::json;

use crate::client::GitHubClient;
use crate::error::{Result, ScanError};
use crate::pagination::Paginator;
use crate::types::{Connection, Organization, PAGE_SIZE, Page, Repository, RepositoryNode};

const VIEWER_QUERY: &str = r#"
query viewerLogin {
    viewer {
        login
    }
}
"#;

const ORGANIZATIONS_QUERY: &str = r#"
query userOrganizations($user: String!, $first: Int!, $after: String) {
    user(login: $user) {
        organizations(first: $first, after: $after) {
            edges {
                node {
                    login
                }
            }
            pageInfo {
                hasNextPage
                endCursor
            }
        }
    }
}
"#;

const REPOSITORIES_QUERY: &str = r#"
query ownerRepositories($login: String!, $first: Int!, $after: String) {
    repositoryOwner(login: $login) {
        repositories(first: $first, after: $after) {
            edges {
                node {
                    id
                    name
                    nameWithOwner
                }
            }
            pageInfo {
                hasNextPage
                endCursor
            }
        }
    }
}
"#;

#[derive(Deserialize)]
struct ViewerData {
    viewer: Viewer,
}

#[derive(Deserialize)]
struct Viewer {
    login: String,
}

#[derive(Deserialize)]
struct UserOrganizationsData {
    user: Option<UserOrganizations>,
}

#[derive(Deserialize)]
struct UserOrganizations {
    organizations: Connection<Organization>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerRepositoriesData {
    repository_owner: Option<OwnerRepositories>,
}

#[derive(Deserialize)]
struct OwnerRepositories {
    repositories: Connection<RepositoryNode>,
}

/// Login of the authenticated user.
pub async fn viewer_login(client: &GitHubClient) -> Result<String> {
    let data: ViewerData = client.graphql(VIEWER_QUERY, json!({})).await?;
    Ok(data.viewer.login)
}

/// Lazily paginate the organizations `user` belongs to.
pub fn organizations<'a>(client: &'a GitHubClient, user: &str) -> Paginator<'a, Organization> {
    let user = user.to_string();
    Paginator::new(move |after: Option<String>| {
        let user = user.clone();
        async move {
            let variables = json!({ "user": user, "first": PAGE_SIZE, "after": after });
            let data: UserOrganizationsData =
                client.graphql(ORGANIZATIONS_QUERY, variables).await?;
            let orgs = data
                .user
                .ok_or_else(|| ScanError::protocol(format!("user not found: {user}")))?;
            Ok::<_, ScanError>(orgs.organizations.into_page(|org| org))
        }
    })
}

/// Lazily paginate the repositories owned by `owner`.
///
/// Each repository is annotated with the owning login taken from its
/// `nameWithOwner`.
pub fn repositories<'a>(client: &'a GitHubClient, owner: &str) -> Paginator<'a, Repository> {
    let owner = owner.to_string();
    Paginator::new(move |after: Option<String>| {
        let owner = owner.clone();
        async move {
            let variables = json!({ "login": owner, "first": PAGE_SIZE, "after": after });
            let data: OwnerRepositoriesData =
                client.graphql(REPOSITORIES_QUERY, variables).await?;
            let repos = data
                .repository_owner
                .ok_or_else(|| ScanError::protocol(format!("repository owner not found: {owner}")))?;

            let page = repos.repositories.into_page(|node| node);
            let items = page
                .items
                .into_iter()
                .map(annotate_owner)
                .collect::<Result<Vec<_>>>()?;
            Ok::<_, ScanError>(Page {
                items,
                page_info: page.page_info,
            })
        }
    })
}

fn annotate_owner(node: RepositoryNode) -> Result<Repository> {
    let (owner, _) = node.name_with_owner.split_once('/').ok_or_else(|| {
        ScanError::protocol(format!(
            "repository name without owner: {}",
            node.name_with_owner
        ))
    })?;
    Ok(Repository {
        owner: owner.to_string(),
        id: node.id,
        name: node.name,
    })
}

enum OwnerSource<'a> {
    Explicit(std::vec::IntoIter<String>),
    Organizations(Paginator<'a, Organization>),
}

/// Lazy sequence of owner logins to scan for one user.
///
/// Yields the explicit owners if any were given, otherwise the user's
/// organizations, and always ends with the user's own login.
pub struct AffectedOwners<'a> {
    source: Option<OwnerSource<'a>>,
    user: Option<String>,
}

impl AffectedOwners<'_> {
    /// Next owner login. An error ends the sequence.
    pub async fn next(&mut self) -> Option<Result<String>> {
        loop {
            match self.source.as_mut() {
                Some(OwnerSource::Explicit(owners)) => match owners.next() {
                    Some(owner) => return Some(Ok(owner)),
                    None => self.source = None,
                },
                Some(OwnerSource::Organizations(orgs)) => match orgs.next().await {
                    Some(Ok(org)) => return Some(Ok(org.login)),
                    Some(Err(e)) => {
                        self.source = None;
                        self.user = None;
                        return Some(Err(e));
                    }
                    None => self.source = None,
                },
                None => return self.user.take().map(Ok),
            }
        }
    }
}

/// Owners whose repositories should be scanned for `user`.
pub fn affected_owners<'a>(
    client: &'a GitHubClient,
    user: &str,
    explicit_owners: &[String],
) -> AffectedOwners<'a> {
    let source = if explicit_owners.is_empty() {
        OwnerSource::Organizations(organizations(client, user))
    } else {
        OwnerSource::Explicit(explicit_owners.to_vec().into_iter())
    };
    AffectedOwners {
        source: Some(source),
        user: Some(user.to_string()),
    }
}
