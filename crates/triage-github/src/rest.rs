//! GitHub REST API backend for repository enumeration and item fetching.
//!
//! Boards live in the GraphQL projects API and are left to [`crate::GhCli`].

use std::future::Future;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use triage_core::{
    ItemClass, ItemFetcher, ItemRef, RepoId, RepositoryEnumerator, Result, TriageError,
};

use crate::wire::{self, RestError, RestIssue, RestPull, RestRepository};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Largest page the REST API serves.
const MAX_PER_PAGE: usize = 100;

/// Message the issues endpoint returns with `410 Gone` when a repository
/// has its issue tracker turned off.
const ISSUES_DISABLED_MESSAGE: &str = "Issues are disabled";

/// One page of a listing after filtering.
#[derive(Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// The server returned a full page, so another may follow.
    pub full: bool,
}

/// Pull pages until one comes back short or `limit` items are collected.
pub async fn collect_pages<T, E, F, Fut>(
    limit: usize,
    mut fetch_page: F,
) -> std::result::Result<Vec<T>, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = std::result::Result<Page<T>, E>>,
{
    let mut out = Vec::new();
    let mut page = 1;
    while out.len() < limit {
        let next = fetch_page(page).await?;
        out.extend(next.items);
        if !next.full {
            break;
        }
        page += 1;
    }
    out.truncate(limit);
    Ok(out)
}

/// True for the `410 Gone` answer of a repository without issues.
pub fn is_issues_disabled(status: StatusCode, body: &str) -> bool {
    status == StatusCode::GONE && body.contains(ISSUES_DISABLED_MESSAGE)
}

/// Failure of one REST call, before it is attributed to an operation.
#[derive(Debug)]
enum CallError {
    Status { status: StatusCode, body: String },
    Transport(String),
    Decode(TriageError),
}

impl CallError {
    fn detail(self) -> String {
        match self {
            CallError::Status { status, body } => {
                let message = serde_json::from_str::<RestError>(&body)
                    .map(|e| e.message)
                    .unwrap_or(body);
                format!("HTTP {status}: {message}")
            }
            CallError::Transport(detail) => detail,
            CallError::Decode(err) => err.to_string(),
        }
    }
}

/// REST client authenticated with a personal access token.
pub struct RestClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        Self::with_base_url(DEFAULT_API_URL, token)
    }

    /// Client against a GitHub Enterprise or test server.
    pub fn with_base_url(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("triage-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TriageError::InvalidConfig(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
        })
    }

    fn per_page(limit: usize) -> usize {
        limit.clamp(1, MAX_PER_PAGE)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<Vec<T>, CallError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .client
            .get(&url)
            .query(query)
            .header(header::ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| CallError::Transport(format!("GET {path} failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .bytes()
            .await
            .map_err(|e| CallError::Transport(format!("GET {path} body: {e}")))?;
        if !status.is_success() {
            return Err(CallError::Status {
                status,
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        wire::decode(path, &body).map_err(CallError::Decode)
    }

    /// Public, unarchived repositories listed under `path`.
    async fn list_repos_at(
        &self,
        path: &str,
        kind: &str,
        limit: usize,
    ) -> std::result::Result<Vec<RepoId>, CallError> {
        let per_page = Self::per_page(limit);
        collect_pages(limit, |page| async move {
            let query = [
                ("type", kind.to_string()),
                ("per_page", per_page.to_string()),
                ("page", page.to_string()),
            ];
            let repos: Vec<RestRepository> = self.get_page(path, &query).await?;
            let full = repos.len() == per_page;
            Ok(Page {
                items: repos
                    .into_iter()
                    .filter(|r| !r.archived && !r.private)
                    .map(|r| RepoId::new(r.owner.login, r.name))
                    .collect(),
                full,
            })
        })
        .await
    }
}

#[async_trait]
impl RepositoryEnumerator for RestClient {
    async fn list_repositories(&self, owner: &str, limit: usize) -> Result<Vec<RepoId>> {
        let org_path = format!("/orgs/{owner}/repos");
        let listed = match self.list_repos_at(&org_path, "public", limit).await {
            // Not an organization; try the user of that name.
            Err(CallError::Status {
                status: StatusCode::NOT_FOUND,
                ..
            }) => {
                debug!(owner, "no such organization, listing user repositories");
                let user_path = format!("/users/{owner}/repos");
                self.list_repos_at(&user_path, "owner", limit).await
            }
            other => other,
        };
        listed.map_err(|e| TriageError::ListFailure {
            owner: owner.to_string(),
            detail: e.detail(),
        })
    }
}

#[async_trait]
impl ItemFetcher for RestClient {
    async fn fetch_issues(&self, repo: &RepoId, limit: usize) -> Result<Vec<ItemRef>> {
        let path = format!("/repos/{}/issues", repo.full_name());
        let per_page = Self::per_page(limit);
        collect_pages(limit, |page| {
            let path = path.as_str();
            async move {
                let query = [
                    ("state", "open".to_string()),
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ];
                let issues: Vec<RestIssue> = match self.get_page(path, &query).await {
                    Ok(issues) => issues,
                    Err(CallError::Status { status, body })
                        if is_issues_disabled(status, &body) =>
                    {
                        debug!(repo = %repo, "issues disabled, treating as empty");
                        return Ok(Page {
                            items: Vec::new(),
                            full: false,
                        });
                    }
                    Err(e) => {
                        return Err(TriageError::FetchFailure {
                            repo: repo.clone(),
                            class: ItemClass::Issue,
                            detail: e.detail(),
                        })
                    }
                };
                // The issues endpoint lists pull requests too.
                let full = issues.len() == per_page;
                Ok(Page {
                    items: issues
                        .into_iter()
                        .filter(|i| i.pull_request.is_none())
                        .map(|i| ItemRef::from(i.html_url))
                        .collect(),
                    full,
                })
            }
        })
        .await
    }

    async fn fetch_pulls(&self, repo: &RepoId, limit: usize) -> Result<Vec<ItemRef>> {
        let path = format!("/repos/{}/pulls", repo.full_name());
        let per_page = Self::per_page(limit);
        collect_pages(limit, |page| {
            let path = path.as_str();
            async move {
                let query = [
                    ("state", "open".to_string()),
                    ("per_page", per_page.to_string()),
                    ("page", page.to_string()),
                ];
                let pulls: Vec<RestPull> =
                    self.get_page(path, &query).await.map_err(|e| TriageError::FetchFailure {
                        repo: repo.clone(),
                        class: ItemClass::PullRequest,
                        detail: e.detail(),
                    })?;
                let full = pulls.len() == per_page;
                Ok(Page {
                    items: pulls.into_iter().map(|p| ItemRef::from(p.html_url)).collect(),
                    full,
                })
            }
        })
        .await
    }
}
