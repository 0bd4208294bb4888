//! JSON shapes returned by `gh` and the REST API, and their decoders.
//!
//! Only the fields the reconciler reads are modelled; everything else in the
//! payloads is ignored.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use triage_core::{ItemRef, ItemSet, RepoId, Result, TriageError};

/// Entry of `gh repo list --json name,owner`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoEntry {
    pub name: String,
    pub owner: OwnerEntry,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OwnerEntry {
    pub login: String,
}

/// Entry of `gh issue list --json url` and `gh pr list --json url`.
#[derive(Debug, Clone, Deserialize)]
pub struct UrlEntry {
    pub url: String,
}

/// Output of `gh project item-list --format json`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectItemList {
    #[serde(default)]
    pub items: Vec<ProjectItem>,
    #[serde(default)]
    pub total_count: usize,
}

impl ProjectItemList {
    /// The board holds more entries than were listed.
    pub fn is_truncated(&self) -> bool {
        self.total_count > self.items.len()
    }

    /// Linked URLs of the listed entries. Entries without linked content are
    /// skipped.
    pub fn tracked(self) -> ItemSet {
        self.items
            .into_iter()
            .filter_map(|item| item.content.and_then(|c| c.url))
            .filter(|url| !url.is_empty())
            .map(ItemRef::from)
            .collect()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectItem {
    #[serde(default)]
    pub content: Option<ProjectContent>,
}

/// Linked content of a board item. Draft items carry no `url`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectContent {
    #[serde(default)]
    pub url: Option<String>,
}

/// Repository object of `GET /orgs/{org}/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestRepository {
    pub name: String,
    pub owner: OwnerEntry,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub private: bool,
}

/// Issue object of `GET /repos/{owner}/{repo}/issues`.
///
/// The endpoint also returns pull requests; those carry a `pull_request`
/// object.
#[derive(Debug, Clone, Deserialize)]
pub struct RestIssue {
    pub html_url: String,
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

/// Pull request object of `GET /repos/{owner}/{repo}/pulls`.
#[derive(Debug, Clone, Deserialize)]
pub struct RestPull {
    pub html_url: String,
}

/// Error body of the REST API.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestError {
    #[serde(default)]
    pub message: String,
}

pub(crate) fn decode<T: DeserializeOwned>(source_name: &str, bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| TriageError::DecodeFailure {
        source_name: source_name.to_string(),
        detail: e.to_string(),
    })
}

/// Decode `gh repo list` output.
pub fn decode_repositories(bytes: &[u8]) -> Result<Vec<RepoId>> {
    let entries: Vec<RepoEntry> = decode("gh repo list", bytes)?;
    Ok(entries
        .into_iter()
        .map(|e| RepoId::new(e.owner.login, e.name))
        .collect())
}

/// Decode `gh issue list` or `gh pr list` output.
pub fn decode_urls(source_name: &str, bytes: &[u8]) -> Result<Vec<ItemRef>> {
    let entries: Vec<UrlEntry> = decode(source_name, bytes)?;
    Ok(entries.into_iter().map(|e| ItemRef::from(e.url)).collect())
}

/// Decode `gh project item-list` output.
pub fn decode_board_items(bytes: &[u8]) -> Result<ProjectItemList> {
    decode("gh project item-list", bytes)
}
