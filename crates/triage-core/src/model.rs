//! Identity types: repositories, item references, item classes, boards.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies a repository by owner and name.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name`, the form accepted by `gh --repo` and the REST API paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Canonical URL of one issue or pull request.
///
/// The URL is the only identity used across fetch, board read and board
/// write; numbers and node ids are never compared.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemRef(String);

impl ItemRef {
    pub fn new(url: impl Into<String>) -> Self {
        ItemRef(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemRef {
    fn from(url: &str) -> Self {
        ItemRef::new(url)
    }
}

impl From<String> for ItemRef {
    fn from(url: String) -> Self {
        ItemRef(url)
    }
}

/// The two kinds of tracked item. Each class is fetched, read and
/// reconciled on its own.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemClass {
    Issue,
    PullRequest,
}

impl ItemClass {
    pub const ALL: [ItemClass; 2] = [ItemClass::Issue, ItemClass::PullRequest];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemClass::Issue => "issues",
            ItemClass::PullRequest => "pull requests",
        }
    }

    /// Identifier-safe name, used for wave names.
    pub fn slug(&self) -> &'static str {
        match self {
            ItemClass::Issue => "issue",
            ItemClass::PullRequest => "pull_request",
        }
    }
}

impl fmt::Display for ItemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque handle of a tracking board (a project number for GitHub projects).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardHandle(String);

impl BoardHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        BoardHandle(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BoardHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
