//! Collaborator traits the reconciler consumes.
//!
//! These traits define the external operations of a run:
//! - `RepositoryEnumerator`: which repositories to scan
//! - `ItemFetcher`: open issue / pull request URLs of one repository
//! - `BoardReader`: URLs already linked from a board
//! - `BoardWriter`: link one URL to a board
//!
//! All traits are async and backend-agnostic. The `triage-github` crate
//! implements them against GitHub; in-memory fakes live in [`crate::fakes`].

use async_trait::async_trait;

use crate::error::Result;
use crate::item_set::ItemSet;
use crate::model::{BoardHandle, ItemRef, RepoId};

/// Lists the repositories owned by an account.
#[async_trait]
pub trait RepositoryEnumerator: Send + Sync {
    /// Up to `limit` public, non-archived repositories of `owner`, in the
    /// order the backend returns them. Fails with `ListFailure`.
    async fn list_repositories(&self, owner: &str, limit: usize) -> Result<Vec<RepoId>>;
}

/// Lists open items of one repository.
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    /// URLs of up to `limit` most recent open issues.
    ///
    /// A repository with issues disabled yields `Ok(vec![])`. Any other
    /// failure is `FetchFailure`.
    async fn fetch_issues(&self, repo: &RepoId, limit: usize) -> Result<Vec<ItemRef>>;

    /// URLs of up to `limit` most recent open pull requests.
    async fn fetch_pulls(&self, repo: &RepoId, limit: usize) -> Result<Vec<ItemRef>>;
}

/// Reads the items linked from a board.
#[async_trait]
pub trait BoardReader: Send + Sync {
    /// URLs of the linked content of up to `limit` board entries. Entries
    /// with no linked issue or pull request (drafts) are skipped.
    async fn list_board_items(
        &self,
        owner: &str,
        board: &BoardHandle,
        limit: usize,
    ) -> Result<ItemSet>;
}

/// Adds items to a board.
///
/// Not idempotent: adding the same URL twice may create two entries.
#[async_trait]
pub trait BoardWriter: Send + Sync {
    async fn add_item(&self, owner: &str, board: &BoardHandle, url: &ItemRef) -> Result<()>;
}
