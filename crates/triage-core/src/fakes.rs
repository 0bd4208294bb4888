//! In-memory fake of the GitHub collaborators (testing only)
//!
//! `MemoryGitHub` implements every trait in [`crate::source`] over plain
//! collections, with scripted failures and optional latency. Successful
//! `add_item` calls land on the in-memory board, so a second run observes
//! the first run's writes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Result, TriageError};
use crate::item_set::ItemSet;
use crate::model::{BoardHandle, ItemClass, ItemRef, RepoId};
use crate::source::{BoardReader, BoardWriter, ItemFetcher, RepositoryEnumerator};

#[derive(Debug, Clone)]
struct RepoEntry {
    id: RepoId,
    archived: bool,
    public: bool,
}

/// A recorded `add_item` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddCall {
    pub owner: String,
    pub board: BoardHandle,
    pub url: ItemRef,
}

#[derive(Debug, Default)]
struct State {
    repos: Vec<RepoEntry>,
    issues: HashMap<RepoId, Vec<ItemRef>>,
    pulls: HashMap<RepoId, Vec<ItemRef>>,
    issues_disabled: HashSet<RepoId>,
    failing_fetch: HashSet<RepoId>,
    /// `None` entries are drafts with no linked content.
    boards: HashMap<BoardHandle, Vec<Option<ItemRef>>>,
    failing_board_reads: HashSet<BoardHandle>,
    failing_writes: HashSet<ItemRef>,
    list_failure: Option<String>,
    add_calls: Vec<AddCall>,
}

#[derive(Debug, Default)]
struct InFlight {
    now: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.now.fetch_sub(1, Ordering::SeqCst);
    }
}

/// In-memory GitHub organization with two kinds of items and any number
/// of boards.
#[derive(Debug, Default)]
pub struct MemoryGitHub {
    state: Mutex<State>,
    latency: Option<Duration>,
    fetches: InFlight,
    writes: InFlight,
}

impl MemoryGitHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a public, active repository with open issues and pulls, most
    /// recent first.
    pub fn with_repo(self, repo: RepoId, issues: &[&str], pulls: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.issues.insert(
                repo.clone(),
                issues.iter().map(|u| ItemRef::from(*u)).collect(),
            );
            state
                .pulls
                .insert(repo.clone(), pulls.iter().map(|u| ItemRef::from(*u)).collect());
            state.repos.push(RepoEntry {
                id: repo,
                archived: false,
                public: true,
            });
        }
        self
    }

    /// Add an archived repository whose items must never be fetched.
    pub fn with_archived_repo(self, repo: RepoId, issues: &[&str]) -> Self {
        let this = self.with_repo(repo.clone(), issues, &[]);
        this.update_repo(&repo, |entry| entry.archived = true);
        this
    }

    /// Add a private repository whose items must never be fetched.
    pub fn with_private_repo(self, repo: RepoId, issues: &[&str]) -> Self {
        let this = self.with_repo(repo.clone(), issues, &[]);
        this.update_repo(&repo, |entry| entry.public = false);
        this
    }

    /// Add a repository that has its issue tracker turned off.
    pub fn with_issues_disabled(self, repo: RepoId, pulls: &[&str]) -> Self {
        let this = self.with_repo(repo.clone(), &[], pulls);
        this.state.lock().unwrap().issues_disabled.insert(repo);
        this
    }

    /// Make every fetch against `repo` fail.
    pub fn failing_fetch(self, repo: RepoId) -> Self {
        self.state.lock().unwrap().failing_fetch.insert(repo);
        self
    }

    /// Seed a board with linked items.
    pub fn with_board_items(self, board: &str, urls: &[&str]) -> Self {
        self.state
            .lock()
            .unwrap()
            .boards
            .entry(BoardHandle::new(board))
            .or_default()
            .extend(urls.iter().map(|u| Some(ItemRef::from(*u))));
        self
    }

    /// Seed a board with a draft entry that links to nothing.
    pub fn with_draft_item(self, board: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .boards
            .entry(BoardHandle::new(board))
            .or_default()
            .push(None);
        self
    }

    pub fn failing_board_read(self, board: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_board_reads
            .insert(BoardHandle::new(board));
        self
    }

    /// Make adding `url` to any board fail.
    pub fn failing_write(self, url: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_writes
            .insert(ItemRef::from(url));
        self
    }

    pub fn failing_list(self, detail: &str) -> Self {
        self.state.lock().unwrap().list_failure = Some(detail.to_string());
        self
    }

    /// Sleep this long inside every fetch and write.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Every `add_item` call made so far, failed ones included.
    pub fn add_calls(&self) -> Vec<AddCall> {
        self.state.lock().unwrap().add_calls.clone()
    }

    /// Linked items currently on `board`.
    pub fn board_items(&self, board: &str) -> Vec<ItemRef> {
        self.state
            .lock()
            .unwrap()
            .boards
            .get(&BoardHandle::new(board))
            .map(|entries| entries.iter().flatten().cloned().collect())
            .unwrap_or_default()
    }

    /// Highest number of fetches observed running at once.
    pub fn max_concurrent_fetches(&self) -> usize {
        self.fetches.max.load(Ordering::SeqCst)
    }

    /// Highest number of board writes observed running at once.
    pub fn max_concurrent_writes(&self) -> usize {
        self.writes.max.load(Ordering::SeqCst)
    }

    fn update_repo(&self, repo: &RepoId, f: impl FnOnce(&mut RepoEntry)) {
        let mut state = self.state.lock().unwrap();
        if let Some(entry) = state.repos.iter_mut().find(|e| &e.id == repo) {
            f(entry);
        }
    }

    async fn pause(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    async fn fetch_items(
        &self,
        class: ItemClass,
        repo: &RepoId,
        limit: usize,
    ) -> Result<Vec<ItemRef>> {
        self.fetches.enter();
        self.pause().await;
        let result = {
            let state = self.state.lock().unwrap();
            if state.failing_fetch.contains(repo) {
                Err(TriageError::FetchFailure {
                    repo: repo.clone(),
                    class,
                    detail: "scripted fetch failure".to_string(),
                })
            } else if class == ItemClass::Issue && state.issues_disabled.contains(repo) {
                Ok(Vec::new())
            } else {
                let source = match class {
                    ItemClass::Issue => &state.issues,
                    ItemClass::PullRequest => &state.pulls,
                };
                Ok(source
                    .get(repo)
                    .map(|items| items.iter().take(limit).cloned().collect())
                    .unwrap_or_default())
            }
        };
        self.fetches.exit();
        result
    }
}

#[async_trait]
impl RepositoryEnumerator for MemoryGitHub {
    async fn list_repositories(&self, owner: &str, limit: usize) -> Result<Vec<RepoId>> {
        let state = self.state.lock().unwrap();
        if let Some(detail) = &state.list_failure {
            return Err(TriageError::ListFailure {
                owner: owner.to_string(),
                detail: detail.clone(),
            });
        }
        Ok(state
            .repos
            .iter()
            .filter(|e| e.id.owner == owner && !e.archived && e.public)
            .take(limit)
            .map(|e| e.id.clone())
            .collect())
    }
}

#[async_trait]
impl ItemFetcher for MemoryGitHub {
    async fn fetch_issues(&self, repo: &RepoId, limit: usize) -> Result<Vec<ItemRef>> {
        self.fetch_items(ItemClass::Issue, repo, limit).await
    }

    async fn fetch_pulls(&self, repo: &RepoId, limit: usize) -> Result<Vec<ItemRef>> {
        self.fetch_items(ItemClass::PullRequest, repo, limit).await
    }
}

#[async_trait]
impl BoardReader for MemoryGitHub {
    async fn list_board_items(
        &self,
        owner: &str,
        board: &BoardHandle,
        limit: usize,
    ) -> Result<ItemSet> {
        let state = self.state.lock().unwrap();
        if state.failing_board_reads.contains(board) {
            return Err(TriageError::BoardReadFailure {
                owner: owner.to_string(),
                board: board.to_string(),
                detail: "scripted board read failure".to_string(),
            });
        }
        let entries = state.boards.get(board).map(Vec::as_slice).unwrap_or_default();
        if entries.len() > limit {
            return Err(TriageError::BoardReadFailure {
                owner: owner.to_string(),
                board: board.to_string(),
                detail: format!("listed {limit} of {} entries", entries.len()),
            });
        }
        Ok(entries.iter().flatten().cloned().collect())
    }
}

#[async_trait]
impl BoardWriter for MemoryGitHub {
    async fn add_item(&self, owner: &str, board: &BoardHandle, url: &ItemRef) -> Result<()> {
        self.writes.enter();
        self.pause().await;
        let result = {
            let mut state = self.state.lock().unwrap();
            state.add_calls.push(AddCall {
                owner: owner.to_string(),
                board: board.clone(),
                url: url.clone(),
            });
            if state.failing_writes.contains(url) {
                Err(TriageError::WriteFailure {
                    board: board.to_string(),
                    url: url.to_string(),
                    detail: "scripted write failure".to_string(),
                })
            } else {
                state
                    .boards
                    .entry(board.clone())
                    .or_default()
                    .push(Some(url.clone()));
                Ok(())
            }
        };
        self.writes.exit();
        result
    }
}
