//! `gh` command line driver.
//!
//! Every collaborator operation is one `gh` invocation with JSON output.
//! Invocations go through [`GhExec`] so the argument lists and failure
//! classification can be exercised without the binary.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use triage_core::{
    BoardHandle, BoardReader, BoardWriter, ItemClass, ItemFetcher, ItemRef, ItemSet,
    RepoId, RepositoryEnumerator, Result, TriageError,
};

use crate::wire;

/// Diagnostic `gh issue list` prints for a repository with issues turned off.
const ISSUES_DISABLED_MARKER: &str = "has disabled issues";

/// Captured result of one `gh` invocation.
#[derive(Debug, Clone, Default)]
pub struct GhOutput {
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl GhOutput {
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }
}

/// Runs `gh` with the given arguments.
#[async_trait]
pub trait GhExec: Send + Sync {
    async fn run(&self, args: &[String]) -> std::io::Result<GhOutput>;
}

/// Spawns the real `gh` binary.
#[derive(Debug, Clone)]
pub struct ProcessExec {
    program: String,
    timeout: Option<Duration>,
}

impl Default for ProcessExec {
    fn default() -> Self {
        Self {
            program: "gh".to_string(),
            timeout: None,
        }
    }
}

impl ProcessExec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any invocation still running after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl GhExec for ProcessExec {
    async fn run(&self, args: &[String]) -> std::io::Result<GhOutput> {
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("gh timed out after {}s", timeout.as_secs()),
                    )
                })??,
            None => child.wait_with_output().await?,
        };

        Ok(GhOutput {
            success: output.status.success(),
            stdout: output.stdout,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Check whether the `gh` binary is on `PATH`.
pub fn is_gh_available() -> bool {
    std::process::Command::new("gh")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// True when `gh` refused an issue listing because the repository has its
/// issue tracker turned off.
pub fn is_issues_disabled(stderr: &str) -> bool {
    stderr.contains(ISSUES_DISABLED_MARKER)
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Collaborator backend driving `gh`.
pub struct GhCli<E: GhExec = ProcessExec> {
    exec: E,
}

impl<E: GhExec> GhCli<E> {
    pub fn with_exec(exec: E) -> Self {
        Self { exec }
    }

    pub fn exec(&self) -> &E {
        &self.exec
    }

    /// Run `gh`, folding spawn errors and non-zero exits into one string.
    async fn invoke(&self, argv: Vec<String>) -> std::result::Result<Vec<u8>, String> {
        debug!(args = %argv.join(" "), "invoking gh");
        match self.exec.run(&argv).await {
            Ok(out) if out.success => Ok(out.stdout),
            Ok(out) if out.stderr.is_empty() => Err("gh exited with a failure status".to_string()),
            Ok(out) => Err(out.stderr),
            Err(e) => Err(format!("failed to run gh: {e}")),
        }
    }

    async fn fetch_urls(
        &self,
        class: ItemClass,
        repo: &RepoId,
        limit: usize,
    ) -> Result<Vec<ItemRef>> {
        let (subcommand, source_name) = match class {
            ItemClass::Issue => ("issue", "gh issue list"),
            ItemClass::PullRequest => ("pr", "gh pr list"),
        };
        let full_name = repo.full_name();
        let limit = limit.to_string();
        let argv = args(&[
            subcommand,
            "list",
            "--repo",
            full_name.as_str(),
            "--state",
            "open",
            "--limit",
            limit.as_str(),
            "--json",
            "url",
        ]);

        match self.invoke(argv).await {
            Ok(stdout) => wire::decode_urls(source_name, &stdout),
            Err(detail) if class == ItemClass::Issue && is_issues_disabled(&detail) => {
                debug!(repo = %repo, "issues disabled, treating as empty");
                Ok(Vec::new())
            }
            Err(detail) => Err(TriageError::FetchFailure {
                repo: repo.clone(),
                class,
                detail,
            }),
        }
    }
}

#[async_trait]
impl<E: GhExec> RepositoryEnumerator for GhCli<E> {
    async fn list_repositories(&self, owner: &str, limit: usize) -> Result<Vec<RepoId>> {
        let limit = limit.to_string();
        let argv = args(&[
            "repo",
            "list",
            owner,
            "--limit",
            limit.as_str(),
            "--no-archived",
            "--visibility",
            "public",
            "--json",
            "name,owner",
        ]);
        let stdout = self
            .invoke(argv)
            .await
            .map_err(|detail| TriageError::ListFailure {
                owner: owner.to_string(),
                detail,
            })?;
        wire::decode_repositories(&stdout)
    }
}

#[async_trait]
impl<E: GhExec> ItemFetcher for GhCli<E> {
    async fn fetch_issues(&self, repo: &RepoId, limit: usize) -> Result<Vec<ItemRef>> {
        self.fetch_urls(ItemClass::Issue, repo, limit).await
    }

    async fn fetch_pulls(&self, repo: &RepoId, limit: usize) -> Result<Vec<ItemRef>> {
        self.fetch_urls(ItemClass::PullRequest, repo, limit).await
    }
}

#[async_trait]
impl<E: GhExec> BoardReader for GhCli<E> {
    async fn list_board_items(
        &self,
        owner: &str,
        board: &BoardHandle,
        limit: usize,
    ) -> Result<ItemSet> {
        let limit_arg = limit.to_string();
        let argv = args(&[
            "project",
            "item-list",
            board.as_str(),
            "--owner",
            owner,
            "--limit",
            limit_arg.as_str(),
            "--format",
            "json",
        ]);
        let read_failure = |detail: String| TriageError::BoardReadFailure {
            owner: owner.to_string(),
            board: board.to_string(),
            detail,
        };
        let stdout = self.invoke(argv).await.map_err(read_failure)?;
        let listing = wire::decode_board_items(&stdout)?;

        // A partial listing would file already-tracked items a second time.
        if listing.is_truncated() {
            return Err(read_failure(format!(
                "listed {} of {} entries (limit {limit}); raise the board limit",
                listing.items.len(),
                listing.total_count,
            )));
        }
        Ok(listing.tracked())
    }
}

#[async_trait]
impl<E: GhExec> BoardWriter for GhCli<E> {
    async fn add_item(&self, owner: &str, board: &BoardHandle, url: &ItemRef) -> Result<()> {
        let argv = args(&[
            "project",
            "item-add",
            board.as_str(),
            "--owner",
            owner,
            "--url",
            url.as_str(),
        ]);
        self.invoke(argv)
            .await
            .map(|_| ())
            .map_err(|detail| TriageError::WriteFailure {
                board: board.to_string(),
                url: url.to_string(),
                detail,
            })
    }
}

/// Scripted [`GhExec`] for tests.
///
/// Responses are matched by argument prefix, first registered rule wins;
/// an invocation with no matching rule fails with an I/O error. Every
/// invocation is recorded.
#[derive(Debug, Default)]
pub struct ScriptedExec {
    rules: Mutex<Vec<(Vec<String>, VecDeque<GhOutput>, Option<GhOutput>)>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedExec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every invocation starting with `prefix` with `output`.
    pub fn respond(self, prefix: &[&str], output: GhOutput) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((args(prefix), VecDeque::new(), Some(output)));
        self
    }

    /// Answer successive invocations starting with `prefix` with `outputs`
    /// in order, then fail.
    pub fn respond_sequence(self, prefix: &[&str], outputs: Vec<GhOutput>) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((args(prefix), outputs.into(), None));
        self
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl GhExec for ScriptedExec {
    async fn run(&self, argv: &[String]) -> std::io::Result<GhOutput> {
        self.calls.lock().unwrap().push(argv.to_vec());
        let mut rules = self.rules.lock().unwrap();
        for (prefix, queue, fixed) in rules.iter_mut() {
            if argv.starts_with(prefix) {
                if let Some(next) = queue.pop_front() {
                    return Ok(next);
                }
                if let Some(fixed) = fixed {
                    return Ok(fixed.clone());
                }
            }
        }
        Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no scripted response for gh {}", argv.join(" ")),
        ))
    }
}
