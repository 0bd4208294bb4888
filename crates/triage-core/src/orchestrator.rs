//! Run orchestration: enumerate → fetch wave → board reads → reconcile →
//! write waves.
//!
//! Read-side failures (enumeration, any fetch task, board read) abort the
//! run before a single board is written. Write failures are collected per
//! item and reported; they never stop the remaining writes.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument, Instrument};
use uuid::Uuid;

use crate::config::ReconcileConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{Result, TriageError};
use crate::item_set::{ItemSet, SharedItemSet};
use crate::metrics::METRICS;
use crate::model::{BoardHandle, ItemClass, ItemRef, RepoId};
use crate::obs::{
    emit_class_reconciled, emit_item_added, emit_item_failed, emit_run_aborted,
    emit_run_finished, emit_run_started, run_span,
};
use crate::reconcile::ClassReconciliation;
use crate::report::{ClassReport, FailedWrite, RunReport};
use crate::source::{BoardReader, BoardWriter, ItemFetcher, RepositoryEnumerator};

/// The four collaborators a run talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub enumerator: Arc<dyn RepositoryEnumerator>,
    pub fetcher: Arc<dyn ItemFetcher>,
    pub reader: Arc<dyn BoardReader>,
    pub writer: Arc<dyn BoardWriter>,
}

impl Collaborators {
    /// Use one backend for every collaborator.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: RepositoryEnumerator + ItemFetcher + BoardReader + BoardWriter + 'static,
    {
        Self {
            enumerator: backend.clone(),
            fetcher: backend.clone(),
            reader: backend.clone(),
            writer: backend,
        }
    }
}

/// Fetched sets of both classes after the fetch wave drained.
#[derive(Debug, Default)]
struct FetchedItems {
    issues: ItemSet,
    pulls: ItemSet,
}

impl FetchedItems {
    fn take(&mut self, class: ItemClass) -> ItemSet {
        match class {
            ItemClass::Issue => std::mem::take(&mut self.issues),
            ItemClass::PullRequest => std::mem::take(&mut self.pulls),
        }
    }
}

/// Runs reconciliation for one owner and its two boards.
pub struct Reconciler {
    config: ReconcileConfig,
    collaborators: Collaborators,
}

impl Reconciler {
    /// Build a reconciler; fails with `InvalidConfig` on a bad config.
    pub fn new(config: ReconcileConfig, collaborators: Collaborators) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            collaborators,
        })
    }

    /// Execute one full run.
    pub async fn run(&self) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let run_label = run_id.to_string();
        let span = run_span(&run_label, &self.config.owner);
        span.in_scope(|| emit_run_started(&run_label, &self.config.owner, self.config.dry_run));

        let result = self.reconcile(run_id).instrument(span.clone()).await;
        let _entered = span.enter();
        match result {
            Ok(report) => {
                emit_run_finished(
                    &run_label,
                    report.duration_ms(),
                    report.total_added(),
                    report.total_failed(),
                );
                METRICS.flush();
                Ok(report)
            }
            Err(err) => {
                emit_run_aborted(&run_label, &err);
                METRICS.flush();
                Err(err)
            }
        }
    }

    async fn reconcile(&self, run_id: Uuid) -> Result<RunReport> {
        let started_at = Utc::now();
        let owner = &self.config.owner;

        let repos = self
            .collaborators
            .enumerator
            .list_repositories(owner, self.config.repo_limit)
            .await?;
        info!(repositories = repos.len(), "enumerated repositories");

        let mut fetched = self.fetch_wave(&repos).await?;

        // Every board read completes before the first write.
        let mut reconciled = Vec::with_capacity(ItemClass::ALL.len());
        for class in ItemClass::ALL {
            let board = self.config.board_for(class).clone();
            let tracked = self
                .collaborators
                .reader
                .list_board_items(owner, &board, self.config.board_limit)
                .await?;
            let rec = ClassReconciliation::compute(class, fetched.take(class), tracked);
            emit_class_reconciled(
                class.slug(),
                rec.fetched.len(),
                rec.tracked.len(),
                rec.untracked.len(),
            );
            reconciled.push((rec, board));
        }

        let mut classes = Vec::with_capacity(reconciled.len());
        for (rec, board) in reconciled {
            classes.push(self.write_wave(rec, board).await);
        }

        Ok(RunReport {
            run_id,
            owner: owner.clone(),
            dry_run: self.config.dry_run,
            started_at,
            finished_at: Utc::now(),
            repositories: repos.len(),
            classes,
        })
    }

    /// One task per repository fetching both classes into the shared sets.
    #[instrument(skip_all, fields(repositories = repos.len()))]
    async fn fetch_wave(&self, repos: &[RepoId]) -> Result<FetchedItems> {
        let issues = SharedItemSet::new();
        let pulls = SharedItemSet::new();
        let limit = self.config.item_limit;

        let mut wave = Dispatcher::new("fetch", self.config.max_concurrency);
        for repo in repos.iter().cloned() {
            let fetcher = Arc::clone(&self.collaborators.fetcher);
            let issues = issues.clone();
            let pulls = pulls.clone();
            wave.submit(repo, move |repo| async move {
                let repo_issues = fetcher.fetch_issues(&repo, limit).await?;
                let repo_pulls = fetcher.fetch_pulls(&repo, limit).await?;
                debug!(
                    repo = %repo,
                    issues = repo_issues.len(),
                    pulls = repo_pulls.len(),
                    "fetched open items"
                );
                METRICS.inc_repositories_scanned();
                METRICS.add_items_fetched((repo_issues.len() + repo_pulls.len()) as u64);
                issues.extend(repo_issues);
                pulls.extend(repo_pulls);
                Ok::<_, TriageError>(())
            });
        }

        let report = wave.wait().await;
        if !report.is_clean() {
            let total = report.submitted;
            let summary = report.failure_summary();
            let mut failures = report.failures;
            if failures.len() == 1 {
                if let Some(failure) = failures.pop() {
                    return Err(failure.into_error());
                }
            }
            return Err(TriageError::FetchWaveFailed {
                failed: failures.len(),
                total,
                summary,
            });
        }

        Ok(FetchedItems {
            issues: issues.snapshot(),
            pulls: pulls.snapshot(),
        })
    }

    /// One task per untracked item; failures are recorded, not propagated.
    #[instrument(skip_all, fields(class = rec.class.slug(), board = %board))]
    async fn write_wave(&self, rec: ClassReconciliation, board: BoardHandle) -> ClassReport {
        let mut report = ClassReport {
            class: rec.class,
            board: board.clone(),
            fetched: rec.fetched.len(),
            tracked: rec.tracked.len(),
            untracked: rec.untracked.len(),
            stale: rec.stale_count(),
            added: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
        };

        if self.config.dry_run {
            report.skipped = rec.untracked.sorted();
            return report;
        }

        let mut wave: Dispatcher<ItemRef> = Dispatcher::new(
            format!("write:{}", rec.class.slug()),
            self.config.max_concurrency,
        );
        for url in rec.untracked {
            let writer = Arc::clone(&self.collaborators.writer);
            let owner = self.config.owner.clone();
            let board = board.clone();
            wave.submit(url, move |url| async move {
                writer.add_item(&owner, &board, &url).await?;
                emit_item_added(board.as_str(), url.as_str());
                METRICS.inc_items_added();
                Ok::<_, TriageError>(url)
            });
        }

        let outcome = wave.wait().await;
        report.added = outcome.completed;
        report.added.sort();
        report.failed = outcome
            .failures
            .into_iter()
            .map(|failure| {
                emit_item_failed(board.as_str(), &failure.label, &failure.fault);
                METRICS.inc_write_failures();
                FailedWrite {
                    url: failure.label,
                    error: failure.fault.to_string(),
                }
            })
            .collect();
        report.failed.sort_by(|a, b| a.url.cmp(&b.url));
        report
    }
}
