//! triage-sync core library
//!
//! Reconciles the open issues and pull requests of an organization against
//! two tracking boards and files every untracked item on its board.
//!
//! ## Flow
//!
//! 1. [`RepositoryEnumerator`] lists the repositories to scan.
//! 2. A fetch wave on a [`Dispatcher`] pulls open issue and pull request
//!    URLs of every repository into two [`SharedItemSet`]s.
//! 3. [`BoardReader`] returns what each board already tracks.
//! 4. [`reconcile::untracked`] diffs fetched against tracked, per class.
//! 5. A write wave per class hands each untracked URL to [`BoardWriter`].
//!
//! [`Reconciler`] sequences the steps and returns a [`RunReport`].

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fakes;
pub mod item_set;
pub mod metrics;
pub mod model;
pub mod obs;
pub mod orchestrator;
pub mod reconcile;
pub mod report;
pub mod source;
pub mod telemetry;

pub use config::ReconcileConfig;
pub use dispatcher::{default_concurrency, Dispatcher, TaskFailure, TaskFault, WaveReport};
pub use error::{Result, TriageError};
pub use item_set::{ItemSet, SharedItemSet};
pub use metrics::METRICS;
pub use model::{BoardHandle, ItemClass, ItemRef, RepoId};
pub use orchestrator::{Collaborators, Reconciler};
pub use reconcile::{untracked, ClassReconciliation};
pub use report::{ClassReport, FailedWrite, RunReport};
pub use source::{BoardReader, BoardWriter, ItemFetcher, RepositoryEnumerator};
pub use telemetry::init_tracing;

/// triage-sync version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
