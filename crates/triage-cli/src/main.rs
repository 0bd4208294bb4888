//! triage-sync - files untracked issues and pull requests onto tracking boards
//!
//! One invocation is one reconciliation run: list the organization's public
//! repositories, fetch their open issues and pull requests, compare them
//! against the bug board and the pull request board, and add whatever is
//! missing.
//!
//! ## Exit status
//!
//! - `0`: every untracked item was filed (or reported, with `--dry-run`)
//! - `1`: the run aborted before writing (listing, fetch or board read failed)
//! - `2`: the run completed but some items could not be added

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{info, Level};

use triage_core::config::{
    DEFAULT_BOARD_LIMIT, DEFAULT_BUG_BOARD, DEFAULT_ITEM_LIMIT, DEFAULT_OWNER, DEFAULT_PR_BOARD,
    DEFAULT_REPO_LIMIT,
};
use triage_core::{
    default_concurrency, BoardHandle, Collaborators, ReconcileConfig, Reconciler, RunReport,
};
use triage_github::{is_gh_available, GhCli, ProcessExec, RestClient};

/// Where repositories and open items are read from. Boards always go
/// through `gh`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Backend {
    /// `gh repo list`, `gh issue list`, `gh pr list`
    Gh,
    /// GitHub REST API with `GITHUB_TOKEN`
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "triage-sync")]
#[command(author = "Stevedores Org")]
#[command(version = triage_core::VERSION)]
#[command(
    about = "File untracked issues and pull requests onto tracking boards",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,

    /// Organization owning the repositories and the boards
    #[arg(long, env = "TRIAGE_OWNER", default_value = DEFAULT_OWNER)]
    owner: String,

    /// Project number receiving untracked issues
    #[arg(long, env = "TRIAGE_BUG_BOARD", default_value = DEFAULT_BUG_BOARD)]
    bug_board: String,

    /// Project number receiving untracked pull requests
    #[arg(long, env = "TRIAGE_PR_BOARD", default_value = DEFAULT_PR_BOARD)]
    pr_board: String,

    /// Maximum repositories scanned
    #[arg(long, env = "TRIAGE_REPO_LIMIT", default_value_t = DEFAULT_REPO_LIMIT)]
    repo_limit: usize,

    /// Maximum open issues (and pull requests) fetched per repository
    #[arg(long, env = "TRIAGE_ITEM_LIMIT", default_value_t = DEFAULT_ITEM_LIMIT)]
    item_limit: usize,

    /// Maximum entries read from each board
    #[arg(long, env = "TRIAGE_BOARD_LIMIT", default_value_t = DEFAULT_BOARD_LIMIT)]
    board_limit: usize,

    /// Tasks in flight per wave (default: available parallelism)
    #[arg(long, env = "TRIAGE_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Source of repositories and open items
    #[arg(long, env = "TRIAGE_BACKEND", value_enum, default_value_t = Backend::Gh)]
    backend: Backend,

    /// Token for the REST backend
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Kill a `gh` invocation after this many seconds
    #[arg(long, env = "TRIAGE_GH_TIMEOUT_SECS", default_value_t = 120)]
    gh_timeout_secs: u64,

    /// Report untracked items without adding them
    #[arg(long, env = "TRIAGE_DRY_RUN")]
    dry_run: bool,

    /// Format of the run report printed on stdout
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,
}

impl Cli {
    fn config(&self) -> ReconcileConfig {
        ReconcileConfig {
            owner: self.owner.clone(),
            bug_board: BoardHandle::new(self.bug_board.clone()),
            pr_board: BoardHandle::new(self.pr_board.clone()),
            repo_limit: self.repo_limit,
            item_limit: self.item_limit,
            board_limit: self.board_limit,
            max_concurrency: self.concurrency.unwrap_or_else(default_concurrency),
            dry_run: self.dry_run,
        }
    }

    fn collaborators(&self) -> Result<Collaborators> {
        let gh = Arc::new(GhCli::with_exec(
            ProcessExec::new().with_timeout(Duration::from_secs(self.gh_timeout_secs)),
        ));
        match self.backend {
            Backend::Gh => Ok(Collaborators::from_backend(gh)),
            Backend::Rest => {
                if self.github_token.is_none() {
                    bail!("--backend rest needs a token: set GITHUB_TOKEN or pass --github-token");
                }
                let rest = Arc::new(
                    RestClient::new(self.github_token.clone())
                        .context("Failed to build REST client")?,
                );
                Ok(Collaborators {
                    enumerator: rest.clone(),
                    fetcher: rest,
                    reader: gh.clone(),
                    writer: gh,
                })
            }
        }
    }
}

fn print_report(report: &RunReport, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => print!("{}", report.render_summary()),
        ReportFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(report).context("Failed to serialize run report")?
        ),
    }
    Ok(())
}

fn exit_status(report: &RunReport) -> u8 {
    if report.is_clean() {
        0
    } else {
        2
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    triage_core::init_tracing(cli.json, level);

    if !is_gh_available() {
        bail!("gh is not installed or not on PATH; boards are read and written through it");
    }

    let config = cli.config();
    info!(
        owner = %config.owner,
        bug_board = %config.bug_board,
        pr_board = %config.pr_board,
        backend = ?cli.backend,
        concurrency = config.max_concurrency,
        dry_run = config.dry_run,
        "starting triage-sync"
    );

    let reconciler = Reconciler::new(config, cli.collaborators()?)?;
    let report = reconciler.run().await.context("Reconciliation aborted")?;

    print_report(&report, cli.report)?;
    Ok(ExitCode::from(exit_status(&report)))
}
