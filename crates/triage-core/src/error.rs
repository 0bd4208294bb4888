//! Error taxonomy for the reconciliation engine.
//!
//! Read-side kinds (`ListFailure`, `FetchFailure`, `BoardReadFailure`,
//! `DecodeFailure`) abort a run. `WriteFailure` is collected per item and
//! never aborts the write wave.

use crate::model::{ItemClass, RepoId};

/// Errors produced by the reconciliation engine and its collaborators.
#[derive(Debug, thiserror::Error)]
pub enum TriageError {
    #[error("failed to list repositories for {owner}: {detail}")]
    ListFailure { owner: String, detail: String },

    #[error("failed to fetch open {class} for {repo}: {detail}")]
    FetchFailure {
        repo: RepoId,
        class: ItemClass,
        detail: String,
    },

    #[error("failed to read board {board} of {owner}: {detail}")]
    BoardReadFailure {
        owner: String,
        board: String,
        detail: String,
    },

    #[error("failed to add {url} to board {board}: {detail}")]
    WriteFailure {
        board: String,
        url: String,
        detail: String,
    },

    #[error("malformed response from {source_name}: {detail}")]
    DecodeFailure { source_name: String, detail: String },

    #[error("task {label} aborted: {message}")]
    TaskAborted { label: String, message: String },

    #[error("fetch wave failed for {failed} of {total} repositories: {summary}")]
    FetchWaveFailed {
        failed: usize,
        total: usize,
        summary: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, TriageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failure_displays_repo_and_class() {
        let err = TriageError::FetchFailure {
            repo: RepoId::new("kubescape", "a"),
            class: ItemClass::Issue,
            detail: "HTTP 502".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("kubescape/a"));
        assert!(msg.contains("issues"));
        assert!(msg.contains("HTTP 502"));
    }

    #[test]
    fn test_write_failure_names_board_and_url() {
        let err = TriageError::WriteFailure {
            board: "4".to_string(),
            url: "https://github.com/kubescape/a/issues/3".to_string(),
            detail: "forbidden".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("4"));
        assert!(msg.contains("https://github.com/kubescape/a/issues/3"));
        assert!(msg.contains("forbidden"));
    }

    #[test]
    fn test_fetch_wave_failed_reports_counts() {
        let err = TriageError::FetchWaveFailed {
            failed: 2,
            total: 10,
            summary: "kubescape/a: boom".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("2 of 10"));
        assert!(msg.contains("kubescape/a"));
    }
}
