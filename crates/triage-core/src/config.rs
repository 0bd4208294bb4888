//! Run configuration.

use serde::{Deserialize, Serialize};

use crate::dispatcher::default_concurrency;
use crate::error::{Result, TriageError};
use crate::model::{BoardHandle, ItemClass};

/// Default organization scanned.
pub const DEFAULT_OWNER: &str = "kubescape";
/// Default project number of the bug board.
pub const DEFAULT_BUG_BOARD: &str = "4";
/// Default project number of the pull request board.
pub const DEFAULT_PR_BOARD: &str = "5";
pub const DEFAULT_REPO_LIMIT: usize = 1000;
pub const DEFAULT_ITEM_LIMIT: usize = 1000;
pub const DEFAULT_BOARD_LIMIT: usize = 10_000;

/// Everything a reconciliation run needs to know up front.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Organization (or user) owning both the repositories and the boards.
    pub owner: String,
    /// Board receiving untracked issues.
    pub bug_board: BoardHandle,
    /// Board receiving untracked pull requests.
    pub pr_board: BoardHandle,
    /// Maximum repositories enumerated.
    pub repo_limit: usize,
    /// Maximum open items fetched per repository and class. Items beyond
    /// the limit are not seen by the run.
    pub item_limit: usize,
    /// Maximum entries read from each board.
    pub board_limit: usize,
    /// Tasks running at once in each wave.
    pub max_concurrency: usize,
    /// Compute and report untracked items without writing to any board.
    pub dry_run: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            owner: DEFAULT_OWNER.to_string(),
            bug_board: BoardHandle::new(DEFAULT_BUG_BOARD),
            pr_board: BoardHandle::new(DEFAULT_PR_BOARD),
            repo_limit: DEFAULT_REPO_LIMIT,
            item_limit: DEFAULT_ITEM_LIMIT,
            board_limit: DEFAULT_BOARD_LIMIT,
            max_concurrency: default_concurrency(),
            dry_run: false,
        }
    }
}

impl ReconcileConfig {
    /// The board an item class is filed on.
    pub fn board_for(&self, class: ItemClass) -> &BoardHandle {
        match class {
            ItemClass::Issue => &self.bug_board,
            ItemClass::PullRequest => &self.pr_board,
        }
    }

    /// Reject configurations that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(TriageError::InvalidConfig("owner must not be empty".to_string()));
        }
        if self.bug_board.as_str().trim().is_empty() || self.pr_board.as_str().trim().is_empty()
        {
            return Err(TriageError::InvalidConfig(
                "board handles must not be empty".to_string(),
            ));
        }
        if self.bug_board == self.pr_board {
            return Err(TriageError::InvalidConfig(format!(
                "bug board and pull request board are both '{}'",
                self.bug_board
            )));
        }
        for (name, value) in [
            ("repo_limit", self.repo_limit),
            ("item_limit", self.item_limit),
            ("board_limit", self.board_limit),
            ("max_concurrency", self.max_concurrency),
        ] {
            if value == 0 {
                return Err(TriageError::InvalidConfig(format!(
                    "{name} must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReconcileConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.owner, "kubescape");
        assert_eq!(config.board_for(ItemClass::Issue).as_str(), "4");
        assert_eq!(config.board_for(ItemClass::PullRequest).as_str(), "5");
        assert!(config.max_concurrency >= 1);
    }

    #[test]
    fn test_validate_rejects_empty_owner() {
        let config = ReconcileConfig {
            owner: "  ".to_string(),
            ..ReconcileConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TriageError::InvalidConfig(msg)) if msg.contains("owner")
        ));
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = ReconcileConfig {
            item_limit: 0,
            ..ReconcileConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("item_limit"));

        let config = ReconcileConfig {
            max_concurrency: 0,
            ..ReconcileConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_shared_board() {
        let config = ReconcileConfig {
            pr_board: BoardHandle::new("4"),
            ..ReconcileConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
