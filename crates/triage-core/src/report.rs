//! Run report: what was fetched, tracked, and filed.
//!
//! `RunReport` is serialisable for machine consumers and renders a short
//! console summary via [`RunReport::render_summary`]. Neither form carries a
//! compatibility contract.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::model::{BoardHandle, ItemClass, ItemRef};

/// An item that could not be added to its board.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedWrite {
    pub url: String,
    pub error: String,
}

/// Outcome for one item class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub class: ItemClass,
    pub board: BoardHandle,
    pub fetched: usize,
    pub tracked: usize,
    pub untracked: usize,
    /// Tracked board entries with no matching open item.
    pub stale: usize,
    /// Items added to the board, sorted.
    pub added: Vec<ItemRef>,
    /// Items that failed to be added, sorted by URL.
    pub failed: Vec<FailedWrite>,
    /// Untracked items left alone because the run was a dry run, sorted.
    pub skipped: Vec<ItemRef>,
}

impl ClassReport {
    /// Items handed to the board writer, successful or not.
    pub fn processed(&self) -> usize {
        self.added.len() + self.failed.len()
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub owner: String,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub repositories: usize,
    pub classes: Vec<ClassReport>,
}

impl RunReport {
    pub fn class(&self, class: ItemClass) -> Option<&ClassReport> {
        self.classes.iter().find(|c| c.class == class)
    }

    pub fn total_added(&self) -> usize {
        self.classes.iter().map(|c| c.added.len()).sum()
    }

    pub fn total_failed(&self) -> usize {
        self.classes.iter().map(|c| c.failed.len()).sum()
    }

    /// `true` when every attempted write succeeded.
    pub fn is_clean(&self) -> bool {
        self.total_failed() == 0
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Human-readable summary for the console.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!(
            "Reconciled {} repositories of {}{}\n",
            self.repositories,
            self.owner,
            if self.dry_run { " (dry run)" } else { "" }
        ));
        for class in &self.classes {
            out.push_str(&format!(
                "  {:<14} fetched {:>5}  tracked {:>5}  untracked {:>5}  added {:>5}  failed {:>5}  (board {})\n",
                class.class.as_str(),
                class.fetched,
                class.tracked,
                class.untracked,
                class.added.len(),
                class.failed.len(),
                class.board,
            ));
            for failed in &class.failed {
                out.push_str(&format!("    failed {}: {}\n", failed.url, failed.error));
            }
            for skipped in &class.skipped {
                out.push_str(&format!("    would add {skipped}\n"));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_report(class: ItemClass, added: &[&str], failed: &[&str]) -> ClassReport {
        ClassReport {
            class,
            board: BoardHandle::new("4"),
            fetched: 10,
            tracked: 7,
            untracked: added.len() + failed.len(),
            stale: 0,
            added: added.iter().map(|u| ItemRef::from(*u)).collect(),
            failed: failed
                .iter()
                .map(|u| FailedWrite {
                    url: u.to_string(),
                    error: "forbidden".to_string(),
                })
                .collect(),
            skipped: vec![],
        }
    }

    fn report(classes: Vec<ClassReport>) -> RunReport {
        let now = Utc::now();
        RunReport {
            run_id: Uuid::new_v4(),
            owner: "kubescape".to_string(),
            dry_run: false,
            started_at: now,
            finished_at: now,
            repositories: 3,
            classes,
        }
    }

    #[test]
    fn test_totals() {
        let report = report(vec![
            class_report(ItemClass::Issue, &["u1", "u2"], &["u3"]),
            class_report(ItemClass::PullRequest, &["p1"], &[]),
        ]);
        assert_eq!(report.total_added(), 3);
        assert_eq!(report.total_failed(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.class(ItemClass::Issue).unwrap().processed(), 3);
    }

    #[test]
    fn test_summary_lists_failures() {
        let report = report(vec![class_report(ItemClass::Issue, &["u1"], &["u3"])]);
        let summary = report.render_summary();
        assert!(summary.contains("Reconciled 3 repositories of kubescape"));
        assert!(summary.contains("failed u3: forbidden"));
    }

    #[test]
    fn test_report_serializes() {
        let report = report(vec![class_report(ItemClass::PullRequest, &["p1"], &[])]);
        let json = serde_json::to_value(&report).expect("serialize");
        assert_eq!(json["owner"], "kubescape");
        assert_eq!(json["classes"][0]["class"], "pull_request");
        assert_eq!(json["classes"][0]["added"][0], "p1");
    }
}
