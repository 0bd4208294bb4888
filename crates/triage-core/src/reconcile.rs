//! Reconciliation: which open items are not on their board yet.

use serde::Serialize;

use crate::item_set::ItemSet;
use crate::model::ItemClass;

/// Items in `fetched` that do not appear in `tracked`.
///
/// Deterministic as a set; the iteration order of the result is not.
pub fn untracked(fetched: &ItemSet, tracked: &ItemSet) -> ItemSet {
    fetched.difference(tracked)
}

/// Fetched, tracked and untracked sets of a single item class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassReconciliation {
    pub class: ItemClass,
    pub fetched: ItemSet,
    pub tracked: ItemSet,
    pub untracked: ItemSet,
}

impl ClassReconciliation {
    /// Reconcile one class. Both sets must be complete: the fetch wave
    /// drained and the board read returned.
    pub fn compute(class: ItemClass, fetched: ItemSet, tracked: ItemSet) -> Self {
        let untracked = untracked(&fetched, &tracked);
        Self {
            class,
            fetched,
            tracked,
            untracked,
        }
    }

    /// Board entries that no longer correspond to a fetched open item
    /// (closed, merged, or from repositories outside the scan).
    pub fn stale_count(&self) -> usize {
        self.tracked.difference(&self.fetched).len()
    }
}
