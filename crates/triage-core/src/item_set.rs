//! Item sets.
//!
//! [`ItemSet`] is a plain set of [`ItemRef`]s. [`SharedItemSet`] is the
//! handle fetch tasks insert through while a wave is running: clones share
//! one set behind a mutex, so concurrent insertion is part of its contract
//! rather than an accident of the container.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::model::ItemRef;

/// An unordered set of item references with no duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemSet {
    items: HashSet<ItemRef>,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `item`, returning `false` if it was already present.
    pub fn insert(&mut self, item: ItemRef) -> bool {
        self.items.insert(item)
    }

    pub fn contains(&self, item: &ItemRef) -> bool {
        self.items.contains(item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemRef> {
        self.items.iter()
    }

    /// Items of `self` that are not in `other`.
    pub fn difference(&self, other: &ItemSet) -> ItemSet {
        self.items
            .iter()
            .filter(|item| !other.contains(item))
            .cloned()
            .collect()
    }

    /// Members in lexical order, for stable output.
    pub fn sorted(&self) -> Vec<ItemRef> {
        let mut items: Vec<ItemRef> = self.items.iter().cloned().collect();
        items.sort();
        items
    }
}

impl FromIterator<ItemRef> for ItemSet {
    fn from_iter<I: IntoIterator<Item = ItemRef>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}

impl Extend<ItemRef> for ItemSet {
    fn extend<I: IntoIterator<Item = ItemRef>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl IntoIterator for ItemSet {
    type Item = ItemRef;
    type IntoIter = std::collections::hash_set::IntoIter<ItemRef>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

/// Cloneable handle to one [`ItemSet`] that many tasks insert into.
///
/// Safe for concurrent insertion from any number of tasks and threads. The
/// lock is never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedItemSet {
    inner: Arc<Mutex<ItemSet>>,
}

impl SharedItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ItemSet> {
        // Every mutation is a single HashSet call; a poisoned set is still valid.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, item: ItemRef) -> bool {
        self.lock().insert(item)
    }

    pub fn extend<I: IntoIterator<Item = ItemRef>>(&self, items: I) {
        self.lock().extend(items);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current contents.
    ///
    /// Only meaningful as a final result after the wave feeding this set has
    /// been drained.
    pub fn snapshot(&self) -> ItemSet {
        self.lock().clone()
    }
}
