//! Per-experiment memory of computed assignments.
//!
//! [`AssignmentCache`] is read on every bucketing call and written once per user, so it sits
//! behind a readers-writer lock. Locks are only held for a single map access; hashing happens
//! outside of them.
use std::{collections::HashMap, sync::RwLock};

use crate::Str;

/// `AssignmentCache` maps user ids to the index of the variation they were bucketed into.
///
/// Two threads computing the first assignment for the same user may both insert. Both compute the
/// same variation, so the second insert is a no-op in effect.
#[derive(Debug, Default)]
pub(crate) struct AssignmentCache {
    assignments: RwLock<HashMap<Str, usize>>,
}

impl AssignmentCache {
    pub fn new() -> Self {
        AssignmentCache::default()
    }

    /// Get the cached variation index for `user_id`.
    pub fn get(&self, user_id: &str) -> Option<usize> {
        let assignments = self
            .assignments
            .read()
            .expect("thread holding assignment cache lock should not panic");

        assignments.get(user_id).copied()
    }

    /// Remember `variation` for `user_id`.
    pub fn insert(&self, user_id: Str, variation: usize) {
        let mut assignments = self
            .assignments
            .write()
            .expect("thread holding assignment cache lock should not panic");

        assignments.insert(user_id, variation);
    }

    pub fn len(&self) -> usize {
        self.assignments
            .read()
            .expect("thread holding assignment cache lock should not panic")
            .len()
    }
}
