//! Per-user index of items already seen.

use crate::types::{InteractionRecord, ItemId, UserId};
use std::collections::{BTreeSet, HashMap};

static NO_ITEMS: BTreeSet<ItemId> = BTreeSet::new();

/// Which items each user has already rated or consumed.
///
/// Built once from interaction records and never mutated afterwards; the
/// service replaces the whole index when it needs fresher data.
#[derive(Debug, Clone, Default)]
pub struct InteractionIndex {
    seen: HashMap<UserId, BTreeSet<ItemId>>,
    records: usize,
}

impl InteractionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a InteractionRecord>,
    {
        let mut index = Self::new();
        for record in records {
            index.insert(record.user_id, record.item_id);
        }
        index
    }

    /// Record that `user_id` has seen `item_id`
    pub fn insert(&mut self, user_id: UserId, item_id: ItemId) {
        self.seen.entry(user_id).or_default().insert(item_id);
        self.records += 1;
    }

    /// Items already seen by `user_id`; empty for users with no history
    pub fn seen_items(&self, user_id: UserId) -> &BTreeSet<ItemId> {
        self.seen.get(&user_id).unwrap_or(&NO_ITEMS)
    }

    pub fn has_seen(&self, user_id: UserId, item_id: ItemId) -> bool {
        self.seen_items(user_id).contains(&item_id)
    }

    /// Number of distinct items `user_id` has interacted with
    pub fn interaction_count(&self, user_id: UserId) -> usize {
        self.seen_items(user_id).len()
    }

    /// Number of users with at least one interaction
    pub fn user_count(&self) -> usize {
        self.seen.len()
    }

    /// Number of records the index was built from (duplicates included)
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }
}
