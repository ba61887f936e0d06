use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::model::{ItemId, LearningItem};

/// The set of items under spaced repetition, keyed and ordered by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemRegistry {
    items: BTreeMap<ItemId, LearningItem>,
}

impl ItemRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from persisted records, keyed by each item's own id.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = LearningItem>) -> Self {
        Self {
            items: items
                .into_iter()
                .map(|item| (item.id().clone(), item))
                .collect(),
        }
    }

    /// All tracked items in id order.
    pub fn all_items(&self) -> impl Iterator<Item = &LearningItem> + '_ {
        self.items.values()
    }

    #[must_use]
    pub fn contains(&self, id: &ItemId) -> bool {
        self.items.contains_key(id)
    }

    #[must_use]
    pub fn get(&self, id: &ItemId) -> Option<&LearningItem> {
        self.items.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Track `id` with a default record. Returns `false` if it was already tracked.
    pub fn add_item(&mut self, id: ItemId, now: DateTime<Utc>) -> bool {
        if self.items.contains_key(&id) {
            return false;
        }
        self.items.insert(id.clone(), LearningItem::new(id, now));
        true
    }

    /// Track every id not already present; returns how many were added.
    pub fn add_all_items<I>(&mut self, ids: I, now: DateTime<Utc>) -> usize
    where
        I: IntoIterator,
        I::Item: Into<ItemId>,
    {
        ids.into_iter()
            .map(Into::into)
            .filter(|id| self.add_item(id.clone(), now))
            .count()
    }

    pub fn remove(&mut self, id: &ItemId) -> Option<LearningItem> {
        self.items.remove(id)
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Existing record for `id`, creating a default one first if absent.
    ///
    /// The flag is `true` when the record was created by this call.
    pub(crate) fn get_or_create(&mut self, id: ItemId, now: DateTime<Utc>) -> (&mut LearningItem, bool) {
        let mut created = false;
        let item = self.items.entry(id).or_insert_with_key(|id| {
            created = true;
            LearningItem::new(id.clone(), now)
        });
        (item, created)
    }

    /// Borrow the underlying map, e.g. for building a snapshot.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<ItemId, LearningItem> {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn add_item_is_idempotent() {
        let mut registry = ItemRegistry::new();
        let now = fixed_now();

        assert!(registry.add_item(ItemId::from("w1"), now));
        assert!(!registry.add_item(ItemId::from("w1"), now + chrono::Duration::days(1)));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&ItemId::from("w1")).unwrap().next_review_at(), now);
    }

    #[test]
    fn add_all_items_skips_tracked_ids() {
        let mut registry = ItemRegistry::new();
        let now = fixed_now();
        registry.add_item(ItemId::from(2_u64), now);

        let added = registry.add_all_items([1_u64, 2, 3, 3], now);

        assert_eq!(added, 2);
        let ids: Vec<_> = registry.all_items().map(|item| item.id().clone()).collect();
        assert_eq!(ids, vec![ItemId::from(1_u64), ItemId::from(2_u64), ItemId::from(3_u64)]);
    }

    #[test]
    fn remove_and_clear_drop_records() {
        let mut registry = ItemRegistry::new();
        let now = fixed_now();
        registry.add_all_items(["a", "b"], now);

        assert!(registry.remove(&ItemId::from("a")).is_some());
        assert!(registry.remove(&ItemId::from("a")).is_none());
        assert!(registry.contains(&ItemId::from("b")));

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn from_items_keys_by_item_id() {
        let now = fixed_now();
        let registry = ItemRegistry::from_items(vec![
            LearningItem::new(ItemId::from("z"), now),
            LearningItem::new(ItemId::from("a"), now),
        ]);
        let first = registry.all_items().next().unwrap();
        assert_eq!(first.id(), &ItemId::from("a"));
    }
}
