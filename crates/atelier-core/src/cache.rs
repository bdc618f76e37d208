//! Round-scoped entity cache.
//!
//! Merges items from every source (catalog searches, wardrobe) under their
//! identifiers. Registration is additive and first-writer-wins: once an id is
//! present, later records under the same id are ignored for the rest of the
//! round, so provenance never changes after the first sighting.

use std::collections::{BTreeMap, HashMap};

use crate::domain::{Category, Item, ItemId};

/// In-memory item store plus ranked per-category pools.
#[derive(Debug, Clone, Default)]
pub struct EntityCache {
    items: HashMap<ItemId, Item>,
    /// Search results per category, in ranking order.
    ranked: BTreeMap<Category, Vec<ItemId>>,
    /// Wardrobe entries, in fetch order.
    wardrobe: Vec<ItemId>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one record. Returns `false` when the id was already known.
    pub fn register(&mut self, item: Item) -> bool {
        if self.items.contains_key(&item.id) {
            return false;
        }
        self.items.insert(item.id.clone(), item);
        true
    }

    /// Register search results for `category`, appending them to that
    /// category's ranked pool. Returns how many ids were new to the cache.
    pub fn register_ranked(&mut self, category: Category, items: Vec<Item>) -> usize {
        let mut added = 0;
        for item in items {
            let id = item.id.clone();
            if self.register(item) {
                added += 1;
            }
            let pool = self.ranked.entry(category).or_default();
            if !pool.contains(&id) {
                pool.push(id);
            }
        }
        added
    }

    /// Register wardrobe entries. Returns how many ids were new to the cache.
    pub fn register_wardrobe(&mut self, items: Vec<Item>) -> usize {
        let mut added = 0;
        for item in items {
            let id = item.id.clone();
            if self.register(item) {
                added += 1;
            }
            if !self.wardrobe.contains(&id) {
                self.wardrobe.push(id);
            }
        }
        added
    }

    /// The first-registered record for `id`.
    pub fn resolve(&self, id: &ItemId) -> Option<&Item> {
        self.items.get(id)
    }

    /// Ranked search results for `category`, skipping ids whose cached record
    /// belongs to another category.
    pub fn ranked(&self, category: Category) -> Vec<&Item> {
        self.ranked
            .get(&category)
            .into_iter()
            .flatten()
            .filter_map(|id| self.items.get(id))
            .filter(|item| item.category == category)
            .collect()
    }

    /// Wardrobe entries of `category`, in fetch order.
    pub fn wardrobe(&self, category: Category) -> Vec<&Item> {
        self.wardrobe
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|item| item.category == category)
            .collect()
    }

    /// First-ranked item for `category`, falling back to the wardrobe when no
    /// search produced one.
    pub fn first_ranked(&self, category: Category) -> Option<&Item> {
        self.ranked(category)
            .into_iter()
            .next()
            .or_else(|| self.wardrobe(category).into_iter().next())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn wardrobe_len(&self) -> usize {
        self.wardrobe.len()
    }
}
