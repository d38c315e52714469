use crate::execute::allocator::Allocator;
use crate::table::{GroupKey, TableBuilder};
use slab::Slab;
use std::collections::HashMap;

/// Holds at most one live builder per group key.
///
/// The cache never flushes on its own; the owning dataset decides when a builder is
/// finalized and removed.
#[derive(Debug)]
pub struct TableBuilderCache {
    alloc: Allocator,
    builders: Slab<TableBuilder>,
    index: HashMap<GroupKey, usize>,
}

impl TableBuilderCache {
    pub fn new(alloc: Allocator) -> TableBuilderCache {
        TableBuilderCache {
            alloc,
            builders: Slab::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the builder for `key`, creating it if needed. The flag is true iff the
    /// builder was created by this call.
    pub fn table_builder(&mut self, key: &GroupKey) -> (&mut TableBuilder, bool) {
        if let Some(&idx) = self.index.get(key) {
            return (&mut self.builders[idx], false);
        }
        let builder = TableBuilder::new(key.clone(), self.alloc.clone());
        let idx = self.builders.insert(builder);
        self.index.insert(key.clone(), idx);
        (&mut self.builders[idx], true)
    }

    pub fn get(&self, key: &GroupKey) -> Option<&TableBuilder> {
        self.index.get(key).map(|&idx| &self.builders[idx])
    }

    pub fn get_mut(&mut self, key: &GroupKey) -> Option<&mut TableBuilder> {
        match self.index.get(key) {
            Some(&idx) => Some(&mut self.builders[idx]),
            None => None,
        }
    }

    pub fn contains(&self, key: &GroupKey) -> bool {
        self.index.contains_key(key)
    }

    /// Removes the builder for `key`, handing ownership to the caller.
    pub fn remove(&mut self, key: &GroupKey) -> Option<TableBuilder> {
        self.index
            .remove(key)
            .map(|idx| self.builders.remove(idx))
    }

    /// Keys of all live builders.
    pub fn keys(&self) -> Vec<GroupKey> {
        self.builders.iter().map(|(_, b)| b.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.builders.clear();
    }
}
