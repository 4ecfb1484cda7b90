use dashmap::DashMap;
use std::{hash::Hash, sync::Arc};

#[derive(Clone, Debug)]
pub struct MemoryCache<K: Eq + Hash, V: Clone> {
    cache: Arc<DashMap<K, V>>,
}

impl<K: Eq + Hash, V: Clone + Default> MemoryCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Arc::new(DashMap::with_capacity(capacity)),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.cache.get(key).map(|value| value.value().clone())
    }

    /// Applies `f` to the entry for `key` (default-initialised when missing) while
    /// holding the shard lock, and returns the updated value.
    pub fn update<F>(&self, key: K, f: F) -> V
    where
        F: FnOnce(&mut V),
    {
        let mut entry = self.cache.entry(key).or_default();
        f(entry.value_mut());
        entry.value().clone()
    }

    /// Keeps only the entries for which `keep` returns true. Returns how many were removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let before = self.cache.len();
        self.cache.retain(|key, value| keep(key, value));
        before.saturating_sub(self.cache.len())
    }
}
