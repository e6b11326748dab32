use std::{collections::HashMap, hash::Hash, sync::Arc};

use parking_lot::RwLock;

/// Thread-safe cache of handles keyed by a stable name, shared with loader
/// threads.
///
/// Insertion happens at most once per key: a second create for the same key
/// is a cache hit and never runs its constructor.
#[derive(Debug)]
pub struct HandleRegistry<K, V> {
    entries: Arc<RwLock<HashMap<K, V>>>,
}

impl<K, V> Clone for HandleRegistry<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K, V> Default for HandleRegistry<K, V> {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl<K, V> HandleRegistry<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// Returns the cached value for `key`, or runs `create` and caches its
    /// result. Errors are returned without caching anything.
    ///
    /// The write lock is held while `create` runs, so racing callers wait
    /// for the winner instead of creating duplicates.
    pub fn get_or_try_insert_with<F, E>(&self, key: K, create: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let mut guard = self.entries.write();
        if let Some(value) = guard.get(&key) {
            return Ok(value.clone());
        }
        let value = create()?;
        guard.insert(key, value.clone());
        Ok(value)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.entries.write().remove(key)
    }

    /// Drops every entry whose value matches `predicate`.
    pub fn retain<F>(&self, mut predicate: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        self.entries.write().retain(|key, value| predicate(key, value));
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };

    use super::*;

    #[test]
    fn second_create_is_a_cache_hit() {
        let registry = HandleRegistry::new();
        let first: Result<u32, ()> = registry.get_or_try_insert_with("terrain", || Ok(7));
        let second: Result<u32, ()> = registry.get_or_try_insert_with("terrain", || Ok(9));
        assert_eq!(first, Ok(7));
        assert_eq!(second, Ok(7));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_create_caches_nothing() {
        let registry: HandleRegistry<&str, u32> = HandleRegistry::new();
        let failed = registry.get_or_try_insert_with("sky", || Err("no device"));
        assert_eq!(failed, Err("no device"));
        assert!(registry.is_empty());
        assert_eq!(
            registry.get_or_try_insert_with::<_, &str>("sky", || Ok(3)),
            Ok(3)
        );
    }

    #[test]
    fn remove_and_retain() {
        let registry = HandleRegistry::new();
        for (key, value) in [("a", 1u32), ("b", 2), ("c", 3)] {
            registry
                .get_or_try_insert_with::<_, ()>(key, || Ok(value))
                .unwrap();
        }
        assert_eq!(registry.remove(&"a"), Some(1));
        assert_eq!(registry.get(&"a"), None);
        registry.retain(|_, value| *value != 3);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&"b"), Some(2));
    }

    #[test]
    fn concurrent_creates_run_once() {
        let registry: HandleRegistry<String, usize> = HandleRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                let calls = Arc::clone(&calls);
                thread::spawn(move || {
                    registry
                        .get_or_try_insert_with::<_, ()>("shared".to_string(), || {
                            Ok(calls.fetch_add(1, Ordering::SeqCst) + 100)
                        })
                        .unwrap()
                })
            })
            .collect();

        for worker in workers {
            assert_eq!(worker.join().unwrap(), 100);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
