//! Build-once concurrent memoization.
//!
//! Both primitives here share one contract: the first caller to miss pays for the build, the
//! build runs without holding any lock (so builds may recursively consult other entries), the
//! first successfully published value wins a race, every caller observes that same value, and
//! a failed build publishes nothing so the next caller retries.

use std::{hash::Hash, sync::OnceLock};

use dashmap::DashMap;

use crate::Result;

/// A concurrent map from keys to values built at most once per key.
///
/// Entries are never removed.
pub struct Memo<K, V> {
    entries: DashMap<K, V>,
}

impl<K, V> Memo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates an empty memo table
    #[must_use]
    pub fn new() -> Self {
        Memo {
            entries: DashMap::new(),
        }
    }

    /// Returns the value for `key`, building and publishing it with `build` on a miss.
    ///
    /// Concurrent misses on the same key may each run `build`; exactly one result is
    /// published and returned to all of them.
    ///
    /// # Errors
    /// Returns the error of `build`; nothing is cached in that case.
    pub fn get_or_try_insert_with<F>(&self, key: &K, build: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(existing) = self.entries.get(key) {
            return Ok(existing.value().clone());
        }

        let built = build()?;
        let published = self.entries.entry(key.clone()).or_insert(built);
        Ok(published.value().clone())
    }

    /// Returns the cached value for `key` without building
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Returns true if `key` has a published value
    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of published entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been published yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K, V> Default for Memo<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A single value built at most once, e.g. the compiled accessor of one descriptor.
pub struct LazySlot<T> {
    cell: OnceLock<T>,
}

impl<T> LazySlot<T> {
    /// Creates an empty slot
    #[must_use]
    pub const fn new() -> Self {
        LazySlot {
            cell: OnceLock::new(),
        }
    }

    /// Returns the value, building it with `init` if the slot is still empty.
    ///
    /// # Errors
    /// Returns the error of `init`; the slot stays empty and the next call retries.
    pub fn get_or_try_init<F>(&self, init: F) -> Result<&T>
    where
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.cell.get() {
            return Ok(value);
        }

        let value = init()?;
        Ok(self.cell.get_or_init(|| value))
    }

    /// Returns the value if it has been built
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    /// Returns true if the value has been built
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for LazySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    };
    use std::thread;

    #[test]
    fn test_memo_builds_once() {
        let memo: Memo<u32, Arc<String>> = Memo::new();
        let builds = AtomicUsize::new(0);

        let first = memo
            .get_or_try_insert_with(&1, || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("one".to_string()))
            })
            .unwrap();
        let second = memo
            .get_or_try_insert_with(&1, || {
                builds.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new("other".to_string()))
            })
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_memo_failure_not_cached() {
        let memo: Memo<u32, u32> = Memo::new();

        let failed = memo.get_or_try_insert_with(&7, || Err(Error::LockError));
        assert!(failed.is_err());
        assert!(!memo.contains(&7));

        let retried = memo.get_or_try_insert_with(&7, || Ok(49)).unwrap();
        assert_eq!(retried, 49);
    }

    #[test]
    fn test_memo_concurrent_first_access_agrees() {
        let memo: Arc<Memo<u32, Arc<usize>>> = Arc::new(Memo::new());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|index| {
                let memo = memo.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    memo.get_or_try_insert_with(&0, || Ok(Arc::new(index)))
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<Arc<usize>> = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect();
        assert!(results.iter().all(|result| Arc::ptr_eq(result, &results[0])));
    }

    #[test]
    fn test_lazy_slot() {
        let slot: LazySlot<u32> = LazySlot::new();
        assert!(!slot.is_initialized());

        assert!(slot.get_or_try_init(|| Err(Error::LockError)).is_err());
        assert!(slot.get().is_none());

        assert_eq!(*slot.get_or_try_init(|| Ok(5)).unwrap(), 5);
        assert_eq!(*slot.get_or_try_init(|| Ok(6)).unwrap(), 5);
    }
}
