use std::hash::Hash;
use linked_hash_map::LinkedHashMap;
use parking_lot::Mutex;

/// LRU replacement policy over an arbitrary value type. Insertion promotes
/// to most-recently-used; `victim` evicts the least-recently-used entry.
/// The linked hash map gives O(1) removal by value.
pub struct LruReplacer<T: Hash + Eq + Clone> {
    entries: Mutex<LinkedHashMap<T, ()>>,
}

impl<T: Hash + Eq + Clone> LruReplacer<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(LinkedHashMap::new()),
        }
    }

    /// Record `value` as most recently used, removing any prior occurrence
    pub fn insert(&self, value: T) {
        let mut entries = self.entries.lock();
        entries.remove(&value);
        entries.insert(value, ());
    }

    /// Remove and return the least recently used value, if any
    pub fn victim(&self) -> Option<T> {
        self.entries.lock().pop_front().map(|(value, _)| value)
    }

    /// Remove `value`; returns whether it was present
    pub fn erase(&self, value: &T) -> bool {
        self.entries.lock().remove(value).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<T: Hash + Eq + Clone> Default for LruReplacer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_victim_order() {
        let replacer = LruReplacer::new();
        for i in 1..=5 {
            replacer.insert(i);
        }
        assert_eq!(replacer.victim(), Some(1));

        replacer.insert(1);
        assert!(replacer.erase(&3));
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.len(), 3);
    }

    #[test]
    fn test_reinsert_promotes() {
        let replacer = LruReplacer::new();
        replacer.insert(1);
        replacer.insert(2);
        replacer.insert(1);
        assert_eq!(replacer.victim(), Some(2));
        assert_eq!(replacer.victim(), Some(1));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_erase_absent() {
        let replacer: LruReplacer<u32> = LruReplacer::new();
        assert!(!replacer.erase(&10));
        assert!(replacer.is_empty());
    }
}
