use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use parking_lot::Mutex;

/// One hash bucket. A bucket is shared by every directory slot whose index
/// agrees with the bucket's contents on the low `local_depth` bits.
struct Bucket<K, V> {
    local_depth: u32,
    items: HashMap<K, V>,
}

impl<K, V> Bucket<K, V> {
    fn new(local_depth: u32) -> Self {
        Self {
            local_depth,
            items: HashMap::new(),
        }
    }
}

struct TableState<K, V> {
    global_depth: u32,
    num_buckets: usize,
    directory: Vec<Arc<Mutex<Bucket<K, V>>>>,
}

/// Extendible hash table with dynamic bucket splitting. A single mutex
/// guards the directory and, transitively, all buckets; directory slots
/// share bucket storage through `Arc`.
pub struct ExtendibleHashTable<K, V> {
    bucket_max_size: usize,
    state: Mutex<TableState<K, V>>,
}

impl<K, V> ExtendibleHashTable<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a table whose buckets hold at most `bucket_max_size` items
    pub fn new(bucket_max_size: usize) -> Self {
        assert!(bucket_max_size > 0);
        Self {
            bucket_max_size,
            state: Mutex::new(TableState {
                global_depth: 0,
                num_buckets: 1,
                directory: vec![Arc::new(Mutex::new(Bucket::new(0)))],
            }),
        }
    }

    fn hash_key(key: &K) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        hasher.finish()
    }

    fn bucket_index(key: &K, global_depth: u32) -> usize {
        (Self::hash_key(key) & ((1u64 << global_depth) - 1)) as usize
    }

    /// Look up the value associated with `key`
    pub fn find(&self, key: &K) -> Option<V> {
        let state = self.state.lock();
        let index = Self::bucket_index(key, state.global_depth);
        let bucket = state.directory[index].lock();
        bucket.items.get(key).cloned()
    }

    /// Remove `key` from the table. Buckets are never merged back.
    pub fn remove(&self, key: &K) -> bool {
        let state = self.state.lock();
        let index = Self::bucket_index(key, state.global_depth);
        let mut bucket = state.directory[index].lock();
        bucket.items.remove(key).is_some()
    }

    /// Insert `key` -> `value`, replacing any existing entry for an equal
    /// key. Splits the target bucket (doubling the directory when its local
    /// depth has reached the global depth) until there is room.
    pub fn insert(&self, key: K, value: V) {
        let mut state = self.state.lock();

        loop {
            let index = Self::bucket_index(&key, state.global_depth);
            let target = state.directory[index].clone();
            let mut bucket = target.lock();

            if bucket.items.contains_key(&key) || bucket.items.len() < self.bucket_max_size {
                bucket.items.insert(key, value);
                return;
            }

            // Bucket is full: grow the directory if needed, then split.
            if bucket.local_depth == state.global_depth {
                let half = state.directory.len();
                for i in 0..half {
                    let duplicate = state.directory[i].clone();
                    state.directory.push(duplicate);
                }
                state.global_depth += 1;
            }

            let new_depth = bucket.local_depth + 1;
            let zero_bucket = Arc::new(Mutex::new(Bucket::new(new_depth)));
            let one_bucket = Arc::new(Mutex::new(Bucket::new(new_depth)));
            state.num_buckets += 1;

            // Redistribute by the newly discriminating bit
            let mask = 1usize << (new_depth - 1);
            for (k, v) in bucket.items.drain() {
                let item_index = Self::bucket_index(&k, state.global_depth);
                if item_index & mask != 0 {
                    one_bucket.lock().items.insert(k, v);
                } else {
                    zero_bucket.lock().items.insert(k, v);
                }
            }
            drop(bucket);

            for i in 0..state.directory.len() {
                if Arc::ptr_eq(&state.directory[i], &target) {
                    state.directory[i] = if i & mask != 0 {
                        one_bucket.clone()
                    } else {
                        zero_bucket.clone()
                    };
                }
            }
            // Target may still be full for this key; loop and retry
        }
    }

    /// Current global depth of the directory
    pub fn global_depth(&self) -> u32 {
        self.state.lock().global_depth
    }

    /// Local depth of the bucket behind one directory slot
    pub fn local_depth(&self, directory_index: usize) -> u32 {
        let state = self.state.lock();
        let local_depth = state.directory[directory_index].lock().local_depth;
        local_depth
    }

    /// Number of distinct bucket objects
    pub fn num_buckets(&self) -> usize {
        self.state.lock().num_buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_find() {
        let table = ExtendibleHashTable::new(2);
        table.insert(1, "a".to_string());
        table.insert(2, "b".to_string());
        assert_eq!(table.find(&1), Some("a".to_string()));
        assert_eq!(table.find(&2), Some("b".to_string()));
        assert_eq!(table.find(&3), None);
    }

    #[test]
    fn test_overwrite_on_equal_key() {
        let table = ExtendibleHashTable::new(2);
        table.insert(7, 1);
        table.insert(7, 2);
        assert_eq!(table.find(&7), Some(2));
        assert_eq!(table.num_buckets(), 1);
    }

    #[test]
    fn test_split_grows_directory() {
        let table = ExtendibleHashTable::new(2);
        table.insert(1, "a".to_string());
        table.insert(2, "b".to_string());
        table.insert(3, "c".to_string());
        table.insert(4, "d".to_string());

        assert!(table.global_depth() >= 2);
        assert!(table.num_buckets() >= 3);
        assert_eq!(table.find(&3), Some("c".to_string()));
        assert!(table.remove(&2));
        assert_eq!(table.find(&2), None);
    }

    #[test]
    fn test_remove_absent_key() {
        let table: ExtendibleHashTable<i32, i32> = ExtendibleHashTable::new(4);
        assert!(!table.remove(&99));
    }

    #[test]
    fn test_many_inserts_survive_splits() {
        let table = ExtendibleHashTable::new(2);
        for i in 0..256 {
            table.insert(i, i * 10);
        }
        for i in 0..256 {
            assert_eq!(table.find(&i), Some(i * 10), "key {} lost", i);
        }
    }

    #[test]
    fn test_directory_slot_invariant() {
        // every directory slot must point at a bucket whose local depth
        // divides its index class
        let table = ExtendibleHashTable::new(2);
        for i in 0..64 {
            table.insert(i, i);
        }
        let global = table.global_depth();
        for i in 0..(1usize << global) {
            let local = table.local_depth(i);
            assert!(local <= global);
        }
    }

    #[test]
    fn test_concurrent_inserts() {
        use std::sync::Arc;
        use std::thread;

        let table = Arc::new(ExtendibleHashTable::new(4));
        let mut handles = Vec::new();
        for t in 0..4 {
            let table = table.clone();
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    table.insert(t * 1000 + i, i);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        for t in 0..4 {
            for i in 0..100 {
                assert_eq!(table.find(&(t * 1000 + i)), Some(i));
            }
        }
    }
}
