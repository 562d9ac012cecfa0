//! Tag-invalidated cache for records read through the storage collaborator.
//!
//! Entries are stored in a `moka` cache; a side index maps each tag to the keys
//! stored under it so that a write can drop everything it affects at once.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use moka::sync::Cache;

pub struct TagCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    entries: Cache<String, V>,
    tags: Mutex<HashMap<String, HashSet<String>>>,
}

impl<V> TagCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::new(capacity),
            tags: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.entries.get(key)
    }

    pub fn set(&self, key: impl Into<String>, value: V, tags: &[&str]) {
        let key = key.into();
        if let Ok(mut index) = self.tags.lock() {
            for tag in tags {
                index
                    .entry((*tag).to_string())
                    .or_default()
                    .insert(key.clone());
            }
        }
        self.entries.insert(key, value);
    }

    /// Drop every entry stored under any of `tags`.
    pub fn invalidate(&self, tags: &[&str]) {
        let keys: Vec<String> = match self.tags.lock() {
            Ok(mut index) => tags
                .iter()
                .filter_map(|tag| index.remove(*tag))
                .flatten()
                .collect(),
            // A poisoned index can no longer say which keys a tag covers.
            Err(_) => {
                self.entries.invalidate_all();
                return;
            }
        };
        for key in keys {
            self.entries.invalidate(&key);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut index) = self.tags.lock() {
            index.clear();
        }
        self.entries.invalidate_all();
    }
}
