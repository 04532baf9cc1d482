// Copyright (C) 2024 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Least Recently Used (LRU) map implementation.
//!
//! Entries are stamped with a monotonically increasing access tick. A hash
//! map gives O(1) lookups and a `BTreeMap` ordered by tick gives O(log n)
//! eviction of the least recently used entry, without unsafe pointer
//! juggling.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// A Least Recently Used (LRU) map.
///
/// Accessing or inserting an entry marks it most recently used. The map does
/// not enforce a capacity itself; owners evict with [`LRUCache::pop`] when
/// their own budget is exceeded.
///
/// # Examples
///
/// ```rust
/// use request_utils::lru::LRUCache;
///
/// let mut cache = LRUCache::new();
/// cache.insert("key1", "value1");
/// cache.insert("key2", "value2");
///
/// // Access an item (moves it to most recently used)
/// assert_eq!(cache.get(&"key1"), Some(&"value1"));
///
/// // Remove the least recently used item
/// assert_eq!(cache.pop(), Some("value2"));
/// assert_eq!(cache.remove(&"key1"), Some("value1"));
/// assert!(cache.is_empty());
/// ```
pub struct LRUCache<K, V> {
    /// Map from keys to values and their last access tick.
    map: HashMap<K, (V, u64)>,
    /// Access order, oldest tick first.
    order: BTreeMap<u64, K>,
    /// Next tick to hand out.
    tick: u64,
}

impl<K: Hash + Eq + Clone, V> LRUCache<K, V> {
    /// Creates a new empty LRU map.
    pub fn new() -> Self {
        LRUCache {
            map: HashMap::new(),
            order: BTreeMap::new(),
            tick: 0,
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn touch(&mut self, key: &K) -> bool {
        let tick = self.next_tick();
        match self.map.get_mut(key) {
            Some(entry) => {
                self.order.remove(&entry.1);
                entry.1 = tick;
                self.order.insert(tick, key.clone());
                true
            }
            None => false,
        }
    }

    /// Returns a reference to the value for `key`, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.touch(key) {
            return None;
        }
        self.map.get(key).map(|(value, _)| value)
    }

    /// Returns a mutable reference to the value for `key`, marking it most
    /// recently used.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if !self.touch(key) {
            return None;
        }
        self.map.get_mut(key).map(|(value, _)| value)
    }

    /// Returns a reference to the value for `key` without changing its
    /// position.
    pub fn peek(&self, key: &K) -> Option<&V> {
        self.map.get(key).map(|(value, _)| value)
    }

    /// Inserts a key-value pair, marking it most recently used.
    ///
    /// Returns the previous value if the key existed.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        let tick = self.next_tick();
        let previous = self.map.insert(key.clone(), (value, tick));
        if let Some((_, old_tick)) = previous.as_ref() {
            self.order.remove(old_tick);
        }
        self.order.insert(tick, key);
        previous.map(|(value, _)| value)
    }

    /// Removes and returns the least recently used value.
    pub fn pop(&mut self) -> Option<V> {
        let (_, key) = self.order.pop_first()?;
        self.map.remove(&key).map(|(value, _)| value)
    }

    /// Removes the value for `key`, returning it if present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (value, tick) = self.map.remove(key)?;
        self.order.remove(&tick);
        Some(value)
    }

    /// Returns `true` if the map contains `key`. Does not change its position.
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Returns `true` if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Iterates over keys from least to most recently used.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.values()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.map.clear();
        self.order.clear();
    }
}
