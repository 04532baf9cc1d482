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

//! RAM-based entity cache.
//!
//! Keeps entities in an LRU map bounded by entry count. Entries beyond the
//! capacity are evicted least recently used first.

use std::io;
use std::sync::Mutex;
use std::time::SystemTime;

use log::{debug, info};
use request_utils::cache_key::CacheKey;
use request_utils::lru::LRUCache;

use crate::{Entity, EntityCache};

/// Default maximum number of entities held in memory.
const DEFAULT_RAM_CACHE_CAPACITY: usize = 256;

/// Thread-safe in-memory [`EntityCache`].
///
/// # Examples
///
/// ```rust
/// use cache_core::{Content, Entity, EntityCache, RamCache};
/// use std::time::SystemTime;
///
/// let cache = RamCache::with_capacity(8);
/// let key = cache.key("https://example.com/a", "model").unwrap();
/// let entity = Entity::new(Content::new(42u32), "application/x-count", SystemTime::now());
/// cache.write(&entity, &key).unwrap();
/// assert_eq!(cache.read(&key).unwrap().typed_content::<u32>(), Some(&42));
/// ```
pub struct RamCache {
    entries: Mutex<LRUCache<CacheKey, Entity>>,
    capacity: Mutex<usize>,
}

impl RamCache {
    /// Creates a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RAM_CACHE_CAPACITY)
    }

    /// Creates a cache holding at most `capacity` entities.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(LRUCache::new()),
            capacity: Mutex::new(capacity),
        }
    }

    /// Changes the capacity, evicting entries that no longer fit.
    pub fn set_capacity(&self, capacity: usize) {
        info!("set ram cache capacity to {}", capacity);
        *self.capacity.lock().unwrap() = capacity;
        self.evict();
    }

    /// Number of entities currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Returns `true` if no entity is held.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// Returns `true` if an entity is held for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.lock().unwrap().contains_key(key)
    }

    /// Drops every entity.
    pub fn clear(&self) {
        // Entities are dropped after the lock is released.
        let mut evicted = Vec::new();
        {
            let mut entries = self.entries.lock().unwrap();
            while let Some(entity) = entries.pop() {
                evicted.push(entity);
            }
        }
        info!("clear ram cache, {} entries", evicted.len());
    }

    fn evict(&self) {
        let capacity = *self.capacity.lock().unwrap();
        let mut evicted = Vec::new();
        {
            let mut entries = self.entries.lock().unwrap();
            while entries.len() > capacity {
                match entries.pop() {
                    Some(entity) => evicted.push(entity),
                    None => break,
                }
            }
        }
        if !evicted.is_empty() {
            debug!("ram cache evicted {} entries", evicted.len());
        }
    }
}

impl EntityCache for RamCache {
    type Key = CacheKey;

    fn key(&self, url: &str, stage: &str) -> Option<CacheKey> {
        Some(CacheKey::from_url(url, stage))
    }

    fn read(&self, key: &CacheKey) -> Option<Entity> {
        let entity = self.entries.lock().unwrap().get(key).cloned();
        debug!(
            "ram cache {} {}",
            key.brief(),
            if entity.is_some() { "hit" } else { "miss" }
        );
        entity
    }

    fn write(&self, entity: &Entity, key: &CacheKey) -> io::Result<()> {
        if *self.capacity.lock().unwrap() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "ram cache capacity is zero",
            ));
        }
        self.entries
            .lock()
            .unwrap()
            .insert(key.clone(), entity.clone());
        self.evict();
        Ok(())
    }

    fn update_timestamp(&self, timestamp: SystemTime, key: &CacheKey) -> io::Result<()> {
        if let Some(entity) = self.entries.lock().unwrap().get_mut(key) {
            entity.touch(timestamp);
        }
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> io::Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
