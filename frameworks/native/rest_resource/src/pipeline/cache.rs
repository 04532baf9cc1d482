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

//! Type-erased entity caches bound to a stage and URL.

use std::sync::Arc;
use std::time::SystemTime;

use cache_core::{Entity, EntityCache};
use log::{debug, error};

use crate::queue::spawn_background;

/// A pipeline stage's cache with its key type hidden.
pub(crate) trait ErasedCache: Send + Sync {
    /// Derives the entry for `url` in `stage`, or `None` if the cache
    /// declines to store that URL.
    fn bind(&self, url: &str, stage: &str) -> Option<Arc<dyn BoundCacheEntry>>;
}

/// One cache entry, with its key already derived.
pub(crate) trait BoundCacheEntry: Send + Sync {
    fn read(&self) -> Option<Entity>;
    fn write(&self, entity: &Entity);
    fn update_timestamp(&self, timestamp: SystemTime);
    fn remove(&self);
}

pub(crate) struct CacheBox<C> {
    cache: Arc<C>,
}

impl<C: EntityCache> CacheBox<C> {
    pub(crate) fn new(cache: Arc<C>) -> Self {
        Self { cache }
    }
}

impl<C: EntityCache> ErasedCache for CacheBox<C> {
    fn bind(&self, url: &str, stage: &str) -> Option<Arc<dyn BoundCacheEntry>> {
        let key = self.cache.key(url, stage)?;
        Some(Arc::new(BoundEntry {
            cache: self.cache.clone(),
            key,
            label: format!("{} {}", stage, url),
        }))
    }
}

struct BoundEntry<C: EntityCache> {
    cache: Arc<C>,
    key: C::Key,
    label: String,
}

impl<C: EntityCache> BoundCacheEntry for BoundEntry<C> {
    fn read(&self) -> Option<Entity> {
        let entity = self.cache.read(&self.key);
        debug!(
            "cache {} for {}",
            if entity.is_some() { "hit" } else { "miss" },
            self.label
        );
        entity
    }

    fn write(&self, entity: &Entity) {
        if let Err(e) = self.cache.write(entity, &self.key) {
            error!("cache write for {} failed: {}", self.label, e);
        }
    }

    fn update_timestamp(&self, timestamp: SystemTime) {
        if let Err(e) = self.cache.update_timestamp(timestamp, &self.key) {
            error!("cache timestamp update for {} failed: {}", self.label, e);
        }
    }

    fn remove(&self) {
        if let Err(e) = self.cache.remove(&self.key) {
            error!("cache remove for {} failed: {}", self.label, e);
        }
    }
}

/// Writes on the background pool without waiting for the result.
pub(crate) fn write_in_background(entry: Arc<dyn BoundCacheEntry>, entity: Entity) {
    spawn_background(move || entry.write(&entity));
}
