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

use std::sync::Arc;
use std::thread;
use std::time::{Duration, UNIX_EPOCH};

use request_utils::test::log::init;

use super::*;
use crate::Content;

const TEST_URL: &str = "https://example.com/users/1";

fn entity(text: &str) -> Entity {
    Entity::new(Content::new(text.to_string()), "text/plain", UNIX_EPOCH)
}

// @tc.name: ut_ram_cache_write_read
// @tc.desc: Test round trip of an entity through the RAM cache
// @tc.precon: NA
// @tc.step: 1. Derive a key and write an entity
//           2. Read it back
// @tc.expect: The same content is returned and the entry is counted
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_ram_cache_write_read() {
    init();
    let cache = RamCache::new();
    let key = cache.key(TEST_URL, "model").unwrap();
    assert!(cache.read(&key).is_none());
    cache.write(&entity("cached"), &key).unwrap();
    assert!(cache.contains(&key));
    assert_eq!(1, cache.len());
    let read = cache.read(&key).unwrap();
    assert_eq!(read.typed_content::<String>(), Some(&"cached".to_string()));
}

// @tc.name: ut_ram_cache_stage_isolation
// @tc.desc: Test stages do not share entries for the same URL
// @tc.precon: NA
// @tc.step: 1. Write an entity under the parsing stage
//           2. Read under the model stage
// @tc.expect: The model stage misses
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_ram_cache_stage_isolation() {
    init();
    let cache = RamCache::new();
    let parsing = cache.key(TEST_URL, "parsing").unwrap();
    let model = cache.key(TEST_URL, "model").unwrap();
    cache.write(&entity("parsed"), &parsing).unwrap();
    assert!(cache.read(&model).is_none());
}

// @tc.name: ut_ram_cache_eviction
// @tc.desc: Test least recently used entries are evicted past capacity
// @tc.precon: NA
// @tc.step: 1. Create a cache with capacity 2
//           2. Write a and b, read a, write c
// @tc.expect: b is evicted, a and c remain; shrinking to 1 keeps c
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_ram_cache_eviction() {
    init();
    let cache = RamCache::with_capacity(2);
    let a = cache.key("https://example.com/a", "model").unwrap();
    let b = cache.key("https://example.com/b", "model").unwrap();
    let c = cache.key("https://example.com/c", "model").unwrap();
    cache.write(&entity("a"), &a).unwrap();
    cache.write(&entity("b"), &b).unwrap();
    assert!(cache.read(&a).is_some());
    cache.write(&entity("c"), &c).unwrap();
    assert!(cache.contains(&a));
    assert!(!cache.contains(&b));
    assert!(cache.contains(&c));

    cache.set_capacity(1);
    assert_eq!(1, cache.len());
    assert!(cache.contains(&c));
}

// @tc.name: ut_ram_cache_zero_capacity
// @tc.desc: Test writes fail when the cache has no capacity
// @tc.precon: NA
// @tc.step: 1. Create a cache with capacity 0
//           2. Write an entity
// @tc.expect: Write returns an error and nothing is stored
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_ram_cache_zero_capacity() {
    init();
    let cache = RamCache::with_capacity(0);
    let key = cache.key(TEST_URL, "model").unwrap();
    assert!(cache.write(&entity("x"), &key).is_err());
    assert!(cache.is_empty());
}

// @tc.name: ut_ram_cache_update_timestamp_and_remove
// @tc.desc: Test timestamp refresh and removal
// @tc.precon: NA
// @tc.step: 1. Write an entity at the epoch
//           2. Update its timestamp, then remove it
// @tc.expect: The timestamp advances; after removal reads miss
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_ram_cache_update_timestamp_and_remove() {
    init();
    let cache = RamCache::new();
    let key = cache.key(TEST_URL, "model").unwrap();
    cache.write(&entity("x"), &key).unwrap();
    let later = UNIX_EPOCH + Duration::from_secs(60);
    cache.update_timestamp(later, &key).unwrap();
    assert_eq!(cache.read(&key).unwrap().timestamp(), later);
    cache.remove(&key).unwrap();
    assert!(cache.read(&key).is_none());
    cache.clear();
    assert!(cache.is_empty());
}

// @tc.name: ut_ram_cache_concurrent_writes
// @tc.desc: Test the cache is safe to use from several threads
// @tc.precon: NA
// @tc.step: 1. Spawn four threads writing distinct keys
//           2. Join them
// @tc.expect: Every entry is present
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_ram_cache_concurrent_writes() {
    init();
    let cache = Arc::new(RamCache::new());
    let handles = (0..4)
        .map(|i| {
            let cache = cache.clone();
            thread::spawn(move || {
                for j in 0..10 {
                    let url = format!("https://example.com/{}/{}", i, j);
                    let key = cache.key(&url, "raw_data").unwrap();
                    cache.write(&entity(&url), &key).unwrap();
                }
            })
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(40, cache.len());
}
