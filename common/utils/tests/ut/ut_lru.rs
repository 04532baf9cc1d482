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

use super::*;

// @tc.name: ut_lru_cache_empty
// @tc.desc: Test LRUCache behavior when it's empty
// @tc.precon: NA
// @tc.step: 1. Create a new empty LRUCache instance
//           2. Call every accessor
// @tc.expect: All lookups miss and the cache reports empty
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_lru_cache_empty() {
    let mut cache = LRUCache::<&str, usize>::new();
    assert_eq!(None, cache.get(&"key1"));
    assert_eq!(None, cache.get_mut(&"key1"));
    assert_eq!(0, cache.len());
    assert!(!cache.contains_key(&"key1"));
    assert!(cache.is_empty());
    assert_eq!(None, cache.pop());
    assert_eq!(None, cache.remove(&"key1"));
}

// @tc.name: ut_lru_cache_replace
// @tc.desc: Test inserting an existing key returns the previous value
// @tc.precon: NA
// @tc.step: 1. Insert key1 twice with different values
// @tc.expect: Second insert returns the first value and len stays 1
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_lru_cache_replace() {
    let mut cache = LRUCache::new();
    assert_eq!(None, cache.insert("key1", 1));
    assert_eq!(Some(1), cache.insert("key1", 2));
    assert_eq!(1, cache.len());
    assert_eq!(Some(&2), cache.peek(&"key1"));
}

// @tc.name: ut_lru_cache_eviction_order
// @tc.desc: Test pop evicts the least recently used entry
// @tc.precon: NA
// @tc.step: 1. Insert three entries
//           2. Access the oldest one
//           3. Pop twice
// @tc.expect: The accessed entry survives; the others leave in insertion order
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_lru_cache_eviction_order() {
    let mut cache = LRUCache::new();
    cache.insert("a", 1);
    cache.insert("b", 2);
    cache.insert("c", 3);
    assert_eq!(Some(&1), cache.get(&"a"));
    assert_eq!(Some(2), cache.pop());
    assert_eq!(Some(3), cache.pop());
    assert_eq!(Some(1), cache.pop());
    assert!(cache.is_empty());
}

// @tc.name: ut_lru_cache_peek_keeps_order
// @tc.desc: Test peek and contains_key do not refresh recency
// @tc.precon: NA
// @tc.step: 1. Insert two entries
//           2. Peek the oldest
//           3. Pop
// @tc.expect: The peeked entry is still evicted first
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_lru_cache_peek_keeps_order() {
    let mut cache = LRUCache::new();
    cache.insert("a", 1);
    cache.insert("b", 2);
    assert_eq!(Some(&1), cache.peek(&"a"));
    assert!(cache.contains_key(&"a"));
    assert_eq!(Some(1), cache.pop());
}

// @tc.name: ut_lru_cache_get_mut
// @tc.desc: Test values can be modified in place
// @tc.precon: NA
// @tc.step: 1. Insert an entry and modify it through get_mut
// @tc.expect: The modification is visible and keys() lists it last
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_lru_cache_get_mut() {
    let mut cache = LRUCache::new();
    cache.insert("a", 10);
    cache.insert("b", 20);
    if let Some(value) = cache.get_mut(&"a") {
        *value += 5;
    }
    assert_eq!(Some(&15), cache.peek(&"a"));
    assert_eq!(vec![&"b", &"a"], cache.keys().collect::<Vec<_>>());
    cache.clear();
    assert!(cache.is_empty());
}
