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

//! Cache key utilities.
//!
//! This module provides the identifier used to address an entity cache entry.
//! A key is derived from a resource URL and the name of the pipeline stage
//! that produced the entity, so entries written by different stages for the
//! same URL never collide.

use std::fmt::Display;

use crate::hash::url_hash;

/// An identifier for one cache entry.
///
/// Wraps a hash string derived from a URL and a pipeline stage name.
///
/// # Examples
///
/// ```rust
/// use request_utils::cache_key::CacheKey;
///
/// let raw = CacheKey::from_url("https://example.com/users/1", "raw_data");
/// let model = CacheKey::from_url("https://example.com/users/1", "model");
/// assert_ne!(raw, model);
///
/// println!("Brief key: {}", raw.brief());
/// ```
#[derive(Hash, PartialEq, Eq, Clone, Debug)]
pub struct CacheKey {
    /// The hash string that uniquely identifies the entry.
    hash: String,
    /// The pipeline stage the entry belongs to.
    stage: String,
}

impl CacheKey {
    /// Creates a key from an existing hash string and stage name.
    pub fn new(hash: String, stage: &str) -> Self {
        Self {
            hash,
            stage: stage.to_string(),
        }
    }

    /// Creates a key by hashing a URL within the namespace of a stage.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use request_utils::cache_key::CacheKey;
    ///
    /// let a = CacheKey::from_url("https://example.com/a", "parsing");
    /// let b = CacheKey::from_url("https://example.com/a", "parsing");
    /// assert_eq!(a, b);
    /// ```
    pub fn from_url(url: &str, stage: &str) -> Self {
        Self {
            hash: url_hash(&format!("{}\u{0}{}", stage, url)),
            stage: stage.to_string(),
        }
    }

    /// Returns the stage name this key belongs to.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Returns a shortened version of the key for log lines.
    ///
    /// Contains the first quarter of the hash characters.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use request_utils::cache_key::CacheKey;
    ///
    /// let key = CacheKey::new("0123456789abcdef".to_string(), "model");
    /// assert_eq!(key.brief(), "0123");
    /// ```
    pub fn brief(&self) -> &str {
        let len = self.hash.len();
        &self.hash.as_str()[..len / 4]
    }
}

impl Display for CacheKey {
    /// Formats the key as `stage/hash`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.stage, self.hash)
    }
}
