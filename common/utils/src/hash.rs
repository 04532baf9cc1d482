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

//! URL hashing.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Hashes a URL into a fixed-width lowercase hex string.
///
/// The hash is stable for the lifetime of a build, which is all an in-memory
/// cache needs. Persistent caches that outlive the binary should derive their
/// own keys.
///
/// # Examples
///
/// ```rust
/// use request_utils::hash::url_hash;
///
/// assert_eq!(url_hash("https://example.com").len(), 16);
/// ```
pub fn url_hash(input: &str) -> String {
    let mut hasher = DefaultHasher::new();
    input.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
