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

//! Common utilities shared by the resource caching crates.
//!
//! This crate provides the LRU map backing the in-memory entity cache, URL
//! hashing and cache key derivation, and test helpers.

#![allow(missing_docs, clippy::new_without_default)]

/// Internal macros module.
#[macro_use]
mod macros;

/// Cache key derivation from URLs and pipeline stages.
pub mod cache_key;

/// Hash utilities.
pub mod hash;

/// Least Recently Used (LRU) map implementation.
pub mod lru;

/// Testing utilities.
pub mod test;
