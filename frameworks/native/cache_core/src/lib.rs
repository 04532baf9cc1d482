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

//! Core caching types for the resource system.
//!
//! This crate provides the immutable [`Entity`] snapshot of a successful
//! response, the [`EntityCache`] interface that persistent cache backends
//! implement, and [`RamCache`], a thread-safe in-memory backend with LRU
//! eviction.

#![deny(unused_must_use)]
#![allow(unknown_lints, missing_docs, clippy::new_without_default)]

mod cache;
mod entity;
mod ram;

/// Interface implemented by entity caches.
pub use cache::EntityCache;

/// Successful-response snapshot and its type-erased payload.
pub use entity::{Content, Entity};

/// In-memory cache implementation.
pub use ram::RamCache;

pub use request_utils::cache_key::CacheKey;
