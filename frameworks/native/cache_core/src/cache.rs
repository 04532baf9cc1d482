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

//! Entity cache interface.
//!
//! The resource pipeline calls into an [`EntityCache`] from a background
//! thread, so implementations must be thread-safe. Key derivation is the one
//! operation invoked on the main thread.

use std::io;
use std::time::SystemTime;

use crate::Entity;

/// A store of entities keyed by a backend-defined key.
pub trait EntityCache: Send + Sync + 'static {
    /// Opaque key type chosen by the backend.
    type Key: Send + Sync + 'static;

    /// Derives the key for a resource URL within one pipeline stage.
    ///
    /// Returning `None` opts the resource out of this cache. Called on the
    /// main thread.
    fn key(&self, url: &str, stage: &str) -> Option<Self::Key>;

    /// Reads the entity stored for `key`.
    fn read(&self, key: &Self::Key) -> Option<Entity>;

    /// Stores `entity` for `key`, replacing any previous entry.
    fn write(&self, entity: &Entity, key: &Self::Key) -> io::Result<()>;

    /// Marks the entry for `key` as fresh at `timestamp`.
    ///
    /// The default reads the entry back and rewrites it. A missing entry is
    /// not an error.
    fn update_timestamp(&self, timestamp: SystemTime, key: &Self::Key) -> io::Result<()> {
        match self.read(key) {
            Some(mut entity) => {
                entity.touch(timestamp);
                self.write(&entity, key)
            }
            None => Ok(()),
        }
    }

    /// Removes the entry for `key`, if any.
    fn remove(&self, key: &Self::Key) -> io::Result<()>;
}
