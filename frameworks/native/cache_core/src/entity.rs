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

//! Entity snapshots of successful responses.
//!
//! An [`Entity`] is an immutable value: payload, content type, charset,
//! headers and the time it was received. The payload is type-erased in a
//! [`Content`] so that pipeline stages can turn raw bytes into text, JSON or
//! application models while the metadata travels alongside unchanged.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

/// Content type assumed when a response does not declare one.
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Type-erased, cheaply clonable entity payload.
///
/// Holds the value behind an `Arc` together with the name of its concrete
/// type, so a mismatch at a pipeline stage boundary can be reported with
/// both the expected and the actual type.
#[derive(Clone)]
pub struct Content {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Content {
    /// Wraps a value of any thread-safe type.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Wraps a value that is already shared.
    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            value,
            type_name: type_name::<T>(),
        }
    }

    /// Returns `true` if the payload is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Borrows the payload as a `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns a shared handle to the payload as a `T`, if it is one.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// Name of the concrete payload type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Content {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Content<{}>", self.type_name)
    }
}

/// An immutable snapshot of a successful response.
///
/// Header names are stored lowercased, so lookups are case-insensitive.
#[derive(Clone, Debug)]
pub struct Entity {
    content: Content,
    content_type: String,
    charset: Option<String>,
    headers: BTreeMap<String, String>,
    timestamp: SystemTime,
}

impl Entity {
    /// Creates an entity with an explicit content type.
    ///
    /// The charset is taken from the content type's `charset` parameter if
    /// present.
    pub fn new(content: Content, content_type: &str, timestamp: SystemTime) -> Self {
        let mut entity = Self {
            content,
            content_type: String::new(),
            charset: None,
            headers: BTreeMap::new(),
            timestamp,
        };
        entity.set_content_type(content_type);
        entity
    }

    /// Creates an entity from response headers.
    ///
    /// The content type comes from the `Content-Type` header and defaults to
    /// `application/octet-stream`.
    pub fn from_headers<I, K, V>(content: Content, headers: I, timestamp: SystemTime) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let headers = headers
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v.into()))
            .collect::<BTreeMap<_, _>>();
        let content_type = headers
            .get("content-type")
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
        let mut entity = Self {
            content,
            content_type: String::new(),
            charset: None,
            headers,
            timestamp,
        };
        entity.set_content_type(&content_type);
        entity
    }

    fn set_content_type(&mut self, content_type: &str) {
        self.charset = parse_charset(content_type);
        self.content_type = content_type.to_string();
        self.headers
            .insert("content-type".to_string(), content_type.to_string());
    }

    /// The type-erased payload.
    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Borrows the payload as a `T`, if it is one.
    pub fn typed_content<T: Any>(&self) -> Option<&T> {
        self.content.downcast_ref::<T>()
    }

    /// The full content type, parameters included.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// The charset declared by the content type, if any.
    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    /// All headers, keyed by lowercased name.
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// Looks up a header by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// The `ETag` header, if any.
    pub fn etag(&self) -> Option<&str> {
        self.header("etag")
    }

    /// When this entity was received or last confirmed fresh.
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Marks the entity as confirmed fresh at `timestamp`.
    pub fn touch(&mut self, timestamp: SystemTime) {
        self.timestamp = timestamp;
    }

    /// Returns a copy carrying different content and the same metadata.
    pub fn with_content(&self, content: Content) -> Self {
        Self {
            content,
            ..self.clone()
        }
    }

    /// Returns a copy carrying different content and content type.
    pub fn with_content_and_type(&self, content: Content, content_type: &str) -> Self {
        let mut entity = self.with_content(content);
        entity.set_content_type(content_type);
        entity
    }
}

fn parse_charset(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        if !name.trim().eq_ignore_ascii_case("charset") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| value.to_string())
    })
}
