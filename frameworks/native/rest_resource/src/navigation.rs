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

//! URL algebra for resource navigation.

use url::{Position, Url};

/// Parses an absolute URL.
pub(crate) fn parse(raw: &str) -> Option<Url> {
    Url::parse(raw).ok()
}

/// Appends `subpath` as path segments under `base`.
///
/// Slashes at the join are collapsed to one, and characters with special
/// meaning in a URL, such as `?`, are escaped rather than interpreted. Any
/// query on `base` is dropped.
pub(crate) fn child(base: &Url, subpath: &str) -> Url {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    let path = format!(
        "{}/{}",
        base.path().trim_end_matches('/'),
        subpath.trim_start_matches('/')
    );
    // `set_path` treats `?` and `#` as path characters and escapes them.
    url.set_path(&path);
    url
}

/// Resolves `href` against `base` the way a browser resolves a link.
pub(crate) fn relative(base: &Url, href: &str) -> Option<Url> {
    base.join(href).ok()
}

/// Sets or removes the query parameter `name`.
///
/// An existing parameter keeps its position; a new one is appended. All
/// occurrences are removed when `value` is `None`.
pub(crate) fn with_param(base: &Url, name: &str, value: Option<&str>) -> Url {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut replaced = false;
    for (key, existing) in base.query_pairs() {
        if key != name {
            pairs.push((key.into_owned(), existing.into_owned()));
        } else if let (Some(value), false) = (value, replaced) {
            pairs.push((name.to_string(), value.to_string()));
            replaced = true;
        }
    }
    if let (Some(value), false) = (value, replaced) {
        pairs.push((name.to_string(), value.to_string()));
    }

    let mut url = base.clone();
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(pairs);
    }
    url
}

/// The URL without its query and fragment, for pattern matching.
pub(crate) fn without_query(url: &Url) -> &str {
    &url[..Position::AfterPath]
}
