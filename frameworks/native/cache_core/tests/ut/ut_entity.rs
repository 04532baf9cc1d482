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

use std::time::{Duration, UNIX_EPOCH};

use super::*;

// @tc.name: ut_entity_from_headers
// @tc.desc: Test entity metadata is parsed from response headers
// @tc.precon: NA
// @tc.step: 1. Build an entity from mixed-case headers
//           2. Read content type, charset, etag and a header
// @tc.expect: Lookups are case-insensitive and the charset is extracted
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_entity_from_headers() {
    let entity = Entity::from_headers(
        Content::new(b"hello".to_vec()),
        vec![
            ("Content-Type", "text/plain; charset=\"UTF-8\""),
            ("ETag", "\"abc\""),
            ("X-Custom", "yes"),
        ],
        UNIX_EPOCH,
    );
    assert_eq!(entity.content_type(), "text/plain; charset=\"UTF-8\"");
    assert_eq!(entity.charset(), Some("UTF-8"));
    assert_eq!(entity.etag(), Some("\"abc\""));
    assert_eq!(entity.header("x-custom"), Some("yes"));
    assert_eq!(entity.header("X-CUSTOM"), Some("yes"));
    assert_eq!(entity.typed_content::<Vec<u8>>(), Some(&b"hello".to_vec()));
}

// @tc.name: ut_entity_default_content_type
// @tc.desc: Test entities without a Content-Type header
// @tc.precon: NA
// @tc.step: 1. Build an entity with no headers
// @tc.expect: Content type defaults to application/octet-stream, no charset
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_entity_default_content_type() {
    let entity = Entity::from_headers(
        Content::new(Vec::<u8>::new()),
        Vec::<(&str, &str)>::new(),
        UNIX_EPOCH,
    );
    assert_eq!(entity.content_type(), "application/octet-stream");
    assert_eq!(entity.charset(), None);
    assert_eq!(entity.etag(), None);
}

// @tc.name: ut_entity_touch_and_with_content
// @tc.desc: Test timestamp refresh and content replacement keep metadata
// @tc.precon: NA
// @tc.step: 1. Create an entity with an etag
//           2. Replace its content and touch it
// @tc.expect: Metadata survives, the timestamp moves, the content changes type
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_entity_touch_and_with_content() {
    let entity = Entity::from_headers(
        Content::new(b"{}".to_vec()),
        vec![("content-type", "application/json"), ("etag", "v1")],
        UNIX_EPOCH,
    );
    let mut replaced = entity.with_content(Content::new("{}".to_string()));
    replaced.touch(UNIX_EPOCH + Duration::from_secs(10));
    assert_eq!(replaced.etag(), Some("v1"));
    assert_eq!(replaced.content_type(), "application/json");
    assert_eq!(replaced.timestamp(), UNIX_EPOCH + Duration::from_secs(10));
    assert_eq!(entity.timestamp(), UNIX_EPOCH);
    assert!(replaced.content().is::<String>());
    assert!(replaced.typed_content::<Vec<u8>>().is_none());
}

// @tc.name: ut_content_downcast
// @tc.desc: Test type-erased content downcasting and type names
// @tc.precon: NA
// @tc.step: 1. Wrap a String in Content
//           2. Downcast to the right and wrong types
// @tc.expect: Right type succeeds, wrong type fails, type name is reported
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_content_downcast() {
    let content = Content::new("hi".to_string());
    assert_eq!(content.downcast::<String>().as_deref(), Some(&"hi".to_string()));
    assert!(content.downcast::<u32>().is_none());
    assert!(content.type_name().contains("String"));
    assert_eq!(format!("{:?}", content), format!("Content<{}>", content.type_name()));
}
