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

use std::time::UNIX_EPOCH;

use http::StatusCode;

use super::*;

fn entity<T: Send + Sync + 'static>(value: T, content_type: &str) -> Entity {
    Entity::new(Content::new(value), content_type, UNIX_EPOCH)
}

fn shout() -> ContentTransformer<String, String> {
    ContentTransformer::new(|text: Arc<String>, _: &Entity| Ok(text.to_uppercase()))
        .content_types(["text/*"])
}

// @tc.name: ut_content_type_matcher
// @tc.desc: Test wildcard content type patterns
// @tc.precon: NA
// @tc.step: 1. Build matchers for text/* and */*+json
// @tc.expect: Wildcards stop at / and +, parameters are ignored, case does not matter
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_content_type_matcher() {
    let text = ContentTypeMatcher::new(["text/*"]);
    assert!(text.matches("text/plain"));
    assert!(text.matches("text/html; charset=utf-8"));
    assert!(text.matches("TEXT/Plain"));
    assert!(!text.matches("application/text"));
    assert!(!text.matches("text/plain+xml"));

    let json = ContentTypeMatcher::new(["*/json", "*/*+json"]);
    assert!(json.matches("application/json"));
    assert!(json.matches("application/vnd.api+json; charset=utf-8"));
    assert!(!json.matches("application/jsonp"));
    assert!(!json.matches("text/plain"));
}

// @tc.name: ut_content_transformer_maps_matching_content
// @tc.desc: Test a transformer maps content of a matching type and leaves others alone
// @tc.precon: NA
// @tc.step: 1. Process a text/plain entity and an application/json entity
// @tc.expect: Only the text entity is transformed; metadata is kept
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_content_transformer_maps_matching_content() {
    let transformer = shout();
    let processed = transformer.process(Response::Success(entity("hi".to_string(), "text/plain")));
    let output = processed.entity().unwrap();
    assert_eq!(Some(&"HI".to_string()), output.typed_content::<String>());
    assert_eq!("text/plain", output.content_type());

    let untouched = transformer.process(Response::Success(entity("hi".to_string(), "application/json")));
    assert_eq!(
        Some(&"hi".to_string()),
        untouched.entity().unwrap().typed_content::<String>()
    );
}

// @tc.name: ut_content_transformer_mismatch_actions
// @tc.desc: Test the three input type mismatch actions
// @tc.precon: NA
// @tc.step: 1. Feed bytes to a String transformer under each action
// @tc.expect: Error fails, Skip passes, SkipIfOutputTypeMatches depends on the content
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_content_transformer_mismatch_actions() {
    let bytes = || Response::Success(entity(vec![1u8, 2, 3], "text/plain"));

    let failing = shout().process(bytes());
    match failing.error().and_then(|e| e.cause()) {
        Some(ErrorCause::WrongInputTypeInTransformerPipeline { expected, actual }) => {
            assert!(expected.contains("String"));
            assert!(actual.contains("Vec<u8>"));
        }
        other => panic!("unexpected {:?}", other),
    }

    let skipped = shout()
        .on_input_type_mismatch(InputTypeMismatchAction::Skip)
        .process(bytes());
    assert!(skipped.entity().unwrap().content().is::<Vec<u8>>());

    let to_len = ContentTransformer::new(|text: Arc<String>, _: &Entity| Ok(text.len()))
        .on_input_type_mismatch(InputTypeMismatchAction::SkipIfOutputTypeMatches);
    let already_output = to_len.process(Response::Success(entity(5usize, "text/plain")));
    assert_eq!(Some(&5usize), already_output.entity().unwrap().typed_content::<usize>());
    assert!(to_len.process(bytes()).error().is_some());
}

// @tc.name: ut_content_transformer_error_bodies
// @tc.desc: Test error bodies are only transformed when enabled
// @tc.precon: NA
// @tc.step: 1. Process a failure carrying a text body with and without error transformation
// @tc.expect: The body is transformed only when enabled; the response stays a failure
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_content_transformer_error_bodies() {
    let failure = || {
        Response::Failure(RequestError::from_response(
            Some(StatusCode::NOT_FOUND),
            Some(entity("missing".to_string(), "text/plain")),
            None,
            None,
            UNIX_EPOCH,
        ))
    };
    let body_of = |response: Response| {
        response
            .error()
            .and_then(|e| e.entity())
            .and_then(|e| e.typed_content::<String>().cloned())
    };

    assert_eq!(Some("missing".to_string()), body_of(shout().process(failure())));
    assert_eq!(
        Some("MISSING".to_string()),
        body_of(shout().transform_errors(true).process(failure()))
    );
}

// @tc.name: ut_content_transformer_optional
// @tc.desc: Test a transformer producing nothing fails with TransformerReturnedNothing
// @tc.precon: NA
// @tc.step: 1. Process with a transformer that returns None
// @tc.expect: The response fails with TransformerReturnedNothing
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_content_transformer_optional() {
    let nothing = ContentTransformer::optional(|_: Arc<String>, _: &Entity| None::<u32>);
    let response = nothing.process(Response::Success(entity("x".to_string(), "text/plain")));
    assert_eq!(
        Some(&ErrorCause::TransformerReturnedNothing),
        response.error().and_then(|e| e.cause())
    );
}

// @tc.name: ut_response_transformer_closure
// @tc.desc: Test a whole-response closure can turn success into failure
// @tc.precon: NA
// @tc.step: 1. Wrap a closure failing every success
// @tc.expect: Success becomes failure with the given message
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_response_transformer_closure() {
    let reject = response_transformer(|response| match response {
        Response::Success(entity) => Response::Failure(RequestError::with_message(
            "rejected",
            None,
            entity.timestamp(),
        )),
        failure => failure,
    });
    let response = reject.process(Response::Success(entity(1u8, "application/octet-stream")));
    assert_eq!("rejected", response.error().unwrap().user_message());
}
