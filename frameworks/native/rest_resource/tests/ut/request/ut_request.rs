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

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, UNIX_EPOCH};

use cache_core::Content;
use request_utils::test::log::init;

use super::*;
use crate::clock::ManualClock;
use crate::error::ErrorCause;

/// Replies with scripted responses, one per start, from the main queue.
#[derive(Clone)]
struct ScriptedDelegate {
    script: Arc<Mutex<VecDeque<ResponseInfo>>>,
    starts: Arc<AtomicUsize>,
    cancels: Arc<AtomicUsize>,
    handler: Arc<Mutex<Option<RequestCompletionHandler>>>,
    manual: bool,
}

impl ScriptedDelegate {
    fn new(script: Vec<ResponseInfo>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            starts: Arc::new(AtomicUsize::new(0)),
            cancels: Arc::new(AtomicUsize::new(0)),
            handler: Arc::new(Mutex::new(None)),
            manual: false,
        }
    }

    /// A delegate that never responds by itself.
    fn manual() -> Self {
        Self {
            manual: true,
            ..Self::new(Vec::new())
        }
    }

    fn respond(&self, info: ResponseInfo) {
        let handler = self.handler.lock().unwrap().clone().unwrap();
        handler.broadcast_response(info);
    }
}

impl RequestDelegate for ScriptedDelegate {
    fn start_underlying_operation(&self, handler: RequestCompletionHandler) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        *self.handler.lock().unwrap() = Some(handler.clone());
        if self.manual {
            return;
        }
        let next = self.script.lock().unwrap().pop_front().unwrap();
        let main = handler.main_queue().clone();
        main.dispatch(move || handler.broadcast_response(next));
    }

    fn cancel_underlying_operation(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }

    fn repeated(&self) -> Box<dyn RequestDelegate> {
        let mut repeated = self.clone();
        repeated.handler = Arc::new(Mutex::new(None));
        Box::new(repeated)
    }

    fn request_description(&self) -> String {
        "scripted".to_string()
    }
}

fn context() -> RequestContext {
    RequestContext {
        main: MainQueue::for_current_thread(),
        clock: Arc::new(ManualClock::default()),
        progress_interval: Duration::from_millis(10),
    }
}

fn success(text: &str) -> ResponseInfo {
    ResponseInfo::new(Response::Success(Entity::new(
        Content::new(text.to_string()),
        "text/plain",
        UNIX_EPOCH,
    )))
}

fn http_failure(status: u16) -> ResponseInfo {
    ResponseInfo::new(Response::Failure(RequestError::from_response(
        Some(StatusCode::from_u16(status).unwrap()),
        None,
        None,
        None,
        UNIX_EPOCH,
    )))
}

fn text_of(info: &ResponseInfo) -> Option<String> {
    info.response
        .entity()
        .and_then(|entity| entity.typed_content::<String>().cloned())
}

fn wait_completed(context: &RequestContext, request: &Request) {
    assert!(context
        .main
        .run_until(Duration::from_secs(5), || request.is_completed()));
}

// @tc.name: ut_request_lifecycle
// @tc.desc: Test state moves from not started to in progress to completed
// @tc.precon: NA
// @tc.step: 1. Create a request and check its state
//           2. Start it twice
//           3. Run the main queue until it completes
// @tc.expect: The delegate started once and the completion carries the response
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_lifecycle() {
    init();
    let context = context();
    let delegate = ScriptedDelegate::new(vec![success("hello")]);
    let request = Request::new(Box::new(delegate.clone()), context.clone());
    assert_eq!(RequestState::NotStarted, request.state());
    assert!(!request.is_started());

    let result = Arc::new(Mutex::new(None));
    let r = result.clone();
    request.on_completion(move |info| *r.lock().unwrap() = text_of(info));
    request.start().start();
    assert_eq!(RequestState::InProgress, request.state());
    assert_eq!(1, delegate.starts.load(Ordering::SeqCst));

    wait_completed(&context, &request);
    assert_eq!(Some("hello".to_string()), *result.lock().unwrap());
    assert_eq!(1.0, request.progress());
}

// @tc.name: ut_request_cancel_is_synchronous
// @tc.desc: Test cancel reports a cancellation before returning and drops late responses
// @tc.precon: NA
// @tc.step: 1. Start a request that never responds by itself
//           2. Cancel it
//           3. Deliver a response afterwards
// @tc.expect: Failure callback saw a cancellation exactly once; the late response is ignored
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_cancel_is_synchronous() {
    init();
    let context = context();
    let delegate = ScriptedDelegate::manual();
    let request = Request::new(Box::new(delegate.clone()), context.clone());
    let failures = Arc::new(Mutex::new(Vec::new()));
    let f = failures.clone();
    request
        .on_failure(move |error| f.lock().unwrap().push(error.is_cancellation()))
        .on_success(|_| panic!("late response must be ignored"));
    request.start();

    request.cancel();
    assert!(request.is_completed());
    assert_eq!(vec![true], *failures.lock().unwrap());
    assert_eq!(1, delegate.cancels.load(Ordering::SeqCst));

    delegate.respond(success("too late"));
    request.cancel();
    context.main.run_pending();
    assert_eq!(1, failures.lock().unwrap().len());
    assert_eq!(1, delegate.cancels.load(Ordering::SeqCst));
}

// @tc.name: ut_request_hook_routing
// @tc.desc: Test success, new data, not modified and failure hooks fire for the right outcomes
// @tc.precon: NA
// @tc.step: 1. Complete one request with new data, one with a 304, one with an error
// @tc.expect: Each hook fires only for its outcome
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_hook_routing() {
    init();
    let context = context();
    let not_modified = ResponseInfo::not_modified(Entity::new(
        Content::new("old".to_string()),
        "text/plain",
        UNIX_EPOCH,
    ));
    let cases = [
        (success("new"), "success new_data"),
        (not_modified, "success not_modified"),
        (http_failure(500), "failure"),
    ];
    for (info, expected) in cases {
        let request = Request::hardwired(info, context.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (a, b, c, d) = (seen.clone(), seen.clone(), seen.clone(), seen.clone());
        request
            .on_success(move |_| a.lock().unwrap().push("success"))
            .on_new_data(move |_| b.lock().unwrap().push("new_data"))
            .on_not_modified(move || c.lock().unwrap().push("not_modified"))
            .on_failure(move |_| d.lock().unwrap().push("failure"));
        let count = expected.split(' ').count();
        assert!(context
            .main
            .run_until(Duration::from_secs(5), || seen.lock().unwrap().len() == count));
        assert_eq!(expected, seen.lock().unwrap().join(" "));
    }
}

// @tc.name: ut_request_chain_actions
// @tc.desc: Test each chain action decides the chained request's outcome
// @tc.precon: NA
// @tc.step: 1. Chain with UseThisResponse, UseResponse and PassTo
// @tc.expect: The chained request reports the wrapped, replacement and passed-to responses
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_chain_actions() {
    init();
    let context = context();

    let base = Request::new(Box::new(ScriptedDelegate::new(vec![success("base")])), context.clone());
    let chained = base.chained(|_| RequestChainAction::UseThisResponse);
    assert!(!base.is_started());
    let result = Arc::new(Mutex::new(None));
    let r = result.clone();
    chained.on_completion(move |info| *r.lock().unwrap() = text_of(info));
    chained.start();
    assert!(base.is_started());
    wait_completed(&context, &chained);
    assert_eq!(Some("base".to_string()), *result.lock().unwrap());

    let base = Request::new(Box::new(ScriptedDelegate::new(vec![success("base")])), context.clone());
    let chained = base.chained(|_| RequestChainAction::UseResponse(success("replaced")));
    let r = result.clone();
    chained.on_completion(move |info| *r.lock().unwrap() = text_of(info));
    chained.start();
    wait_completed(&context, &chained);
    assert_eq!(Some("replaced".to_string()), *result.lock().unwrap());

    let next = Request::new(Box::new(ScriptedDelegate::new(vec![success("next")])), context.clone());
    let base = Request::new(Box::new(ScriptedDelegate::new(vec![http_failure(500)])), context.clone());
    let chained = base.chained(move |_| RequestChainAction::PassTo(next.clone()));
    let r = result.clone();
    chained.on_completion(move |info| *r.lock().unwrap() = text_of(info));
    chained.start();
    wait_completed(&context, &chained);
    assert_eq!(Some("next".to_string()), *result.lock().unwrap());
}

// @tc.name: ut_request_chain_cancel
// @tc.desc: Test cancelling a chain cancels the wrapped request
// @tc.precon: NA
// @tc.step: 1. Chain a request that never responds and start it
//           2. Cancel the chain
// @tc.expect: Both report cancellation and the wrapped delegate was cancelled
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_chain_cancel() {
    init();
    let context = context();
    let delegate = ScriptedDelegate::manual();
    let base = Request::new(Box::new(delegate.clone()), context.clone());
    let chained = base.chained(|_| RequestChainAction::UseResponse(success("unused")));
    chained.start();
    let cancelled = Arc::new(AtomicUsize::new(0));
    let c = cancelled.clone();
    chained.on_failure(move |error| {
        assert!(error.is_cancellation());
        c.fetch_add(1, Ordering::SeqCst);
    });
    chained.cancel();
    assert_eq!(1, cancelled.load(Ordering::SeqCst));
    assert!(base.is_completed());
    assert_eq!(1, delegate.cancels.load(Ordering::SeqCst));
}

// @tc.name: ut_request_retrying_after
// @tc.desc: Test a 401 triggers a refresh and one retry of the original request
// @tc.precon: NA
// @tc.step: 1. Script the original to fail with 401, then succeed
//           2. Script a refresh that succeeds
//           3. Run the retrying request
// @tc.expect: The final outcome is the retried success; the original ran twice
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_retrying_after() {
    init();
    let context = context();
    let original = ScriptedDelegate::new(vec![http_failure(401), success("authorized")]);
    let refresh = ScriptedDelegate::new(vec![success("token")]);
    let refreshes = refresh.starts.clone();

    let request = Request::new(Box::new(original.clone()), context.clone());
    let refresh_context = context.clone();
    let retrying = request.retrying_after(StatusCode::UNAUTHORIZED, move || {
        let request = Request::new(Box::new(refresh.clone()), refresh_context.clone());
        request.start();
        request
    });
    let result = Arc::new(Mutex::new(None));
    let r = result.clone();
    retrying.on_completion(move |info| *r.lock().unwrap() = text_of(info));
    retrying.start();
    wait_completed(&context, &retrying);

    assert_eq!(Some("authorized".to_string()), *result.lock().unwrap());
    assert_eq!(2, original.starts.load(Ordering::SeqCst));
    assert_eq!(1, refreshes.load(Ordering::SeqCst));
}

// @tc.name: ut_request_retrying_after_refresh_fails
// @tc.desc: Test a failed refresh reports the original failure without retrying
// @tc.precon: NA
// @tc.step: 1. Script the original to fail with 401 and the refresh to fail
// @tc.expect: The outcome is the 401; the original ran once
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_request_retrying_after_refresh_fails() {
    init();
    let context = context();
    let original = ScriptedDelegate::new(vec![http_failure(401)]);
    let refresh = ScriptedDelegate::new(vec![http_failure(500)]);

    let request = Request::new(Box::new(original.clone()), context.clone());
    let refresh_context = context.clone();
    let retrying = request.retrying_after(StatusCode::UNAUTHORIZED, move || {
        Request::new(Box::new(refresh.clone()), refresh_context.clone())
    });
    let status = Arc::new(Mutex::new(None));
    let s = status.clone();
    retrying.on_failure(move |error| *s.lock().unwrap() = error.http_status_code());
    retrying.start();
    wait_completed(&context, &retrying);

    assert_eq!(Some(401), *status.lock().unwrap());
    assert_eq!(1, original.starts.load(Ordering::SeqCst));
}

// @tc.name: ut_request_progress_callbacks
// @tc.desc: Test progress callbacks end with exactly one at completion
// @tc.precon: NA
// @tc.step: 1. Start a request that responds only when told
//           2. Let a few polling intervals pass, then respond
// @tc.expect: Progress values never decrease and the last is 1
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_progress_callbacks() {
    init();
    let context = context();
    let delegate = ScriptedDelegate::manual();
    let request = Request::new(Box::new(delegate.clone()), context.clone());
    let values = Arc::new(Mutex::new(Vec::new()));
    let v = values.clone();
    request.on_progress(move |p| v.lock().unwrap().push(p));
    request.start();

    context
        .main
        .run_until(Duration::from_millis(60), || false);
    delegate.respond(success("done"));

    let values = values.lock().unwrap();
    assert_eq!(Some(&1.0), values.last());
    assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));
}

// @tc.name: ut_request_failed_constructor
// @tc.desc: Test a failed request completes with its error
// @tc.precon: NA
// @tc.step: 1. Create a failed request and attach a failure hook
// @tc.expect: The hook runs asynchronously with the given cause
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_request_failed_constructor() {
    init();
    let context = context();
    let request = Request::failed(
        RequestError::from_cause(ErrorCause::InvalidUrl { url: None }, UNIX_EPOCH),
        context.clone(),
    );
    assert!(request.is_completed());
    let cause = Arc::new(Mutex::new(None));
    let c = cause.clone();
    request.on_failure(move |error| *c.lock().unwrap() = error.cause().cloned());
    assert!(cause.lock().unwrap().is_none());
    assert!(context
        .main
        .run_until(Duration::from_secs(5), || cause.lock().unwrap().is_some()));
    assert_eq!(
        Some(ErrorCause::InvalidUrl { url: None }),
        *cause.lock().unwrap()
    );
}
