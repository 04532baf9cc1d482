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

//! Requests and their lifecycle.
//!
//! A [`Request`] is a handle to one operation that eventually produces a
//! [`ResponseInfo`]. The operation itself is supplied by a [`RequestDelegate`]:
//! a network round trip, a hardwired response, or a chain of other requests.
//! The request owns everything around it: the started and completed state,
//! completion and progress callbacks, cancellation and progress polling.

mod callback;
mod chain;
mod hardwired;
pub(crate) mod network;

use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cache_core::Entity;
use http::StatusCode;
use log::{debug, info, warn};

pub use chain::RequestChainAction;
pub(crate) use hardwired::HardwiredRequestDelegate;

use crate::clock::Clock;
use crate::error::RequestError;
use crate::progress::{RequestProgress, TransferMetrics};
use crate::queue::MainQueue;
use crate::response::{Response, ResponseInfo};
use callback::CallbackGroup;
use chain::RequestChainDelegate;

/// Where a request is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// Created but not yet handed to its delegate.
    NotStarted,
    /// Started and waiting for a response.
    InProgress,
    /// A response was delivered or the request was cancelled. Terminal.
    Completed,
}

/// The operation behind a [`Request`].
///
/// Implement this to make custom request types. The delegate only performs
/// the work; the request guarantees at-most-once completion around it.
pub trait RequestDelegate: Send + Sync {
    /// Starts the operation. The result must be passed to `handler`, on the
    /// main thread, via [`RequestCompletionHandler::broadcast_response`].
    fn start_underlying_operation(&self, handler: RequestCompletionHandler);

    /// Stops the operation if possible. The request has already reported a
    /// cancellation by the time this returns.
    fn cancel_underlying_operation(&self);

    /// A fresh, unstarted delegate for the same operation.
    fn repeated(&self) -> Box<dyn RequestDelegate>;

    /// A short description for log lines.
    fn request_description(&self) -> String;

    /// Byte counters for progress estimation.
    fn transfer_metrics(&self) -> TransferMetrics {
        TransferMetrics::default()
    }

    /// Whether the operation uploads a body, which weights upload progress in.
    fn sends_body(&self) -> bool {
        false
    }
}

/// Shared runtime pieces every request needs.
#[derive(Clone)]
pub(crate) struct RequestContext {
    pub(crate) main: Arc<MainQueue>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) progress_interval: Duration,
}

struct RequestCore {
    context: RequestContext,
    delegate: Box<dyn RequestDelegate>,
    state: Mutex<LiveState>,
    response_callbacks: CallbackGroup<ResponseInfo>,
    progress_callbacks: CallbackGroup<f64>,
}

struct LiveState {
    /// Lifecycle position; only ever moves forward.
    state: RequestState,
    /// Completion estimate, forced to 1 on completion.
    progress: RequestProgress,
    /// Set once a response arriving after completion has been logged.
    ignored_late_response: bool,
}

/// Gives a delegate a way to report its result.
#[derive(Clone)]
pub struct RequestCompletionHandler {
    core: Arc<RequestCore>,
}

impl RequestCompletionHandler {
    /// Returns `true` if the request already completed, so any response
    /// broadcast now would be dropped.
    pub fn will_ignore(&self) -> bool {
        self.core.state() == RequestState::Completed
    }

    /// Completes the request with `info`. Must be called on the main thread.
    ///
    /// A response arriving after completion is discarded and logged once.
    pub fn broadcast_response(&self, info: ResponseInfo) {
        self.core.broadcast_response(info);
    }

    pub fn main_queue(&self) -> &Arc<MainQueue> {
        &self.core.context.main
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.core.context.clock
    }
}

impl RequestCore {
    fn state(&self) -> RequestState {
        self.state.lock().unwrap().state
    }

    fn broadcast_response(&self, info: ResponseInfo) {
        self.context.main.assert_main_thread();
        {
            let mut live = self.state.lock().unwrap();
            if live.state == RequestState::Completed {
                if !live.ignored_late_response {
                    live.ignored_late_response = true;
                    warn!(
                        "{} already completed, ignoring late response",
                        self.delegate.request_description()
                    );
                }
                return;
            }
            live.state = RequestState::Completed;
            live.progress.complete();
        }
        debug!(
            "{} completed: {}",
            self.delegate.request_description(),
            describe(&info)
        );
        self.progress_callbacks.notify_of_completion(1.0);
        self.response_callbacks.notify_of_completion(info);
    }
}

fn describe(info: &ResponseInfo) -> String {
    match (&info.response, info.is_new) {
        (Response::Success(entity), true) => format!("new data ({})", entity.content_type()),
        (Response::Success(_), false) => "not modified".to_string(),
        (Response::Failure(error), _) => format!("failure: {}", error),
    }
}

/// A handle to one request. Cloning shares the same request.
#[derive(Clone)]
pub struct Request {
    core: Arc<RequestCore>,
}

impl Request {
    pub(crate) fn new(delegate: Box<dyn RequestDelegate>, context: RequestContext) -> Self {
        let sends_body = delegate.sends_body();
        let main = context.main.clone();
        Self {
            core: Arc::new(RequestCore {
                context,
                delegate,
                state: Mutex::new(LiveState {
                    state: RequestState::NotStarted,
                    progress: RequestProgress::new(sends_body),
                    ignored_late_response: false,
                }),
                response_callbacks: CallbackGroup::new(main.clone()),
                progress_callbacks: CallbackGroup::new(main),
            }),
        }
    }

    /// A started request that immediately completes with `info`.
    pub(crate) fn hardwired(info: ResponseInfo, context: RequestContext) -> Self {
        let request = Self::new(Box::new(HardwiredRequestDelegate::new(info)), context);
        request.start();
        request
    }

    /// A started request that immediately fails with `error`.
    pub(crate) fn failed(error: RequestError, context: RequestContext) -> Self {
        Self::hardwired(ResponseInfo::new(Response::Failure(error)), context)
    }

    /// Starts the underlying operation. Starting twice has no effect.
    pub fn start(&self) -> &Self {
        self.core.context.main.assert_main_thread();
        {
            let mut live = self.core.state.lock().unwrap();
            if live.state != RequestState::NotStarted {
                debug!(
                    "{} already started",
                    self.core.delegate.request_description()
                );
                return self;
            }
            live.state = RequestState::InProgress;
        }
        info!("start {}", self.core.delegate.request_description());
        self.core
            .delegate
            .start_underlying_operation(RequestCompletionHandler {
                core: self.core.clone(),
            });
        schedule_progress_poll(&self.core);
        self
    }

    /// Cancels the request.
    ///
    /// Completion callbacks receive a cancellation error before this returns,
    /// and any response the operation produces later is discarded. Has no
    /// effect on a completed request.
    pub fn cancel(&self) {
        self.core.context.main.assert_main_thread();
        if self.is_completed() {
            debug!(
                "{} already completed, cancel ignored",
                self.core.delegate.request_description()
            );
            return;
        }
        info!("cancel {}", self.core.delegate.request_description());
        let now = self.core.context.clock.now();
        // Complete first so whatever the operation reports while stopping
        // is treated as late.
        self.core.broadcast_response(ResponseInfo::cancellation(now));
        self.core.delegate.cancel_underlying_operation();
    }

    /// A new, unstarted request for the same operation.
    pub fn repeated(&self) -> Request {
        Request::new(self.core.delegate.repeated(), self.core.context.clone())
    }

    /// Returns where the request is in its lifecycle.
    ///
    /// # Returns
    /// [`RequestState::Completed`] as soon as a response was delivered or
    /// [`Request::cancel`] was called, even if the transport is still busy.
    pub fn state(&self) -> RequestState {
        self.core.state()
    }

    pub fn is_started(&self) -> bool {
        self.state() != RequestState::NotStarted
    }

    pub fn is_completed(&self) -> bool {
        self.state() == RequestState::Completed
    }

    /// The current progress estimate in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        self.core.state.lock().unwrap().progress.fraction_done()
    }

    /// Returns `true` if both handles refer to the same request.
    pub fn ptr_eq(&self, other: &Request) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// Calls `callback` once with the final response.
    pub fn on_completion<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&ResponseInfo) + Send + 'static,
    {
        let mut callback = Some(callback);
        self.core.response_callbacks.add_callback(move |info| {
            if let Some(callback) = callback.take() {
                callback(&info);
            }
        });
        self
    }

    /// Calls `callback` if the request succeeds, with new or unchanged data.
    pub fn on_success<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&Entity) + Send + 'static,
    {
        self.on_completion(move |info| {
            if let Response::Success(entity) = &info.response {
                callback(entity);
            }
        })
    }

    /// Calls `callback` if the request succeeds with new data.
    pub fn on_new_data<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&Entity) + Send + 'static,
    {
        self.on_completion(move |info| match &info.response {
            Response::Success(entity) if info.is_new => callback(entity),
            _ => {}
        })
    }

    /// Calls `callback` if the server reports the local data is still current.
    pub fn on_not_modified<F>(&self, callback: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_completion(move |info| {
            if matches!(info.response, Response::Success(_)) && !info.is_new {
                callback();
            }
        })
    }

    /// Calls `callback` if the request fails, including by cancellation.
    pub fn on_failure<F>(&self, callback: F) -> &Self
    where
        F: FnOnce(&RequestError) + Send + 'static,
    {
        self.on_completion(move |info| {
            if let Response::Failure(error) = &info.response {
                callback(error);
            }
        })
    }

    /// Calls `callback` with progress updates, and with 1 at completion.
    pub fn on_progress<F>(&self, callback: F) -> &Self
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.core.progress_callbacks.add_callback(callback);
        self
    }

    /// Wraps this request in a new one whose outcome is decided by
    /// `when_completed` once this one finishes.
    ///
    /// The returned request is not started; starting it starts this one.
    /// Cancelling it cancels whichever request is current in the chain.
    pub fn chained<F>(&self, when_completed: F) -> Request
    where
        F: Fn(&ResponseInfo) -> RequestChainAction + Send + Sync + 'static,
    {
        let delegate = RequestChainDelegate::new(self.clone(), Arc::new(when_completed));
        Request::new(Box::new(delegate), self.core.context.clone())
    }

    /// Retries once after `status` if `refresh` succeeds.
    ///
    /// When this request fails with HTTP `status`, the request produced by
    /// `refresh` runs, typically to renew credentials. If it succeeds, a
    /// repeat of this request runs and its outcome is final; otherwise the
    /// original failure is reported.
    pub fn retrying_after<F>(&self, status: StatusCode, refresh: F) -> Request
    where
        F: Fn() -> Request + Send + Sync + 'static,
    {
        let original = self.clone();
        self.chained(move |info| match &info.response {
            Response::Failure(error) if error.http_status() == Some(status) => {
                info!("got {}, refreshing before retry", status);
                let retry = original.repeated();
                let original_failure = info.clone();
                RequestChainAction::PassTo(refresh().chained(move |refreshed| {
                    match refreshed.response {
                        Response::Success(_) => RequestChainAction::PassTo(retry.clone()),
                        Response::Failure(_) => {
                            RequestChainAction::UseResponse(original_failure.clone())
                        }
                    }
                }))
            }
            _ => RequestChainAction::UseThisResponse,
        })
    }

    pub(crate) fn transfer_metrics(&self) -> TransferMetrics {
        self.core.delegate.transfer_metrics()
    }
}

impl Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("operation", &self.core.delegate.request_description())
            .field("state", &self.state())
            .finish()
    }
}

/// Polls transfer metrics on the main queue while the request is running.
fn schedule_progress_poll(core: &Arc<RequestCore>) {
    let weak = Arc::downgrade(core);
    let interval = core.context.progress_interval;
    core.context.main.dispatch_after(interval, move || {
        let Some(core) = weak.upgrade() else {
            return;
        };
        let metrics = core.delegate.transfer_metrics();
        let fraction = {
            let mut live = core.state.lock().unwrap();
            if live.state != RequestState::InProgress {
                return;
            }
            live.progress.update(&metrics)
        };
        core.progress_callbacks.notify(fraction);
        schedule_progress_poll(&core);
    });
}
