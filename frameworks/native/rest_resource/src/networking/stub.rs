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

//! In-memory networking provider for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use http::{Method, StatusCode};

use super::{
    HttpResponse, NetworkingProvider, RequestDescriptor, RequestNetworking,
    TransportCompletion, TransportError,
};
use crate::progress::TransferMetrics;

/// A canned response for one URL.
#[derive(Clone, Debug)]
pub(crate) struct Stub {
    pub(crate) method: Option<Method>,
    pub(crate) url: String,
    pub(crate) response: Option<HttpResponse>,
    pub(crate) body: Vec<u8>,
    pub(crate) error: Option<TransportError>,
}

impl Stub {
    pub(crate) fn new(url: &str, status: u16) -> Self {
        Self {
            method: None,
            url: url.to_string(),
            response: Some(HttpResponse::new(
                StatusCode::from_u16(status).expect("stub status out of range"),
            )),
            body: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn transport_error(url: &str, message: &str) -> Self {
        Self {
            method: None,
            url: url.to_string(),
            response: None,
            body: Vec::new(),
            error: Some(TransportError::new(message)),
        }
    }

    pub(crate) fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub(crate) fn header(mut self, name: &str, value: &str) -> Self {
        self.response = self.response.map(|r| r.with_header(name, value));
        self
    }

    pub(crate) fn body(mut self, body: &[u8]) -> Self {
        self.body = body.to_vec();
        self
    }

    fn matches(&self, request: &RequestDescriptor) -> bool {
        self.url == request.url().as_str()
            && self.method.as_ref().map_or(true, |method| method == request.method())
    }
}

struct HeldCall {
    stub: Option<Stub>,
    completion: TransportCompletion,
}

#[derive(Default)]
struct StubState {
    stubs: Vec<Stub>,
    calls: Vec<RequestDescriptor>,
    held: Vec<HeldCall>,
    hold: bool,
    cancelled: Vec<Arc<AtomicBool>>,
    metrics: TransferMetrics,
}

/// Serves stubbed responses, optionally holding them until released.
#[derive(Default)]
pub(crate) struct StubNetworking {
    state: Mutex<StubState>,
}

impl StubNetworking {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Adds a stub. Later stubs for the same URL win.
    pub(crate) fn stub(&self, stub: Stub) {
        self.state.lock().unwrap().stubs.push(stub);
    }

    /// While holding, responses are kept until [`StubNetworking::release_all`].
    pub(crate) fn hold_responses(&self, hold: bool) {
        self.state.lock().unwrap().hold = hold;
    }

    /// Delivers every held response on the calling thread, cancelled or not.
    pub(crate) fn release_all(&self) {
        let held = std::mem::take(&mut self.state.lock().unwrap().held);
        for call in held {
            deliver(call.stub, call.completion);
        }
    }

    /// Delivers every held response from a separate thread.
    pub(crate) fn release_all_on_other_thread(&self) {
        let held = std::mem::take(&mut self.state.lock().unwrap().held);
        let _ = thread::spawn(move || {
            for call in held {
                deliver(call.stub, call.completion);
            }
        })
        .join();
    }

    pub(crate) fn set_metrics(&self, metrics: TransferMetrics) {
        self.state.lock().unwrap().metrics = metrics;
    }

    pub(crate) fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub(crate) fn calls(&self) -> Vec<RequestDescriptor> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn held_count(&self) -> usize {
        self.state.lock().unwrap().held.len()
    }

    pub(crate) fn cancelled_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .cancelled
            .iter()
            .filter(|flag| flag.load(Ordering::Acquire))
            .count()
    }
}

fn deliver(stub: Option<Stub>, completion: TransportCompletion) {
    match stub {
        Some(stub) => completion(stub.response, Some(stub.body), stub.error),
        None => completion(None, None, Some(TransportError::new("no stub for request"))),
    }
}

impl NetworkingProvider for StubNetworking {
    fn start_request(
        &self,
        request: RequestDescriptor,
        completion: TransportCompletion,
    ) -> Box<dyn RequestNetworking> {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock().unwrap();
        let stub = state
            .stubs
            .iter()
            .rev()
            .find(|stub| stub.matches(&request))
            .cloned();
        state.calls.push(request);
        state.cancelled.push(cancelled.clone());
        let metrics = state.metrics;
        if state.hold {
            state.held.push(HeldCall { stub, completion });
        } else {
            drop(state);
            deliver(stub, completion);
        }
        Box::new(StubHandle { cancelled, metrics })
    }
}

struct StubHandle {
    cancelled: Arc<AtomicBool>,
    metrics: TransferMetrics,
}

impl RequestNetworking for StubHandle {
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn transfer_metrics(&self) -> TransferMetrics {
        self.metrics
    }
}
