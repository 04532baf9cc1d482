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

//! The seam between resources and an HTTP implementation.
//!
//! The crate never performs I/O itself. A [`NetworkingProvider`] receives a
//! fully built [`RequestDescriptor`] and reports the outcome through a
//! [`TransportCompletion`], which may be invoked on any thread.

use http::{Method, StatusCode};
use url::Url;

use crate::progress::TransferMetrics;

cfg_test! {
    pub(crate) mod stub;
}

/// Whether requests with this method usually upload a body.
pub(crate) fn sends_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// A request ready to be handed to the transport.
#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl RequestDescriptor {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Sets a header, replacing any existing header with the same
    /// case-insensitive name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    /// Looks a header up by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = Some(body);
    }
}

/// Status line and headers of an HTTP response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: Vec<(String, String)>,
}

impl HttpResponse {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// A failure below the HTTP layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportError {
    pub message: String,
    /// Set when the failure is the transport acknowledging a cancellation.
    pub cancelled: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            message: "cancelled".to_string(),
            cancelled: true,
        }
    }
}

/// Receives the outcome of one transport operation.
///
/// Carries the response head, the body bytes and the transport error, any of
/// which may be absent. May be called on any thread, at most once.
pub type TransportCompletion =
    Box<dyn FnOnce(Option<HttpResponse>, Option<Vec<u8>>, Option<TransportError>) + Send>;

/// Starts HTTP requests on behalf of a service.
pub trait NetworkingProvider: Send + Sync {
    /// Starts `request` and returns a handle to the running operation.
    ///
    /// `completion` must eventually be called exactly once, including after
    /// the operation is cancelled.
    fn start_request(
        &self,
        request: RequestDescriptor,
        completion: TransportCompletion,
    ) -> Box<dyn RequestNetworking>;
}

/// A running transport operation.
pub trait RequestNetworking: Send + Sync {
    /// Asks the transport to stop. The completion may still be delivered.
    fn cancel(&self);

    /// Reports byte counters for progress estimation.
    fn transfer_metrics(&self) -> TransferMetrics {
        TransferMetrics::default()
    }
}
