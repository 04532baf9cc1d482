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

//! Requests backed by the networking provider.

use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use cache_core::{Content, Entity};
use http::{Method, StatusCode};
use log::{debug, error};

use super::{RequestCompletionHandler, RequestDelegate};
use crate::config::Configuration;
use crate::error::{ErrorCause, RequestError};
use crate::networking::{
    sends_body, HttpResponse, NetworkingProvider, RequestDescriptor, RequestNetworking,
    TransportError,
};
use crate::progress::TransferMetrics;
use crate::queue::spawn_background;
use crate::resource::Resource;
use crate::response::{Response, ResponseInfo};

/// Applies caller-specific changes to a request before it is sent.
pub(crate) type RequestMutation = Arc<dyn Fn(&mut RequestDescriptor) + Send + Sync>;

/// One HTTP round trip for a resource.
///
/// The descriptor is rebuilt on every start from the resource's current
/// configuration, so a repeated request picks up headers that changed in
/// between (a refreshed auth token, for example).
pub(crate) struct NetworkRequestDelegate {
    resource: Resource,
    method: Method,
    mutation: RequestMutation,
    networking: Arc<dyn NetworkingProvider>,
    handle: Mutex<Option<Box<dyn RequestNetworking>>>,
}

impl NetworkRequestDelegate {
    pub(crate) fn new(
        resource: Resource,
        method: Method,
        mutation: RequestMutation,
        networking: Arc<dyn NetworkingProvider>,
    ) -> Self {
        Self {
            resource,
            method,
            mutation,
            networking,
            handle: Mutex::new(None),
        }
    }

    fn build_descriptor(&self, config: &Configuration) -> Option<RequestDescriptor> {
        let url = self.resource.url()?.clone();
        let mut descriptor = RequestDescriptor::new(self.method.clone(), url);
        for (name, value) in config.headers() {
            descriptor.set_header(name, value);
        }
        (self.mutation)(&mut descriptor);
        Some(descriptor)
    }
}

impl RequestDelegate for NetworkRequestDelegate {
    fn start_underlying_operation(&self, handler: RequestCompletionHandler) {
        let config = self.resource.configuration(&self.method);
        let Some(descriptor) = self.build_descriptor(&config) else {
            let now = handler.clock().now();
            handler.broadcast_response(ResponseInfo::new(Response::Failure(
                RequestError::from_cause(ErrorCause::InvalidUrl { url: None }, now),
            )));
            return;
        };

        let main = handler.main_queue().clone();
        let resource = self.resource.clone();
        let handle = self.networking.start_request(
            descriptor,
            Box::new(move |response, body, error| {
                main.dispatch(move || {
                    response_received(handler, resource, config, response, body, error)
                });
            }),
        );
        *self.handle.lock().unwrap() = Some(handle);
    }

    fn cancel_underlying_operation(&self) {
        if let Some(handle) = self.handle.lock().unwrap().as_ref() {
            handle.cancel();
        }
    }

    fn repeated(&self) -> Box<dyn RequestDelegate> {
        Box::new(NetworkRequestDelegate::new(
            self.resource.clone(),
            self.method.clone(),
            self.mutation.clone(),
            self.networking.clone(),
        ))
    }

    fn request_description(&self) -> String {
        match self.resource.url() {
            Some(url) => format!("{} {}", self.method, url),
            None => format!("{} <invalid url>", self.method),
        }
    }

    fn transfer_metrics(&self) -> TransferMetrics {
        self.handle
            .lock()
            .unwrap()
            .as_ref()
            .map(|handle| handle.transfer_metrics())
            .unwrap_or_default()
    }

    fn sends_body(&self) -> bool {
        sends_body(&self.method)
    }
}

/// Handles the transport outcome on the main thread.
fn response_received(
    handler: RequestCompletionHandler,
    resource: Resource,
    config: Arc<Configuration>,
    response: Option<HttpResponse>,
    body: Option<Vec<u8>>,
    error: Option<TransportError>,
) {
    let now = handler.clock().now();
    let info = interpret(&resource, response, body, error, now);

    if handler.will_ignore() || !info.is_new {
        handler.broadcast_response(info);
        return;
    }

    let url = resource.url().map(|url| url.to_string());
    let processor = config.pipeline.make_processor(info.response, url.as_deref());
    let main = handler.main_queue().clone();
    spawn_background(move || {
        let processed = processor();
        main.dispatch(move || handler.broadcast_response(ResponseInfo::new(processed)));
    });
}

/// Turns the raw transport outcome into a response.
fn interpret(
    resource: &Resource,
    response: Option<HttpResponse>,
    body: Option<Vec<u8>>,
    error: Option<TransportError>,
    now: SystemTime,
) -> ResponseInfo {
    match (response, error) {
        (response, Some(error)) => {
            debug!("transport error for {:?}: {}", resource.url(), error.message);
            let status = response.as_ref().map(|r| r.status);
            ResponseInfo::new(Response::Failure(RequestError::from_response(
                status,
                None,
                Some(&error),
                None,
                now,
            )))
        }
        (Some(response), None) if response.status.as_u16() >= 400 => {
            let entity = body
                .filter(|body| !body.is_empty())
                .map(|body| body_entity(&response, body, now));
            ResponseInfo::new(Response::Failure(RequestError::from_response(
                Some(response.status),
                entity,
                None,
                None,
                now,
            )))
        }
        (Some(response), None) if response.status == StatusCode::NOT_MODIFIED => {
            match resource.latest_data() {
                Some(entity) => ResponseInfo::not_modified(entity),
                None => {
                    error!("{:?} got 304 without local data", resource.url());
                    ResponseInfo::new(Response::Failure(
                        RequestError::from_cause(ErrorCause::NoLocalDataFor304, now)
                            .with_status(StatusCode::NOT_MODIFIED),
                    ))
                }
            }
        }
        (Some(response), None) => ResponseInfo::new(Response::Success(body_entity(
            &response,
            body.unwrap_or_default(),
            now,
        ))),
        (None, None) => ResponseInfo::new(Response::Failure(RequestError::from_cause(
            ErrorCause::Transport {
                message: "no response".to_string(),
            },
            now,
        ))),
    }
}

fn body_entity(response: &HttpResponse, body: Vec<u8>, now: SystemTime) -> Entity {
    Entity::from_headers(
        Content::new(body),
        response
            .headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.clone())),
        now,
    )
}
