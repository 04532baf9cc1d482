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

//! Client-side caching and observation layer for REST resources.
//!
//! A [`Service`] hands out one [`Resource`] per URL. Each resource keeps the
//! latest entity and error it has seen, runs network responses through a
//! configurable [`Pipeline`] of transformers and caches, and notifies its
//! [`ResourceObserver`]s whenever any of that state changes.
//!
//! All resource state lives on the [`MainQueue`] thread. Networking completes
//! on arbitrary threads, and pipeline work runs on a background pool; both hand
//! their results back to the main queue before touching any resource.

#![allow(
    unknown_lints,
    stable_features,
    missing_docs,
    clippy::new_without_default
)]

#[macro_use]
extern crate request_utils;

mod clock;
mod config;
mod error;
mod navigation;
mod networking;
mod pipeline;
mod progress;
mod queue;
mod request;
mod resource;
mod response;
mod service;

pub use cache_core::{CacheKey, Content, Entity, EntityCache, RamCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Configuration, ConfigurationPattern};
pub use error::{ErrorCause, RequestError};
pub use http::{Method, StatusCode};
pub use networking::{
    HttpResponse, NetworkingProvider, RequestDescriptor, RequestNetworking, TransportCompletion,
    TransportError,
};
pub use pipeline::{
    json_model_transformer, json_transformer, response_transformer, text_transformer,
    ContentTransformer, ContentTypeMatcher, InputTypeMismatchAction, Pipeline, PipelineStage,
    PipelineStageKey, ResponseTransformer, StandardTransformer,
};
pub use progress::{RequestProgress, TransferMetrics};
pub use queue::MainQueue;
pub use request::{
    RequestChainAction, Request, RequestCompletionHandler, RequestDelegate, RequestState,
};
pub use resource::{NewDataSource, Resource, ResourceEvent, ResourceObserver};
pub use response::{Response, ResponseInfo};
pub use service::{Service, ServiceBuilder, ServiceError};

cfg_test! {
    mod testing;
}
