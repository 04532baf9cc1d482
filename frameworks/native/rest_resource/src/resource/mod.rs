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

//! Resources: the local view of one remote URL.
//!
//! A [`Resource`] remembers the latest entity and the latest error it has
//! seen, which requests are in flight, and who is observing it. Its state only
//! changes on the main thread and only in response to the completion of one
//! of its own requests, a cache lookup, or an explicit local call.

mod observer;

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, SystemTime};

use cache_core::{Content, Entity};
use http::Method;
use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use url::Url;

pub(crate) use observer::{address_of, ClosureObserver, ObserverList, OwnerRef};
pub use observer::{NewDataSource, ResourceEvent, ResourceObserver};

use crate::config::Configuration;
use crate::error::{ErrorCause, RequestError};
use crate::navigation;
use crate::networking::RequestDescriptor;
use crate::queue::spawn_background;
use crate::request::network::{NetworkRequestDelegate, RequestMutation};
use crate::request::{Request, RequestContext, RequestDelegate};
use crate::response::{Response, ResponseInfo};
use crate::service::{Service, ServiceContext, ServiceInner};

/// Content type of entities created by [`Resource::override_local_content`]
/// when there is no existing entity to take one from.
const LOCAL_CONTENT_TYPE: &str = "application/octet-stream";

/// A handle to the resource for one URL. Cloning shares the same resource.
#[derive(Clone)]
pub struct Resource {
    inner: Arc<ResourceInner>,
}

struct ResourceInner {
    /// Queue, clock, networking and configuration shared with the service.
    context: Arc<ServiceContext>,
    /// The owning service, used to look up related resources.
    service: Weak<ServiceInner>,
    url: Option<Url>,
    /// Registry key: the URL, or `invalid:<raw>` when there is none.
    key: String,
    state: Mutex<ResourceState>,
}

#[derive(Default)]
struct ResourceState {
    /// Entity from the latest success. Kept across errors.
    latest_data: Option<Entity>,
    /// Error from the latest failure. Cleared by the next success.
    latest_error: Option<RequestError>,
    /// Forces the next staleness check to fail.
    invalidated: bool,
    /// In-flight requests that will update this resource, oldest first.
    load_requests: Vec<Request>,
    /// Every in-flight request, loads included.
    all_requests: Vec<Request>,
    observers: ObserverList,
    // Bumped on every change to data or error; a cache result computed
    // before a bump is stale.
    generation: u64,
    /// Per-method configuration with the service version it was built at.
    configurations: HashMap<Method, (u64, Arc<Configuration>)>,
}

impl Resource {
    pub(crate) fn new(
        context: Arc<ServiceContext>,
        service: Weak<ServiceInner>,
        url: Option<Url>,
        key: String,
    ) -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                context,
                service,
                url,
                key,
                state: Mutex::new(ResourceState::default()),
            }),
        }
    }

    pub(crate) fn key(&self) -> &str {
        &self.inner.key
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ResourceState) -> R) -> R {
        f(&mut self.inner.state.lock().unwrap())
    }

    fn assert_main_thread(&self) {
        self.inner.context.main().assert_main_thread();
    }

    fn now(&self) -> SystemTime {
        self.inner.context.clock().now()
    }

    fn request_context(&self, method: &Method) -> RequestContext {
        RequestContext {
            main: self.inner.context.main().clone(),
            clock: self.inner.context.clock().clone(),
            progress_interval: self.configuration(method).progress_report_interval,
        }
    }

    /// The resource's URL, or `None` if it was created from an invalid one.
    pub fn url(&self) -> Option<&Url> {
        self.inner.url.as_ref()
    }

    /// Returns the entity from the most recent success.
    ///
    /// # Returns
    /// `None` before the first success and after [`Resource::wipe`]. A later
    /// failure does not clear it.
    pub fn latest_data(&self) -> Option<Entity> {
        self.with_state(|state| state.latest_data.clone())
    }

    /// The error from the most recent failure, cleared by the next success
    /// or not-modified response. Cancellations never set it.
    pub fn latest_error(&self) -> Option<RequestError> {
        self.with_state(|state| state.latest_error.clone())
    }

    /// The later of the latest data's and the latest error's timestamps.
    pub fn timestamp(&self) -> Option<SystemTime> {
        self.with_state(|state| {
            let data = state.latest_data.as_ref().map(Entity::timestamp);
            let error = state.latest_error.as_ref().map(RequestError::timestamp);
            data.max(error)
        })
    }

    /// Whether a load request is in flight.
    pub fn is_loading(&self) -> bool {
        self.with_state(|state| !state.load_requests.is_empty())
    }

    /// Whether any request for this resource is in flight.
    pub fn is_requesting(&self) -> bool {
        self.with_state(|state| !state.all_requests.is_empty())
    }

    /// Whether the latest data or error is recent enough to skip a load.
    ///
    /// Errors age out after the retry time and data after the expiration
    /// time. Invalidation makes any state stale.
    pub fn is_up_to_date(&self) -> bool {
        let (timestamp, has_error, invalidated) = self.with_state(|state| {
            let data = state.latest_data.as_ref().map(Entity::timestamp);
            let error = state.latest_error.as_ref().map(RequestError::timestamp);
            (data.max(error), state.latest_error.is_some(), state.invalidated)
        });
        let Some(timestamp) = timestamp else {
            return false;
        };
        if invalidated {
            return false;
        }
        let config = self.configuration(&Method::GET);
        let max_age = if has_error {
            config.retry_time
        } else {
            config.expiration_time
        };
        // A timestamp in the future counts as age zero.
        let age = self
            .now()
            .duration_since(timestamp)
            .unwrap_or(Duration::ZERO);
        age <= max_age
    }

    /// The latest content if it has type `T`.
    pub fn typed_content<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.with_state(|state| {
            state
                .latest_data
                .as_ref()
                .and_then(|entity| entity.content().downcast::<T>())
        })
    }

    /// The latest content as text, or `None` if it is not a `String`.
    pub fn text(&self) -> Option<String> {
        self.typed_content::<String>().map(|text| text.as_ref().clone())
    }

    /// The latest content as JSON, or `None` if it is not parsed JSON.
    pub fn json(&self) -> Option<Value> {
        self.typed_content::<Value>().map(|json| json.as_ref().clone())
    }

    /// The configuration for requests using `method`.
    pub fn configuration(&self, method: &Method) -> Arc<Configuration> {
        let context = &self.inner.context;
        let version = context.configuration_version();
        let cached = self.with_state(|state| {
            state
                .configurations
                .get(method)
                .filter(|(cached_version, _)| *cached_version == version)
                .map(|(_, config)| config.clone())
        });
        if let Some(config) = cached {
            return config;
        }
        let config = Arc::new(context.build_configuration(self.url(), method));
        self.with_state(|state| {
            state
                .configurations
                .insert(method.clone(), (version, config.clone()))
        });
        config
    }

    // Navigation

    /// The resource at `subpath` below this one.
    pub fn child(&self, subpath: &str) -> Resource {
        let url = self.url().map(|url| navigation::child(url, subpath));
        self.sibling(url, subpath)
    }

    /// The resource `href` points to, resolved against this one.
    pub fn relative(&self, href: &str) -> Resource {
        let url = self.url().and_then(|url| navigation::relative(url, href));
        self.sibling(url, href)
    }

    pub fn optional_relative(&self, href: Option<&str>) -> Option<Resource> {
        href.map(|href| self.relative(href))
    }

    /// This resource's URL with query parameter `name` set, or removed when
    /// `value` is `None`.
    pub fn with_param(&self, name: &str, value: Option<&str>) -> Resource {
        let url = self
            .url()
            .map(|url| navigation::with_param(url, name, value));
        self.sibling(url, name)
    }

    fn sibling(&self, url: Option<Url>, raw: &str) -> Resource {
        let invalid = || format!("{} + {}", self.inner.key, raw);
        match (self.inner.service.upgrade().map(Service::from_inner), url) {
            (Some(service), Some(url)) => service.resource_for_url(url),
            (Some(service), None) => service.invalid_resource(&invalid()),
            // The service is gone, so there is no registry to share with.
            (None, url) => {
                let key = url
                    .as_ref()
                    .map_or_else(|| format!("invalid:{}", invalid()), Url::to_string);
                Resource::new(self.inner.context.clone(), Weak::new(), url, key)
            }
        }
    }

    // Requests

    /// Starts a request with no changes beyond the configured headers.
    pub fn request(&self, method: Method) -> Request {
        self.request_with(method, |_| {})
    }

    /// Starts a request, letting `mutation` adjust it before it is sent.
    ///
    /// The request does not touch the resource's state unless it is passed
    /// to [`Resource::load_using`].
    pub fn request_with<F>(&self, method: Method, mutation: F) -> Request
    where
        F: Fn(&mut RequestDescriptor) + Send + Sync + 'static,
    {
        self.assert_main_thread();
        if self.url().is_none() {
            return self.failed_request(RequestError::from_cause(
                ErrorCause::InvalidUrl {
                    url: Some(self.inner.key.clone()),
                },
                self.now(),
            ));
        }
        let mutation: RequestMutation = Arc::new(mutation);
        let context = self.request_context(&method);
        let config = self.configuration(&method);
        let delegate = NetworkRequestDelegate::new(
            self.clone(),
            method,
            mutation,
            self.inner.context.networking().clone(),
        );
        let request = Request::new(Box::new(delegate), context);
        let request = config.decorate(self, request);
        request.start();
        self.track_request(&request);
        request
    }

    /// Starts a request with a JSON body.
    pub fn request_with_json<T: Serialize>(&self, method: Method, body: &T) -> Request {
        match serde_json::to_vec(body) {
            Ok(bytes) => self.request_with_body(method, bytes, "application/json"),
            Err(e) => self.failed_request(RequestError::from_cause(
                ErrorCause::InvalidJsonObject {
                    message: e.to_string(),
                },
                self.now(),
            )),
        }
    }

    /// Starts a request with a text body in the given encoding, which must be
    /// `utf-8`, `us-ascii` or `iso-8859-1`.
    pub fn request_with_text(
        &self,
        method: Method,
        text: &str,
        encoding: &str,
    ) -> Request {
        match encode_text(text, encoding) {
            Some(bytes) => self.request_with_body(
                method,
                bytes,
                &format!("text/plain; charset={}", encoding.to_ascii_lowercase()),
            ),
            None => self.failed_request(RequestError::from_cause(
                ErrorCause::UnencodableText {
                    encoding: encoding.to_string(),
                },
                self.now(),
            )),
        }
    }

    /// Starts a request with an `application/x-www-form-urlencoded` body.
    pub fn request_with_url_encoded(
        &self,
        method: Method,
        params: &[(&str, &str)],
    ) -> Request {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish();
        self.request_with_body(
            method,
            body.into_bytes(),
            "application/x-www-form-urlencoded",
        )
    }

    fn request_with_body(&self, method: Method, body: Vec<u8>, content_type: &str) -> Request {
        let content_type = content_type.to_string();
        self.request_with(method, move |descriptor| {
            descriptor.set_header("Content-Type", &content_type);
            descriptor.set_body(body.clone());
        })
    }

    /// Prepares an unstarted request around a custom delegate.
    pub fn prepare_request(&self, delegate: impl RequestDelegate + 'static) -> Request {
        Request::new(Box::new(delegate), self.request_context(&Method::GET))
    }

    /// A started request that completes with `info`.
    pub fn hardwired_request(&self, info: ResponseInfo) -> Request {
        Request::hardwired(info, self.request_context(&Method::GET))
    }

    /// A started request that fails with `error`.
    pub fn failed_request(&self, error: RequestError) -> Request {
        Request::failed(error, self.request_context(&Method::GET))
    }

    fn track_request(&self, request: &Request) {
        self.with_state(|state| state.all_requests.push(request.clone()));
        let resource = self.clone();
        let tracked = request.clone();
        request.on_completion(move |_| {
            resource.with_state(|state| state.all_requests.retain(|r| !r.ptr_eq(&tracked)));
        });
    }

    // Loading

    /// Starts a GET that updates this resource.
    ///
    /// Sends `If-None-Match` when the latest data has an ETag, so the server
    /// can answer 304.
    pub fn load(&self) -> Request {
        let etag = self
            .latest_data()
            .and_then(|entity| entity.etag().map(str::to_string));
        let request = self.request_with(Method::GET, move |descriptor| {
            if let Some(etag) = &etag {
                descriptor.set_header("If-None-Match", etag);
            }
        });
        self.load_using(request)
    }

    /// Lets `request` update this resource when it completes.
    ///
    /// Clears invalidation, reports progress to observers and sends
    /// [`ResourceEvent::Requested`].
    pub fn load_using(&self, request: Request) -> Request {
        self.assert_main_thread();
        self.with_state(|state| {
            state.invalidated = false;
            state.load_requests.push(request.clone());
        });

        let resource = self.clone();
        let tracked = request.clone();
        request.on_completion(move |_| {
            resource.with_state(|state| {
                state.load_requests.retain(|r| !r.ptr_eq(&tracked));
            });
        });

        let resource = self.clone();
        request.on_progress(move |progress| resource.notify_progress(progress));
        let resource = self.clone();
        request.on_new_data(move |entity| {
            resource.receive_new_data(entity.clone(), NewDataSource::Network)
        });
        let resource = self.clone();
        request.on_not_modified(move || resource.receive_data_not_modified());
        let resource = self.clone();
        request.on_failure(move |error| resource.receive_error(error.clone()));

        self.notify_observers(ResourceEvent::Requested);
        request
    }

    /// Loads unless the resource is up to date, or reuses the load already
    /// in flight.
    ///
    /// # Returns
    /// The in-flight load if there is one, `None` if the resource is up to
    /// date, and a newly started load otherwise.
    pub fn load_if_needed(&self) -> Option<Request> {
        self.assert_main_thread();
        let in_flight = self.with_state(|state| state.load_requests.first().cloned());
        if let Some(request) = in_flight {
            debug!("{:?} already loading", self);
            return Some(request);
        }
        if self.is_up_to_date() {
            debug!("{:?} is up to date, no load needed", self);
            return None;
        }
        Some(self.load())
    }

    /// Cancels load requests, unless the resource is observed.
    ///
    /// Ad hoc requests from [`Resource::request`] are never cancelled here.
    pub fn cancel_load_if_unobserved(&self) {
        self.assert_main_thread();
        self.clean_defunct_observers();
        let loads = self.with_state(|state| {
            if state.observers.is_empty() {
                state.load_requests.clone()
            } else {
                Vec::new()
            }
        });
        if !loads.is_empty() {
            info!("{:?} has no observers, cancelling {} loads", self, loads.len());
        }
        for request in loads {
            request.cancel();
        }
    }

    /// Calls [`Resource::cancel_load_if_unobserved`] after `delay`, then
    /// `then`.
    ///
    /// # Parameters
    /// - `delay`: How long observers have to reappear before loads are cancelled
    /// - `then`: Runs on the main queue once the check is done
    pub fn cancel_load_if_unobserved_after<F>(&self, delay: Duration, then: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let resource = self.clone();
        self.inner.context.main().dispatch_after(delay, move || {
            resource.cancel_load_if_unobserved();
            then();
        });
    }

    // Local mutation

    /// Replaces the latest data with `entity`, as if it had just loaded.
    ///
    /// Cached copies are removed, since they no longer match.
    pub fn override_local_data(&self, entity: Entity) {
        self.assert_main_thread();
        if let Some(url) = self.url() {
            self.configuration(&Method::GET)
                .pipeline
                .remove_cache_entries(url.as_str());
        }
        self.receive_new_data(entity, NewDataSource::LocalOverride);
    }

    /// Replaces only the content of the latest data, keeping its headers and
    /// content type, with the timestamp set to now.
    pub fn override_local_content(&self, content: Content) {
        let now = self.now();
        let entity = match self.latest_data() {
            Some(existing) => {
                let mut entity = existing.with_content(content);
                entity.touch(now);
                entity
            }
            None => Entity::new(content, LOCAL_CONTENT_TYPE, now),
        };
        self.override_local_data(entity);
    }

    /// Marks the resource stale without touching its data.
    pub fn invalidate(&self) {
        self.assert_main_thread();
        self.with_state(|state| state.invalidated = true);
    }

    /// Cancels every request, clears data and error, and reloads from cache.
    pub fn wipe(&self) {
        self.assert_main_thread();
        let requests = self.with_state(|state| {
            let mut requests = state.all_requests.clone();
            for load in &state.load_requests {
                if !requests.iter().any(|r| r.ptr_eq(load)) {
                    requests.push(load.clone());
                }
            }
            requests
        });
        info!("wipe {:?}, cancelling {} requests", self, requests.len());
        for request in requests {
            request.cancel();
        }
        self.with_state(|state| {
            state.latest_data = None;
            state.latest_error = None;
            state.generation += 1;
        });
        self.notify_observers(ResourceEvent::NewData(NewDataSource::Wipe));
        self.initialize_data_from_cache();
    }

    // State transitions driven by request completion

    fn receive_new_data(&self, entity: Entity, source: NewDataSource) {
        self.with_state(|state| {
            state.latest_error = None;
            state.latest_data = Some(entity);
            state.generation += 1;
        });
        self.notify_observers(ResourceEvent::NewData(source));
    }

    fn receive_data_not_modified(&self) {
        let now = self.now();
        self.with_state(|state| {
            state.latest_error = None;
            if let Some(entity) = state.latest_data.as_mut() {
                entity.touch(now);
            }
            state.generation += 1;
        });
        if let Some(url) = self.url() {
            self.configuration(&Method::GET)
                .pipeline
                .update_cache_entry_timestamps(now, url.as_str());
        }
        self.notify_observers(ResourceEvent::NotModified);
    }

    fn receive_error(&self, error: RequestError) {
        if error.is_cancellation() {
            self.notify_observers(ResourceEvent::RequestCancelled);
            return;
        }
        self.with_state(|state| {
            state.latest_error = Some(error);
            state.generation += 1;
        });
        self.notify_observers(ResourceEvent::Error);
    }

    fn receive_data_from_cache(&self, entity: Entity, generation: u64) {
        let accepted = self.with_state(|state| {
            if state.generation != generation {
                return false;
            }
            state.latest_data = Some(entity);
            state.generation += 1;
            true
        });
        if accepted {
            self.notify_observers(ResourceEvent::NewData(NewDataSource::Cache));
        } else {
            debug!("{:?} changed while reading cache, cached data dropped", self);
        }
    }

    /// Looks for cached data on the background pool.
    ///
    /// The result is applied only if nothing else changed the resource in
    /// the meantime.
    pub(crate) fn initialize_data_from_cache(&self) {
        let Some(url) = self.url() else {
            return;
        };
        let Some(check) = self
            .configuration(&Method::GET)
            .pipeline
            .cache_check(url.as_str())
        else {
            return;
        };
        let generation = self.with_state(|state| state.generation);
        let resource = self.clone();
        let main = self.inner.context.main().clone();
        spawn_background(move || {
            if let Some(entity) = check() {
                main.dispatch(move || resource.receive_data_from_cache(entity, generation));
            }
        });
    }

    // Observers

    /// Adds an observer that owns itself.
    ///
    /// The resource holds it weakly, so it stays registered only while
    /// something else keeps it alive.
    pub fn add_observer(&self, observer: Arc<dyn ResourceObserver>) -> &Self {
        self.add_observer_entry(observer, None)
    }

    /// Adds an observer that stays registered while `owner` is alive.
    ///
    /// # Parameters
    /// - `observer`: Receives events; held strongly while `owner` lives
    /// - `owner`: Any shared object, compared by address and held weakly
    ///
    /// # Returns
    /// This resource, for chaining
    pub fn add_observer_owned_by<O: Any + Send + Sync>(
        &self,
        observer: Arc<dyn ResourceObserver>,
        owner: &Arc<O>,
    ) -> &Self {
        self.add_observer_entry(observer, Some(OwnerRef::new(owner)))
    }

    /// Adds a closure observer that stays registered while `owner` is alive.
    pub fn add_observer_fn<O, F>(&self, owner: &Arc<O>, f: F) -> &Self
    where
        O: Any + Send + Sync,
        F: Fn(&Resource, ResourceEvent) + Send + Sync + 'static,
    {
        self.add_observer_owned_by(Arc::new(ClosureObserver::new(f)), owner)
    }

    /// Removes `owner` from all observers, dropping those it alone kept.
    pub fn remove_observers_owned_by<O: ?Sized>(&self, owner: &Arc<O>) {
        self.assert_main_thread();
        let address = address_of(owner);
        // Keep released observers alive until they are told.
        let _alive = self.with_state(|state| {
            let alive = state.observers.live_observers();
            state.observers.remove_owner(address);
            alive
        });
        self.clean_defunct_observers();
    }

    pub fn observer_count(&self) -> usize {
        self.clean_defunct_observers();
        self.with_state(|state| state.observers.len())
    }

    fn add_observer_entry(
        &self,
        observer: Arc<dyn ResourceObserver>,
        owner: Option<OwnerRef>,
    ) -> &Self {
        self.assert_main_thread();
        let added = self.with_state(|state| state.observers.add(observer.clone(), owner));
        if added {
            debug!("{:?} gained an observer", self);
            observer.resource_changed(self, ResourceEvent::ObserverAdded);
        }
        self
    }

    fn clean_defunct_observers(&self) {
        let removed = self.with_state(|state| state.observers.sweep());
        for observer in removed {
            observer.stopped_observing(self);
        }
    }

    fn notify_observers(&self, event: ResourceEvent) {
        self.clean_defunct_observers();
        let observers = self.with_state(|state| state.observers.live_observers());
        debug!("{:?} {:?} to {} observers", self, event, observers.len());
        for observer in observers {
            observer.resource_changed(self, event);
        }
    }

    fn notify_progress(&self, progress: f64) {
        let observers = self.with_state(|state| state.observers.live_observers());
        for observer in observers {
            observer.resource_request_progress(self, progress);
        }
    }
}

impl PartialEq for Resource {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Resource {}

impl Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.url() {
            Some(url) => write!(f, "Resource({})", url),
            None => write!(f, "Resource(invalid: {})", self.inner.key),
        }
    }
}

fn encode_text(text: &str, encoding: &str) -> Option<Vec<u8>> {
    match encoding.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Some(text.as_bytes().to_vec()),
        "us-ascii" | "ascii" => text.is_ascii().then(|| text.as_bytes().to_vec()),
        "iso-8859-1" | "latin1" | "latin-1" => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect(),
        _ => None,
    }
}
