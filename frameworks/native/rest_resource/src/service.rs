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

//! The service: resource registry and configuration.
//!
//! A [`Service`] owns the networking provider, the main queue and the clock,
//! and guarantees one [`Resource`] per URL. The registry keeps every resource
//! it hands out, together with its loaded data, until
//! [`Service::flush_unused_resources`] finds it idle.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use http::Method;
use log::{debug, info};
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::config::{Configuration, ConfigurationEntry, ConfigurationPattern};
use crate::navigation;
use crate::networking::NetworkingProvider;
use crate::pipeline::{
    json_transformer, text_transformer, PipelineStageKey, ResponseTransformer,
    StandardTransformer,
};
use crate::queue::MainQueue;
use crate::resource::Resource;

/// Reasons a service cannot be built.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    #[error("no networking provider configured")]
    MissingNetworking,
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

/// Builds a [`Service`].
pub struct ServiceBuilder {
    base_url: Option<String>,
    networking: Option<Arc<dyn NetworkingProvider>>,
    clock: Arc<dyn Clock>,
    main: Option<Arc<MainQueue>>,
    standard_transformers: Vec<StandardTransformer>,
}

impl ServiceBuilder {
    fn new() -> Self {
        Self {
            base_url: None,
            networking: None,
            clock: Arc::new(SystemClock),
            main: None,
            standard_transformers: StandardTransformer::ALL.to_vec(),
        }
    }

    /// The URL that [`Service::resource`] paths are relative to.
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = Some(url.to_string());
        self
    }

    pub fn networking(mut self, networking: Arc<dyn NetworkingProvider>) -> Self {
        self.networking = Some(networking);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The queue resource state is confined to. Defaults to a new queue on
    /// the building thread.
    pub fn main_queue(mut self, main: Arc<MainQueue>) -> Self {
        self.main = Some(main);
        self
    }

    /// Which standard transformers to install on the parsing stage. Both are
    /// installed by default.
    pub fn standard_transformers(mut self, transformers: &[StandardTransformer]) -> Self {
        self.standard_transformers = transformers.to_vec();
        self
    }

    pub fn build(self) -> Result<Service, ServiceError> {
        let networking = self.networking.ok_or(ServiceError::MissingNetworking)?;
        let base_url = match self.base_url {
            Some(raw) => Some(
                navigation::parse(&raw).ok_or_else(|| ServiceError::InvalidBaseUrl(raw.clone()))?,
            ),
            None => None,
        };
        let context = ServiceContext {
            networking,
            main: self.main.unwrap_or_else(MainQueue::for_current_thread),
            clock: self.clock,
            configuration: Mutex::new(ConfigurationRegistry::default()),
            configuration_version: AtomicU64::new(0),
        };
        let service = Service {
            inner: Arc::new(ServiceInner {
                base_url,
                context: Arc::new(context),
                registry: Mutex::new(ResourceRegistry::default()),
            }),
        };

        let standard = self.standard_transformers;
        if !standard.is_empty() {
            service.configure(None, "standard transformers", move |config| {
                let parsing = config.pipeline.stage_mut(&PipelineStageKey::PARSING);
                for transformer in &standard {
                    match transformer {
                        StandardTransformer::Json => parsing.add(json_transformer()),
                        StandardTransformer::Text => parsing.add(text_transformer()),
                    };
                }
            });
        }
        info!("service created for {:?}", service.base_url().map(Url::as_str));
        Ok(service)
    }
}

#[derive(Default)]
struct ConfigurationRegistry {
    entries: Vec<ConfigurationEntry>,
}

#[derive(Default)]
struct ResourceRegistry {
    /// Every resource handed out and not yet flushed, keyed by URL.
    resources: HashMap<String, Resource>,
}

/// The parts of a service that its resources share.
///
/// Resources hold this rather than the service itself, so the registry can
/// own its resources without forming a cycle.
pub(crate) struct ServiceContext {
    networking: Arc<dyn NetworkingProvider>,
    main: Arc<MainQueue>,
    clock: Arc<dyn Clock>,
    configuration: Mutex<ConfigurationRegistry>,
    /// Bumped whenever configuration may have changed.
    configuration_version: AtomicU64,
}

impl ServiceContext {
    pub(crate) fn main(&self) -> &Arc<MainQueue> {
        &self.main
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn networking(&self) -> &Arc<dyn NetworkingProvider> {
        &self.networking
    }

    pub(crate) fn configuration_version(&self) -> u64 {
        self.configuration_version.load(Ordering::Acquire)
    }

    /// Applies every matching configurer, in registration order, to the
    /// defaults.
    pub(crate) fn build_configuration(&self, url: Option<&Url>, method: &Method) -> Configuration {
        let configurers: Vec<_> = {
            let registry = self.configuration.lock().unwrap();
            registry
                .entries
                .iter()
                .filter(|entry| entry.applies_to(url, method))
                .map(|entry| (entry.description.clone(), entry.configurer.clone()))
                .collect()
        };
        let mut config = Configuration::default();
        for (description, configurer) in configurers {
            debug!(
                "apply {} to {} {}",
                description,
                method,
                url.map(Url::as_str).unwrap_or("<invalid url>")
            );
            configurer(&mut config);
        }
        config
    }
}

pub(crate) struct ServiceInner {
    base_url: Option<Url>,
    context: Arc<ServiceContext>,
    registry: Mutex<ResourceRegistry>,
}

/// Entry point: hands out resources and holds their configuration.
#[derive(Clone)]
pub struct Service {
    inner: Arc<ServiceInner>,
}

impl Service {
    pub fn builder() -> ServiceBuilder {
        ServiceBuilder::new()
    }

    pub(crate) fn from_inner(inner: Arc<ServiceInner>) -> Self {
        Self { inner }
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.inner.base_url.as_ref()
    }

    pub fn main_queue(&self) -> &Arc<MainQueue> {
        self.inner.context.main()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        self.inner.context.clock()
    }

    /// The resource at `path` below the base URL.
    ///
    /// Without a base URL the resource is invalid; its requests fail with
    /// [`crate::ErrorCause::InvalidUrl`].
    ///
    /// # Parameters
    /// - `path`: Appended to the base URL; leading slashes are collapsed
    ///
    /// # Returns
    /// The same resource for every lookup of the same URL until it is
    /// flushed
    pub fn resource(&self, path: &str) -> Resource {
        match self.base_url() {
            Some(base) => self.resource_for_url(navigation::child(base, path)),
            None => self.invalid_resource(path),
        }
    }

    /// The resource for an absolute URL.
    pub fn resource_absolute(&self, url: &str) -> Resource {
        match navigation::parse(url) {
            Some(url) => self.resource_for_url(url),
            None => self.invalid_resource(url),
        }
    }

    pub(crate) fn resource_for_url(&self, url: Url) -> Resource {
        let key = url.to_string();
        self.lookup_or_create(key, Some(url))
    }

    pub(crate) fn invalid_resource(&self, raw: &str) -> Resource {
        self.lookup_or_create(format!("invalid:{}", raw), None)
    }

    fn lookup_or_create(&self, key: String, url: Option<Url>) -> Resource {
        self.inner.context.main().assert_main_thread();
        let resource = {
            let mut registry = self.inner.registry.lock().unwrap();
            if let Some(existing) = registry.resources.get(&key) {
                return existing.clone();
            }
            let resource = Resource::new(
                self.inner.context.clone(),
                Arc::downgrade(&self.inner),
                url,
                key.clone(),
            );
            registry.resources.insert(key, resource.clone());
            resource
        };
        debug!("created {:?}", resource);
        resource.initialize_data_from_cache();
        resource
    }

    /// Registers a configurer for resources matching `pattern`, or for every
    /// resource when `pattern` is `None`.
    ///
    /// Configurers apply in registration order, so later ones override
    /// earlier ones.
    pub fn configure<F>(&self, pattern: Option<&str>, description: &str, configurer: F)
    where
        F: Fn(&mut Configuration) + Send + Sync + 'static,
    {
        self.add_configuration(pattern, None, description, Arc::new(configurer));
    }

    /// Like [`Service::configure`], restricted to one request method.
    pub fn configure_for_method<F>(
        &self,
        pattern: Option<&str>,
        method: Method,
        description: &str,
        configurer: F,
    ) where
        F: Fn(&mut Configuration) + Send + Sync + 'static,
    {
        self.add_configuration(pattern, Some(method), description, Arc::new(configurer));
    }

    /// Appends `transformer` to `stage` for resources matching `pattern`.
    pub fn configure_transformer<T>(&self, pattern: Option<&str>, stage: PipelineStageKey, transformer: T)
    where
        T: ResponseTransformer + 'static,
    {
        let transformer: Arc<dyn ResponseTransformer> = Arc::new(transformer);
        let description = format!("{} transformer {}", stage, transformer.description());
        self.configure(pattern, &description, move |config| {
            config.pipeline.stage_mut(&stage).add_shared(transformer.clone());
        });
    }

    fn add_configuration(
        &self,
        pattern: Option<&str>,
        method: Option<Method>,
        description: &str,
        configurer: Arc<dyn Fn(&mut Configuration) + Send + Sync>,
    ) {
        let pattern = pattern.map(|p| ConfigurationPattern::new(p, self.base_url()));
        debug!("configure {} for {:?}", description, pattern.as_ref().map(|p| p.source()));
        self.inner
            .context
            .configuration
            .lock()
            .unwrap()
            .entries
            .push(ConfigurationEntry {
                description: description.to_string(),
                pattern,
                method,
                configurer,
            });
        self.invalidate_configuration();
    }

    /// Forces every resource to rebuild its configuration on next use.
    ///
    /// Call this when state read by a configurer changes, such as an auth
    /// token.
    pub fn invalidate_configuration(&self) {
        self.inner
            .context
            .configuration_version
            .fetch_add(1, Ordering::AcqRel);
    }

    /// Every registered resource.
    fn live_resources(&self) -> Vec<Resource> {
        let registry = self.inner.registry.lock().unwrap();
        registry.resources.values().cloned().collect()
    }

    /// How many resources the registry currently holds.
    pub fn cached_resource_count(&self) -> usize {
        self.inner.registry.lock().unwrap().resources.len()
    }

    /// Drops resources that have no live observers and no request in flight.
    ///
    /// A dropped resource loses its data; the next lookup of its URL creates
    /// a fresh one, which starts again from the cache.
    pub fn flush_unused_resources(&self) {
        self.inner.context.main().assert_main_thread();
        // Observer sweeps call back into observers, so run them unlocked.
        let idle: Vec<String> = self
            .live_resources()
            .into_iter()
            .filter(|resource| resource.observer_count() == 0 && !resource.is_requesting())
            .map(|resource| resource.key().to_string())
            .collect();
        let (flushed, remaining) = {
            let mut registry = self.inner.registry.lock().unwrap();
            let flushed: Vec<Resource> = idle
                .iter()
                .filter_map(|key| registry.resources.remove(key))
                .collect();
            (flushed, registry.resources.len())
        };
        info!(
            "flushed {} unused resources, {} remain",
            flushed.len(),
            remaining
        );
    }

    /// Wipes every live resource.
    pub fn wipe_resources(&self) {
        self.inner.context.main().assert_main_thread();
        for resource in self.live_resources() {
            resource.wipe();
        }
    }

    /// Wipes every live resource whose URL matches `pattern`.
    pub fn wipe_resources_matching(&self, pattern: &str) {
        self.inner.context.main().assert_main_thread();
        let pattern = ConfigurationPattern::new(pattern, self.base_url());
        for resource in self.live_resources() {
            if resource.url().is_some_and(|url| pattern.matches(url)) {
                resource.wipe();
            }
        }
    }
}
