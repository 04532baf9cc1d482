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

//! The response pipeline.
//!
//! A [`Pipeline`] is an ordered list of named stages. Each stage holds zero or
//! more transformers and at most one entity cache. A new network response is
//! folded through every stage in order on the background pool; after each
//! stage, a successful entity is written to that stage's cache.
//!
//! When a resource is first created, the caches are consulted in reverse
//! order. The first hit is replayed through the stages after it, so a cache of
//! raw bytes still produces fully parsed content.

mod cache;
mod standard;
mod transformer;

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Arc;
use std::time::SystemTime;

use cache_core::{Entity, EntityCache};
use log::{debug, warn};

pub use standard::{json_model_transformer, json_transformer, text_transformer, StandardTransformer};
pub use transformer::{
    response_transformer, ContentTransformer, ContentTypeMatcher, InputTypeMismatchAction,
    ResponseTransformer,
};

use crate::queue::spawn_background;
use crate::response::Response;
use cache::{write_in_background, BoundCacheEntry, CacheBox, ErasedCache};

/// The name of a pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineStageKey(Cow<'static, str>);

impl PipelineStageKey {
    pub const RAW_DATA: PipelineStageKey = PipelineStageKey(Cow::Borrowed("raw_data"));
    pub const DECODING: PipelineStageKey = PipelineStageKey(Cow::Borrowed("decoding"));
    pub const PARSING: PipelineStageKey = PipelineStageKey(Cow::Borrowed("parsing"));
    pub const MODEL: PipelineStageKey = PipelineStageKey(Cow::Borrowed("model"));
    pub const CLEANUP: PipelineStageKey = PipelineStageKey(Cow::Borrowed("cleanup"));

    pub fn new(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for PipelineStageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transformers and an optional cache for one stage.
#[derive(Clone, Default)]
pub struct PipelineStage {
    transformers: Vec<Arc<dyn ResponseTransformer>>,
    cache: Option<Arc<dyn ErasedCache>>,
}

impl PipelineStage {
    /// Appends a transformer to this stage.
    pub fn add<T>(&mut self, transformer: T) -> &mut Self
    where
        T: ResponseTransformer + 'static,
    {
        self.transformers.push(Arc::new(transformer));
        self
    }

    pub fn add_shared(&mut self, transformer: Arc<dyn ResponseTransformer>) -> &mut Self {
        self.transformers.push(transformer);
        self
    }

    pub fn remove_transformers(&mut self) -> &mut Self {
        self.transformers.clear();
        self
    }

    /// Stores entities leaving this stage in `cache`, replacing any previous
    /// cache.
    pub fn cache_using<C: EntityCache>(&mut self, cache: Arc<C>) -> &mut Self {
        self.cache = Some(Arc::new(CacheBox::new(cache)));
        self
    }

    pub fn do_not_cache(&mut self) -> &mut Self {
        self.cache = None;
        self
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    pub fn transformer_count(&self) -> usize {
        self.transformers.len()
    }

    pub fn transformer_descriptions(&self) -> Vec<String> {
        self.transformers.iter().map(|t| t.description()).collect()
    }
}

/// An ordered set of stages.
#[derive(Clone)]
pub struct Pipeline {
    order: Vec<PipelineStageKey>,
    stages: HashMap<PipelineStageKey, PipelineStage>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            order: vec![
                PipelineStageKey::RAW_DATA,
                PipelineStageKey::DECODING,
                PipelineStageKey::PARSING,
                PipelineStageKey::MODEL,
                PipelineStageKey::CLEANUP,
            ],
            stages: HashMap::new(),
        }
    }
}

impl Pipeline {
    pub fn order(&self) -> &[PipelineStageKey] {
        &self.order
    }

    /// Replaces the stage order. Stages left out keep their contents but no
    /// longer run.
    pub fn set_order(&mut self, order: Vec<PipelineStageKey>) {
        self.order = order;
    }

    /// Returns a stage for editing, creating it empty if needed.
    pub fn stage_mut(&mut self, key: &PipelineStageKey) -> &mut PipelineStage {
        self.stages.entry(key.clone()).or_default()
    }

    pub fn stage(&self, key: &PipelineStageKey) -> Option<&PipelineStage> {
        self.stages.get(key)
    }

    pub fn remove_all_transformers(&mut self) {
        for stage in self.stages.values_mut() {
            stage.remove_transformers();
        }
    }

    pub fn remove_all_caches(&mut self) {
        for stage in self.stages.values_mut() {
            stage.do_not_cache();
        }
    }

    /// Resolves the ordered stages for `url`, deriving cache keys.
    fn plan(&self, url: Option<&str>) -> Vec<StagePlan> {
        self.order
            .iter()
            .filter_map(|key| {
                let stage = self.stages.get(key)?;
                let cache = match (&stage.cache, url) {
                    (Some(cache), Some(url)) => cache.bind(url, key.name()),
                    _ => None,
                };
                Some(StagePlan {
                    key: key.clone(),
                    transformers: stage.transformers.clone(),
                    cache,
                })
            })
            .collect()
    }

    /// Prepares the fold of `response` through every stage.
    ///
    /// Cache keys are derived now, on the calling thread; the returned
    /// closure does the transformation work and is meant for the background
    /// pool. Cache writes it triggers do not block it.
    pub(crate) fn make_processor(
        &self,
        response: Response,
        url: Option<&str>,
    ) -> impl FnOnce() -> Response + Send + 'static {
        let plan = self.plan(url);
        move || {
            plan.iter().fold(response, |response, stage| {
                let response = stage.process(response);
                if let (Response::Success(entity), Some(cache)) = (&response, &stage.cache) {
                    write_in_background(cache.clone(), entity.clone());
                }
                response
            })
        }
    }

    /// Prepares a cache lookup for `url`, or `None` when no stage caches it.
    pub(crate) fn cache_check(
        &self,
        url: &str,
    ) -> Option<impl FnOnce() -> Option<Entity> + Send + 'static> {
        let plan = self.plan(Some(url));
        if plan.iter().all(|stage| stage.cache.is_none()) {
            return None;
        }
        let url = url.to_string();
        Some(move || {
            for index in (0..plan.len()).rev() {
                let Some(cache) = &plan[index].cache else {
                    continue;
                };
                let Some(entity) = cache.read() else {
                    continue;
                };
                let replayed = plan[index + 1..]
                    .iter()
                    .fold(Response::Success(entity), |response, stage| {
                        stage.process(response)
                    });
                match replayed {
                    Response::Success(entity) => {
                        debug!("{} restored from {} cache", url, plan[index].key);
                        return Some(entity);
                    }
                    Response::Failure(error) => warn!(
                        "{} cached in {} no longer processes: {}",
                        url, plan[index].key, error
                    ),
                }
            }
            None
        })
    }

    /// Refreshes the timestamp of every cached entry for `url`.
    pub(crate) fn update_cache_entry_timestamps(&self, timestamp: SystemTime, url: &str) {
        let entries = self.cache_entries(url);
        if !entries.is_empty() {
            spawn_background(move || {
                for entry in entries {
                    entry.update_timestamp(timestamp);
                }
            });
        }
    }

    /// Removes every cached entry for `url`.
    pub(crate) fn remove_cache_entries(&self, url: &str) {
        let entries = self.cache_entries(url);
        if !entries.is_empty() {
            spawn_background(move || {
                for entry in entries {
                    entry.remove();
                }
            });
        }
    }

    fn cache_entries(&self, url: &str) -> Vec<Arc<dyn BoundCacheEntry>> {
        self.plan(Some(url))
            .into_iter()
            .filter_map(|stage| stage.cache)
            .collect()
    }
}

struct StagePlan {
    key: PipelineStageKey,
    transformers: Vec<Arc<dyn ResponseTransformer>>,
    cache: Option<Arc<dyn BoundCacheEntry>>,
}

impl StagePlan {
    fn process(&self, response: Response) -> Response {
        self.transformers
            .iter()
            .fold(response, |response, transformer| transformer.process(response))
    }
}
