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

//! Per-resource configuration.
//!
//! A [`Configuration`] is assembled for each resource and request method by
//! starting from the defaults and applying, in registration order, every
//! configurer registered on the service whose pattern and method match.

use std::fmt::{self, Debug};
use std::sync::Arc;
use std::time::Duration;

use http::Method;
use log::error;
use regex::Regex;
use url::Url;

use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::resource::Resource;

const DEFAULT_EXPIRATION_TIME: Duration = Duration::from_secs(30);
const DEFAULT_RETRY_TIME: Duration = Duration::from_secs(1);
const DEFAULT_PROGRESS_REPORT_INTERVAL: Duration = Duration::from_millis(50);

type RequestDecorator = Arc<dyn Fn(&Resource, Request) -> Request + Send + Sync>;

/// Settings that govern how one resource loads and processes data.
#[derive(Clone)]
pub struct Configuration {
    /// How long loaded data counts as fresh.
    pub expiration_time: Duration,
    /// How long after an error before `load_if_needed` tries again.
    pub retry_time: Duration,
    /// How often in-flight requests poll transfer progress.
    pub progress_report_interval: Duration,
    /// The response pipeline.
    pub pipeline: Pipeline,
    headers: Vec<(String, String)>,
    decorators: Vec<RequestDecorator>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            expiration_time: DEFAULT_EXPIRATION_TIME,
            retry_time: DEFAULT_RETRY_TIME,
            progress_report_interval: DEFAULT_PROGRESS_REPORT_INTERVAL,
            pipeline: Pipeline::default(),
            headers: Vec::new(),
            decorators: Vec::new(),
        }
    }
}

impl Configuration {
    /// Adds a header to every request, replacing one with the same
    /// case-insensitive name.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.to_string()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Wraps every request made for the resource.
    ///
    /// Decorators run in registration order on the unstarted request and may
    /// return it as is, or a replacement such as a chained request.
    pub fn decorate_requests<F>(&mut self, decorator: F)
    where
        F: Fn(&Resource, Request) -> Request + Send + Sync + 'static,
    {
        self.decorators.push(Arc::new(decorator));
    }

    pub(crate) fn decorate(&self, resource: &Resource, request: Request) -> Request {
        self.decorators
            .iter()
            .fold(request, |request, decorator| decorator(resource, request))
    }
}

impl Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("expiration_time", &self.expiration_time)
            .field("retry_time", &self.retry_time)
            .field("progress_report_interval", &self.progress_report_interval)
            .field("headers", &self.headers)
            .field("decorators", &self.decorators.len())
            .finish()
    }
}

/// A URL pattern selecting which resources a configurer applies to.
///
/// `*` matches within one path segment and `**` matches across segments.
/// Patterns that are not absolute URLs are taken relative to the service's
/// base URL. Query strings are ignored when matching.
#[derive(Clone, Debug)]
pub struct ConfigurationPattern {
    source: String,
    regex: Option<Regex>,
}

impl ConfigurationPattern {
    pub fn new(pattern: &str, base_url: Option<&Url>) -> Self {
        let absolute = match (pattern.contains("://"), base_url) {
            (false, Some(base)) => format!(
                "{}/{}",
                base.as_str().trim_end_matches('/'),
                pattern.trim_start_matches('/')
            ),
            _ => pattern.to_string(),
        };
        let source = format!(
            "^{}$",
            regex::escape(&absolute)
                .replace(r"\*\*", ".*")
                .replace(r"\*", "[^/]*")
        );
        let regex = match Regex::new(&source) {
            Ok(regex) => Some(regex),
            Err(e) => {
                error!("configuration pattern {} rejected: {}", pattern, e);
                None
            }
        };
        Self {
            source: absolute,
            regex,
        }
    }

    pub fn matches(&self, url: &Url) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(crate::navigation::without_query(url)))
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// One registered configurer.
pub(crate) struct ConfigurationEntry {
    pub(crate) description: String,
    pub(crate) pattern: Option<ConfigurationPattern>,
    pub(crate) method: Option<Method>,
    pub(crate) configurer: Arc<dyn Fn(&mut Configuration) + Send + Sync>,
}

impl ConfigurationEntry {
    pub(crate) fn applies_to(&self, url: Option<&Url>, method: &Method) -> bool {
        if self.method.as_ref().is_some_and(|only| only != method) {
            return false;
        }
        match (&self.pattern, url) {
            (None, _) => true,
            (Some(pattern), Some(url)) => pattern.matches(url),
            (Some(_), None) => false,
        }
    }
}
