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

//! Response transformers.
//!
//! A [`ResponseTransformer`] turns one [`Response`] into another. Most
//! transformers are [`ContentTransformer`]s, which only look at entities with
//! a matching content type and map their content from one Rust type to
//! another.

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use cache_core::{Content, Entity};
use log::error;
use regex::Regex;

use crate::error::{ErrorCause, RequestError};
use crate::response::Response;

/// One step of a pipeline stage.
pub trait ResponseTransformer: Send + Sync {
    fn process(&self, response: Response) -> Response;

    fn description(&self) -> String {
        type_name::<Self>().to_string()
    }
}

struct FnTransformer<F>(F);

impl<F> ResponseTransformer for FnTransformer<F>
where
    F: Fn(Response) -> Response + Send + Sync,
{
    fn process(&self, response: Response) -> Response {
        (self.0)(response)
    }

    fn description(&self) -> String {
        "closure transformer".to_string()
    }
}

/// Wraps a closure over whole responses as a transformer.
pub fn response_transformer<F>(f: F) -> impl ResponseTransformer
where
    F: Fn(Response) -> Response + Send + Sync + 'static,
{
    FnTransformer(f)
}

/// What a [`ContentTransformer`] does with content of the wrong type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputTypeMismatchAction {
    /// Fail with [`ErrorCause::WrongInputTypeInTransformerPipeline`].
    Error,
    /// Pass the entity through unchanged.
    Skip,
    /// Pass the entity through if its content already has the output type,
    /// otherwise fail.
    SkipIfOutputTypeMatches,
}

/// Matches content types against wildcard patterns such as `text/*` or
/// `*/*+json`.
///
/// `*` matches any run of characters other than `/` and `+`. Parameters after
/// a `;` are ignored.
#[derive(Clone, Debug)]
pub struct ContentTypeMatcher {
    patterns: Vec<String>,
    regex: Option<Regex>,
}

impl ContentTypeMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns: Vec<String> = patterns
            .into_iter()
            .map(|pattern| pattern.as_ref().to_string())
            .collect();
        let alternatives: Vec<String> = patterns
            .iter()
            .map(|pattern| regex::escape(pattern).replace(r"\*", "[^/+]*"))
            .collect();
        let source = format!(r"(?i)^(?:{})\s*(?:$|;)", alternatives.join("|"));
        let regex = match Regex::new(&source) {
            Ok(regex) => Some(regex),
            Err(e) => {
                error!("content type patterns {:?} rejected: {}", patterns, e);
                None
            }
        };
        Self { patterns, regex }
    }

    pub fn matches(&self, content_type: &str) -> bool {
        self.regex
            .as_ref()
            .is_some_and(|regex| regex.is_match(content_type.trim()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

type ContentFn<I, O> = Arc<dyn Fn(Arc<I>, &Entity) -> Result<Option<O>, RequestError> + Send + Sync>;

/// Maps entity content of type `I` to content of type `O`.
///
/// Only successful entities are considered, unless error-body transformation
/// is turned on, in which case the entity attached to an HTTP error is
/// transformed too. An entity whose content type does not match is passed
/// through untouched.
pub struct ContentTransformer<I, O> {
    matcher: Option<ContentTypeMatcher>,
    mismatch: InputTypeMismatchAction,
    transform_errors: bool,
    f: ContentFn<I, O>,
    _types: PhantomData<fn(I) -> O>,
}

impl<I, O> Clone for ContentTransformer<I, O> {
    fn clone(&self) -> Self {
        Self {
            matcher: self.matcher.clone(),
            mismatch: self.mismatch,
            transform_errors: self.transform_errors,
            f: self.f.clone(),
            _types: PhantomData,
        }
    }
}

impl<I, O> ContentTransformer<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    /// Creates a transformer from a fallible mapping.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use rest_resource::ContentTransformer;
    ///
    /// let shout = ContentTransformer::new(|text: std::sync::Arc<String>, _| Ok(text.to_uppercase()))
    ///     .content_types(["text/plain"]);
    /// # let _ = shout;
    /// ```
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Arc<I>, &Entity) -> Result<O, RequestError> + Send + Sync + 'static,
    {
        Self::from_fn(Arc::new(move |input: Arc<I>, entity: &Entity| {
            f(input, entity).map(Some)
        }))
    }

    /// Creates a transformer from a mapping that may produce nothing, which
    /// becomes a [`ErrorCause::TransformerReturnedNothing`] failure.
    pub fn optional<F>(f: F) -> Self
    where
        F: Fn(Arc<I>, &Entity) -> Option<O> + Send + Sync + 'static,
    {
        Self::from_fn(Arc::new(move |input: Arc<I>, entity: &Entity| {
            Ok(f(input, entity))
        }))
    }

    fn from_fn(f: ContentFn<I, O>) -> Self {
        Self {
            matcher: None,
            mismatch: InputTypeMismatchAction::Error,
            transform_errors: false,
            f,
            _types: PhantomData,
        }
    }

    /// Restricts the transformer to matching content types.
    pub fn content_types<P, S>(mut self, patterns: P) -> Self
    where
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.matcher = Some(ContentTypeMatcher::new(patterns));
        self
    }

    pub fn on_input_type_mismatch(mut self, action: InputTypeMismatchAction) -> Self {
        self.mismatch = action;
        self
    }

    /// Also transform the bodies attached to HTTP errors.
    pub fn transform_errors(mut self, transform: bool) -> Self {
        self.transform_errors = transform;
        self
    }

    fn process_entity(&self, entity: Entity) -> Response {
        if let Some(matcher) = &self.matcher {
            if !matcher.matches(entity.content_type()) {
                return Response::Success(entity);
            }
        }
        let Some(input) = entity.content().downcast::<I>() else {
            return self.input_type_mismatch(entity);
        };
        match (self.f)(input, &entity) {
            Ok(Some(output)) => Response::Success(entity.with_content(Content::new(output))),
            Ok(None) => Response::Failure(RequestError::from_cause(
                ErrorCause::TransformerReturnedNothing,
                entity.timestamp(),
            )),
            Err(error) => Response::Failure(error),
        }
    }

    fn input_type_mismatch(&self, entity: Entity) -> Response {
        let skip = match self.mismatch {
            InputTypeMismatchAction::Error => false,
            InputTypeMismatchAction::Skip => true,
            InputTypeMismatchAction::SkipIfOutputTypeMatches => entity.content().is::<O>(),
        };
        if skip {
            return Response::Success(entity);
        }
        Response::Failure(RequestError::from_cause(
            ErrorCause::WrongInputTypeInTransformerPipeline {
                expected: type_name::<I>().to_string(),
                actual: entity.content().type_name().to_string(),
            },
            entity.timestamp(),
        ))
    }
}

impl<I, O> ResponseTransformer for ContentTransformer<I, O>
where
    I: Send + Sync + 'static,
    O: Send + Sync + 'static,
{
    fn process(&self, response: Response) -> Response {
        match response {
            Response::Success(entity) => self.process_entity(entity),
            Response::Failure(mut error) => {
                if self.transform_errors {
                    if let Some(entity) = error.entity().cloned() {
                        // A body that fails to transform is left as it was.
                        if let Response::Success(transformed) = self.process_entity(entity) {
                            error.set_entity(Some(transformed));
                        }
                    }
                }
                Response::Failure(error)
            }
        }
    }

    fn description(&self) -> String {
        format!(
            "{} -> {} {:?}",
            type_name::<I>(),
            type_name::<O>(),
            self.matcher.as_ref().map(|m| m.patterns()).unwrap_or(&[])
        )
    }
}
