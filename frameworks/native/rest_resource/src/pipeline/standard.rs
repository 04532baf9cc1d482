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

//! Transformers installed by default, plus the JSON model helper.

use std::sync::Arc;

use cache_core::Entity;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::transformer::{ContentTransformer, InputTypeMismatchAction};
use crate::error::{ErrorCause, RequestError, PARSE_FAILURE_MESSAGE};

/// Charset assumed for text bodies that do not declare one.
const DEFAULT_CHARSET: &str = "iso-8859-1";

const JSON_CONTENT_TYPES: [&str; 2] = ["*/json", "*/*+json"];

/// Transformers a service can install on its parsing stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StandardTransformer {
    /// Bytes to `String` for `text/*`.
    Text,
    /// Bytes to [`serde_json::Value`] for `*/json` and `*/*+json`.
    Json,
}

impl StandardTransformer {
    pub const ALL: [StandardTransformer; 2] = [StandardTransformer::Json, StandardTransformer::Text];
}

/// Decodes `text/*` bodies into `String` using the declared charset.
///
/// Supports UTF-8, US-ASCII and ISO-8859-1. Content that is already a
/// `String` passes through, and other non-byte content is left alone.
pub fn text_transformer() -> ContentTransformer<Vec<u8>, String> {
    ContentTransformer::new(|bytes: Arc<Vec<u8>>, entity: &Entity| {
        let charset = entity.charset().unwrap_or(DEFAULT_CHARSET);
        decode_text(&bytes, charset, entity)
    })
    .content_types(["text/*"])
    .on_input_type_mismatch(InputTypeMismatchAction::Skip)
    .transform_errors(true)
}

/// Parses `*/json` and `*/*+json` bodies into [`serde_json::Value`].
pub fn json_transformer() -> ContentTransformer<Vec<u8>, Value> {
    ContentTransformer::new(|bytes: Arc<Vec<u8>>, entity: &Entity| {
        serde_json::from_slice::<Value>(&bytes).map_err(|e| {
            parse_failure(
                ErrorCause::UnparsableJson {
                    message: e.to_string(),
                },
                entity,
            )
        })
    })
    .content_types(JSON_CONTENT_TYPES)
    .on_input_type_mismatch(InputTypeMismatchAction::SkipIfOutputTypeMatches)
    .transform_errors(true)
}

/// Deserialises parsed JSON into a model type.
///
/// Meant for the model stage, after [`json_transformer`] has run.
pub fn json_model_transformer<T>() -> ContentTransformer<Value, T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    ContentTransformer::new(|value: Arc<Value>, entity: &Entity| {
        T::deserialize(value.as_ref()).map_err(|e| {
            parse_failure(
                ErrorCause::UnparsableJson {
                    message: e.to_string(),
                },
                entity,
            )
        })
    })
    .content_types(JSON_CONTENT_TYPES)
    .on_input_type_mismatch(InputTypeMismatchAction::SkipIfOutputTypeMatches)
}

fn decode_text(bytes: &[u8], charset: &str, entity: &Entity) -> Result<String, RequestError> {
    let undecodable = || {
        parse_failure(
            ErrorCause::UndecodableText {
                encoding: charset.to_string(),
            },
            entity,
        )
    };
    match charset.to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => String::from_utf8(bytes.to_vec()).map_err(|_| undecodable()),
        "us-ascii" | "ascii" => {
            if bytes.is_ascii() {
                Ok(bytes.iter().map(|&b| b as char).collect())
            } else {
                Err(undecodable())
            }
        }
        "iso-8859-1" | "iso_8859-1" | "latin1" | "latin-1" => {
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
        _ => Err(parse_failure(
            ErrorCause::InvalidTextEncoding {
                encoding: charset.to_string(),
            },
            entity,
        )),
    }
}

fn parse_failure(cause: ErrorCause, entity: &Entity) -> RequestError {
    RequestError::with_message(PARSE_FAILURE_MESSAGE, Some(cause), entity.timestamp())
}
