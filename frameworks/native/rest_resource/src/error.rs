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

//! Error types for failed requests.
//!
//! A [`RequestError`] is what a resource records as its latest error and what
//! failure callbacks receive. It always carries a user-facing message, and may
//! also carry the HTTP status, the error response body and a structured
//! [`ErrorCause`] describing what went wrong locally.

use std::fmt::{self, Display};
use std::time::SystemTime;

use cache_core::Entity;
use http::StatusCode;

use crate::networking::TransportError;

/// Message used when a response could not be decoded by the pipeline.
pub(crate) const PARSE_FAILURE_MESSAGE: &str = "Cannot parse server response";

/// Message used when nothing more specific is known.
const GENERIC_FAILURE_MESSAGE: &str = "Request failed";

/// Structured reasons a request failed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ErrorCause {
    /// The request was cancelled before it completed.
    #[error("request cancelled")]
    RequestCancelled {
        /// The underlying transport error, if the transport reported one.
        network_error: Option<String>,
    },

    /// The resource has no valid URL.
    #[error("invalid URL: {}", .url.as_deref().unwrap_or("<none>"))]
    InvalidUrl { url: Option<String> },

    /// A text request body could not be encoded.
    #[error("cannot encode text as {encoding}")]
    UnencodableText { encoding: String },

    /// A JSON request body could not be serialised.
    #[error("value is not a valid JSON object: {message}")]
    InvalidJsonObject { message: String },

    /// The transport failed without producing an HTTP response.
    #[error("{message}")]
    Transport { message: String },

    /// The server answered 304 but there is no local data to keep.
    #[error("server sent 304 Not Modified, but there is no local data")]
    NoLocalDataFor304,

    /// A transformer produced no output.
    #[error("transformer returned no output")]
    TransformerReturnedNothing,

    /// A transformer received content of a type it cannot handle.
    #[error("transformer expected {expected} but received {actual}")]
    WrongInputTypeInTransformerPipeline { expected: String, actual: String },

    /// The response body is not valid JSON.
    #[error("cannot parse JSON: {message}")]
    UnparsableJson { message: String },

    /// The response body is not valid text in the declared charset.
    #[error("cannot decode text as {encoding}")]
    UndecodableText { encoding: String },

    /// The response declares a charset the text transformer does not know.
    #[error("unknown text encoding {encoding}")]
    InvalidTextEncoding { encoding: String },

    /// The response body is not a decodable image.
    #[error("cannot parse image")]
    UnparsableImage,
}

impl ErrorCause {
    /// Returns `true` for [`ErrorCause::RequestCancelled`].
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ErrorCause::RequestCancelled { .. })
    }

    fn default_message(&self) -> String {
        match self {
            ErrorCause::RequestCancelled { .. } => "Request cancelled".to_string(),
            ErrorCause::InvalidUrl { .. } => "Invalid URL".to_string(),
            ErrorCause::UnencodableText { .. } | ErrorCause::InvalidJsonObject { .. } => {
                "Cannot send request".to_string()
            }
            ErrorCause::Transport { message } => message.clone(),
            ErrorCause::NoLocalDataFor304 => "No data available".to_string(),
            _ => PARSE_FAILURE_MESSAGE.to_string(),
        }
    }
}

/// Information about a failed request.
#[derive(Clone, Debug)]
pub struct RequestError {
    /// Text suitable for showing to the user. Never empty.
    user_message: String,
    /// Status of the HTTP response, if the server sent one.
    http_status: Option<StatusCode>,
    /// The decoded error response body.
    entity: Option<Entity>,
    /// What went wrong locally, if anything did.
    cause: Option<ErrorCause>,
    /// When the failure was observed.
    timestamp: SystemTime,
}

impl RequestError {
    /// Creates an error for a local failure, with a message derived from the
    /// cause.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::SystemTime;
    /// use rest_resource::{ErrorCause, RequestError};
    ///
    /// let error = RequestError::from_cause(ErrorCause::NoLocalDataFor304, SystemTime::now());
    /// assert_eq!(error.user_message(), "No data available");
    /// ```
    pub fn from_cause(cause: ErrorCause, timestamp: SystemTime) -> Self {
        Self {
            user_message: cause.default_message(),
            http_status: None,
            entity: None,
            cause: Some(cause),
            timestamp,
        }
    }

    /// Creates an error with an explicit user-facing message.
    pub fn with_message(
        user_message: impl Into<String>,
        cause: Option<ErrorCause>,
        timestamp: SystemTime,
    ) -> Self {
        Self {
            user_message: user_message.into(),
            http_status: None,
            entity: None,
            cause,
            timestamp,
        }
    }

    /// Creates an error from whatever the transport produced.
    ///
    /// The user message is chosen from, in order: `user_message`, the
    /// transport error's message, the status text of `status`, and a generic
    /// fallback. A transport error flagged as cancelled becomes a
    /// [`ErrorCause::RequestCancelled`] cause.
    ///
    /// # Parameters
    /// - `status`: HTTP status of the response, if one arrived
    /// - `entity`: Decoded error body
    /// - `transport`: Failure below the HTTP layer
    /// - `user_message`: Overrides every derived message
    /// - `timestamp`: When the failure was observed
    pub fn from_response(
        status: Option<StatusCode>,
        entity: Option<Entity>,
        transport: Option<&TransportError>,
        user_message: Option<String>,
        timestamp: SystemTime,
    ) -> Self {
        let cause = transport.map(|error| {
            if error.cancelled {
                ErrorCause::RequestCancelled {
                    network_error: Some(error.message.clone()),
                }
            } else {
                ErrorCause::Transport {
                    message: error.message.clone(),
                }
            }
        });
        let user_message = user_message
            .or_else(|| transport.map(|error| error.message.clone()))
            .or_else(|| status.map(status_message))
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
        Self {
            user_message,
            http_status: status,
            entity,
            cause,
            timestamp,
        }
    }

    /// The error a request reports when it is cancelled.
    pub fn cancellation(timestamp: SystemTime) -> Self {
        Self::from_cause(
            ErrorCause::RequestCancelled {
                network_error: None,
            },
            timestamp,
        )
    }

    /// Returns the message to show the user.
    ///
    /// # Returns
    /// The explicit message given at construction, else the transport's
    /// message, else the HTTP reason phrase, else `"Request failed"`.
    pub fn user_message(&self) -> &str {
        &self.user_message
    }

    /// The HTTP status as a number, if the server responded.
    pub fn http_status_code(&self) -> Option<u16> {
        self.http_status.map(|status| status.as_u16())
    }

    pub fn http_status(&self) -> Option<StatusCode> {
        self.http_status
    }

    /// The response body of a failed HTTP request, if the server sent one.
    pub fn entity(&self) -> Option<&Entity> {
        self.entity.as_ref()
    }

    pub fn cause(&self) -> Option<&ErrorCause> {
        self.cause.as_ref()
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    pub fn is_cancellation(&self) -> bool {
        self.cause.as_ref().is_some_and(ErrorCause::is_cancellation)
    }

    pub(crate) fn set_entity(&mut self, entity: Option<Entity>) {
        self.entity = entity;
    }

    pub(crate) fn with_status(mut self, status: StatusCode) -> Self {
        self.http_status = Some(status);
        self
    }
}

impl Display for RequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.http_status_code(), &self.cause) {
            (Some(code), Some(cause)) => write!(f, "{} ({}; {})", self.user_message, code, cause),
            (Some(code), None) => write!(f, "{} ({})", self.user_message, code),
            (None, Some(cause)) => write!(f, "{} ({})", self.user_message, cause),
            (None, None) => f.write_str(&self.user_message),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Formats an HTTP status as a reason phrase in sentence case, such as
/// `"Not found"`. Unregistered codes become `"Server error <code>"`.
pub(crate) fn status_message(status: StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => capitalize(&reason.to_ascii_lowercase()),
        None => format!("Server error {}", status.as_u16()),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
