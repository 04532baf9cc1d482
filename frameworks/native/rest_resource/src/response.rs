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

//! Outcomes of a request.

use std::time::SystemTime;

use cache_core::Entity;

use crate::error::RequestError;

/// The result of a request: an entity or an error.
#[derive(Clone, Debug)]
pub enum Response {
    Success(Entity),
    Failure(RequestError),
}

impl Response {
    pub fn entity(&self) -> Option<&Entity> {
        match self {
            Response::Success(entity) => Some(entity),
            Response::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&RequestError> {
        match self {
            Response::Success(_) => None,
            Response::Failure(error) => Some(error),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        self.error().is_some_and(RequestError::is_cancellation)
    }
}

/// A response together with whether it carries new data.
///
/// `is_new` is `false` when the server confirmed that existing data is still
/// current (a 304), in which case the success entity is the local one.
#[derive(Clone, Debug)]
pub struct ResponseInfo {
    pub response: Response,
    pub is_new: bool,
}

impl ResponseInfo {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            is_new: true,
        }
    }

    pub fn not_modified(entity: Entity) -> Self {
        Self {
            response: Response::Success(entity),
            is_new: false,
        }
    }

    pub fn cancellation(timestamp: SystemTime) -> Self {
        Self::new(Response::Failure(RequestError::cancellation(timestamp)))
    }
}
