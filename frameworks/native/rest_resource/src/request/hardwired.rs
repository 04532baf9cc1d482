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

//! Requests whose response is known up front.

use super::{RequestCompletionHandler, RequestDelegate};
use crate::response::{Response, ResponseInfo};

pub(crate) struct HardwiredRequestDelegate {
    info: ResponseInfo,
}

impl HardwiredRequestDelegate {
    pub(crate) fn new(info: ResponseInfo) -> Self {
        Self { info }
    }
}

impl RequestDelegate for HardwiredRequestDelegate {
    fn start_underlying_operation(&self, handler: RequestCompletionHandler) {
        handler.broadcast_response(self.info.clone());
    }

    fn cancel_underlying_operation(&self) {}

    fn repeated(&self) -> Box<dyn RequestDelegate> {
        Box::new(HardwiredRequestDelegate::new(self.info.clone()))
    }

    fn request_description(&self) -> String {
        match &self.info.response {
            Response::Success(_) => "hardwired success".to_string(),
            Response::Failure(error) => format!("hardwired failure: {}", error.user_message()),
        }
    }
}
