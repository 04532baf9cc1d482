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

//! Request chaining.

use std::sync::{Arc, Mutex};

use super::{Request, RequestCompletionHandler, RequestDelegate};
use crate::progress::TransferMetrics;
use crate::response::ResponseInfo;

/// What a chained request does once the request it wraps completes.
#[derive(Clone, Debug)]
pub enum RequestChainAction {
    /// Report the wrapped request's response unchanged.
    UseThisResponse,
    /// Report a different response instead.
    UseResponse(ResponseInfo),
    /// Start another request and report whatever it produces.
    PassTo(Request),
}

type ChainStep = Arc<dyn Fn(&ResponseInfo) -> RequestChainAction + Send + Sync>;

pub(super) struct RequestChainDelegate {
    wrapped: Request,
    when_completed: ChainStep,
    // The request currently doing the work, for cancellation and progress.
    current: Arc<Mutex<Request>>,
}

impl RequestChainDelegate {
    pub(super) fn new(wrapped: Request, when_completed: ChainStep) -> Self {
        Self {
            current: Arc::new(Mutex::new(wrapped.clone())),
            wrapped,
            when_completed,
        }
    }
}

impl RequestDelegate for RequestChainDelegate {
    fn start_underlying_operation(&self, handler: RequestCompletionHandler) {
        let when_completed = self.when_completed.clone();
        let current = self.current.clone();
        self.wrapped.on_completion(move |info| {
            if handler.will_ignore() {
                return;
            }
            match when_completed(info) {
                RequestChainAction::UseThisResponse => handler.broadcast_response(info.clone()),
                RequestChainAction::UseResponse(replacement) => {
                    handler.broadcast_response(replacement)
                }
                RequestChainAction::PassTo(next) => {
                    *current.lock().unwrap() = next.clone();
                    next.start();
                    next.on_completion(move |info| handler.broadcast_response(info.clone()));
                }
            }
        });
        self.wrapped.start();
    }

    fn cancel_underlying_operation(&self) {
        let current = self.current.lock().unwrap().clone();
        current.cancel();
    }

    fn repeated(&self) -> Box<dyn RequestDelegate> {
        Box::new(RequestChainDelegate::new(
            self.wrapped.repeated(),
            self.when_completed.clone(),
        ))
    }

    fn request_description(&self) -> String {
        format!("chain({})", self.wrapped.core.delegate.request_description())
    }

    fn transfer_metrics(&self) -> TransferMetrics {
        self.current.lock().unwrap().transfer_metrics()
    }

    fn sends_body(&self) -> bool {
        self.wrapped.core.delegate.sends_body()
    }
}
