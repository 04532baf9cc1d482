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

//! Shared fixtures for unit tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::networking::stub::StubNetworking;
use crate::{ManualClock, Resource, ResourceEvent, ResourceObserver, Service};

pub(crate) const BASE_URL: &str = "https://api.example.com/v1";

/// How long tests wait for asynchronous work before giving up.
pub(crate) const TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) struct Fixture {
    pub(crate) service: Service,
    pub(crate) network: Arc<StubNetworking>,
    pub(crate) clock: Arc<ManualClock>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        request_utils::test::log::init();
        let network = StubNetworking::new();
        let clock = Arc::new(ManualClock::default());
        let service = Service::builder()
            .base_url(BASE_URL)
            .networking(network.clone())
            .clock(clock.clone())
            .build()
            .unwrap();
        Self {
            service,
            network,
            clock,
        }
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", BASE_URL, path)
    }

    /// Runs the main queue until `done` holds, failing the test on timeout.
    pub(crate) fn wait_for<F: FnMut() -> bool>(&self, done: F) {
        assert!(
            self.service.main_queue().run_until(TIMEOUT, done),
            "timed out waiting on the main queue"
        );
    }

    /// Runs the main queue for a short while, for checks that nothing more
    /// happens.
    pub(crate) fn settle(&self) {
        self.service
            .main_queue()
            .run_until(Duration::from_millis(200), || false);
    }
}

/// Records every event it receives.
#[derive(Default)]
pub(crate) struct RecordingObserver {
    pub(crate) events: Mutex<Vec<ResourceEvent>>,
    pub(crate) progress: Mutex<Vec<f64>>,
    pub(crate) stopped: Mutex<usize>,
    pub(crate) identity: Option<String>,
}

impl RecordingObserver {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn with_identity(identity: &str) -> Arc<Self> {
        Arc::new(Self {
            identity: Some(identity.to_string()),
            ..Self::default()
        })
    }

    pub(crate) fn events(&self) -> Vec<ResourceEvent> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, event: ResourceEvent) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }

    pub(crate) fn stopped(&self) -> usize {
        *self.stopped.lock().unwrap()
    }
}

impl ResourceObserver for RecordingObserver {
    fn resource_changed(&self, _resource: &Resource, event: ResourceEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn resource_request_progress(&self, _resource: &Resource, progress: f64) {
        self.progress.lock().unwrap().push(progress);
    }

    fn stopped_observing(&self, _resource: &Resource) {
        *self.stopped.lock().unwrap() += 1;
    }

    fn observer_identity(&self) -> Option<String> {
        self.identity.clone()
    }
}
