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

//! Request progress estimation.
//!
//! Progress is a fraction in `[0, 1]` that only ever increases. It is computed
//! from four weighted components:
//!
//! - connection latency, time-based until the first byte moves;
//! - upload, from request byte counters (weighted out for body-less requests);
//! - response latency, time-based between the last byte sent and the first
//!   byte received;
//! - download, from response byte counters.
//!
//! When a byte total is unknown, or a component is time-based, the fraction
//! follows an asymptotic curve that approaches but never reaches 1.

use std::time::Instant;

/// Transport byte counters, polled while a request is in flight.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferMetrics {
    pub request_bytes_sent: u64,
    pub request_bytes_total: Option<u64>,
    pub response_bytes_received: u64,
    pub response_bytes_total: Option<u64>,
}

const CONNECT_WEIGHT: f64 = 0.3;
const UPLOAD_WEIGHT: f64 = 1.0;
const RESPONSE_LATENCY_WEIGHT: f64 = 0.3;
const DOWNLOAD_WEIGHT: f64 = 1.0;

/// Seconds at which a time-based component reaches roughly 63%.
const CONNECT_ESTIMATE_SECS: f64 = 2.5;
const RESPONSE_LATENCY_ESTIMATE_SECS: f64 = 1.2;

/// Byte count at which a component of unknown size reaches roughly 63%.
const UNKNOWN_SIZE_ESTIMATE_BYTES: f64 = 64.0 * 1024.0;

/// Progress of a countable task whose total may be unknown.
#[derive(Clone, Copy, Debug)]
struct TaskProgress {
    completed: f64,
    actual_total: Option<f64>,
    estimated_total: f64,
}

impl TaskProgress {
    fn new(estimated_total: f64) -> Self {
        Self {
            completed: 0.0,
            actual_total: None,
            estimated_total,
        }
    }

    fn fraction_done(&self) -> f64 {
        if self.completed <= 0.0 {
            return 0.0;
        }
        match self.actual_total {
            Some(total) if total > 0.0 => (self.completed / total).min(1.0),
            _ => 1.0 - (-self.completed / self.estimated_total).exp(),
        }
    }
}

/// Time-based progress for a phase with no byte counters.
#[derive(Clone, Copy, Debug)]
struct WaitingProgress {
    started: Option<Instant>,
    progress: TaskProgress,
    done: bool,
}

impl WaitingProgress {
    fn new(estimated_secs: f64) -> Self {
        Self {
            started: None,
            progress: TaskProgress::new(estimated_secs),
            done: false,
        }
    }

    fn tick(&mut self, now: Instant) {
        if self.done {
            return;
        }
        match self.started {
            None => self.started = Some(now),
            Some(started) => {
                self.progress.completed = now.saturating_duration_since(started).as_secs_f64()
            }
        }
    }

    fn complete(&mut self) {
        self.done = true;
    }

    fn fraction_done(&self) -> f64 {
        if self.done {
            1.0
        } else {
            self.progress.fraction_done()
        }
    }
}

/// Rescales a raw fraction so that the reported value never decreases.
///
/// If the raw input regresses, the current output becomes the new floor and
/// further input is mapped onto the remaining range.
#[derive(Clone, Copy, Debug, Default)]
struct MonotonicProgress {
    /// Raw input of the previous update.
    previous_input: f64,
    /// Raw input at the latest regression.
    base_input: f64,
    /// Output at the latest regression; outputs never go below it.
    base_output: f64,
    last: f64,
}

impl MonotonicProgress {
    fn update(&mut self, raw: f64) -> f64 {
        let raw = raw.clamp(0.0, 1.0);
        if raw < self.previous_input {
            self.base_input = raw;
            self.base_output = self.last;
        }
        self.previous_input = raw;
        let output = if self.base_input >= 1.0 {
            1.0
        } else {
            self.base_output
                + (raw - self.base_input) * (1.0 - self.base_output) / (1.0 - self.base_input)
        };
        self.last = output.clamp(self.last, 1.0);
        self.last
    }

    fn complete(&mut self) {
        self.last = 1.0;
    }
}

/// Combined progress estimate for one request.
#[derive(Clone, Debug)]
pub struct RequestProgress {
    connect: WaitingProgress,
    upload: TaskProgress,
    response_latency: WaitingProgress,
    download: TaskProgress,
    upload_weight: f64,
    overall: MonotonicProgress,
}

impl RequestProgress {
    /// Creates an estimator. Uploads only carry weight when `sends_body` is set.
    pub fn new(sends_body: bool) -> Self {
        Self {
            connect: WaitingProgress::new(CONNECT_ESTIMATE_SECS),
            upload: TaskProgress::new(UNKNOWN_SIZE_ESTIMATE_BYTES),
            response_latency: WaitingProgress::new(RESPONSE_LATENCY_ESTIMATE_SECS),
            download: TaskProgress::new(UNKNOWN_SIZE_ESTIMATE_BYTES),
            upload_weight: if sends_body { UPLOAD_WEIGHT } else { 0.0 },
            overall: MonotonicProgress::default(),
        }
    }

    pub fn update(&mut self, metrics: &TransferMetrics) -> f64 {
        self.update_at(metrics, Instant::now())
    }

    /// Folds a new set of counters in, observed at `now`.
    pub fn update_at(&mut self, metrics: &TransferMetrics, now: Instant) -> f64 {
        self.upload.completed = metrics.request_bytes_sent as f64;
        self.upload.actual_total = metrics.request_bytes_total.map(|total| total as f64);
        self.download.completed = metrics.response_bytes_received as f64;
        self.download.actual_total = metrics.response_bytes_total.map(|total| total as f64);

        let response_started = metrics.response_bytes_received > 0;
        let request_started = metrics.request_bytes_sent > 0 || response_started;
        let request_sent = request_started
            && metrics
                .request_bytes_total
                .map_or(true, |total| metrics.request_bytes_sent >= total);

        if request_started {
            self.connect.complete();
        } else {
            self.connect.tick(now);
        }

        if response_started {
            self.response_latency.complete();
        } else if request_sent {
            self.response_latency.tick(now);
        }

        let raw = self.raw_fraction();
        self.overall.update(raw)
    }

    /// Marks the request finished. Progress is then exactly 1.
    pub fn complete(&mut self) {
        self.overall.complete();
    }

    pub fn fraction_done(&self) -> f64 {
        self.overall.last
    }

    fn raw_fraction(&self) -> f64 {
        let weighted = CONNECT_WEIGHT * self.connect.fraction_done()
            + self.upload_weight * self.upload.fraction_done()
            + RESPONSE_LATENCY_WEIGHT * self.response_latency.fraction_done()
            + DOWNLOAD_WEIGHT * self.download.fraction_done();
        let total = CONNECT_WEIGHT + self.upload_weight + RESPONSE_LATENCY_WEIGHT + DOWNLOAD_WEIGHT;
        weighted / total
    }
}
