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

use std::time::{Duration, Instant};

use super::*;

fn metrics(sent: u64, sent_total: Option<u64>, received: u64, received_total: Option<u64>) -> TransferMetrics {
    TransferMetrics {
        request_bytes_sent: sent,
        request_bytes_total: sent_total,
        response_bytes_received: received,
        response_bytes_total: received_total,
    }
}

// @tc.name: ut_request_progress_monotonic
// @tc.desc: Test progress never decreases as metrics move
// @tc.precon: NA
// @tc.step: 1. Feed a download whose reported total grows mid-transfer
// @tc.expect: Every reported fraction is at least the previous one
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_progress_monotonic() {
    let mut progress = RequestProgress::new(false);
    let start = Instant::now();
    let mut last = 0.0;
    let samples = [
        metrics(0, None, 0, None),
        metrics(0, None, 10, Some(100)),
        metrics(0, None, 50, Some(100)),
        // total revised upwards: the raw fraction drops
        metrics(0, None, 50, Some(1000)),
        metrics(0, None, 900, Some(1000)),
    ];
    for (i, sample) in samples.iter().enumerate() {
        let now = start + Duration::from_millis(100 * i as u64);
        let fraction = progress.update_at(sample, now);
        assert!(fraction >= last, "{} dropped below {}", fraction, last);
        assert!((0.0..=1.0).contains(&fraction));
        last = fraction;
    }
    assert!(last < 1.0);
}

// @tc.name: ut_monotonic_progress_rebases_after_regression
// @tc.desc: Test a regressing input rescales the remaining range instead of stalling
// @tc.precon: NA
// @tc.step: 1. Feed 0.5, then 0.2, then 0.6 and 1.0
// @tc.expect: Output holds at 0.5, then maps the rest of the input onto 0.5..1
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_monotonic_progress_rebases_after_regression() {
    let mut progress = MonotonicProgress::default();
    assert!((progress.update(0.5) - 0.5).abs() < 1e-9);
    assert!((progress.update(0.2) - 0.5).abs() < 1e-9);
    assert!((progress.update(0.6) - 0.75).abs() < 1e-9);
    assert!((progress.update(1.0) - 1.0).abs() < 1e-9);
}

// @tc.name: ut_request_progress_complete
// @tc.desc: Test completion pins progress to exactly one
// @tc.precon: NA
// @tc.step: 1. Update once, then complete
// @tc.expect: fraction_done is 1
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_request_progress_complete() {
    let mut progress = RequestProgress::new(true);
    progress.update(&metrics(10, Some(100), 0, None));
    assert!(progress.fraction_done() < 1.0);
    progress.complete();
    assert_eq!(1.0, progress.fraction_done());
}

// @tc.name: ut_request_progress_connect_latency
// @tc.desc: Test time spent connecting moves progress without any bytes
// @tc.precon: NA
// @tc.step: 1. Update with no bytes at two instants a few seconds apart
// @tc.expect: Progress is above zero but below the connection weight share
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_request_progress_connect_latency() {
    let mut progress = RequestProgress::new(false);
    let start = Instant::now();
    assert_eq!(0.0, progress.update_at(&TransferMetrics::default(), start));
    let later = progress.update_at(&TransferMetrics::default(), start + Duration::from_secs(5));
    assert!(later > 0.0);
    // connect weight 0.3 out of 1.6 total for a request without a body
    assert!(later < 0.3 / 1.6);
}

// @tc.name: ut_request_progress_unknown_size
// @tc.desc: Test downloads of unknown size approach but never reach one
// @tc.precon: NA
// @tc.step: 1. Receive bytes with no total
// @tc.expect: Progress grows and stays below one
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level2
#[test]
fn ut_request_progress_unknown_size() {
    let mut progress = RequestProgress::new(false);
    let now = Instant::now();
    let small = progress.update_at(&metrics(0, None, 1024, None), now);
    let large = progress.update_at(&metrics(0, None, 256 * 1024, None), now);
    assert!(small > 0.0);
    assert!(large > small);
    assert!(large < 1.0);
}
