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

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use request_utils::test::log::init;

use super::*;

// @tc.name: ut_callback_group_completes_once
// @tc.desc: Test completion calls every callback once and ignores later completions
// @tc.precon: NA
// @tc.step: 1. Register two callbacks
//           2. Complete the group twice
// @tc.expect: Each callback ran once, with the first value
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_callback_group_completes_once() {
    init();
    let group = CallbackGroup::new(MainQueue::for_current_thread());
    let seen = Arc::new(Mutex::new(Vec::new()));
    for _ in 0..2 {
        let seen = seen.clone();
        group.add_callback(move |value: u32| seen.lock().unwrap().push(value));
    }
    assert!(group.notify_of_completion(7));
    assert!(!group.notify_of_completion(8));
    assert_eq!(vec![7, 7], *seen.lock().unwrap());
}

// @tc.name: ut_callback_group_late_registration
// @tc.desc: Test callbacks added after completion run asynchronously on the main queue
// @tc.precon: NA
// @tc.step: 1. Complete the group
//           2. Register a callback
//           3. Run the main queue
// @tc.expect: The callback does not run inline, then runs with the stored value
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_callback_group_late_registration() {
    init();
    let main = MainQueue::for_current_thread();
    let group = CallbackGroup::new(main.clone());
    group.notify_of_completion("done".to_string());

    let seen = Arc::new(Mutex::new(None));
    let s = seen.clone();
    group.add_callback(move |value: String| *s.lock().unwrap() = Some(value));
    assert!(seen.lock().unwrap().is_none());

    assert!(main.run_until(Duration::from_secs(1), || seen.lock().unwrap().is_some()));
    assert_eq!(Some("done".to_string()), *seen.lock().unwrap());
}

// @tc.name: ut_callback_group_notify_repeats
// @tc.desc: Test non-terminal notifications keep callbacks registered
// @tc.precon: NA
// @tc.step: 1. Register a callback
//           2. Notify twice, then complete
//           3. Notify again
// @tc.expect: Three calls in total; notify after completion is ignored
// @tc.type: FUNC
// @tc.require: issue#ICN31I
// @tc.level: level1
#[test]
fn ut_callback_group_notify_repeats() {
    init();
    let group = CallbackGroup::new(MainQueue::for_current_thread());
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    group.add_callback(move |_: f64| {
        c.fetch_add(1, Ordering::SeqCst);
    });
    group.notify(0.2);
    group.notify(0.4);
    group.notify_of_completion(1.0);
    group.notify(0.9);
    assert_eq!(3, calls.load(Ordering::SeqCst));
}
