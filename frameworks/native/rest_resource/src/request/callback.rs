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

//! Callback groups with at-most-once completion.

use std::mem;
use std::sync::{Arc, Mutex};

use crate::queue::MainQueue;

type Callback<A> = Box<dyn FnMut(A) + Send>;

/// An ordered list of callbacks sharing one completion value.
///
/// Callbacks registered before completion run synchronously, in registration
/// order, when the group completes. Callbacks registered afterwards are posted
/// to the main queue with the stored value, never run inline.
pub(crate) struct CallbackGroup<A> {
    main: Arc<MainQueue>,
    inner: Mutex<GroupState<A>>,
}

struct GroupState<A> {
    completed: Option<A>,
    callbacks: Vec<Callback<A>>,
}

impl<A> CallbackGroup<A>
where
    A: Clone + Send + 'static,
{
    pub(crate) fn new(main: Arc<MainQueue>) -> Self {
        Self {
            main,
            inner: Mutex::new(GroupState {
                completed: None,
                callbacks: Vec::new(),
            }),
        }
    }

    /// Registers a callback, or schedules it if the group already completed.
    pub(crate) fn add_callback<F>(&self, callback: F)
    where
        F: FnMut(A) + Send + 'static,
    {
        let mut state = self.inner.lock().unwrap();
        match state.completed.clone() {
            Some(args) => {
                drop(state);
                let mut callback = callback;
                self.main.dispatch(move || callback(args));
            }
            None => state.callbacks.push(Box::new(callback)),
        }
    }

    /// Calls every callback without completing the group.
    ///
    /// Ignored once the group has completed.
    pub(crate) fn notify(&self, args: A) {
        let mut callbacks = {
            let mut state = self.inner.lock().unwrap();
            if state.completed.is_some() {
                return;
            }
            mem::take(&mut state.callbacks)
        };
        for callback in callbacks.iter_mut() {
            callback(args.clone());
        }
        let mut state = self.inner.lock().unwrap();
        match state.completed.clone() {
            // A callback completed the group while it was being notified.
            Some(args) => {
                drop(state);
                for mut callback in callbacks {
                    callback(args.clone());
                }
            }
            None => {
                // Keep callbacks registered while the lock was released.
                callbacks.append(&mut state.callbacks);
                state.callbacks = callbacks;
            }
        }
    }

    /// Completes the group, calling and releasing every callback.
    ///
    /// Returns `false`, calling nothing, if the group already completed.
    pub(crate) fn notify_of_completion(&self, args: A) -> bool {
        let callbacks = {
            let mut state = self.inner.lock().unwrap();
            if state.completed.is_some() {
                return false;
            }
            state.completed = Some(args.clone());
            mem::take(&mut state.callbacks)
        };
        for mut callback in callbacks {
            callback(args.clone());
        }
        true
    }
}
