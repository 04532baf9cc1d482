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

//! Main-thread job queue and background dispatch.
//!
//! Every piece of resource and request state is owned by the thread that
//! created the [`MainQueue`]. Other threads never touch that state directly;
//! they post closures to the queue, and the owning thread runs them from
//! [`MainQueue::run_pending`] or [`MainQueue::run_until`].

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use log::error;

type Job = Box<dyn FnOnce() + Send>;

/// Upper bound on a single blocking wait, so that delayed jobs posted from
/// other threads are noticed promptly.
const MAX_WAIT: Duration = Duration::from_millis(10);

/// A serial queue bound to a single owning thread.
pub struct MainQueue {
    owner: ThreadId,
    sender: Sender<Job>,
    receiver: Mutex<Receiver<Job>>,
    delayed: Mutex<Vec<(Instant, Job)>>,
}

impl MainQueue {
    /// Creates a queue owned by the calling thread.
    pub fn for_current_thread() -> Arc<Self> {
        let (sender, receiver) = mpsc::channel();
        Arc::new(Self {
            owner: thread::current().id(),
            sender,
            receiver: Mutex::new(receiver),
            delayed: Mutex::new(Vec::new()),
        })
    }

    /// Returns `true` when called from the owning thread.
    pub fn is_main_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Panics unless called from the owning thread.
    ///
    /// Resource and request state may only be read or mutated on the main
    /// thread; violating that is a programming error.
    pub fn assert_main_thread(&self) {
        assert!(
            self.is_main_thread(),
            "resource state accessed off the main thread"
        );
    }

    /// Posts a job to run on the owning thread. Safe to call from any thread.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // The receiver lives as long as `self`, so this only fails while the
        // queue itself is being torn down.
        if self.sender.send(Box::new(job)).is_err() {
            error!("main queue is gone, job dropped");
        }
    }

    /// Posts a job to run on the owning thread once `delay` has elapsed.
    pub fn dispatch_after<F>(&self, delay: Duration, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let due = Instant::now() + delay;
        self.delayed.lock().unwrap().push((due, Box::new(job)));
    }

    /// Runs every job that is ready right now, returning how many ran.
    ///
    /// Jobs posted by the jobs themselves are run too, as long as they are
    /// ready before the queue drains.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    pub fn run_pending(&self) -> usize {
        self.assert_main_thread();
        let mut count = 0;
        loop {
            let mut ran = false;
            for job in self.take_due_jobs() {
                job();
                count += 1;
                ran = true;
            }
            // The receiver guard is a temporary, released before the job runs.
            let next = self.receiver.lock().unwrap().try_recv();
            if let Ok(job) = next {
                job();
                count += 1;
                ran = true;
            }
            if !ran {
                return count;
            }
        }
    }

    /// Runs jobs until `done` returns `true` or `timeout` expires.
    ///
    /// Returns whether `done` was satisfied. Blocks between jobs instead of
    /// spinning.
    ///
    /// # Panics
    ///
    /// Panics if called from a thread other than the owner.
    pub fn run_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let mut wait = (deadline - now).min(MAX_WAIT);
            if let Some(due) = self.next_due() {
                wait = wait.min(due.saturating_duration_since(now));
            }
            let next = self.receiver.lock().unwrap().recv_timeout(wait);
            match next {
                Ok(job) => job(),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }

    fn take_due_jobs(&self) -> Vec<Job> {
        let now = Instant::now();
        let mut delayed = self.delayed.lock().unwrap();
        let mut due = Vec::new();
        let mut index = 0;
        while index < delayed.len() {
            if delayed[index].0 <= now {
                due.push(delayed.remove(index).1);
            } else {
                index += 1;
            }
        }
        due
    }

    fn next_due(&self) -> Option<Instant> {
        self.delayed.lock().unwrap().iter().map(|(due, _)| *due).min()
    }
}

/// Runs `job` on the background worker pool.
pub(crate) fn spawn_background<F>(job: F)
where
    F: FnOnce() + Send + 'static,
{
    rayon::spawn(job);
}
