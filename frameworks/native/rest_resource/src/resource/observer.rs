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

//! Resource observers and their ownership.
//!
//! An observer is held weakly unless something other than itself owns it. An
//! entry stays registered while either the observer is its own owner and
//! still alive elsewhere, or at least one external owner is alive. Entries
//! failing both are swept before each notification.

use std::any::Any;
use std::sync::{Arc, Weak};

use super::Resource;

/// Where the data behind a [`ResourceEvent::NewData`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NewDataSource {
    Network,
    Cache,
    LocalOverride,
    Wipe,
}

/// A change in a resource's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceEvent {
    /// Sent once to an observer right after it is added.
    ObserverAdded,
    /// A load request started.
    Requested,
    /// A load request was cancelled. Data and error are unchanged.
    RequestCancelled,
    /// The latest data changed.
    NewData(NewDataSource),
    /// The server confirmed the latest data is current; its timestamp moved.
    NotModified,
    /// The latest error changed.
    Error,
}

/// Receives notifications about a resource.
///
/// Called on the main thread, never while resource state is locked, so
/// implementations may freely call back into the resource.
pub trait ResourceObserver: Send + Sync {
    fn resource_changed(&self, resource: &Resource, event: ResourceEvent);

    /// Progress of the resource's current load, in `[0, 1]`.
    fn resource_request_progress(&self, _resource: &Resource, _progress: f64) {}

    /// The observer was removed from `resource`.
    fn stopped_observing(&self, _resource: &Resource) {}

    /// Observers reporting the same identity are treated as one observer.
    fn observer_identity(&self) -> Option<String> {
        None
    }
}

/// Adapts a closure to [`ResourceObserver`].
pub(crate) struct ClosureObserver<F> {
    f: F,
}

impl<F> ClosureObserver<F> {
    pub(crate) fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ResourceObserver for ClosureObserver<F>
where
    F: Fn(&Resource, ResourceEvent) + Send + Sync,
{
    fn resource_changed(&self, resource: &Resource, event: ResourceEvent) {
        (self.f)(resource, event)
    }
}

/// A weak reference to an observer's owner, comparable by address.
#[derive(Clone)]
pub(crate) struct OwnerRef {
    owner: Weak<dyn Any + Send + Sync>,
    address: usize,
}

impl OwnerRef {
    pub(crate) fn new<O: Any + Send + Sync>(owner: &Arc<O>) -> Self {
        let weak = Arc::downgrade(owner);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        Self {
            owner: weak,
            address: address_of(owner),
        }
    }

    fn is_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

pub(crate) fn address_of<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc) as *const () as usize
}

enum ObserverRef {
    Strong(Arc<dyn ResourceObserver>),
    Weak(Weak<dyn ResourceObserver>),
}

struct ObserverEntry {
    observer: ObserverRef,
    address: usize,
    identity: Option<String>,
    owners: Vec<OwnerRef>,
    self_owned: bool,
}

impl ObserverEntry {
    fn upgrade(&self) -> Option<Arc<dyn ResourceObserver>> {
        match &self.observer {
            ObserverRef::Strong(observer) => Some(observer.clone()),
            ObserverRef::Weak(observer) => observer.upgrade(),
        }
    }

    /// Holds the observer strongly exactly when an external owner is alive.
    fn recompute_storage_mode(&mut self) {
        self.owners.retain(OwnerRef::is_alive);
        let externally_owned = !self.owners.is_empty();
        let next = match &self.observer {
            ObserverRef::Strong(observer) if !externally_owned => {
                Some(ObserverRef::Weak(Arc::downgrade(observer)))
            }
            ObserverRef::Weak(observer) if externally_owned => {
                observer.upgrade().map(ObserverRef::Strong)
            }
            _ => None,
        };
        if let Some(next) = next {
            self.observer = next;
        }
    }

    fn is_defunct(&self) -> bool {
        let alive = match &self.observer {
            ObserverRef::Strong(_) => true,
            ObserverRef::Weak(observer) => observer.strong_count() > 0,
        };
        !alive || (!self.self_owned && self.owners.is_empty())
    }

    fn is_same(&self, address: usize, identity: Option<&str>) -> bool {
        self.address == address
            || matches!((self.identity.as_deref(), identity), (Some(a), Some(b)) if a == b)
    }
}

/// The observers of one resource.
#[derive(Default)]
pub(crate) struct ObserverList {
    entries: Vec<ObserverEntry>,
}

impl ObserverList {
    /// Registers `observer`, or adds `owner` to its existing entry.
    ///
    /// Returns `true` when the observer is new to this list. Without an
    /// owner, or with the observer itself as owner, it owns itself.
    pub(crate) fn add(
        &mut self,
        observer: Arc<dyn ResourceObserver>,
        owner: Option<OwnerRef>,
    ) -> bool {
        let address = address_of(&observer);
        let identity = observer.observer_identity();
        let owner = owner.filter(|owner| owner.address != address);

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|entry| entry.is_same(address, identity.as_deref()))
        {
            match owner {
                Some(owner) => {
                    if !entry.owners.iter().any(|o| o.address == owner.address) {
                        entry.owners.push(owner);
                    }
                }
                None => entry.self_owned = true,
            }
            entry.recompute_storage_mode();
            return false;
        }

        let self_owned = owner.is_none();
        let mut entry = ObserverEntry {
            observer: ObserverRef::Strong(observer),
            address,
            identity,
            owners: owner.into_iter().collect(),
            self_owned,
        };
        entry.recompute_storage_mode();
        self.entries.push(entry);
        true
    }

    /// Drops `owner` from every entry. Passing an observer's own address
    /// removes its self-ownership.
    pub(crate) fn remove_owner(&mut self, address: usize) {
        for entry in self.entries.iter_mut() {
            if entry.address == address {
                entry.self_owned = false;
            }
            entry.owners.retain(|owner| owner.address != address);
            entry.recompute_storage_mode();
        }
    }

    /// Removes defunct entries, returning the removed observers still alive.
    pub(crate) fn sweep(&mut self) -> Vec<Arc<dyn ResourceObserver>> {
        let mut removed = Vec::new();
        self.entries.retain_mut(|entry| {
            // Held across the recompute so a just-released observer can
            // still be told it stopped observing.
            let observer = entry.upgrade();
            entry.recompute_storage_mode();
            if entry.is_defunct() {
                removed.extend(observer);
                false
            } else {
                true
            }
        });
        removed
    }

    pub(crate) fn live_observers(&self) -> Vec<Arc<dyn ResourceObserver>> {
        self.entries.iter().filter_map(ObserverEntry::upgrade).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
