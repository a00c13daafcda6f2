//! Instance cache: singleton partition plus one partition per scope.
//!
//! Each partition maps a key to either a finished instance or a build
//! that is still running. The first caller to miss installs a pending
//! slot and builds outside the lock; callers arriving meanwhile wait on
//! that slot and get the same instance, or the same error.
//!
//! Named entries use name-qualified keys inside the same partitions, so
//! destroying a scope drops its named and unnamed entries together.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Result, WeftError};
use crate::key::DependencyKey;
use crate::registry::Instance;
use crate::scope::ScopeId;

/// Which partition an entry lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tier {
    Singleton,
    Scope(ScopeId),
}

/// A build in progress. Waiters block until the builder publishes.
pub(crate) struct PendingBuild {
    owner: ThreadId,
    outcome: OnceCell<Result<Instance>>,
}

impl PendingBuild {
    fn new() -> Self {
        Self {
            owner: thread::current().id(),
            outcome: OnceCell::new(),
        }
    }

    /// True when the calling thread is the one running the build. Waiting
    /// on such a build can never finish.
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.owner == thread::current().id()
    }

    pub fn wait(&self) -> Result<Instance> {
        self.outcome.wait().clone()
    }

    fn publish(&self, outcome: Result<Instance>) {
        // Only the owning guard publishes, and only once.
        let _ = self.outcome.set(outcome);
    }
}

enum Slot {
    Ready(Instance),
    Pending(Arc<PendingBuild>),
}

enum SlotState {
    Ready(Instance),
    Pending(Arc<PendingBuild>),
    Claimed(Arc<PendingBuild>),
}

#[derive(Default)]
struct Partition {
    slots: HashMap<DependencyKey, Slot>,
}

impl Partition {
    fn ready(&self, key: &DependencyKey) -> Option<Instance> {
        match self.slots.get(key)? {
            Slot::Ready(instance) => Some(instance.clone()),
            Slot::Pending(_) => None,
        }
    }

    fn claim(&mut self, key: &DependencyKey) -> SlotState {
        match self.slots.get(key) {
            Some(Slot::Ready(instance)) => SlotState::Ready(instance.clone()),
            Some(Slot::Pending(pending)) => SlotState::Pending(pending.clone()),
            None => {
                let pending = Arc::new(PendingBuild::new());
                self.slots.insert(key.clone(), Slot::Pending(pending.clone()));
                SlotState::Claimed(pending)
            }
        }
    }

    // Leaves the slot alone if it was evicted or replaced meanwhile.
    fn settle(&mut self, key: &DependencyKey, pending: &Arc<PendingBuild>, value: Option<Instance>) {
        let ours = matches!(self.slots.get(key), Some(Slot::Pending(p)) if Arc::ptr_eq(p, pending));
        if !ours {
            return;
        }
        match value {
            Some(instance) => {
                self.slots.insert(key.clone(), Slot::Ready(instance));
            }
            None => {
                self.slots.remove(key);
            }
        }
    }

    fn evict(&mut self, key: &DependencyKey) -> bool {
        self.slots.remove(key).is_some()
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Outcome of asking the cache for a key.
pub(crate) enum Claim<'a> {
    /// Already built.
    Hit(Instance),
    /// Another caller is building it.
    Wait(Arc<PendingBuild>),
    /// The caller must build it and hand the result to the guard.
    Build(BuildGuard<'a>),
}

/// All cached instances of one container.
#[derive(Default)]
pub(crate) struct InstanceCache {
    singletons: RwLock<Partition>,
    scopes: DashMap<ScopeId, Partition>,
}

impl InstanceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks `key` up in `tier`, claiming the build on a miss.
    ///
    /// # Errors
    /// [`WeftError::UnknownScope`] if the scope partition does not exist.
    pub fn claim(&self, tier: &Tier, key: &DependencyKey) -> Result<Claim<'_>> {
        let state = match tier {
            Tier::Singleton => {
                if let Some(instance) = self.singletons.read().ready(key) {
                    return Ok(Claim::Hit(instance));
                }
                self.singletons.write().claim(key)
            }
            Tier::Scope(id) => {
                {
                    let partition = self
                        .scopes
                        .get(id)
                        .ok_or_else(|| unknown_scope(id, key))?;
                    if let Some(instance) = partition.ready(key) {
                        return Ok(Claim::Hit(instance));
                    }
                }
                self.scopes
                    .get_mut(id)
                    .ok_or_else(|| unknown_scope(id, key))?
                    .claim(key)
            }
        };

        Ok(match state {
            SlotState::Ready(instance) => Claim::Hit(instance),
            SlotState::Pending(pending) => Claim::Wait(pending),
            SlotState::Claimed(pending) => Claim::Build(BuildGuard {
                cache: self,
                tier: tier.clone(),
                key: key.clone(),
                pending,
                finished: false,
            }),
        })
    }

    fn settle(&self, tier: &Tier, key: &DependencyKey, pending: &Arc<PendingBuild>, value: Option<Instance>) {
        match tier {
            Tier::Singleton => self.singletons.write().settle(key, pending, value),
            Tier::Scope(id) => {
                if let Some(mut partition) = self.scopes.get_mut(id) {
                    partition.settle(key, pending, value);
                } else {
                    trace!(scope = %id, key = %key, "Scope destroyed during construction, not caching");
                }
            }
        }
    }

    /// Removes `key` from the singleton partition and every scope.
    ///
    /// Returns how many entries were dropped.
    pub fn evict(&self, key: &DependencyKey) -> usize {
        let mut evicted = usize::from(self.singletons.write().evict(key));
        for mut partition in self.scopes.iter_mut() {
            evicted += usize::from(partition.evict(key));
        }
        evicted
    }

    pub fn create_scope(&self) -> ScopeId {
        let id = ScopeId::generate();
        self.scopes.insert(id.clone(), Partition::default());
        debug!(scope = %id, "Created scope");
        id
    }

    /// Drops a scope and everything cached in it. Unknown ids are ignored.
    pub fn destroy_scope(&self, id: &ScopeId) -> bool {
        match self.scopes.remove(id) {
            Some((_, partition)) => {
                debug!(scope = %id, dropped = partition.len(), "Destroyed scope");
                true
            }
            None => {
                trace!(scope = %id, "Destroy of unknown scope ignored");
                false
            }
        }
    }

    /// Drops every scope. Returns how many there were.
    pub fn destroy_all_scopes(&self) -> usize {
        let count = self.scopes.len();
        self.scopes.clear();
        debug!(count, "Destroyed all scopes");
        count
    }

    pub fn has_scope(&self, id: &ScopeId) -> bool {
        self.scopes.contains_key(id)
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn singleton_count(&self) -> usize {
        self.singletons.read().len()
    }

    pub fn clear(&self) {
        self.singletons.write().slots.clear();
        self.scopes.clear();
    }
}

fn unknown_scope(id: &ScopeId, key: &DependencyKey) -> WeftError {
    WeftError::UnknownScope {
        scope: id.clone(),
        key: key.clone(),
    }
}

/// Exclusive right to build one (tier, key).
///
/// Dropping the guard without calling [`finish`](Self::finish), which
/// only happens while unwinding out of a constructor, clears the slot
/// and wakes waiters with [`WeftError::ConstructionAborted`].
pub(crate) struct BuildGuard<'a> {
    cache: &'a InstanceCache,
    tier: Tier,
    key: DependencyKey,
    pending: Arc<PendingBuild>,
    finished: bool,
}

impl BuildGuard<'_> {
    /// Stores a successful result, then wakes waiters with `result`.
    pub fn finish(mut self, result: Result<Instance>) -> Result<Instance> {
        self.finished = true;
        self.cache
            .settle(&self.tier, &self.key, &self.pending, result.as_ref().ok().cloned());
        self.pending.publish(result.clone());
        result
    }
}

impl Drop for BuildGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.cache.settle(&self.tier, &self.key, &self.pending, None);
        self.pending.publish(Err(WeftError::ConstructionAborted {
            key: self.key.clone(),
        }));
    }
}
