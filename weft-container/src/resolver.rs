//! Runtime resolution.
//!
//! A [`Resolver`] lives for one top-level resolve call. It owns the
//! resolution chain, so unrelated calls on other threads never see each
//! other's chain and a cycle is caught on the call that walks into it.

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::cache::{Claim, InstanceCache, Tier};
use crate::error::{CircularDependencyError, NotRegisteredError, Result, WeftError};
use crate::key::DependencyKey;
use crate::registry::{Arguments, Instance, Registration, Registry};
use crate::scope::{Scope, ScopeId};

pub(crate) struct Resolver<'a> {
    registry: &'a RwLock<Registry>,
    cache: &'a InstanceCache,
    max_suggestions: usize,
    scope: Option<&'a ScopeId>,
    chain: Vec<DependencyKey>,
}

impl<'a> Resolver<'a> {
    pub fn new(
        registry: &'a RwLock<Registry>,
        cache: &'a InstanceCache,
        max_suggestions: usize,
        scope: Option<&'a ScopeId>,
    ) -> Self {
        Self {
            registry,
            cache,
            max_suggestions,
            scope,
            chain: Vec::new(),
        }
    }

    /// Resolves `key`, building whatever is missing along the way.
    pub fn resolve(&mut self, key: &DependencyKey) -> Result<Instance> {
        if !key.is_interface() {
            return self.resolve_concrete(key);
        }

        let binding = self
            .registry
            .read()
            .bindings()
            .get(key)
            .cloned()
            .ok_or_else(|| WeftError::NoBinding {
                interface: key.clone(),
            })?;

        trace!(interface = %key, concrete = %binding.concrete(), "Following binding");
        let instance = self.resolve_concrete(binding.concrete())?;
        binding.upcast(&instance).ok_or_else(|| WeftError::TypeMismatch {
            key: key.clone(),
            expected: key.type_name(),
        })
    }

    fn resolve_concrete(&mut self, key: &DependencyKey) -> Result<Instance> {
        let lock = self.registry;
        let registry = lock.read();
        let registration = match registry.lookup(key) {
            Some(registration) => registration.clone(),
            None => {
                return Err(WeftError::NotRegistered(NotRegisteredError {
                    requested: key.clone(),
                    required_by: self.chain.last().cloned(),
                    suggestions: registry.suggestions(key, self.max_suggestions),
                }));
            }
        };
        let effective = registration.key();

        if let Some(start) = self.chain.iter().position(|k| k == effective) {
            let mut chain = self.chain[start..].to_vec();
            chain.push(effective.clone());
            return Err(self.cycle(chain));
        }

        let tier = match registration.scope() {
            Scope::Transient => {
                drop(registry);
                return self.build(&registration);
            }
            Scope::Singleton => Tier::Singleton,
            Scope::Scoped => {
                let id = self.scope.ok_or_else(|| WeftError::ScopeRequired {
                    key: effective.clone(),
                })?;
                Tier::Scope(id.clone())
            }
        };

        // Claimed under the registry guard: an override either evicts this
        // claim or was already visible to the lookup above.
        let cache = self.cache;
        let claim = cache.claim(&tier, effective)?;
        drop(registry);
        self.cached(claim, &registration)
    }

    fn cycle(&self, chain: Vec<DependencyKey>) -> WeftError {
        warn!(cycle = ?chain, "Circular dependency detected at resolve time");
        WeftError::CircularDependency(CircularDependencyError { chain })
    }

    fn cached(&mut self, claim: Claim<'_>, registration: &Registration) -> Result<Instance> {
        match claim {
            Claim::Hit(instance) => Ok(instance),
            // Re-entered from inside our own constructor, e.g. via a provider.
            Claim::Wait(pending) if pending.is_owned_by_current_thread() => {
                let key = registration.key().clone();
                let mut chain = Vec::with_capacity(self.chain.len() + 2);
                chain.push(key.clone());
                chain.extend(self.chain.iter().cloned());
                chain.push(key);
                Err(self.cycle(chain))
            }
            Claim::Wait(pending) => {
                trace!(key = %registration.key(), "Waiting on in-flight construction");
                pending.wait()
            }
            Claim::Build(guard) => {
                let result = self.build(registration);
                guard.finish(result)
            }
        }
    }

    fn build(&mut self, registration: &Registration) -> Result<Instance> {
        self.chain.push(registration.key().clone());
        let result = self.construct(registration);
        self.chain.pop();
        result
    }

    fn construct(&mut self, registration: &Registration) -> Result<Instance> {
        let consumer = registration.key();
        let mut values = Vec::with_capacity(registration.dependencies().len());

        for (index, dependency) in registration.dependencies().iter().enumerate() {
            let instance = self
                .resolve(dependency)
                .map_err(|source| WeftError::DependencyFailed {
                    consumer: consumer.clone(),
                    index,
                    dependency: dependency.clone(),
                    source: Box::new(source),
                })?;
            values.push((dependency.clone(), instance));
        }

        trace!(key = %consumer, scope = %registration.scope(), "Constructing");
        registration.invoke(&Arguments::new(consumer.clone(), values))
    }
}
