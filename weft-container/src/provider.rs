//! Lazy dependency handles.
//!
//! A [`Provider`] remembers what to resolve, not the value. Each
//! [`get`](Provider::get) runs a fresh resolve, which hits the cache for
//! singletons and scoped values and builds anew for transients.
//!
//! ```
//! use std::sync::Arc;
//! use weft_container::prelude::*;
//!
//! struct Clock;
//!
//! let container = Container::builder().transient(|| Clock).build().unwrap();
//! let clocks = container.provider::<Clock>();
//!
//! let a = clocks.get().unwrap();
//! let b = clocks.get().unwrap();
//! assert!(!Arc::ptr_eq(&a, &b));
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::container::Container;
use crate::error::Result;
use crate::key::DependencyKey;
use crate::registry::downcast;
use crate::scope::ScopeId;

/// Deferred resolve of `T`, optionally named and bound to a scope.
pub struct Provider<T: ?Sized> {
    container: Container,
    key: DependencyKey,
    scope: Option<ScopeId>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> {
    pub(crate) fn new(container: Container, key: DependencyKey) -> Self {
        Self {
            container,
            key,
            scope: None,
            _marker: PhantomData,
        }
    }

    /// Resolves inside `scope` from now on.
    pub fn in_scope(mut self, scope: &ScopeId) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    pub fn scope(&self) -> Option<&ScopeId> {
        self.scope.as_ref()
    }

    /// Resolves the dependency now.
    ///
    /// # Errors
    /// Whatever the resolve returns; nothing is remembered between calls,
    /// so a later call can succeed after registrations change.
    pub fn get(&self) -> Result<Arc<T>> {
        let instance = self.container.resolve_key(&self.key, self.scope.as_ref())?;
        downcast::<T>(&self.key, &instance)
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            key: self.key.clone(),
            scope: self.scope.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .finish()
    }
}
