//! Interface bindings.
//!
//! A [`Binding`] says which concrete type satisfies an interface
//! (`dyn Trait`), optionally under a name. The cast closure given at
//! bind time is the proof that the concrete type implements the trait:
//! `|c: Arc<FileLog>| -> Arc<dyn Log> { c }` only compiles if it does.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::key::DependencyKey;
use crate::registry::{Instance, erase};

type UpcastFn = Arc<dyn Fn(&Instance) -> Option<Instance> + Send + Sync>;

/// Maps an interface key to the concrete key that satisfies it.
#[derive(Clone)]
pub struct Binding {
    interface: DependencyKey,
    concrete: DependencyKey,
    upcast: UpcastFn,
}

impl Binding {
    /// Binds `I` to `C`, optionally under `name`.
    ///
    /// With a name, both sides carry it: the concrete side resolves its
    /// named registration if there is one and the unnamed one otherwise.
    pub fn new<I, C>(
        name: Option<Arc<str>>,
        cast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
    ) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        Self {
            interface: DependencyKey::of::<I>().with_name(name.clone()),
            concrete: DependencyKey::of::<C>().with_name(name),
            upcast: Arc::new(move |instance: &Instance| {
                let concrete = instance.downcast_ref::<Arc<C>>()?;
                Some(erase(cast(concrete.clone())))
            }),
        }
    }

    pub fn interface(&self) -> &DependencyKey {
        &self.interface
    }

    pub fn concrete(&self) -> &DependencyKey {
        &self.concrete
    }

    /// Turns a concrete instance into an interface instance.
    ///
    /// Returns `None` if `instance` does not hold the concrete type.
    pub(crate) fn upcast(&self, instance: &Instance) -> Option<Instance> {
        (self.upcast)(instance)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("interface", &self.interface)
            .field("concrete", &self.concrete)
            .finish()
    }
}

/// Interface bindings, keyed by (name, interface).
///
/// Lookups are exact: a named interface key never matches an unnamed
/// binding.
#[derive(Debug, Default)]
pub(crate) struct BindingTable {
    bindings: HashMap<DependencyKey, Binding>,
}

impl BindingTable {
    /// Inserts a binding, returning the one it replaced.
    pub fn insert(&mut self, binding: Binding) -> Option<Binding> {
        self.bindings.insert(binding.interface.clone(), binding)
    }

    pub fn get(&self, interface: &DependencyKey) -> Option<&Binding> {
        self.bindings.get(interface)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn clear(&mut self) {
        self.bindings.clear();
    }
}
