//! Dependency registry: what can be built, and from what.
//!
//! The registry maps a [`DependencyKey`] to the [`Registration`] that
//! produces it, and owns the interface [`BindingTable`].

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};
use weft_support::rendering::suggest_similar;

use crate::binding::BindingTable;
use crate::constructor::{Constructor, FallibleConstructor};
use crate::error::{BoxError, InvalidConstructorError, Result, WeftError};
use crate::key::DependencyKey;
use crate::scope::Scope;

/// A constructed value, type-erased.
///
/// The payload is always an `Arc<T>` for the key's type `T`, which lets
/// sized types and trait objects share one representation.
pub type Instance = Arc<dyn Any + Send + Sync>;

/// Type-erased constructor: resolved parameters in, instance out.
pub type FactoryFn = Arc<dyn Fn(&Arguments) -> Result<Instance> + Send + Sync>;

/// Wraps a shared value as an [`Instance`].
#[inline]
pub fn erase<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Instance {
    Arc::new(value)
}

/// Recovers the typed value from an [`Instance`] produced for `key`.
pub(crate) fn downcast<T: ?Sized + Send + Sync + 'static>(
    key: &DependencyKey,
    instance: &Instance,
) -> Result<Arc<T>> {
    instance
        .downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or_else(|| WeftError::TypeMismatch {
            key: key.clone(),
            expected: type_name::<T>(),
        })
}

/// Resolved parameters handed to a factory, in declaration order.
pub struct Arguments {
    consumer: DependencyKey,
    values: Vec<(DependencyKey, Instance)>,
}

impl Arguments {
    pub(crate) fn new(consumer: DependencyKey, values: Vec<(DependencyKey, Instance)>) -> Self {
        Self { consumer, values }
    }

    /// The key being constructed.
    pub fn consumer(&self) -> &DependencyKey {
        &self.consumer
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns parameter `index` as `Arc<T>`.
    ///
    /// # Errors
    /// [`WeftError::TypeMismatch`] when the index is out of range or the
    /// value was produced for another type.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>> {
        match self.values.get(index) {
            Some((key, instance)) => downcast::<T>(key, instance),
            None => Err(WeftError::TypeMismatch {
                key: self.consumer.clone(),
                expected: type_name::<T>(),
            }),
        }
    }

    pub(crate) fn constructor_failed(&self, source: BoxError) -> WeftError {
        WeftError::ConstructionFailed {
            key: self.consumer.clone(),
            source: Arc::from(source),
        }
    }
}

/// One way to produce a value of a given type.
///
/// ```
/// use std::sync::Arc;
/// use weft_container::registry::Registration;
/// use weft_container::scope::Scope;
///
/// struct Db;
/// struct Repo(Arc<Db>);
///
/// let repo = Registration::new(|db: Arc<Db>| Repo(db)).transient();
/// assert_eq!(repo.scope(), Scope::Transient);
/// assert_eq!(repo.dependencies().len(), 1);
/// ```
#[derive(Clone)]
pub struct Registration {
    key: DependencyKey,
    scope: Scope,
    dependencies: Vec<DependencyKey>,
    factory: FactoryFn,
    defect: Option<&'static str>,
}

impl Registration {
    /// Registers an infallible constructor as a singleton.
    pub fn new<Args, C: Constructor<Args>>(constructor: C) -> Self {
        // Best effort: `type_name` output is not a stable format, so a
        // Result that slips past here is registered as a plain value.
        let defect = shape_defect::<C::Output>().or_else(|| {
            type_name::<C::Output>()
                .starts_with("core::result::Result<")
                .then_some("constructor returns a Result; register it with Registration::fallible so the error is propagated")
        });

        Self {
            key: DependencyKey::of::<C::Output>(),
            scope: Scope::default(),
            dependencies: C::dependencies(),
            factory: Arc::new(move |args: &Arguments| {
                constructor.construct(args).map(|value| erase(Arc::new(value)))
            }),
            defect,
        }
    }

    /// Registers a constructor returning `Result<T, E>` as a singleton.
    pub fn fallible<Args, C: FallibleConstructor<Args>>(constructor: C) -> Self {
        Self {
            key: DependencyKey::of::<C::Output>(),
            scope: Scope::default(),
            dependencies: C::dependencies(),
            factory: Arc::new(move |args: &Arguments| {
                constructor.construct(args).map(|value| erase(Arc::new(value)))
            }),
            defect: shape_defect::<C::Output>(),
        }
    }

    /// Registers a pre-built value as a singleton.
    ///
    /// Every resolve hands out the same `Arc`.
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        let shared = Arc::new(value);
        Self {
            key: DependencyKey::of::<T>(),
            scope: Scope::Singleton,
            dependencies: Vec::new(),
            factory: Arc::new(move |_: &Arguments| Ok(erase(shared.clone()))),
            defect: shape_defect::<T>(),
        }
    }

    /// Registers a raw factory.
    ///
    /// Dependencies may carry names; they are resolved with their own
    /// qualifier and handed to `factory` in order. The factory must
    /// return an instance whose payload is an `Arc` of the key's type.
    pub fn from_factory(
        key: DependencyKey,
        dependencies: Vec<DependencyKey>,
        factory: impl Fn(&Arguments) -> Result<Instance> + Send + Sync + 'static,
    ) -> Self {
        let defect = key
            .is_interface()
            .then_some("interfaces are bound to an implementation, not constructed");
        Self {
            key,
            scope: Scope::default(),
            dependencies,
            factory: Arc::new(factory),
            defect,
        }
    }

    /// Sets the lifetime.
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn singleton(self) -> Self {
        self.with_scope(Scope::Singleton)
    }

    pub fn scoped(self) -> Self {
        self.with_scope(Scope::Scoped)
    }

    pub fn transient(self) -> Self {
        self.with_scope(Scope::Transient)
    }

    /// Qualifies the produced key with `name`.
    ///
    /// Parameters keep their own keys; the name never propagates down.
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.key = self.key.with_name(Some(name.into()));
        self
    }

    pub fn key(&self) -> &DependencyKey {
        &self.key
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn dependencies(&self) -> &[DependencyKey] {
        &self.dependencies
    }

    pub(crate) fn invoke(&self, args: &Arguments) -> Result<Instance> {
        (self.factory)(args)
    }

    fn check(&self) -> Result<()> {
        match self.defect {
            Some(reason) => Err(WeftError::InvalidConstructor(InvalidConstructorError {
                key: self.key.clone(),
                reason,
            })),
            None => Ok(()),
        }
    }
}

fn shape_defect<T: 'static>() -> Option<&'static str> {
    (TypeId::of::<T>() == TypeId::of::<()>()).then_some("constructor returns no value")
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Stores all registrations and interface bindings.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    registrations: HashMap<DependencyKey, Registration>,
    order: Vec<DependencyKey>,
    bindings: BindingTable,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration, replacing any previous one for the key.
    ///
    /// # Errors
    /// [`WeftError::InvalidConstructor`] if the registration cannot act
    /// as a constructor.
    pub fn register(&mut self, registration: Registration) -> Result<Option<Registration>> {
        registration.check()?;

        let key = registration.key.clone();
        debug!(key = %key, scope = %registration.scope, "Registered dependency");

        let previous = self.registrations.insert(key.clone(), registration);
        if previous.is_none() {
            self.order.push(key);
        } else {
            trace!(key = %key, "Replaced previous registration");
        }
        Ok(previous)
    }

    /// Exact lookup.
    pub fn get(&self, key: &DependencyKey) -> Option<&Registration> {
        self.registrations.get(key)
    }

    /// Lookup used for resolution: a named key without a named
    /// registration falls back to the unnamed registration of its type.
    ///
    /// The returned registration's key is the effective cache key.
    pub fn lookup(&self, key: &DependencyKey) -> Option<&Registration> {
        self.registrations.get(key).or_else(|| {
            key.name()?;
            trace!(key = %key, "No named registration, falling back to unnamed");
            self.registrations.get(&key.unnamed())
        })
    }

    /// All registrations in the order their keys were first registered.
    pub fn iter(&self) -> impl Iterator<Item = &Registration> {
        self.order.iter().filter_map(|key| self.registrations.get(key))
    }

    /// Keys in registration order.
    pub fn registered_keys(&self) -> &[DependencyKey] {
        &self.order
    }

    pub fn bindings(&self) -> &BindingTable {
        &self.bindings
    }

    pub fn bindings_mut(&mut self) -> &mut BindingTable {
        &mut self.bindings
    }

    /// Registered names close to `key`, for "did you mean" hints.
    pub fn suggestions(&self, key: &DependencyKey, limit: usize) -> Vec<String> {
        let names: Vec<String> = self.order.iter().map(ToString::to_string).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        suggest_similar(&key.to_string(), &names, limit)
    }

    /// Returns the number of registrations.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn clear(&mut self) {
        self.registrations.clear();
        self.order.clear();
        self.bindings.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Database;
    struct Cache;
    #[derive(Debug)]
    struct Config(&'static str);

    fn database() -> Database {
        Database
    }

    #[test]
    fn register_and_get() {
        let mut reg = Registry::new();
        reg.register(Registration::new(database)).unwrap();
        assert!(reg.get(&DependencyKey::of::<Database>()).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn re_registration_replaces_silently() {
        let mut reg = Registry::new();
        assert!(reg.register(Registration::new(database)).unwrap().is_none());
        let previous = reg.register(Registration::new(database).transient()).unwrap();
        assert_eq!(previous.map(|p| p.scope()), Some(Scope::Singleton));
        assert_eq!(reg.len(), 1);
        assert_eq!(
            reg.get(&DependencyKey::of::<Database>()).map(Registration::scope),
            Some(Scope::Transient)
        );
    }

    #[test]
    fn iteration_keeps_first_registration_order() {
        let mut reg = Registry::new();
        reg.register(Registration::new(|| Cache)).unwrap();
        reg.register(Registration::new(database)).unwrap();
        reg.register(Registration::new(|| Cache).transient()).unwrap();

        let keys: Vec<_> = reg.iter().map(|r| r.key().clone()).collect();
        assert_eq!(keys, vec![DependencyKey::of::<Cache>(), DependencyKey::of::<Database>()]);
        assert_eq!(reg.registered_keys(), keys.as_slice());
    }

    #[test]
    fn named_lookup_prefers_named_then_falls_back() {
        let mut reg = Registry::new();
        reg.register(Registration::new(|| Config("default"))).unwrap();
        reg.register(Registration::new(|| Config("primary")).named("primary")).unwrap();

        let primary = reg.lookup(&DependencyKey::named::<Config>("primary")).unwrap();
        assert_eq!(primary.key().name(), Some("primary"));

        let other = reg.lookup(&DependencyKey::named::<Config>("other")).unwrap();
        assert_eq!(other.key().name(), None);

        assert!(reg.get(&DependencyKey::named::<Config>("other")).is_none());
    }

    #[test]
    fn unit_constructor_is_invalid() {
        let mut reg = Registry::new();
        let err = reg.register(Registration::new(|| ())).unwrap_err();
        assert!(matches!(err, WeftError::InvalidConstructor(_)));
        assert!(reg.is_empty());
    }

    #[test]
    fn result_returning_infallible_constructor_is_invalid() {
        let mut reg = Registry::new();
        let ctor = || -> std::result::Result<Database, std::io::Error> { Ok(Database) };
        let err = reg.register(Registration::new(ctor)).unwrap_err();
        match err {
            WeftError::InvalidConstructor(e) => assert!(e.reason.contains("fallible")),
            other => panic!("expected InvalidConstructor, got {other:?}"),
        }

        assert!(reg.register(Registration::fallible(ctor)).is_ok());
        assert!(reg.get(&DependencyKey::of::<Database>()).is_some());
    }

    #[test]
    fn only_std_result_is_rejected() {
        mod outcome {
            pub struct Result<T>(pub T);
        }

        let mut reg = Registry::new();
        assert!(reg.register(Registration::new(|| outcome::Result(Database))).is_ok());
    }

    #[test]
    fn raw_factory_for_interface_is_invalid() {
        trait Port: Send + Sync {}
        let mut reg = Registry::new();
        let raw = Registration::from_factory(DependencyKey::of::<dyn Port>(), vec![], |_| {
            Ok(erase(Arc::new(0u8)))
        });
        assert!(matches!(reg.register(raw), Err(WeftError::InvalidConstructor(_))));
    }

    #[test]
    fn named_does_not_touch_dependencies() {
        let reg = Registration::new(|_db: Arc<Database>| Cache).named("hot");
        assert_eq!(reg.key(), &DependencyKey::named::<Cache>("hot"));
        assert_eq!(reg.dependencies(), &[DependencyKey::of::<Database>()]);
    }

    #[test]
    fn suggestions_for_missing_type() {
        let mut reg = Registry::new();
        reg.register(Registration::new(database)).unwrap();
        reg.register(Registration::new(|| Cache)).unwrap();

        struct Databse;
        let hints = reg.suggestions(&DependencyKey::of::<Databse>(), 3);
        assert!(hints.iter().any(|h| h.ends_with("Database")));
    }

    #[test]
    fn value_registration_shares_one_arc() {
        let reg = Registration::value(Config("fixed"));
        let args = Arguments::new(reg.key().clone(), vec![]);
        let a = reg.invoke(&args).unwrap();
        let b = reg.invoke(&args).unwrap();
        let a = downcast::<Config>(reg.key(), &a).unwrap();
        let b = downcast::<Config>(reg.key(), &b).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.0, "fixed");
    }
}
