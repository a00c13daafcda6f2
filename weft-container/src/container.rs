//! # The Container
//!
//! Owns the registry, the interface bindings and the instance cache, and
//! exposes typed registration and resolution on top of them.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> Container ──create_scope()──> ScopeId
//!                                   │
//!                        resolve / resolve_scoped
//!                                   │
//!                                   ▼
//!                  Resolver ──> Registry + InstanceCache
//! ```
//!
//! # Examples
//! ```rust
//! use weft_container::prelude::*;
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, msg: &str);
//! }
//!
//! struct ConsoleLogger;
//! impl Logger for ConsoleLogger {
//!     fn log(&self, msg: &str) { println!("{msg}"); }
//! }
//!
//! struct UserService {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! let container = Container::builder()
//!     .singleton(|| ConsoleLogger)
//!     .bind::<dyn Logger, ConsoleLogger>(|logger| logger)
//!     .transient(|logger: Arc<dyn Logger>| UserService { logger })
//!     .build()
//!     .expect("Failed to build container");
//!
//! let service = container.resolve::<UserService>().expect("Failed to resolve");
//! service.logger.log("ready");
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, instrument, trace};

use crate::binding::Binding;
use crate::cache::InstanceCache;
use crate::constructor::{Constructor, FallibleConstructor};
use crate::error::{NotRegisteredError, Result, WeftError};
use crate::graph::GraphValidator;
use crate::key::DependencyKey;
use crate::provider::Provider;
use crate::registry::{Instance, Registration, Registry, downcast};
use crate::resolver::Resolver;
use crate::scope::ScopeId;
use crate::settings::ContainerSettings;

// ============================================================
// ContainerBuilder
// ============================================================

/// Collects registrations and bindings, then builds a validated
/// [`Container`].
///
/// Order does not matter: bindings are applied after every registration,
/// and the graph is validated once at the end.
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .singleton_value(Config::load())
///     .fallible_singleton(Database::connect)
///     .scoped(RequestContext::new)
///     .bind::<dyn Repository, PgRepository>(|repo| repo)
///     .build()?;
/// ```
pub struct ContainerBuilder {
    registrations: Vec<Registration>,
    bindings: Vec<Binding>,
    settings: ContainerSettings,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            registrations: Vec::new(),
            bindings: Vec::new(),
            settings: ContainerSettings::default(),
        }
    }

    pub fn settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds a prepared registration.
    pub fn register(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    pub fn register_all(mut self, registrations: impl IntoIterator<Item = Registration>) -> Self {
        self.registrations.extend(registrations);
        self
    }

    // ── Infallible constructors ──

    /// Built once, shared for the life of the container.
    pub fn singleton<Args, C: Constructor<Args>>(self, constructor: C) -> Self {
        self.register(Registration::new(constructor).singleton())
    }

    /// Built once per scope.
    pub fn scoped<Args, C: Constructor<Args>>(self, constructor: C) -> Self {
        self.register(Registration::new(constructor).scoped())
    }

    /// Built on every resolve.
    pub fn transient<Args, C: Constructor<Args>>(self, constructor: C) -> Self {
        self.register(Registration::new(constructor).transient())
    }

    /// Singleton under a name, independent of the unnamed registration.
    pub fn named_singleton<Args, C: Constructor<Args>>(
        self,
        name: impl Into<Arc<str>>,
        constructor: C,
    ) -> Self {
        self.register(Registration::new(constructor).singleton().named(name))
    }

    /// Registers a pre-built value.
    pub fn singleton_value<T: Send + Sync + 'static>(self, value: T) -> Self {
        self.register(Registration::value(value))
    }

    // ── Fallible constructors ──

    pub fn fallible_singleton<Args, C: FallibleConstructor<Args>>(self, constructor: C) -> Self {
        self.register(Registration::fallible(constructor).singleton())
    }

    pub fn fallible_scoped<Args, C: FallibleConstructor<Args>>(self, constructor: C) -> Self {
        self.register(Registration::fallible(constructor).scoped())
    }

    pub fn fallible_transient<Args, C: FallibleConstructor<Args>>(self, constructor: C) -> Self {
        self.register(Registration::fallible(constructor).transient())
    }

    // ── Interfaces ──

    /// Resolves `I` through the registration of `C`.
    pub fn bind<I, C>(mut self, cast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        self.bindings.push(Binding::new::<I, C>(None, cast));
        self
    }

    pub fn bind_named<I, C>(
        mut self,
        name: impl Into<Arc<str>>,
        cast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
    ) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        self.bindings.push(Binding::new::<I, C>(Some(name.into()), cast));
        self
    }

    // ── Build ──

    /// Builds the container and validates the whole graph.
    ///
    /// Validation always runs here, whatever `validate_on_change` says.
    ///
    /// # Errors
    /// The first invalid registration or binding, otherwise the first
    /// validation error.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        info!(
            registrations = self.registrations.len(),
            bindings = self.bindings.len(),
            "Building container"
        );

        let container = Container::with_settings(self.settings);
        {
            let mut registry = container.inner.registry.write();
            for registration in self.registrations {
                registry.register(registration)?;
            }
            for binding in self.bindings {
                check_binding(&registry, &binding, container.inner.settings.max_suggestions)?;
                registry.bindings_mut().insert(binding);
            }
        }
        container.validate()?;

        info!("Container built successfully ✓");
        Ok(container)
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

struct ContainerInner {
    registry: RwLock<Registry>,
    cache: InstanceCache,
    settings: ContainerSettings,
}

/// Thread-safe dependency injection container.
///
/// Cloning is cheap and every clone shares the same registry and caches.
/// Registrations can be added at any time; with `validate_on_change`
/// (the default) every mutation re-validates the graph and reports the
/// first problem to the caller that caused it.
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_settings(ContainerSettings::default())
    }

    pub fn with_settings(settings: ContainerSettings) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                registry: RwLock::new(Registry::new()),
                cache: InstanceCache::new(),
                settings,
            }),
        }
    }

    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Registers every constructor as given (singletons unless the
    /// registration says otherwise), then validates once.
    ///
    /// ```
    /// use std::sync::Arc;
    /// use weft_container::prelude::*;
    ///
    /// struct Db;
    /// struct Repo(Arc<Db>);
    ///
    /// let container = Container::init([
    ///     Registration::new(|db: Arc<Db>| Repo(db)),
    ///     Registration::new(|| Db),
    /// ])
    /// .unwrap();
    /// assert!(container.resolve::<Repo>().is_ok());
    /// ```
    pub fn init(registrations: impl IntoIterator<Item = Registration>) -> Result<Self> {
        Self::builder().register_all(registrations).build()
    }

    pub fn settings(&self) -> &ContainerSettings {
        &self.inner.settings
    }

    // ── Runtime registration ──

    /// Adds or replaces a registration.
    ///
    /// Cached instances of a replaced registration stay cached; use
    /// [`override_with`](Self::override_with) to drop them.
    ///
    /// # Errors
    /// [`WeftError::InvalidConstructor`] for a malformed registration, or
    /// the validation error the new graph produces. The registration is
    /// kept in the latter case.
    pub fn register(&self, registration: Registration) -> Result<()> {
        self.inner.registry.write().register(registration)?;
        self.revalidate()
    }

    /// Registers several constructors and validates once for all of them.
    pub fn register_batch(&self, registrations: impl IntoIterator<Item = Registration>) -> Result<()> {
        {
            let mut registry = self.inner.registry.write();
            for registration in registrations {
                registry.register(registration)?;
            }
        }
        self.revalidate()
    }

    /// Replaces a registration and evicts its cached instances from the
    /// singleton partition and every scope.
    ///
    /// Meant for swapping in test doubles.
    pub fn override_with(&self, registration: Registration) -> Result<()> {
        let key = registration.key().clone();
        {
            let mut registry = self.inner.registry.write();
            registry.register(registration)?;
            let evicted = self.inner.cache.evict(&key);
            info!(key = %key, evicted, "Overrode registration");
        }
        self.revalidate()
    }

    /// Resolves interface `I` through the registration of `C`.
    ///
    /// # Errors
    /// - [`WeftError::NotAnInterface`] if `I` is a sized type
    /// - [`WeftError::NotRegistered`] if `C` has no registration yet
    pub fn bind<I, C>(&self, cast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        self.insert_binding(Binding::new::<I, C>(None, cast))
    }

    /// Like [`bind`](Self::bind), for the named interface key.
    ///
    /// `C` resolves its registration under the same name, falling back
    /// to its unnamed one.
    pub fn bind_named<I, C>(
        &self,
        name: impl Into<Arc<str>>,
        cast: impl Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
    ) -> Result<()>
    where
        I: ?Sized + Send + Sync + 'static,
        C: Send + Sync + 'static,
    {
        self.insert_binding(Binding::new::<I, C>(Some(name.into()), cast))
    }

    fn insert_binding(&self, binding: Binding) -> Result<()> {
        {
            let mut registry = self.inner.registry.write();
            check_binding(&registry, &binding, self.inner.settings.max_suggestions)?;
            debug!(interface = %binding.interface(), concrete = %binding.concrete(), "Bound interface");
            registry.bindings_mut().insert(binding);
        }
        self.revalidate()
    }

    // ── Resolution ──

    /// Resolve a dependency by type.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = container.resolve()?;
    /// let log: Arc<dyn Logger> = container.resolve()?;
    /// ```
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_typed(DependencyKey::of::<T>(), None)
    }

    /// Resolves the registration named `name`, or the unnamed one when
    /// there is none. Named interfaces never fall back.
    pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.resolve_typed(DependencyKey::named::<T>(name), None)
    }

    /// Resolves inside `scope`. Scoped values are cached per scope.
    pub fn resolve_scoped<T: ?Sized + Send + Sync + 'static>(&self, scope: &ScopeId) -> Result<Arc<T>> {
        self.resolve_typed(DependencyKey::of::<T>(), Some(scope))
    }

    pub fn resolve_named_scoped<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &str,
        scope: &ScopeId,
    ) -> Result<Arc<T>> {
        self.resolve_typed(DependencyKey::named::<T>(name), Some(scope))
    }

    /// Untyped resolve. The instance payload is an `Arc` of the key's type.
    pub fn resolve_key(&self, key: &DependencyKey, scope: Option<&ScopeId>) -> Result<Instance> {
        trace!(key = %key, scope = ?scope, "Resolving");
        let inner = &*self.inner;
        Resolver::new(&inner.registry, &inner.cache, inner.settings.max_suggestions, scope).resolve(key)
    }

    fn resolve_typed<T: ?Sized + Send + Sync + 'static>(
        &self,
        key: DependencyKey,
        scope: Option<&ScopeId>,
    ) -> Result<Arc<T>> {
        let instance = self.resolve_key(&key, scope)?;
        downcast::<T>(&key, &instance)
    }

    /// A handle that resolves `T` each time it is asked.
    pub fn provider<T: ?Sized + Send + Sync + 'static>(&self) -> Provider<T> {
        Provider::new(self.clone(), DependencyKey::of::<T>())
    }

    pub fn named_provider<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Provider<T> {
        Provider::new(self.clone(), DependencyKey::named::<T>(name))
    }

    // ── Scopes ──

    /// Opens a scope. It lives until [`destroy_scope`](Self::destroy_scope)
    /// or [`destroy_all_scopes`](Self::destroy_all_scopes).
    pub fn create_scope(&self) -> ScopeId {
        self.inner.cache.create_scope()
    }

    /// Opens a scope that is destroyed when the guard drops.
    pub fn scope(&self) -> ScopeGuard {
        ScopeGuard {
            container: self.clone(),
            id: self.create_scope(),
        }
    }

    /// Drops a scope and its cached values. Unknown ids are a no-op.
    pub fn destroy_scope(&self, scope: &ScopeId) {
        self.inner.cache.destroy_scope(scope);
    }

    pub fn destroy_all_scopes(&self) {
        self.inner.cache.destroy_all_scopes();
    }

    pub fn scope_count(&self) -> usize {
        self.inner.cache.scope_count()
    }

    /// Returns `true` while `scope` has not been destroyed.
    pub fn has_scope(&self, scope: &ScopeId) -> bool {
        self.inner.cache.has_scope(scope)
    }

    // ── Introspection ──

    /// Validates the dependency graph without building anything.
    pub fn validate(&self) -> Result<()> {
        let registry = self.inner.registry.read();
        GraphValidator::new(&registry, &self.inner.settings).validate()
    }

    fn revalidate(&self) -> Result<()> {
        if self.inner.settings.validate_on_change {
            self.validate()
        } else {
            Ok(())
        }
    }

    /// Returns `true` if `T` is registered, or bound when it is an
    /// interface.
    pub fn is_registered<T: ?Sized + 'static>(&self) -> bool {
        self.contains(&DependencyKey::of::<T>())
    }

    /// Exact check for `key`, name included.
    pub fn contains(&self, key: &DependencyKey) -> bool {
        let registry = self.inner.registry.read();
        if key.is_interface() {
            registry.bindings().get(key).is_some()
        } else {
            registry.get(key).is_some()
        }
    }

    /// Registered keys, named ones included, in registration order.
    pub fn registered_keys(&self) -> Vec<DependencyKey> {
        self.inner.registry.read().registered_keys().to_vec()
    }

    /// Number of registrations, named ones included.
    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.registry.read().is_empty()
    }

    /// Drops every registration, binding, cached instance and scope.
    pub fn reset(&self) {
        let mut registry = self.inner.registry.write();
        registry.clear();
        self.inner.cache.clear();
        info!("Container reset");
    }
}

fn check_binding(registry: &Registry, binding: &Binding, max_suggestions: usize) -> Result<()> {
    if !binding.interface().is_interface() {
        return Err(WeftError::NotAnInterface {
            key: binding.interface().clone(),
        });
    }

    let concrete = binding.concrete();
    if registry.lookup(concrete).is_none() {
        return Err(WeftError::NotRegistered(NotRegisteredError {
            requested: concrete.clone(),
            required_by: Some(binding.interface().clone()),
            suggestions: registry.suggestions(concrete, max_suggestions),
        }));
    }

    Ok(())
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.inner.registry.read();
        f.debug_struct("Container")
            .field("registered", &registry.len())
            .field("bindings", &registry.bindings().len())
            .field("singletons", &self.inner.cache.singleton_count())
            .field("scopes", &self.inner.cache.scope_count())
            .finish()
    }
}

// ═══════════════════════════════════════════
// ScopeGuard
// ═══════════════════════════════════════════

/// A scope that is destroyed when dropped.
pub struct ScopeGuard {
    container: Container,
    id: ScopeId,
}

impl ScopeGuard {
    pub fn id(&self) -> &ScopeId {
        &self.id
    }

    /// Resolve a dependency within this scope.
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.container.resolve_scoped(&self.id)
    }

    pub fn resolve_named<T: ?Sized + Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        self.container.resolve_named_scoped(name, &self.id)
    }
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        self.container.destroy_scope(&self.id);
    }
}

impl fmt::Debug for ScopeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopeGuard").field(&self.id).finish()
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{Container, ContainerBuilder, ScopeGuard};
    pub use crate::error::{Result, WeftError};
    pub use crate::key::DependencyKey;
    pub use crate::provider::Provider;
    pub use crate::registry::Registration;
    pub use crate::scope::{Scope, ScopeId};
    pub use crate::settings::ContainerSettings;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
