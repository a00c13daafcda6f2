//! Dependency graph validation.
//!
//! Walks the registry without building anything:
//! - every parameter is registered, or bound if it is an interface
//! - no type depends on itself
//! - with strict lifetimes, no consumer outlives its dependencies
//!
//! Cycles are reported exactly as the resolver would report them when
//! resolving the same root.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::error::{
    CircularDependencyError, NotRegisteredError, Result, ScopeMismatchError, WeftError,
};
use crate::key::DependencyKey;
use crate::registry::{Registration, Registry};
use crate::settings::ContainerSettings;

/// Depth-first walk over the registered graph.
///
/// `visiting` holds the nodes on the current path, `validated` the nodes
/// whose whole subgraph is known to be sound, so diamonds and repeated
/// roots are walked once.
pub(crate) struct GraphValidator<'a> {
    registry: &'a Registry,
    strict_lifetimes: bool,
    max_suggestions: usize,
    visiting: HashSet<DependencyKey>,
    validated: HashSet<DependencyKey>,
    path: Vec<DependencyKey>,
}

impl<'a> GraphValidator<'a> {
    pub fn new(registry: &'a Registry, settings: &ContainerSettings) -> Self {
        Self {
            registry,
            strict_lifetimes: settings.strict_lifetimes,
            max_suggestions: settings.max_suggestions,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates every registration, in registration order.
    ///
    /// # Errors
    /// - [`WeftError::CircularDependency`]: cycle detected
    /// - [`WeftError::NotRegistered`]: missing dependency
    /// - [`WeftError::NoBinding`]: interface parameter with nothing bound
    /// - [`WeftError::ScopeMismatch`]: lifetime violation (strict only)
    ///
    /// Errors below a root come wrapped in [`WeftError::DependencyFailed`].
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<()> {
        let registry = self.registry;
        debug!(
            registrations = registry.len(),
            bindings = registry.bindings().len(),
            "Starting dependency graph validation"
        );

        for registration in registry.iter() {
            self.visit(registration.key(), None)?;
        }

        debug!("Dependency graph validation passed");
        Ok(())
    }

    fn visit(&mut self, key: &DependencyKey, consumer: Option<&Registration>) -> Result<()> {
        let registry = self.registry;

        let target = if key.is_interface() {
            registry
                .bindings()
                .get(key)
                .ok_or_else(|| WeftError::NoBinding {
                    interface: key.clone(),
                })?
                .concrete()
        } else {
            key
        };

        let registration = registry.lookup(target).ok_or_else(|| {
            WeftError::NotRegistered(NotRegisteredError {
                requested: target.clone(),
                required_by: self.path.last().cloned(),
                suggestions: registry.suggestions(target, self.max_suggestions),
            })
        })?;
        let node = registration.key();

        if let Some(consumer) = consumer {
            self.check_lifetimes(consumer, registration)?;
        }

        if self.visiting.contains(node) {
            let start = self.path.iter().position(|k| k == node).unwrap_or(0);
            let mut chain = self.path[start..].to_vec();
            chain.push(node.clone());

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(WeftError::CircularDependency(CircularDependencyError { chain }));
        }

        if self.validated.contains(node) {
            return Ok(());
        }

        self.visiting.insert(node.clone());
        self.path.push(node.clone());

        for (index, dependency) in registration.dependencies().iter().enumerate() {
            self.visit(dependency, Some(registration))
                .map_err(|source| WeftError::DependencyFailed {
                    consumer: node.clone(),
                    index,
                    dependency: dependency.clone(),
                    source: Box::new(source),
                })?;
        }

        self.path.pop();
        self.visiting.remove(node);
        self.validated.insert(node.clone());

        Ok(())
    }

    /// A dependency must live at least as long as its consumer:
    /// `Singleton > Scoped > Transient`.
    fn check_lifetimes(&self, consumer: &Registration, dependency: &Registration) -> Result<()> {
        if consumer.scope() <= dependency.scope() {
            return Ok(());
        }

        if !self.strict_lifetimes {
            debug!(
                consumer = %consumer.key(),
                dependency = %dependency.key(),
                "Consumer outlives its dependency"
            );
            return Ok(());
        }

        warn!(
            consumer = %consumer.key(),
            consumer_scope = %consumer.scope(),
            dependency = %dependency.key(),
            dependency_scope = %dependency.scope(),
            "Scope mismatch detected"
        );

        Err(WeftError::ScopeMismatch(ScopeMismatchError {
            consumer: consumer.key().clone(),
            consumer_scope: consumer.scope(),
            dependency: dependency.key().clone(),
            dependency_scope: dependency.scope(),
        }))
    }
}
