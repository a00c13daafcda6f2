//! Error types for container operations.
//!
//! Every error names the types involved and, where there is an obvious
//! next step, says what it is.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use weft_support::rendering::render_chain;

use crate::key::DependencyKey;
use crate::scope::{Scope, ScopeId};

/// Error reported by a user constructor, shared so that every caller
/// waiting on the same build sees the same value.
pub type SharedError = Arc<dyn StdError + Send + Sync>;

/// Error type returned by fallible constructors.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Main error type for all container operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WeftError {
    /// A registration cannot be used as a constructor.
    #[error("{}", .0)]
    InvalidConstructor(InvalidConstructorError),

    /// Requested dependency was never registered.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// An interface was requested but nothing is bound to it.
    #[error(
        "No binding for interface {interface}\n  Hint: bind an implementation with .bind::<{}, _>()",
        .interface.type_name()
    )]
    NoBinding { interface: DependencyKey },

    /// A type depends on itself, directly or transitively.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// A scoped dependency was resolved outside of any scope.
    #[error("{key} is Scoped and needs a scope id\n  Hint: resolve it with .resolve_scoped() inside a scope from .create_scope()")]
    ScopeRequired { key: DependencyKey },

    /// The scope id does not exist (never created, or already destroyed).
    #[error("Scope {scope} does not exist (resolving {key})")]
    UnknownScope { scope: ScopeId, key: DependencyKey },

    /// The constructor itself returned an error.
    #[error("Failed to construct {key}: {source}")]
    ConstructionFailed {
        key: DependencyKey,
        #[source]
        source: SharedError,
    },

    /// The thread building the value unwound before finishing.
    #[error("Construction of {key} was aborted before it finished")]
    ConstructionAborted { key: DependencyKey },

    /// A constructor parameter could not be resolved.
    #[error("Failed to resolve parameter #{index} ({dependency}) of {consumer}: {source}")]
    DependencyFailed {
        consumer: DependencyKey,
        index: usize,
        dependency: DependencyKey,
        #[source]
        source: Box<WeftError>,
    },

    /// The resolved value is not of the requested type.
    #[error("Type mismatch: {key} did not produce a value of type {expected}")]
    TypeMismatch {
        key: DependencyKey,
        expected: &'static str,
    },

    /// A long-lived dependency captures a shorter-lived one.
    #[error("{}", .0)]
    ScopeMismatch(ScopeMismatchError),

    /// A binding target is not interface-shaped.
    #[error("{key} is not an interface\n  Hint: only unsized types such as `dyn Trait` can be bound")]
    NotAnInterface { key: DependencyKey },
}

impl WeftError {
    /// Peels parameter context off and returns the error that started
    /// the failure.
    ///
    /// ```
    /// use weft_container::error::{NotRegisteredError, WeftError};
    /// use weft_container::key::DependencyKey;
    ///
    /// let inner = WeftError::NotRegistered(NotRegisteredError {
    ///     requested: DependencyKey::of::<u8>(),
    ///     required_by: Some(DependencyKey::of::<u16>()),
    ///     suggestions: vec![],
    /// });
    /// let outer = WeftError::DependencyFailed {
    ///     consumer: DependencyKey::of::<u16>(),
    ///     index: 0,
    ///     dependency: DependencyKey::of::<u8>(),
    ///     source: Box::new(inner),
    /// };
    /// assert!(matches!(outer.root_cause(), WeftError::NotRegistered(_)));
    /// ```
    pub fn root_cause(&self) -> &WeftError {
        let mut current = self;
        while let WeftError::DependencyFailed { source, .. } = current {
            current = source;
        }
        current
    }

    /// Returns the cycle if the root cause is a circular dependency.
    pub fn cycle(&self) -> Option<&[DependencyKey]> {
        match self.root_cause() {
            WeftError::CircularDependency(err) => Some(&err.chain),
            _ => None,
        }
    }

    /// Returns the constructor's own error if the root cause is one.
    pub fn constructor_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self.root_cause() {
            WeftError::ConstructionFailed { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// A registration that cannot act as a constructor.
#[derive(Debug, Clone)]
pub struct InvalidConstructorError {
    pub key: DependencyKey,
    pub reason: &'static str,
}

impl fmt::Display for InvalidConstructorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid constructor for {}: {}", self.key, self.reason)
    }
}

/// Error when a dependency was not registered.
#[derive(Debug, Clone)]
pub struct NotRegisteredError {
    /// The dependency that was requested
    pub requested: DependencyKey,
    /// What required it, if anything
    pub required_by: Option<DependencyKey>,
    /// Registered types with similar names
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "No constructor registered for {}", self.requested)?;

        if let Some(parent) = &self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register a constructor producing {} before resolving it",
            self.requested.type_name()
        )
    }
}

/// The chain of types that forms a cycle, first occurrence through the
/// repeat, e.g. `[A, B, C, A]`.
#[derive(Debug, Clone)]
pub struct CircularDependencyError {
    pub chain: Vec<DependencyKey>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.chain.iter().map(DependencyKey::short_name).collect();
        write!(f, "Circular dependency detected:\n  {}", render_chain(&names))?;
        write!(
            f,
            "\n  Hint: break the cycle by moving the shared state into its own type"
        )
    }
}

/// A consumer outlives one of its dependencies.
///
/// Only reported when strict lifetime checking is enabled.
#[derive(Debug, Clone)]
pub struct ScopeMismatchError {
    pub dependency: DependencyKey,
    pub dependency_scope: Scope,
    pub consumer: DependencyKey,
    pub consumer_scope: Scope,
}

impl fmt::Display for ScopeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Scope mismatch: {} ({}) depends on {} ({})",
            self.consumer, self.consumer_scope, self.dependency, self.dependency_scope,
        )?;
        write!(
            f,
            "\n  Hint: make {} {} or longer-lived",
            self.dependency, self.consumer_scope,
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, WeftError>;
