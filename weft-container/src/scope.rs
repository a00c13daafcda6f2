//! Dependency lifetimes and scope contexts.
//!
//! [`Scope`] decides how long a resolved value lives:
//! - [`Scope::Singleton`]: one instance for the whole container
//! - [`Scope::Scoped`]: one instance per [`ScopeId`]
//! - [`Scope::Transient`]: a new instance on every resolve
//!
//! Lifetimes are ordered by how long they live:
//! `Singleton > Scoped > Transient`.

use std::fmt;

use serde::Deserialize;
use uuid::Uuid;

/// Defines the lifetime of a dependency within the container.
///
/// ```
/// use weft_container::scope::Scope;
///
/// assert!(Scope::Singleton > Scope::Scoped);
/// assert!(Scope::Scoped > Scope::Transient);
/// assert_eq!(Scope::default(), Scope::Singleton);
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Built on first resolve and shared until the container is reset.
    #[default]
    Singleton,

    /// Built once per scope context and dropped with it.
    ///
    /// Resolving a scoped dependency without a [`ScopeId`] is an error.
    Scoped,

    /// Never cached. Each resolve runs the constructor again.
    Transient,
}

impl Scope {
    /// Returns `true` if this lifetime caches instances.
    #[inline]
    pub fn is_cached(&self) -> bool {
        !matches!(self, Scope::Transient)
    }

    #[inline]
    fn rank(&self) -> u8 {
        match self {
            Scope::Singleton => 2,
            Scope::Scoped => 1,
            Scope::Transient => 0,
        }
    }
}

impl PartialOrd for Scope {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scope {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Singleton => "Singleton",
            Scope::Scoped => "Scoped",
            Scope::Transient => "Transient",
        })
    }
}

/// Opaque handle for one scope context (for example one request).
///
/// Ids come from random v4 UUIDs and render as 32 hex digits. They are
/// created by [`Container::create_scope`](crate::container::Container::create_scope)
/// and stay valid until destroyed explicitly.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(Uuid);

impl ScopeId {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl fmt::Debug for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScopeId({self})")
    }
}
