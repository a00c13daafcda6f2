//! Dependency identification keys.
//!
//! A [`DependencyKey`] is the registry's handle for a type: its
//! [`TypeId`], its readable name, and an optional qualifier for named
//! registrations and named interface bindings.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::size_of;
use std::sync::Arc;

use weft_support::rendering::{render_qualified, shorten_type_name};

/// Uniquely identifies a dependency in the container.
///
/// Two keys are equal when both the type and the name match.
///
/// # Examples
/// ```
/// use weft_container::key::DependencyKey;
///
/// let key = DependencyKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.name(), None);
///
/// let key = DependencyKey::named::<String>("database_url");
/// assert_eq!(key.name(), Some("database_url"));
/// ```
#[derive(Clone)]
pub struct DependencyKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<Arc<str>>,
    interface: bool,
}

impl DependencyKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: None,
            interface: is_unsized::<T>(),
        }
    }

    /// Creates a named key for type `T`.
    ///
    /// ```
    /// use weft_container::key::DependencyKey;
    ///
    /// let primary = DependencyKey::named::<String>("primary_db");
    /// let replica = DependencyKey::named::<String>("replica_db");
    /// assert_ne!(primary, replica);
    /// ```
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: impl Into<Arc<str>>) -> Self {
        Self::of::<T>().with_name(Some(name.into()))
    }

    /// Returns this key with its qualifier replaced.
    #[inline]
    pub fn with_name(mut self, name: Option<Arc<str>>) -> Self {
        self.name = name;
        self
    }

    /// Returns the same type without a qualifier.
    #[inline]
    pub fn unnamed(&self) -> Self {
        self.clone().with_name(None)
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the human-readable type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the qualifier of a named key.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The qualified name without module paths, e.g. `[primary]Pool`.
    pub fn short_name(&self) -> String {
        render_qualified(&shorten_type_name(self.type_name), self.name())
    }

    /// Returns `true` for interface-shaped (unsized) types such as
    /// `dyn Trait`.
    ///
    /// Interface keys are satisfied through bindings, never through a
    /// constructor of their own.
    ///
    /// ```
    /// use weft_container::key::DependencyKey;
    ///
    /// trait Clock: Send + Sync {}
    /// assert!(DependencyKey::of::<dyn Clock>().is_interface());
    /// assert!(!DependencyKey::of::<u64>().is_interface());
    /// ```
    #[inline]
    pub fn is_interface(&self) -> bool {
        self.interface
    }
}

// Pointers to unsized types carry metadata and are wider than thin ones.
// `str` and slices pass too; they can never be registered, so resolving
// one reports NoBinding instead of NotRegistered.
fn is_unsized<T: ?Sized>() -> bool {
    size_of::<*const T>() != size_of::<*const ()>()
}

impl PartialEq for DependencyKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for DependencyKey {}

impl Hash for DependencyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "DependencyKey({}, name={:?})", self.type_name, name),
            None => write!(f, "DependencyKey({})", self.type_name),
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_qualified(self.type_name, self.name()))
    }
}
