//! Core container implementation for Weft DI.

pub mod binding;
mod cache;
pub mod constructor;
pub mod container;
pub mod error;
mod graph;
pub mod key;
pub mod provider;
pub mod registry;
mod resolver;
pub mod scope;
pub mod settings;

pub use binding::Binding;
pub use container::{Container, ContainerBuilder, ScopeGuard, prelude};
pub use error::{Result, WeftError};
pub use key::DependencyKey;
pub use provider::Provider;
pub use registry::{Arguments, Instance, Registration, erase};
pub use scope::{Scope, ScopeId};
pub use settings::ContainerSettings;
