//! Typed constructor adapters.
//!
//! Any `Fn(Arc<A>, Arc<B>, ...) -> T` is a [`Constructor`]; any
//! `Fn(Arc<A>, ...) -> Result<T, E>` is a [`FallibleConstructor`]. The
//! parameter types become the registration's dependency list, so the
//! validator can walk the graph without calling anything, and the
//! resolver hands the resolved values back in declaration order.
//!
//! ```
//! use std::sync::Arc;
//! use weft_container::constructor::Constructor;
//!
//! struct Db;
//! struct Repo(Arc<Db>);
//!
//! fn new_repo(db: Arc<Db>) -> Repo {
//!     Repo(db)
//! }
//!
//! fn deps<Args, C: Constructor<Args>>(_: &C) -> usize {
//!     C::dependencies().len()
//! }
//!
//! assert_eq!(deps(&new_repo), 1);
//! ```

use std::sync::Arc;

use crate::error::{BoxError, Result};
use crate::key::DependencyKey;
use crate::registry::Arguments;

/// A function that builds `Output` from already resolved parameters.
pub trait Constructor<Args>: Send + Sync + 'static {
    /// The produced type.
    type Output: Send + Sync + 'static;

    /// Parameter keys in declaration order.
    fn dependencies() -> Vec<DependencyKey>;

    /// Calls the function with the values in `args`.
    fn construct(&self, args: &Arguments) -> Result<Self::Output>;
}

/// A constructor that can report failure through its return value.
///
/// The error is kept as the source of
/// [`WeftError::ConstructionFailed`](crate::error::WeftError::ConstructionFailed).
pub trait FallibleConstructor<Args>: Send + Sync + 'static {
    /// The produced type.
    type Output: Send + Sync + 'static;

    /// Parameter keys in declaration order.
    fn dependencies() -> Vec<DependencyKey>;

    /// Calls the function with the values in `args`.
    fn construct(&self, args: &Arguments) -> Result<Self::Output>;
}

macro_rules! impl_constructors ({ $($param:ident)* } => {
    impl<F, R, $($param,)*> Constructor<($(Arc<$param>,)*)> for F
    where
        F: Fn($(Arc<$param>),*) -> R + Send + Sync + 'static,
        R: Send + Sync + 'static,
        $($param: ?Sized + Send + Sync + 'static,)*
    {
        type Output = R;

        #[inline]
        fn dependencies() -> Vec<DependencyKey> {
            vec![$(DependencyKey::of::<$param>()),*]
        }

        #[inline]
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        fn construct(&self, args: &Arguments) -> Result<R> {
            let mut index = 0;
            $(
                let $param = args.get::<$param>(index)?;
                index += 1;
            )*
            Ok((self)($($param),*))
        }
    }

    impl<F, R, E, $($param,)*> FallibleConstructor<($(Arc<$param>,)*)> for F
    where
        F: Fn($(Arc<$param>),*) -> std::result::Result<R, E> + Send + Sync + 'static,
        R: Send + Sync + 'static,
        E: Into<BoxError>,
        $($param: ?Sized + Send + Sync + 'static,)*
    {
        type Output = R;

        #[inline]
        fn dependencies() -> Vec<DependencyKey> {
            vec![$(DependencyKey::of::<$param>()),*]
        }

        #[inline]
        #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
        fn construct(&self, args: &Arguments) -> Result<R> {
            let mut index = 0;
            $(
                let $param = args.get::<$param>(index)?;
                index += 1;
            )*
            (self)($($param),*).map_err(|err| args.constructor_failed(err.into()))
        }
    }
});

impl_constructors! {}
impl_constructors! { T1 }
impl_constructors! { T1 T2 }
impl_constructors! { T1 T2 T3 }
impl_constructors! { T1 T2 T3 T4 }
impl_constructors! { T1 T2 T3 T4 T5 }
impl_constructors! { T1 T2 T3 T4 T5 T6 }
impl_constructors! { T1 T2 T3 T4 T5 T6 T7 }
impl_constructors! { T1 T2 T3 T4 T5 T6 T7 T8 }
