//! # Weft: dependency injection container for Rust
//!
//! Register constructors against the types they produce; the container
//! works out the order, builds what is needed on first use and caches it
//! according to its lifetime.
//!
//! ```
//! use std::sync::Arc;
//! use weft::prelude::*;
//!
//! struct Config { url: &'static str }
//! struct Pool { url: &'static str }
//! struct Users { pool: Arc<Pool> }
//!
//! let container = Container::builder()
//!     .transient(|pool: Arc<Pool>| Users { pool })
//!     .singleton(|config: Arc<Config>| Pool { url: config.url })
//!     .singleton_value(Config { url: "postgres://localhost" })
//!     .build()?;
//!
//! let users = container.resolve::<Users>()?;
//! assert_eq!(users.pool.url, "postgres://localhost");
//! # Ok::<(), weft::WeftError>(())
//! ```

pub use weft_container::*;
pub use weft_support::rendering;
