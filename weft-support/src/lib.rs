//! # Weft Support
//!
//! Helpers shared by the weft crates that have nothing to do with
//! resolving dependencies themselves, mostly diagnostic rendering.

pub mod rendering;
