//! Container settings.
//!
//! Settings are plain data and deserialize from any serde format, with
//! every field optional:
//!
//! ```
//! use weft_container::settings::ContainerSettings;
//!
//! let settings = ContainerSettings::default();
//! assert!(settings.validate_on_change);
//! assert!(!settings.strict_lifetimes);
//! ```

use serde::Deserialize;

/// Tunables for a [`Container`](crate::container::Container).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContainerSettings {
    /// Re-run graph validation after every register, override and bind.
    pub validate_on_change: bool,

    /// Reject consumers that outlive their dependencies, such as a
    /// singleton holding a transient.
    pub strict_lifetimes: bool,

    /// How many "did you mean" candidates a missing-type error lists.
    pub max_suggestions: usize,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            validate_on_change: true,
            strict_lifetimes: false,
            max_suggestions: 3,
        }
    }
}

impl ContainerSettings {
    pub fn validate_on_change(mut self, enabled: bool) -> Self {
        self.validate_on_change = enabled;
        self
    }

    pub fn strict_lifetimes(mut self, enabled: bool) -> Self {
        self.strict_lifetimes = enabled;
        self
    }

    pub fn max_suggestions(mut self, limit: usize) -> Self {
        self.max_suggestions = limit;
        self
    }
}
