//! Engine configuration.
//!
//! [`EngineConfig`] controls which members discovery reports. It is fixed for the lifetime of
//! an [`crate::Engine`]: every cached descriptor collection was built under it.

/// Member discovery settings.
///
/// # Examples
///
/// ```rust
/// use reflectscope::{Engine, EngineConfig, TypeRegistry};
/// use std::sync::Arc;
///
/// let config = EngineConfig {
///     include_non_public: true,
///     ..EngineConfig::default()
/// };
/// let engine = Engine::with_config(Arc::new(TypeRegistry::new()), config);
/// assert!(engine.config().include_non_public);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Report private, family and assembly members besides public ones
    pub include_non_public: bool,
    /// Report instance members inherited from base types
    pub include_inherited: bool,
    /// List property and event accessor methods (`get_X`, `add_X`, ...) in method groups
    pub include_special_methods: bool,
}

impl EngineConfig {
    /// Public members only, inherited members included. The default.
    #[must_use]
    pub const fn public_only() -> Self {
        EngineConfig {
            include_non_public: false,
            include_inherited: true,
            include_special_methods: false,
        }
    }

    /// Every member discovery can see, including accessor methods
    #[must_use]
    pub const fn everything() -> Self {
        EngineConfig {
            include_non_public: true,
            include_inherited: true,
            include_special_methods: true,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::public_only()
    }
}
