//! Policy configuration.
//!
//! Selects the governing taxonomy and governed post type, and the switches
//! that decide how documents without terms are treated. Configuration is
//! loaded from environment variables with defaults matching a stock install.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Cache TTL in debug mode, in seconds.
pub const DEBUG_CACHE_TTL_SECS: u64 = 10;

/// Cache TTL outside debug mode, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 120;

/// Largest accepted cache TTL, in seconds.
pub const MAX_CACHE_TTL_SECS: u64 = 86_400;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Missing required value.
    #[error("Missing required configuration value: {0}")]
    Missing(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// What a document with no terms falls back to when no-term access is off.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ZeroTermPolicy {
    /// Nobody but administrators may act on it.
    #[default]
    Deny,
    /// It is ungoverned; plain base capabilities decide.
    Base,
}

impl ZeroTermPolicy {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ZeroTermPolicy::Deny => "deny",
            ZeroTermPolicy::Base => "base",
        }
    }

    /// Parse from a configuration value.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "deny" => Some(ZeroTermPolicy::Deny),
            "base" => Some(ZeroTermPolicy::Base),
            _ => None,
        }
    }
}

/// Access policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Taxonomy whose terms scope capabilities.
    pub taxonomy: String,

    /// Post type subject to term-scoped access control.
    pub governed_type: String,

    /// Whether documents without terms stay reachable through base capabilities.
    pub allow_no_term_access: bool,

    /// Whether a published document may carry at most one term.
    pub only_one_term: bool,

    /// Debug mode (shorter cache TTL).
    pub debug: bool,

    /// Explicit cache TTL in seconds, overriding the debug-based default.
    pub cache_ttl_secs: Option<u64>,

    /// Fallback for documents without terms when no-term access is off.
    pub zero_term_policy: ZeroTermPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            taxonomy: "department".to_string(),
            governed_type: "document".to_string(),
            allow_no_term_access: false,
            only_one_term: true,
            debug: false,
            cache_ttl_secs: None,
            zero_term_policy: ZeroTermPolicy::Deny,
        }
    }
}

impl PolicyConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DOCGUARD_TAXONOMY`: Governing taxonomy (default: department)
    /// - `DOCGUARD_GOVERNED_TYPE`: Governed post type (default: document)
    /// - `DOCGUARD_ALLOW_NO_TERM_ACCESS`: Keep documents without terms reachable (default: false)
    /// - `DOCGUARD_ONLY_ONE_TERM`: Published documents carry one term at most (default: true)
    /// - `DOCGUARD_DEBUG`: Debug mode, 10s cache TTL instead of 120s (default: false)
    /// - `DOCGUARD_CACHE_TTL_SECS`: Explicit cache TTL in seconds
    /// - `DOCGUARD_ZERO_TERM_POLICY`: `deny` or `base` (default: deny)
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through a variable lookup.
    ///
    /// Unparseable values fall back to their defaults.
    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();

        let flag = |key: &str, default: bool| {
            var(key)
                .map(|s| {
                    let s = s.trim().to_lowercase();
                    !(s.is_empty() || s == "false" || s == "0" || s == "no")
                })
                .unwrap_or(default)
        };

        let zero_term_policy = match var("DOCGUARD_ZERO_TERM_POLICY") {
            Some(value) => ZeroTermPolicy::parse(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Unknown DOCGUARD_ZERO_TERM_POLICY, using deny");
                default.zero_term_policy
            }),
            None => default.zero_term_policy,
        };

        Self {
            taxonomy: var("DOCGUARD_TAXONOMY").unwrap_or(default.taxonomy),
            governed_type: var("DOCGUARD_GOVERNED_TYPE").unwrap_or(default.governed_type),
            allow_no_term_access: flag("DOCGUARD_ALLOW_NO_TERM_ACCESS", default.allow_no_term_access),
            only_one_term: flag("DOCGUARD_ONLY_ONE_TERM", default.only_one_term),
            debug: flag("DOCGUARD_DEBUG", default.debug),
            cache_ttl_secs: var("DOCGUARD_CACHE_TTL_SECS").and_then(|s| s.trim().parse().ok()),
            zero_term_policy,
        }
    }

    /// Set the governing taxonomy.
    pub fn with_taxonomy(mut self, taxonomy: impl Into<String>) -> Self {
        self.taxonomy = taxonomy.into();
        self
    }

    /// Set whether documents without terms stay reachable.
    pub fn with_no_term_access(mut self, allow: bool) -> Self {
        self.allow_no_term_access = allow;
        self
    }

    /// Set the zero-term fallback.
    pub fn with_zero_term_policy(mut self, policy: ZeroTermPolicy) -> Self {
        self.zero_term_policy = policy;
        self
    }

    /// Set the explicit cache TTL.
    pub fn with_cache_ttl_secs(mut self, secs: u64) -> Self {
        self.cache_ttl_secs = Some(secs);
        self
    }

    /// Effective cache TTL in seconds.
    pub fn cache_ttl_secs(&self) -> u64 {
        self.cache_ttl_secs.unwrap_or(if self.debug {
            DEBUG_CACHE_TTL_SECS
        } else {
            DEFAULT_CACHE_TTL_SECS
        })
    }

    /// Effective cache TTL as a Duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs())
    }

    /// Whether documents without terms fall back to base capabilities.
    pub fn zero_terms_use_base_caps(&self) -> bool {
        self.allow_no_term_access || self.zero_term_policy == ZeroTermPolicy::Base
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.taxonomy.trim().is_empty() {
            return Err(ConfigError::Missing("DOCGUARD_TAXONOMY".to_string()));
        }
        if self.governed_type.trim().is_empty() {
            return Err(ConfigError::Missing("DOCGUARD_GOVERNED_TYPE".to_string()));
        }
        let ttl = self.cache_ttl_secs();
        if ttl == 0 || ttl > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::InvalidValue {
                key: "DOCGUARD_CACHE_TTL_SECS".to_string(),
                message: format!("must be between 1 and {}, got {}", MAX_CACHE_TTL_SECS, ttl),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = PolicyConfig::default();
        assert_eq!(config.taxonomy, "department");
        assert_eq!(config.governed_type, "document");
        assert!(!config.allow_no_term_access);
        assert!(config.only_one_term);
        assert_eq!(config.cache_ttl_secs(), 120);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_vars() {
        let config = PolicyConfig::from_vars(vars(&[
            ("DOCGUARD_TAXONOMY", "workflow_state"),
            ("DOCGUARD_ALLOW_NO_TERM_ACCESS", "true"),
            ("DOCGUARD_ONLY_ONE_TERM", "0"),
            ("DOCGUARD_DEBUG", "1"),
            ("DOCGUARD_ZERO_TERM_POLICY", "base"),
        ]));

        assert_eq!(config.taxonomy, "workflow_state");
        assert_eq!(config.governed_type, "document");
        assert!(config.allow_no_term_access);
        assert!(!config.only_one_term);
        assert_eq!(config.cache_ttl_secs(), DEBUG_CACHE_TTL_SECS);
        assert_eq!(config.zero_term_policy, ZeroTermPolicy::Base);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let config = PolicyConfig::from_vars(vars(&[
            ("DOCGUARD_CACHE_TTL_SECS", "soon"),
            ("DOCGUARD_ZERO_TERM_POLICY", "maybe"),
        ]));
        assert_eq!(config.cache_ttl_secs, None);
        assert_eq!(config.zero_term_policy, ZeroTermPolicy::Deny);
    }

    #[test]
    fn test_explicit_ttl_overrides_debug() {
        let config = PolicyConfig {
            debug: true,
            ..PolicyConfig::default()
        }
        .with_cache_ttl_secs(30);
        assert_eq!(config.cache_ttl(), Duration::from_secs(30));
    }

    #[test]
    fn test_validate() {
        let empty = PolicyConfig::default().with_taxonomy("  ");
        assert!(matches!(empty.validate(), Err(ConfigError::Missing(_))));

        let zero_ttl = PolicyConfig::default().with_cache_ttl_secs(0);
        assert!(matches!(zero_ttl.validate(), Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_zero_terms_use_base_caps() {
        assert!(!PolicyConfig::default().zero_terms_use_base_caps());
        assert!(PolicyConfig::default().with_no_term_access(true).zero_terms_use_base_caps());
        assert!(PolicyConfig::default()
            .with_zero_term_policy(ZeroTermPolicy::Base)
            .zero_terms_use_base_caps());
    }
}
