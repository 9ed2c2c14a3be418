//! Error types for access-control evaluation
//!
//! Covers host store failures, configuration problems and the fatal
//! policy inconsistencies that stop the engine from starting.

use docguard_caps::TermId;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors reported by host stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named role does not exist
    #[error("Role not found: {0}")]
    RoleNotFound(String),

    /// The store rejected a write
    #[error("Write rejected for {target}: {message}")]
    WriteRejected {
        /// Role, term or resource the write was for
        target: String,
        /// Reason given by the store
        message: String,
    },

    /// The store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for host store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Engine error types.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The governing taxonomy does not classify the governed post type
    #[error("Taxonomy '{taxonomy}' must apply to the '{post_type}' post type")]
    TaxonomyNotForGovernedType {
        /// Configured taxonomy
        taxonomy: String,
        /// Configured governed post type
        post_type: String,
    },

    /// A term could not be resolved
    #[error("Term not found: {0}")]
    TermNotFound(TermId),

    /// Capability sync stopped short for some roles
    #[error("Capability sync incomplete for roles: {}", failed_roles.join(", "))]
    SyncIncomplete {
        /// Roles whose grants were not fully written
        failed_roles: Vec<String>,
    },

    /// Host store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Check if this error must stop the engine from running.
    ///
    /// Running with an inconsistent policy or leaving orphaned grants
    /// behind is worse than not running at all.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            EngineError::TaxonomyNotForGovernedType { .. } | EngineError::TermNotFound(_) | EngineError::Config(_)
        )
    }

    /// Check if this error should be logged at error level.
    pub fn is_server_error(&self) -> bool {
        matches!(self, EngineError::Store(_) | EngineError::SyncIncomplete { .. })
    }

    /// Get error code for host-facing messages.
    pub fn error_code(&self) -> &'static str {
        match self {
            EngineError::TaxonomyNotForGovernedType { .. } => "TAXONOMY_NOT_FOR_GOVERNED_TYPE",
            EngineError::TermNotFound(_) => "TERM_NOT_FOUND",
            EngineError::SyncIncomplete { .. } => "SYNC_INCOMPLETE",
            EngineError::Store(_) => "STORE_ERROR",
            EngineError::Config(_) => "CONFIG_ERROR",
        }
    }
}
