//! # Docguard Engine
//!
//! Taxonomy-scoped capability evaluation for governed documents.
//!
//! ## Overview
//!
//! The docguard-engine crate handles:
//! - **Registry**: Keeps `<action>_in_<term>` grants on every role in step with the taxonomy
//! - **Mapper**: Rewrites object-level checks into term-scoped requirements
//! - **Filter**: Drops inaccessible documents from query results
//! - **Cache**: Memoizes each principal's accessible terms for a short TTL
//! - **Query injection**: Restricts listing queries before they run
//! - **Publish validation**: Refuses publishing without a usable set of terms
//! - **Role restrictions**: Optional per-document role lists
//!
//! The engine owns no storage. Roles, terms, resources and principals are
//! reached through the [`host`] traits; [`MemoryHost`] implements them in
//! process.
//!
//! ## Architecture
//!
//! ```text
//! user_can(principal, "edit_post", doc)
//!   │
//!   ├─ host requirement      edit_others_documents
//!   ├─ CapabilityMapper      edit_others_documents_in_{t} for t in terms(doc), any of
//!   ├─ ViewPermissionProvider (nested CheckContext, never remapped)
//!   └─ effective capabilities of the principal
//!
//! term created / renamed / deleted ─→ Registry ─→ RoleStore
//!                                  └→ TermCache::clear
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use docguard_engine::{HostServices, MemoryHost, PolicyConfig, TaxonomyPermissions};
//! use docguard_taxonomy::{Principal, PrincipalId, ResourceId};
//!
//! let host = Arc::new(MemoryHost::new());
//! let permissions = TaxonomyPermissions::new(PolicyConfig::from_env(), HostServices::from_shared(host))?;
//! permissions.activate();
//! permissions.on_admin_init()?;
//!
//! let editor = Principal::new(PrincipalId(4)).with_role("editor");
//! let allowed = permissions.user_can(&editor, "edit_post", Some(ResourceId(42)))?;
//! # Ok::<(), docguard_engine::EngineError>(())
//! ```

pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod host;
pub mod mapper;
pub mod memory;
pub mod permissions;
pub mod query;
pub mod registry;
pub mod restrictions;
pub mod validation;

// Re-export main types for convenience
pub use cache::{Clock, ManualClock, SystemClock, TermCache};
pub use config::{ConfigError, PolicyConfig, ZeroTermPolicy};
pub use context::CheckContext;
pub use error::{EngineError, EngineResult, StoreError, StoreResult};
pub use filter::{may_include, retain_accessible, FilterOutcome, ResultFilter};
pub use host::{HostServices, PrincipalStore, ResourceStore, RoleStore, TermStore};
pub use mapper::{CapabilityChecker, CapabilityMapper, ViewPermissionProvider};
pub use memory::MemoryHost;
pub use permissions::{TaxonomyPermissions, TermSyncHandler};
pub use query::{QueryDescriptor, QueryInjector, Relation, TaxQuery, UserTaxQuery};
pub use registry::{Registry, SyncReport};
pub use restrictions::{RoleRestrictions, RESTRICT_CONTENT};
pub use validation::{validate_publish, PublishRedirect, PublishSubmission, TermCountViolation};
