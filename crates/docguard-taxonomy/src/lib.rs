//! # Docguard Taxonomy
//!
//! Data model for taxonomy-scoped document access control.
//!
//! ## Overview
//!
//! The docguard-taxonomy crate handles:
//! - **Terms**: Nodes of the governing taxonomy (departments, workflow states)
//! - **Taxonomy**: Which post types are classified and who manages terms
//! - **Roles**: Named grant bundles and the standard default document grants
//! - **Principals**: The acting user and its effective capabilities
//! - **Resources**: Governed content objects and query post-type filters
//!
//! ## Architecture
//!
//! ```text
//! Principal
//!   ├─ Roles ─→ GrantMap (edit_documents, edit_documents_in_<term>, ...)
//!   └─ User grants
//!
//! Resource (post_type = governed type)
//!   └─ assigned Terms (resolved through the host)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docguard_caps::TermId;
//! use docguard_taxonomy::{Principal, PrincipalId, Role, StandardRole, TaxonomyDefinition, Term};
//!
//! let department = TaxonomyDefinition::new("department", ["document"]);
//! let accounting = Term::new(TermId(1), &department.name, "Accounting");
//!
//! let roles = vec![Role::standard(StandardRole::Author)];
//! let user = Principal::new(PrincipalId(5)).with_role("author");
//! let effective = user.effective_capabilities(&roles);
//! ```

pub mod principal;
pub mod resource;
pub mod roles;
pub mod taxonomy;
pub mod term;

// Re-export main types for convenience
pub use principal::{Principal, PrincipalId};
pub use resource::{PostTypeFilter, Resource, ResourceId, ResourceStatus};
pub use roles::{Role, StandardRole, ADMINISTRATOR};
pub use taxonomy::{TaxonomyDefinition, TermCapabilities};
pub use term::{slugify, Term, TermIndex};
