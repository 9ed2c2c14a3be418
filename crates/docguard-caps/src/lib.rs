//! # Docguard Capabilities
//!
//! Capability primitives for taxonomy-scoped document access control.
//!
//! ## Overview
//!
//! The docguard-caps crate handles:
//! - **Base actions**: the thirteen document capabilities (`edit_documents`, ...)
//! - **Primitive actions**: per-object checks (`edit_post`, `read_post`, ...)
//! - **Capabilities**: structured keys, including term-scoped ones
//! - **Grant maps**: capability → boolean tables carried by roles
//! - **Requirements**: conjunctions of any-of clauses evaluated against grants
//!
//! ## Architecture
//!
//! ```text
//! Scoped capability = Base action × Term id
//!
//! Rendered for the host as:
//!   "edit_documents_in_accounting"   - edit own documents in Accounting
//!   "read_documents_in_hr"           - read documents in HR
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use docguard_caps::{BaseAction, Capability, GrantMap, Requirement, TermId};
//!
//! let accounting = TermId(4);
//! let mut grants = GrantMap::new();
//! grants.grant(Capability::scoped(BaseAction::EditDocuments, accounting));
//!
//! let req = Requirement::single(Capability::scoped(BaseAction::EditDocuments, accounting));
//! assert!(req.is_satisfied_by(&grants));
//! ```

pub mod actions;
pub mod capabilities;
pub mod grants;
pub mod requirement;

// Re-export main types for convenience
pub use actions::{BaseAction, PrimitiveAction};
pub use capabilities::{Capability, ScopedCapability, TermId, TermLookup, TERM_SEPARATOR};
pub use grants::{Grant, GrantMap};
pub use requirement::Requirement;
