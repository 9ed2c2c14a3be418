//! Governing taxonomy definition
//!
//! Describes the taxonomy permissions are based on: which post types it
//! classifies and which capabilities manage its terms.

use docguard_caps::Capability;
use serde::{Deserialize, Serialize};

/// Capabilities that manage the terms of a taxonomy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermCapabilities {
    /// Create and reorganise terms (e.g. `manage_departments`)
    pub manage_terms: String,

    /// Rename terms (e.g. `edit_departments`)
    pub edit_terms: String,

    /// Delete terms (e.g. `delete_departments`)
    pub delete_terms: String,

    /// Assign terms to documents (e.g. `assign_departments`)
    pub assign_terms: String,
}

impl TermCapabilities {
    /// Derives the four management capabilities from a plural noun.
    ///
    /// # Examples
    ///
    /// ```
    /// use docguard_taxonomy::TermCapabilities;
    ///
    /// let caps = TermCapabilities::for_plural("departments");
    /// assert_eq!(caps.assign_terms, "assign_departments");
    /// ```
    pub fn for_plural(plural: &str) -> Self {
        Self {
            manage_terms: format!("manage_{}", plural),
            edit_terms: format!("edit_{}", plural),
            delete_terms: format!("delete_{}", plural),
            assign_terms: format!("assign_{}", plural),
        }
    }

    /// All four capabilities as named capability keys.
    pub fn all(&self) -> Vec<Capability> {
        vec![
            Capability::named(self.manage_terms.as_str()),
            Capability::named(self.edit_terms.as_str()),
            Capability::named(self.delete_terms.as_str()),
            Capability::named(self.assign_terms.as_str()),
        ]
    }
}

/// The taxonomy access control is based on.
///
/// # Examples
///
/// ```
/// use docguard_taxonomy::TaxonomyDefinition;
///
/// let tax = TaxonomyDefinition::new("department", ["document"]);
/// assert!(tax.applies_to("document"));
/// assert!(!tax.applies_to("post"));
/// assert_eq!(tax.term_caps.manage_terms, "manage_departments");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaxonomyDefinition {
    /// Taxonomy name (e.g. `department`, `workflow_state`)
    pub name: String,

    /// Post types this taxonomy classifies
    pub object_types: Vec<String>,

    /// Whether terms may have parents
    pub hierarchical: bool,

    /// Whether the taxonomy is visible outside the admin
    pub public: bool,

    /// Term management capabilities
    pub term_caps: TermCapabilities,
}

impl TaxonomyDefinition {
    /// Creates a private, hierarchical taxonomy over the given post types.
    pub fn new<I, S>(name: impl Into<String>, object_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let term_caps = TermCapabilities::for_plural(&pluralize(&name));
        Self {
            name,
            object_types: object_types.into_iter().map(Into::into).collect(),
            hierarchical: true,
            public: false,
            term_caps,
        }
    }

    /// Overrides the term management capabilities.
    pub fn with_term_caps(mut self, term_caps: TermCapabilities) -> Self {
        self.term_caps = term_caps;
        self
    }

    /// Check whether this taxonomy classifies the given post type.
    pub fn applies_to(&self, post_type: &str) -> bool {
        self.object_types.iter().any(|t| t == post_type)
    }
}

fn pluralize(name: &str) -> String {
    if name.ends_with('s') {
        name.to_string()
    } else if let Some(stem) = name.strip_suffix('y') {
        format!("{}ies", stem)
    } else {
        format!("{}s", name)
    }
}
