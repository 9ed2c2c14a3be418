//! Classification terms
//!
//! A term is a node in the governing taxonomy (a department, a workflow
//! state). Documents are assigned to terms, and roles are granted base
//! actions per term.

use chrono::{DateTime, Utc};
use docguard_caps::{TermId, TermLookup};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A classification term.
///
/// # Examples
///
/// ```
/// use docguard_caps::TermId;
/// use docguard_taxonomy::Term;
///
/// let term = Term::new(TermId(3), "department", "Human Resources");
/// assert_eq!(term.slug, "human-resources");
/// assert!(term.parent.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Term {
    /// Stable numeric id
    pub id: TermId,

    /// Taxonomy this term belongs to
    pub taxonomy: String,

    /// URL-friendly slug (unique within the taxonomy)
    pub slug: String,

    /// Display name
    pub name: String,

    /// Parent term for hierarchical taxonomies
    pub parent: Option<TermId>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last rename timestamp
    pub updated_at: DateTime<Utc>,
}

impl Term {
    /// Creates a term with a slug derived from its name.
    pub fn new(id: TermId, taxonomy: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        let slug = slug_for(id, &name);
        Self::with_slug(id, taxonomy, name, slug)
    }

    /// Creates a term with an explicit slug.
    ///
    /// An empty slug is replaced by `term-<id>`.
    pub fn with_slug(
        id: TermId,
        taxonomy: impl Into<String>,
        name: impl Into<String>,
        slug: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let slug = slug.into();
        Self {
            id,
            taxonomy: taxonomy.into(),
            slug: if slug.is_empty() { fallback_slug(id) } else { slug },
            name: name.into(),
            parent: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the parent term.
    pub fn with_parent(mut self, parent: TermId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Renames the term, regenerating its slug.
    ///
    /// A name without any slug characters yields `term-<id>`.
    ///
    /// # Returns
    ///
    /// The previous slug.
    pub fn rename(&mut self, name: impl Into<String>) -> String {
        self.name = name.into();
        let previous = std::mem::replace(&mut self.slug, slug_for(self.id, &self.name));
        self.updated_at = Utc::now();
        previous
    }
}

fn slug_for(id: TermId, name: &str) -> String {
    let slug = slugify(name);
    if slug.is_empty() {
        fallback_slug(id)
    } else {
        slug
    }
}

fn fallback_slug(id: TermId) -> String {
    format!("term-{}", id)
}

/// Converts a display name into a slug.
///
/// May return an empty string; [`Term`] falls back to `term-<id>` then.
///
/// Lowercases ASCII letters, keeps digits, `_` and `-`, and collapses every
/// other run of characters into a single `-`.
///
/// # Examples
///
/// ```
/// use docguard_taxonomy::term::slugify;
///
/// assert_eq!(slugify("Accounting & Finance"), "accounting-finance");
/// assert_eq!(slugify("  R&D "), "r-d");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Lookup table over the current terms of one taxonomy.
///
/// Implements [`TermLookup`] so scoped capabilities can be rendered and
/// parsed against it.
#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    by_id: HashMap<TermId, Term>,
    by_slug: HashMap<String, TermId>,
}

impl TermIndex {
    /// Builds an index from a list of terms.
    pub fn new(terms: impl IntoIterator<Item = Term>) -> Self {
        let mut index = Self::default();
        for term in terms {
            index.insert(term);
        }
        index
    }

    /// Adds or replaces a term.
    pub fn insert(&mut self, term: Term) {
        if let Some(previous) = self.by_id.get(&term.id) {
            self.by_slug.remove(&previous.slug);
        }
        self.by_slug.insert(term.slug.clone(), term.id);
        self.by_id.insert(term.id, term);
    }

    /// Removes a term.
    pub fn remove(&mut self, id: TermId) -> Option<Term> {
        let term = self.by_id.remove(&id)?;
        self.by_slug.remove(&term.slug);
        Some(term)
    }

    /// Gets a term by id.
    pub fn get(&self, id: TermId) -> Option<&Term> {
        self.by_id.get(&id)
    }

    /// Gets a term by slug.
    pub fn by_slug(&self, slug: &str) -> Option<&Term> {
        self.by_slug.get(slug).and_then(|id| self.by_id.get(id))
    }

    /// All terms, ordered by id.
    pub fn terms(&self) -> Vec<&Term> {
        let mut terms: Vec<&Term> = self.by_id.values().collect();
        terms.sort_by_key(|term| term.id);
        terms
    }

    /// Number of terms.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

impl TermLookup for TermIndex {
    fn slug_of(&self, id: TermId) -> Option<&str> {
        self.by_id.get(&id).map(|term| term.slug.as_str())
    }

    fn id_of(&self, slug: &str) -> Option<TermId> {
        self.by_slug.get(slug).copied()
    }
}
