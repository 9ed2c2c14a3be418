//! # Capabilities
//!
//! Structured capability keys. A capability is either a base action, a base
//! action scoped to one classification term, or an opaque host capability
//! that docguard does not interpret.
//!
//! Term-scoped capabilities are keyed by term id, not by slug, so renaming a
//! term never orphans grants. The host-facing string form
//! (`edit_documents_in_accounting`) is produced on demand with a
//! [`TermLookup`].

use serde::{Deserialize, Serialize};

use crate::actions::BaseAction;

/// Separator between a base action and a term slug in rendered keys.
pub const TERM_SEPARATOR: &str = "_in_";

/// Stable numeric identifier of a classification term.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct TermId(pub u64);

impl std::fmt::Display for TermId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves term ids to slugs and back.
///
/// Implemented by the taxonomy crate's term index and by anything else that
/// knows the current taxonomy state.
pub trait TermLookup {
    /// Slug of the term with the given id.
    fn slug_of(&self, id: TermId) -> Option<&str>;

    /// Id of the term with the given slug.
    fn id_of(&self, slug: &str) -> Option<TermId>;
}

/// A base action restricted to a single classification term.
///
/// # Example
///
/// ```
/// use docguard_caps::actions::BaseAction;
/// use docguard_caps::capabilities::{ScopedCapability, TermId};
///
/// let cap = ScopedCapability::new(BaseAction::EditDocuments, TermId(7));
/// assert_eq!(cap.render("accounting"), "edit_documents_in_accounting");
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopedCapability {
    /// The base action being scoped.
    pub action: BaseAction,
    /// The term the action is restricted to.
    pub term: TermId,
}

impl ScopedCapability {
    /// Create a scoped capability.
    pub fn new(action: BaseAction, term: TermId) -> Self {
        Self { action, term }
    }

    /// Render the host capability name for a given term slug.
    pub fn render(&self, slug: &str) -> String {
        format!("{}{}{}", self.action.as_str(), TERM_SEPARATOR, slug)
    }
}

/// A capability key.
///
/// # Variants
///
/// - `Read`: the bare `read` capability. Scoped checks treat it as
///   [`BaseAction::ReadDocuments`].
/// - `Base`: an unscoped document base action.
/// - `Scoped`: a base action restricted to one term.
/// - `Named`: any other host capability (`restrict_content`,
///   `manage_departments`, orphaned keys).
/// - `DoNotAllow`: a requirement nobody can satisfy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Capability {
    /// Bare read capability.
    Read,
    /// Unscoped base action.
    Base {
        /// The base action.
        action: BaseAction,
    },
    /// Base action scoped to a term.
    Scoped {
        /// The scoped capability.
        #[serde(flatten)]
        scoped: ScopedCapability,
    },
    /// Opaque host capability.
    Named {
        /// Capability name as stored by the host.
        name: String,
    },
    /// Never satisfiable.
    DoNotAllow,
}

impl Capability {
    /// Unscoped base action capability.
    pub fn base(action: BaseAction) -> Self {
        Capability::Base { action }
    }

    /// Term-scoped capability.
    pub fn scoped(action: BaseAction, term: TermId) -> Self {
        Capability::Scoped {
            scoped: ScopedCapability::new(action, term),
        }
    }

    /// Opaque host capability.
    pub fn named(name: impl Into<String>) -> Self {
        Capability::Named { name: name.into() }
    }

    /// The term this capability is scoped to, if any.
    pub fn term(&self) -> Option<TermId> {
        match self {
            Capability::Scoped { scoped } => Some(scoped.term),
            _ => None,
        }
    }

    /// The base action behind this capability, if any.
    ///
    /// `Read` reports [`BaseAction::ReadDocuments`].
    pub fn base_action(&self) -> Option<BaseAction> {
        match self {
            Capability::Read => Some(BaseAction::ReadDocuments),
            Capability::Base { action } => Some(*action),
            Capability::Scoped { scoped } => Some(scoped.action),
            Capability::Named { .. } | Capability::DoNotAllow => None,
        }
    }

    /// Scope this capability to a term.
    ///
    /// Returns `None` for capabilities that have no base action; those are
    /// kept as-is by the mapper.
    pub fn scope_to(&self, term: TermId) -> Option<Capability> {
        match self {
            Capability::Scoped { .. } => None,
            other => other.base_action().map(|action| Capability::scoped(action, term)),
        }
    }

    /// Render the host capability name.
    ///
    /// Returns `None` for a scoped capability whose term is unknown to the
    /// lookup.
    pub fn render(&self, terms: &dyn TermLookup) -> Option<String> {
        match self {
            Capability::Read => Some("read".to_string()),
            Capability::Base { action } => Some(action.as_str().to_string()),
            Capability::Scoped { scoped } => terms.slug_of(scoped.term).map(|slug| scoped.render(slug)),
            Capability::Named { name } => Some(name.clone()),
            Capability::DoNotAllow => Some("do_not_allow".to_string()),
        }
    }

    /// Parse a host capability name.
    ///
    /// `<base_action>_in_<slug>` resolves to a scoped capability when the
    /// slug is a known term; with an unknown slug it is kept as a named
    /// (orphaned) capability.
    ///
    /// # Example
    ///
    /// ```
    /// use docguard_caps::actions::BaseAction;
    /// use docguard_caps::capabilities::{Capability, TermId, TermLookup};
    ///
    /// struct One;
    /// impl TermLookup for One {
    ///     fn slug_of(&self, id: TermId) -> Option<&str> { (id == TermId(1)).then_some("hr") }
    ///     fn id_of(&self, slug: &str) -> Option<TermId> { (slug == "hr").then_some(TermId(1)) }
    /// }
    ///
    /// assert_eq!(
    ///     Capability::parse("read_documents_in_hr", &One),
    ///     Capability::scoped(BaseAction::ReadDocuments, TermId(1))
    /// );
    /// assert_eq!(Capability::parse("read", &One), Capability::Read);
    /// ```
    pub fn parse(s: &str, terms: &dyn TermLookup) -> Capability {
        match s {
            "read" => return Capability::Read,
            "do_not_allow" => return Capability::DoNotAllow,
            _ => {}
        }

        if let Some(action) = BaseAction::parse(s) {
            return Capability::base(action);
        }

        for action in BaseAction::all() {
            let Some(rest) = s.strip_prefix(action.as_str()) else {
                continue;
            };
            if let Some(slug) = rest.strip_prefix(TERM_SEPARATOR) {
                if let Some(term) = terms.id_of(slug) {
                    return Capability::scoped(action, term);
                }
            }
        }

        Capability::named(s)
    }
}

impl std::fmt::Display for Capability {
    /// Slug-free rendering, for logs. Scoped capabilities show the term id.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Read => f.write_str("read"),
            Capability::Base { action } => f.write_str(action.as_str()),
            Capability::Scoped { scoped } => {
                write!(f, "{}{}#{}", scoped.action.as_str(), TERM_SEPARATOR, scoped.term)
            }
            Capability::Named { name } => f.write_str(name),
            Capability::DoNotAllow => f.write_str("do_not_allow"),
        }
    }
}
