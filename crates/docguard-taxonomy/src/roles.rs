//! Roles and default document grants
//!
//! A role is a named bundle of capability grants stored by the host. The
//! five standard roles also carry default document grants, which seed any
//! base action a role has no explicit entry for.

use docguard_caps::{BaseAction, Capability, GrantMap};
use serde::{Deserialize, Serialize};

/// Name of the role that bypasses every term-scoped check.
pub const ADMINISTRATOR: &str = "administrator";

/// A host role.
///
/// # Examples
///
/// ```
/// use docguard_caps::{BaseAction, Capability};
/// use docguard_taxonomy::Role;
///
/// let mut role = Role::new("auditor", "Auditor");
/// role.grants.grant(Capability::base(BaseAction::ReadDocuments));
/// assert!(role.base_grant(BaseAction::ReadDocuments));
/// assert!(!role.base_grant(BaseAction::EditDocuments));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    /// Role key (e.g. `editor`)
    pub name: String,

    /// Human-readable label
    pub display_name: String,

    /// Capability grants
    pub grants: GrantMap,
}

impl Role {
    /// Creates a role with no grants.
    pub fn new(name: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display_name: display_name.into(),
            grants: GrantMap::new(),
        }
    }

    /// Creates one of the standard roles with its default document grants.
    pub fn standard(role: StandardRole) -> Self {
        let mut grants = GrantMap::new();
        grants.grant(Capability::Read);
        for action in BaseAction::all() {
            grants.set(Capability::base(action), role.default_grant(action));
        }
        Self {
            name: role.as_str().to_string(),
            display_name: role.display_name().to_string(),
            grants,
        }
    }

    /// The role's grant for an unscoped base action.
    ///
    /// Uses the explicit entry if there is one, otherwise the standard
    /// default for this role name (`false` for non-standard roles).
    pub fn base_grant(&self, action: BaseAction) -> bool {
        self.grants
            .get(&Capability::base(action))
            .unwrap_or_else(|| {
                StandardRole::parse(&self.name)
                    .map(|role| role.default_grant(action))
                    .unwrap_or(false)
            })
    }

    /// Check if this is the administrator role.
    pub fn is_administrator(&self) -> bool {
        self.name == ADMINISTRATOR
    }
}

/// The host's built-in roles.
///
/// Ordered by privilege: Subscriber < Contributor < Author < Editor < Administrator
///
/// # Document defaults
///
/// - **Subscriber**: read documents
/// - **Contributor**: edit, read and delete own unpublished documents
/// - **Author**: publish and manage own documents
/// - **Editor**: everything
/// - **Administrator**: everything
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StandardRole {
    /// Can read documents
    Subscriber = 0,

    /// Can draft documents
    Contributor = 1,

    /// Can publish own documents
    Author = 2,

    /// Can manage all documents
    Editor = 3,

    /// Full control, bypasses term scoping
    Administrator = 4,
}

impl StandardRole {
    /// Default grant of a base action for this role.
    pub fn default_grant(&self, action: BaseAction) -> bool {
        use BaseAction::*;

        match self {
            StandardRole::Administrator | StandardRole::Editor => true,
            StandardRole::Author => matches!(
                action,
                EditDocuments
                    | EditPublishedDocuments
                    | ReadDocuments
                    | ReadDocumentRevisions
                    | DeleteDocuments
                    | DeletePublishedDocuments
                    | PublishDocuments
            ),
            StandardRole::Contributor => matches!(
                action,
                EditDocuments | ReadDocuments | ReadDocumentRevisions | DeleteDocuments
            ),
            StandardRole::Subscriber => matches!(action, ReadDocuments),
        }
    }

    /// Parse role from its key.
    ///
    /// # Examples
    ///
    /// ```
    /// use docguard_taxonomy::StandardRole;
    ///
    /// assert_eq!(StandardRole::parse("editor"), Some(StandardRole::Editor));
    /// assert_eq!(StandardRole::parse("AUTHOR"), Some(StandardRole::Author));
    /// assert_eq!(StandardRole::parse("auditor"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "subscriber" => Some(Self::Subscriber),
            "contributor" => Some(Self::Contributor),
            "author" => Some(Self::Author),
            "editor" => Some(Self::Editor),
            "administrator" => Some(Self::Administrator),
            _ => None,
        }
    }

    /// Get the role key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Subscriber => "subscriber",
            Self::Contributor => "contributor",
            Self::Author => "author",
            Self::Editor => "editor",
            Self::Administrator => ADMINISTRATOR,
        }
    }

    /// Get a human-readable display name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Subscriber => "Subscriber",
            Self::Contributor => "Contributor",
            Self::Author => "Author",
            Self::Editor => "Editor",
            Self::Administrator => "Administrator",
        }
    }

    /// All standard roles, lowest privilege first.
    pub fn all() -> [StandardRole; 5] {
        [
            Self::Subscriber,
            Self::Contributor,
            Self::Author,
            Self::Editor,
            Self::Administrator,
        ]
    }
}
