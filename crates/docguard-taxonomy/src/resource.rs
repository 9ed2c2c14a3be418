//! Governed resources
//!
//! Document-like content objects with a lifecycle and a post-type
//! discriminator. Only resources of the governed post type are subject to
//! term-scoped access control.

use serde::{Deserialize, Serialize};

use crate::principal::PrincipalId;

/// Stable numeric resource id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct ResourceId(pub u64);

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resource lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    /// Work in progress
    #[default]
    Draft,
    /// Awaiting review
    Pending,
    /// Visible to privileged users only
    Private,
    /// Published
    Publish,
    /// In the trash
    Trash,
}

impl ResourceStatus {
    /// Get the status key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Private => "private",
            Self::Publish => "publish",
            Self::Trash => "trash",
        }
    }

    /// Parse a status key.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" | "auto-draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "private" => Some(Self::Private),
            "publish" => Some(Self::Publish),
            "trash" => Some(Self::Trash),
            _ => None,
        }
    }
}

/// A content object.
///
/// # Examples
///
/// ```
/// use docguard_taxonomy::{PrincipalId, Resource, ResourceId, ResourceStatus};
///
/// let doc = Resource::new(ResourceId(12), "document")
///     .with_status(ResourceStatus::Publish)
///     .with_author(PrincipalId(3));
/// assert!(doc.is_published());
/// assert!(doc.is_authored_by(PrincipalId(3)));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resource {
    /// Resource ID
    pub id: ResourceId,

    /// Post type discriminator
    pub post_type: String,

    /// Lifecycle status
    pub status: ResourceStatus,

    /// Author, if known
    pub author: Option<PrincipalId>,

    /// Roles allowed to view this resource; empty means unrestricted
    #[serde(default)]
    pub allowed_roles: Vec<String>,
}

impl Resource {
    /// Creates a draft resource.
    pub fn new(id: ResourceId, post_type: impl Into<String>) -> Self {
        Self {
            id,
            post_type: post_type.into(),
            status: ResourceStatus::Draft,
            author: None,
            allowed_roles: Vec::new(),
        }
    }

    /// Sets the status.
    pub fn with_status(mut self, status: ResourceStatus) -> Self {
        self.status = status;
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, author: PrincipalId) -> Self {
        self.author = Some(author);
        self
    }

    /// Restricts viewing to the given roles.
    pub fn with_allowed_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_roles = roles.into_iter().map(Into::into).collect();
        self
    }

    /// Check if the resource is of the given post type.
    pub fn is_type(&self, post_type: &str) -> bool {
        self.post_type == post_type
    }

    /// Check if published.
    pub fn is_published(&self) -> bool {
        self.status == ResourceStatus::Publish
    }

    /// Check if private.
    pub fn is_private(&self) -> bool {
        self.status == ResourceStatus::Private
    }

    /// Check authorship.
    pub fn is_authored_by(&self, principal: PrincipalId) -> bool {
        self.author == Some(principal)
    }
}

/// The post-type restriction of a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PostTypeFilter {
    /// A single post type
    Single(String),
    /// Any of several post types
    Many(Vec<String>),
}

impl PostTypeFilter {
    /// Check whether resources of the given type can match.
    pub fn includes(&self, post_type: &str) -> bool {
        match self {
            Self::Single(t) => t == post_type,
            Self::Many(types) => types.iter().any(|t| t == post_type),
        }
    }

    /// Check whether this is exactly a single-type filter for `post_type`.
    pub fn is_exactly(&self, post_type: &str) -> bool {
        matches!(self, Self::Single(t) if t == post_type)
    }
}
