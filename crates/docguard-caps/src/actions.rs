//! # Actions
//!
//! Defines the document base actions and the primitive actions the host
//! asks about. Base actions are the capabilities a role is granted on
//! documents; primitive actions are the per-object checks (`edit_post` on
//! document 42) that get rewritten into term-scoped base actions.

use serde::{Deserialize, Serialize};

/// Base document capabilities.
///
/// Every base action can be combined with a classification term to form a
/// term-scoped capability (`edit_documents` + `accounting` becomes
/// `edit_documents_in_accounting`).
///
/// The set is grouped by operation:
/// - **Edit**: own, others', private and published documents
/// - **Read**: documents, revisions and private documents
/// - **Delete**: own, others', private and published documents
/// - **Publish**: make a document public
/// - **Lock override**: take over a document another user is editing
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BaseAction {
    /// Edit own documents.
    EditDocuments,

    /// Edit documents authored by other users.
    EditOthersDocuments,

    /// Edit documents with private status.
    EditPrivateDocuments,

    /// Edit documents that are already published.
    EditPublishedDocuments,

    /// Read documents.
    ///
    /// The bare `read` capability is an alias for this action when a check
    /// is scoped to a term.
    ReadDocuments,

    /// Read the revision history of documents.
    ReadDocumentRevisions,

    /// Read documents with private status.
    ReadPrivateDocuments,

    /// Delete own documents.
    DeleteDocuments,

    /// Delete documents authored by other users.
    DeleteOthersDocuments,

    /// Delete documents with private status.
    DeletePrivateDocuments,

    /// Delete documents that are already published.
    DeletePublishedDocuments,

    /// Publish documents.
    PublishDocuments,

    /// Override another user's edit lock on a document.
    OverrideDocumentLock,
}

impl BaseAction {
    /// Get the string representation of the action.
    ///
    /// # Returns
    ///
    /// The capability name the host stores for this action.
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseAction::EditDocuments => "edit_documents",
            BaseAction::EditOthersDocuments => "edit_others_documents",
            BaseAction::EditPrivateDocuments => "edit_private_documents",
            BaseAction::EditPublishedDocuments => "edit_published_documents",
            BaseAction::ReadDocuments => "read_documents",
            BaseAction::ReadDocumentRevisions => "read_document_revisions",
            BaseAction::ReadPrivateDocuments => "read_private_documents",
            BaseAction::DeleteDocuments => "delete_documents",
            BaseAction::DeleteOthersDocuments => "delete_others_documents",
            BaseAction::DeletePrivateDocuments => "delete_private_documents",
            BaseAction::DeletePublishedDocuments => "delete_published_documents",
            BaseAction::PublishDocuments => "publish_documents",
            BaseAction::OverrideDocumentLock => "override_document_lock",
        }
    }

    /// Parse a base action from its capability name.
    ///
    /// Matching is exact: capability names are case-sensitive keys in the
    /// host's role store.
    ///
    /// # Example
    ///
    /// ```
    /// use docguard_caps::actions::BaseAction;
    ///
    /// assert_eq!(BaseAction::parse("edit_documents"), Some(BaseAction::EditDocuments));
    /// assert_eq!(BaseAction::parse("edit_posts"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|action| action.as_str() == s)
    }

    /// Get all base actions.
    ///
    /// # Returns
    ///
    /// A vector containing all base actions, in registration order.
    pub fn all() -> Vec<Self> {
        vec![
            BaseAction::EditDocuments,
            BaseAction::EditOthersDocuments,
            BaseAction::EditPrivateDocuments,
            BaseAction::EditPublishedDocuments,
            BaseAction::ReadDocuments,
            BaseAction::ReadDocumentRevisions,
            BaseAction::ReadPrivateDocuments,
            BaseAction::DeleteDocuments,
            BaseAction::DeleteOthersDocuments,
            BaseAction::DeletePrivateDocuments,
            BaseAction::DeletePublishedDocuments,
            BaseAction::PublishDocuments,
            BaseAction::OverrideDocumentLock,
        ]
    }

    /// Check if this action only reads data.
    pub fn is_read_only(&self) -> bool {
        matches!(
            self,
            BaseAction::ReadDocuments
                | BaseAction::ReadDocumentRevisions
                | BaseAction::ReadPrivateDocuments
        )
    }

    /// Check if this is a destructive action.
    pub fn is_destructive(&self) -> bool {
        matches!(
            self,
            BaseAction::DeleteDocuments
                | BaseAction::DeleteOthersDocuments
                | BaseAction::DeletePrivateDocuments
                | BaseAction::DeletePublishedDocuments
        )
    }
}

impl std::fmt::Display for BaseAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitive, object-specific actions.
///
/// These are the checks the host performs against a single object
/// (`current_user_can('edit_post', 42)`). Only these are rewritten into
/// term-scoped capabilities; anything else passes through untouched.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveAction {
    /// View a single object.
    ReadPost,
    /// Edit a single object.
    EditPost,
    /// Delete a single object.
    DeletePost,
    /// Publish a single object.
    PublishPost,
    /// Take over the edit lock on a single object.
    OverrideDocumentLock,
}

impl PrimitiveAction {
    /// Get the string representation of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveAction::ReadPost => "read_post",
            PrimitiveAction::EditPost => "edit_post",
            PrimitiveAction::DeletePost => "delete_post",
            PrimitiveAction::PublishPost => "publish_post",
            PrimitiveAction::OverrideDocumentLock => "override_document_lock",
        }
    }

    /// Parse a primitive action.
    ///
    /// Returns `None` for every capability that is not object-specific,
    /// which is the mapper's fast path.
    ///
    /// # Example
    ///
    /// ```
    /// use docguard_caps::actions::PrimitiveAction;
    ///
    /// assert_eq!(PrimitiveAction::parse("edit_post"), Some(PrimitiveAction::EditPost));
    /// assert_eq!(PrimitiveAction::parse("manage_options"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "read_post" => Some(PrimitiveAction::ReadPost),
            "edit_post" => Some(PrimitiveAction::EditPost),
            "delete_post" => Some(PrimitiveAction::DeletePost),
            "publish_post" => Some(PrimitiveAction::PublishPost),
            "override_document_lock" => Some(PrimitiveAction::OverrideDocumentLock),
            _ => None,
        }
    }

    /// The base action a plain (own, non-private, unpublished) object check
    /// resolves to.
    ///
    /// Hosts usually refine this further depending on authorship and
    /// status; see [`PrimitiveAction::base_actions_for`].
    pub fn base_action(&self) -> BaseAction {
        match self {
            PrimitiveAction::ReadPost => BaseAction::ReadDocuments,
            PrimitiveAction::EditPost => BaseAction::EditDocuments,
            PrimitiveAction::DeletePost => BaseAction::DeleteDocuments,
            PrimitiveAction::PublishPost => BaseAction::PublishDocuments,
            PrimitiveAction::OverrideDocumentLock => BaseAction::OverrideDocumentLock,
        }
    }

    /// Base actions required for this primitive given authorship and status.
    ///
    /// Mirrors how the host expands an object check: editing someone else's
    /// published document needs both `edit_others_documents` and
    /// `edit_published_documents`.
    ///
    /// # Arguments
    ///
    /// * `is_author` - Whether the acting principal authored the object
    /// * `is_published` - Whether the object is published
    /// * `is_private` - Whether the object has private status
    pub fn base_actions_for(&self, is_author: bool, is_published: bool, is_private: bool) -> Vec<BaseAction> {
        match self {
            PrimitiveAction::ReadPost => {
                if is_private && !is_author {
                    vec![BaseAction::ReadPrivateDocuments]
                } else {
                    vec![BaseAction::ReadDocuments]
                }
            }
            PrimitiveAction::EditPost => {
                let mut actions = if is_author {
                    vec![BaseAction::EditDocuments]
                } else {
                    vec![BaseAction::EditOthersDocuments]
                };
                if is_published {
                    actions.push(BaseAction::EditPublishedDocuments);
                } else if is_private {
                    actions.push(BaseAction::EditPrivateDocuments);
                }
                actions
            }
            PrimitiveAction::DeletePost => {
                let mut actions = if is_author {
                    vec![BaseAction::DeleteDocuments]
                } else {
                    vec![BaseAction::DeleteOthersDocuments]
                };
                if is_published {
                    actions.push(BaseAction::DeletePublishedDocuments);
                } else if is_private {
                    actions.push(BaseAction::DeletePrivateDocuments);
                }
                actions
            }
            PrimitiveAction::PublishPost => vec![BaseAction::PublishDocuments],
            PrimitiveAction::OverrideDocumentLock => vec![BaseAction::OverrideDocumentLock],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_action_parsing() {
        for action in BaseAction::all() {
            assert_eq!(BaseAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(BaseAction::parse("EDIT_DOCUMENTS"), None);
        assert_eq!(BaseAction::parse("read"), None);
    }

    #[test]
    fn test_all_base_actions_count() {
        assert_eq!(BaseAction::all().len(), 13);
    }

    #[test]
    fn test_read_only_and_destructive() {
        assert!(BaseAction::ReadDocuments.is_read_only());
        assert!(BaseAction::ReadDocumentRevisions.is_read_only());
        assert!(!BaseAction::EditDocuments.is_read_only());

        assert!(BaseAction::DeletePublishedDocuments.is_destructive());
        assert!(!BaseAction::PublishDocuments.is_destructive());
    }

    #[test]
    fn test_primitive_parsing() {
        assert_eq!(PrimitiveAction::parse("read_post"), Some(PrimitiveAction::ReadPost));
        assert_eq!(PrimitiveAction::parse("delete_post"), Some(PrimitiveAction::DeletePost));
        assert_eq!(
            PrimitiveAction::parse("override_document_lock"),
            Some(PrimitiveAction::OverrideDocumentLock)
        );
        assert_eq!(PrimitiveAction::parse("edit_posts"), None);
        assert_eq!(PrimitiveAction::parse("read"), None);
    }

    #[test]
    fn test_base_actions_for_edit() {
        let own_draft = PrimitiveAction::EditPost.base_actions_for(true, false, false);
        assert_eq!(own_draft, vec![BaseAction::EditDocuments]);

        let others_published = PrimitiveAction::EditPost.base_actions_for(false, true, false);
        assert_eq!(
            others_published,
            vec![BaseAction::EditOthersDocuments, BaseAction::EditPublishedDocuments]
        );

        let own_private = PrimitiveAction::DeletePost.base_actions_for(true, false, true);
        assert_eq!(
            own_private,
            vec![BaseAction::DeleteDocuments, BaseAction::DeletePrivateDocuments]
        );
    }

    #[test]
    fn test_base_actions_for_read_private() {
        assert_eq!(
            PrimitiveAction::ReadPost.base_actions_for(false, false, true),
            vec![BaseAction::ReadPrivateDocuments]
        );
        assert_eq!(
            PrimitiveAction::ReadPost.base_actions_for(true, false, true),
            vec![BaseAction::ReadDocuments]
        );
    }
}
