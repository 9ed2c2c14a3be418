//! # Requirements
//!
//! A requirement is what a principal must hold to pass a check. It is a
//! conjunction of clauses; each clause is a disjunction of capabilities.
//!
//! ```text
//! edit_post on a document in {accounting, legal}, not the author, published:
//!
//!   (edit_others_documents_in_accounting    OR edit_others_documents_in_legal)
//!   AND
//!   (edit_published_documents_in_accounting OR edit_published_documents_in_legal)
//! ```
//!
//! An unscoped requirement is just one single-capability clause per
//! capability, which is how the host evaluates a plain list.

use serde::{Deserialize, Serialize};

use crate::capabilities::Capability;
use crate::grants::GrantMap;

/// A conjunction of any-of clauses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requirement {
    clauses: Vec<Vec<Capability>>,
}

impl Requirement {
    /// An empty requirement (always satisfied).
    pub fn new() -> Self {
        Self { clauses: Vec::new() }
    }

    /// Every capability must be held.
    ///
    /// # Example
    ///
    /// ```
    /// use docguard_caps::actions::BaseAction;
    /// use docguard_caps::capabilities::Capability;
    /// use docguard_caps::requirement::Requirement;
    ///
    /// let req = Requirement::all_of([
    ///     Capability::base(BaseAction::EditOthersDocuments),
    ///     Capability::base(BaseAction::EditPublishedDocuments),
    /// ]);
    /// assert_eq!(req.clauses().len(), 2);
    /// ```
    pub fn all_of<I>(capabilities: I) -> Self
    where
        I: IntoIterator<Item = Capability>,
    {
        Self {
            clauses: capabilities.into_iter().map(|capability| vec![capability]).collect(),
        }
    }

    /// A single capability.
    pub fn single(capability: Capability) -> Self {
        Self::all_of([capability])
    }

    /// A requirement nobody satisfies.
    pub fn deny() -> Self {
        Self::single(Capability::DoNotAllow)
    }

    /// Add a clause satisfied by any one of the given capabilities.
    pub fn push_any_of(&mut self, any_of: Vec<Capability>) {
        self.clauses.push(any_of);
    }

    /// Add a single mandatory capability.
    pub fn require(&mut self, capability: Capability) {
        self.clauses.push(vec![capability]);
    }

    /// The clauses of this requirement.
    pub fn clauses(&self) -> &[Vec<Capability>] {
        &self.clauses
    }

    /// Every capability mentioned anywhere in the requirement.
    pub fn capabilities(&self) -> impl Iterator<Item = &Capability> {
        self.clauses.iter().flatten()
    }

    /// Check whether a capability appears anywhere in the requirement.
    pub fn mentions(&self, capability: &Capability) -> bool {
        self.capabilities().any(|c| c == capability)
    }

    /// Check whether this requirement can never be satisfied.
    pub fn is_denied(&self) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.iter().all(|capability| *capability == Capability::DoNotAllow))
    }

    /// Evaluate against a principal's effective capabilities.
    ///
    /// Every clause needs at least one granted capability. An empty
    /// clause can never be satisfied.
    pub fn is_satisfied_by(&self, grants: &GrantMap) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.iter().any(|capability| grants.is_granted(capability)))
    }

    /// Check if there are no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

impl FromIterator<Capability> for Requirement {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self::all_of(iter)
    }
}
