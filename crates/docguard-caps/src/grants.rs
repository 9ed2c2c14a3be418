//! # Grant Maps
//!
//! A grant map is the capability → boolean table a role (or a principal's
//! effective capability set) carries. An explicit `false` is different from
//! an absent key: the registry only fills in keys that are absent, so an
//! administrator's explicit denial survives re-synchronisation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::capabilities::{Capability, TermId};

/// One entry of a grant map, used for serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Grant {
    /// The capability.
    pub capability: Capability,
    /// Whether it is granted.
    pub granted: bool,
}

/// Capability → grant table.
///
/// # Example
///
/// ```
/// use docguard_caps::actions::BaseAction;
/// use docguard_caps::capabilities::Capability;
/// use docguard_caps::grants::GrantMap;
///
/// let mut grants = GrantMap::new();
/// grants.grant(Capability::base(BaseAction::ReadDocuments));
/// grants.revoke(Capability::base(BaseAction::EditDocuments));
///
/// assert!(grants.is_granted(&Capability::base(BaseAction::ReadDocuments)));
/// assert!(!grants.is_granted(&Capability::base(BaseAction::EditDocuments)));
/// assert_eq!(grants.get(&Capability::base(BaseAction::EditDocuments)), Some(false));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Grant>", into = "Vec<Grant>")]
pub struct GrantMap {
    grants: HashMap<Capability, bool>,
}

impl GrantMap {
    /// Create an empty grant map.
    pub fn new() -> Self {
        Self {
            grants: HashMap::new(),
        }
    }

    /// Set a capability to the given value, replacing any previous value.
    pub fn set(&mut self, capability: Capability, granted: bool) {
        self.grants.insert(capability, granted);
    }

    /// Grant a capability.
    pub fn grant(&mut self, capability: Capability) {
        self.set(capability, true);
    }

    /// Explicitly deny a capability.
    pub fn revoke(&mut self, capability: Capability) {
        self.set(capability, false);
    }

    /// Set a capability only if it has no entry yet.
    ///
    /// # Returns
    ///
    /// `true` if the entry was inserted.
    pub fn set_if_absent(&mut self, capability: Capability, granted: bool) -> bool {
        if self.grants.contains_key(&capability) {
            return false;
        }
        self.grants.insert(capability, granted);
        true
    }

    /// Remove a capability entry entirely.
    ///
    /// # Returns
    ///
    /// The previous value, if there was one.
    pub fn remove(&mut self, capability: &Capability) -> Option<bool> {
        self.grants.remove(capability)
    }

    /// Raw entry lookup; `None` when the key is absent.
    pub fn get(&self, capability: &Capability) -> Option<bool> {
        self.grants.get(capability).copied()
    }

    /// Check whether a capability is granted.
    ///
    /// `DoNotAllow` is never granted, whatever the table says.
    pub fn is_granted(&self, capability: &Capability) -> bool {
        if *capability == Capability::DoNotAllow {
            return false;
        }
        self.get(capability).unwrap_or(false)
    }

    /// Check whether the key is present (granted or explicitly denied).
    pub fn contains(&self, capability: &Capability) -> bool {
        self.grants.contains_key(capability)
    }

    /// Merge another map into this one. Values from `other` win.
    pub fn merge(&mut self, other: &GrantMap) {
        for (capability, granted) in &other.grants {
            self.grants.insert(capability.clone(), *granted);
        }
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&Capability, bool)> {
        self.grants.iter().map(|(capability, granted)| (capability, *granted))
    }

    /// Iterate over granted capabilities only.
    pub fn granted(&self) -> impl Iterator<Item = &Capability> {
        self.grants
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(capability, _)| capability)
    }

    /// Capabilities scoped to the given term (granted or not).
    pub fn scoped_to(&self, term: TermId) -> Vec<Capability> {
        self.grants
            .keys()
            .filter(|capability| capability.term() == Some(term))
            .cloned()
            .collect()
    }

    /// Terms for which at least one scoped capability is granted.
    pub fn granted_terms(&self) -> Vec<TermId> {
        let mut terms: Vec<TermId> = self.granted().filter_map(Capability::term).collect();
        terms.sort();
        terms.dedup();
        terms
    }

    /// Remove every key matching the predicate.
    ///
    /// # Returns
    ///
    /// The number of removed entries.
    pub fn remove_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&Capability) -> bool,
    {
        let before = self.grants.len();
        self.grants.retain(|capability, _| !predicate(capability));
        before - self.grants.len()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }
}

impl FromIterator<(Capability, bool)> for GrantMap {
    fn from_iter<T: IntoIterator<Item = (Capability, bool)>>(iter: T) -> Self {
        Self {
            grants: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Grant>> for GrantMap {
    fn from(grants: Vec<Grant>) -> Self {
        grants
            .into_iter()
            .map(|grant| (grant.capability, grant.granted))
            .collect()
    }
}

impl From<GrantMap> for Vec<Grant> {
    fn from(map: GrantMap) -> Self {
        let mut grants: Vec<Grant> = map
            .grants
            .into_iter()
            .map(|(capability, granted)| Grant { capability, granted })
            .collect();
        grants.sort_by(|a, b| a.capability.cmp(&b.capability));
        grants
    }
}
