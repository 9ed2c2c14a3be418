//! In-memory host
//!
//! Implements every host contract over `parking_lot` locked maps. Suitable
//! for tests and for embedders that keep their content in process.

use std::collections::{BTreeMap, HashMap, HashSet};

use docguard_caps::{Capability, GrantMap, TermId};
use docguard_taxonomy::{
    Principal, PrincipalId, Resource, ResourceId, Role, TaxonomyDefinition, Term, TermIndex,
};
use parking_lot::RwLock;

use crate::error::{StoreError, StoreResult};
use crate::host::{PrincipalStore, ResourceStore, RoleStore, TermStore};
use crate::query::QueryDescriptor;

/// A host that keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    taxonomies: RwLock<HashMap<String, TaxonomyDefinition>>,
    terms: RwLock<HashMap<String, TermIndex>>,
    assignments: RwLock<HashMap<ResourceId, HashMap<String, Vec<TermId>>>>,
    roles: RwLock<BTreeMap<String, Role>>,
    resources: RwLock<BTreeMap<ResourceId, Resource>>,
    principals: RwLock<HashMap<PrincipalId, Principal>>,
    rejected_roles: RwLock<HashSet<String>>,
}

impl MemoryHost {
    /// Create an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a taxonomy.
    pub fn register(&self, definition: TaxonomyDefinition) {
        self.taxonomies.write().insert(definition.name.clone(), definition);
    }

    /// Add or replace a role.
    pub fn add_role(&self, role: Role) {
        self.roles.write().insert(role.name.clone(), role);
    }

    /// A copy of a role as currently stored.
    pub fn role_snapshot(&self, name: &str) -> Option<Role> {
        self.roles.read().get(name).cloned()
    }

    /// Add or replace a term.
    pub fn add_term(&self, term: Term) {
        self.terms
            .write()
            .entry(term.taxonomy.clone())
            .or_default()
            .insert(term);
    }

    /// A copy of a term as currently stored.
    pub fn term_snapshot(&self, taxonomy: &str, id: TermId) -> Option<Term> {
        self.terms.read().get(taxonomy).and_then(|index| index.get(id)).cloned()
    }

    /// Rename a term.
    ///
    /// # Returns
    ///
    /// The renamed term and its previous slug.
    pub fn rename_term(&self, taxonomy: &str, id: TermId, name: &str) -> Option<(Term, String)> {
        let mut terms = self.terms.write();
        let index = terms.get_mut(taxonomy)?;
        let mut term = index.get(id)?.clone();
        let previous_slug = term.rename(name);
        index.insert(term.clone());
        Some((term, previous_slug))
    }

    /// Delete a term and unassign it everywhere.
    pub fn delete_term(&self, taxonomy: &str, id: TermId) -> Option<Term> {
        let removed = self.terms.write().get_mut(taxonomy)?.remove(id)?;

        for by_taxonomy in self.assignments.write().values_mut() {
            if let Some(assigned) = by_taxonomy.get_mut(taxonomy) {
                assigned.retain(|t| *t != id);
            }
        }

        Some(removed)
    }

    /// Add or replace a resource.
    pub fn add_resource(&self, resource: Resource) {
        self.resources.write().insert(resource.id, resource);
    }

    /// Set the terms of a taxonomy assigned to a resource.
    pub fn assign_terms<I>(&self, resource: ResourceId, taxonomy: &str, terms: I)
    where
        I: IntoIterator<Item = TermId>,
    {
        self.assignments
            .write()
            .entry(resource)
            .or_default()
            .insert(taxonomy.to_string(), terms.into_iter().collect());
    }

    /// Add or replace a principal.
    pub fn add_principal(&self, principal: Principal) {
        self.principals.write().insert(principal.id, principal);
    }

    /// Make every write to a role fail.
    pub fn reject_writes_for(&self, role: &str) {
        self.rejected_roles.write().insert(role.to_string());
    }

    /// Accept writes to a role again.
    pub fn accept_writes_for(&self, role: &str) {
        self.rejected_roles.write().remove(role);
    }

    /// Run a query against stored resources.
    ///
    /// Results come back in id order. The query's `found_posts` is set to
    /// the number of matches.
    pub fn run_query(&self, query: &mut QueryDescriptor) -> Vec<Resource> {
        let assignments = self.assignments.read();
        let no_terms = HashMap::new();

        let results: Vec<Resource> = self
            .resources
            .read()
            .values()
            .filter(|resource| {
                query
                    .post_type
                    .as_ref()
                    .map_or(true, |filter| filter.includes(&resource.post_type))
            })
            .filter(|resource| query.post_in.as_ref().map_or(true, |ids| ids.contains(&resource.id)))
            .filter(|resource| {
                let assigned = assignments.get(&resource.id).unwrap_or(&no_terms);
                query.tax_query.as_ref().map_or(true, |tax_query| {
                    tax_query.matches(&|taxonomy: &str| assigned.get(taxonomy).cloned().unwrap_or_default())
                })
            })
            .cloned()
            .collect();

        query.found_posts = results.len();
        results
    }

    fn check_writable(&self, role: &str) -> StoreResult<()> {
        if self.rejected_roles.read().contains(role) {
            return Err(StoreError::WriteRejected {
                target: role.to_string(),
                message: "role is read-only".to_string(),
            });
        }
        Ok(())
    }
}

impl RoleStore for MemoryHost {
    fn role_names(&self) -> StoreResult<Vec<String>> {
        Ok(self.roles.read().keys().cloned().collect())
    }

    fn role(&self, name: &str) -> StoreResult<Option<Role>> {
        Ok(self.role_snapshot(name))
    }

    fn add_cap(&self, role: &str, capability: Capability, granted: bool) -> StoreResult<()> {
        self.check_writable(role)?;
        let mut roles = self.roles.write();
        let stored = roles
            .get_mut(role)
            .ok_or_else(|| StoreError::RoleNotFound(role.to_string()))?;
        stored.grants.set(capability, granted);
        Ok(())
    }

    fn remove_cap(&self, role: &str, capability: &Capability) -> StoreResult<()> {
        self.check_writable(role)?;
        let mut roles = self.roles.write();
        let stored = roles
            .get_mut(role)
            .ok_or_else(|| StoreError::RoleNotFound(role.to_string()))?;
        stored.grants.remove(capability);
        Ok(())
    }
}

impl TermStore for MemoryHost {
    fn taxonomy(&self, name: &str) -> StoreResult<Option<TaxonomyDefinition>> {
        Ok(self.taxonomies.read().get(name).cloned())
    }

    fn register_taxonomy(&self, definition: TaxonomyDefinition) -> StoreResult<()> {
        self.register(definition);
        Ok(())
    }

    fn terms(&self, taxonomy: &str) -> StoreResult<Vec<Term>> {
        Ok(self
            .terms
            .read()
            .get(taxonomy)
            .map(|index| index.terms().into_iter().cloned().collect())
            .unwrap_or_default())
    }

    fn term(&self, taxonomy: &str, id: TermId) -> StoreResult<Option<Term>> {
        Ok(self.term_snapshot(taxonomy, id))
    }

    fn resolve_terms(&self, resource: ResourceId, taxonomy: &str) -> StoreResult<Vec<Term>> {
        let assignments = self.assignments.read();
        let Some(assigned) = assignments.get(&resource).and_then(|by_taxonomy| by_taxonomy.get(taxonomy)) else {
            return Ok(Vec::new());
        };

        let terms = self.terms.read();
        let Some(index) = terms.get(taxonomy) else {
            return Ok(Vec::new());
        };
        Ok(assigned.iter().filter_map(|id| index.get(*id)).cloned().collect())
    }
}

impl ResourceStore for MemoryHost {
    fn resource(&self, id: ResourceId) -> StoreResult<Option<Resource>> {
        Ok(self.resources.read().get(&id).cloned())
    }
}

impl PrincipalStore for MemoryHost {
    fn principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>> {
        Ok(self.principals.read().get(&id).cloned())
    }

    fn effective_capabilities(&self, principal: &Principal) -> StoreResult<GrantMap> {
        let roles: Vec<Role> = self.roles.read().values().cloned().collect();
        Ok(principal.effective_capabilities(&roles))
    }
}
