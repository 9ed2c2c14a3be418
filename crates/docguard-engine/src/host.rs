//! Host contracts
//!
//! The engine owns no storage. Roles, terms, resources and principals
//! live in the host and are reached through these narrow traits, passed in
//! as [`HostServices`].

use std::sync::Arc;

use docguard_caps::{Capability, GrantMap, TermId};
use docguard_taxonomy::{Principal, PrincipalId, Resource, ResourceId, Role, TaxonomyDefinition, Term};

use crate::error::StoreResult;

/// Persistent role and capability storage.
pub trait RoleStore: Send + Sync {
    /// Keys of every role.
    fn role_names(&self) -> StoreResult<Vec<String>>;

    /// Look up a role by key.
    fn role(&self, name: &str) -> StoreResult<Option<Role>>;

    /// Set a capability on a role.
    fn add_cap(&self, role: &str, capability: Capability, granted: bool) -> StoreResult<()>;

    /// Remove a capability from a role.
    fn remove_cap(&self, role: &str, capability: &Capability) -> StoreResult<()>;
}

/// Taxonomy and term storage.
pub trait TermStore: Send + Sync {
    /// Look up a registered taxonomy.
    fn taxonomy(&self, name: &str) -> StoreResult<Option<TaxonomyDefinition>>;

    /// Register a taxonomy.
    fn register_taxonomy(&self, definition: TaxonomyDefinition) -> StoreResult<()>;

    /// Every term of a taxonomy, empty ones included.
    fn terms(&self, taxonomy: &str) -> StoreResult<Vec<Term>>;

    /// Look up a single term.
    fn term(&self, taxonomy: &str, id: TermId) -> StoreResult<Option<Term>>;

    /// Terms of a taxonomy assigned to a resource.
    fn resolve_terms(&self, resource: ResourceId, taxonomy: &str) -> StoreResult<Vec<Term>>;
}

/// Content storage.
pub trait ResourceStore: Send + Sync {
    /// Look up a resource.
    fn resource(&self, id: ResourceId) -> StoreResult<Option<Resource>>;
}

/// User storage.
pub trait PrincipalStore: Send + Sync {
    /// Look up a principal.
    fn principal(&self, id: PrincipalId) -> StoreResult<Option<Principal>>;

    /// The principal's capabilities after merging role and user grants.
    fn effective_capabilities(&self, principal: &Principal) -> StoreResult<GrantMap>;

    /// Administrators bypass every term-scoped check.
    fn is_administrator(&self, principal: &Principal) -> bool {
        principal.is_administrator()
    }
}

/// The host services an engine runs against.
#[derive(Clone)]
pub struct HostServices {
    /// Role store
    pub roles: Arc<dyn RoleStore>,
    /// Term store
    pub terms: Arc<dyn TermStore>,
    /// Resource store
    pub resources: Arc<dyn ResourceStore>,
    /// Principal store
    pub principals: Arc<dyn PrincipalStore>,
}

impl HostServices {
    /// Bundle separate stores.
    pub fn new(
        roles: Arc<dyn RoleStore>,
        terms: Arc<dyn TermStore>,
        resources: Arc<dyn ResourceStore>,
        principals: Arc<dyn PrincipalStore>,
    ) -> Self {
        Self {
            roles,
            terms,
            resources,
            principals,
        }
    }

    /// Use one host object for every store.
    pub fn from_shared<H>(host: Arc<H>) -> Self
    where
        H: RoleStore + TermStore + ResourceStore + PrincipalStore + 'static,
    {
        Self {
            roles: host.clone(),
            terms: host.clone(),
            resources: host.clone(),
            principals: host,
        }
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices").finish_non_exhaustive()
    }
}
