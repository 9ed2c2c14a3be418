//! Acting principals
//!
//! A principal is the user a check is evaluated for. Its effective
//! capabilities are the merge of its roles' grants followed by any
//! user-specific grants, the same order the host uses.

use docguard_caps::{Capability, GrantMap};
use serde::{Deserialize, Serialize};

use crate::roles::{Role, ADMINISTRATOR};

/// Stable numeric user id. `0` is the anonymous visitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct PrincipalId(pub u64);

impl PrincipalId {
    /// The anonymous (logged-out) principal.
    pub const ANONYMOUS: PrincipalId = PrincipalId(0);

    /// Check if this is the anonymous principal.
    pub fn is_anonymous(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The acting user.
///
/// # Examples
///
/// ```
/// use docguard_taxonomy::{Principal, PrincipalId};
///
/// let user = Principal::new(PrincipalId(7)).with_role("editor");
/// assert!(user.has_role("editor"));
/// assert!(!user.is_administrator());
/// assert!(user.logged_in);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// User ID
    pub id: PrincipalId,

    /// Role keys, in assignment order
    #[serde(default)]
    pub roles: Vec<String>,

    /// User-specific grants, applied after role grants
    #[serde(default)]
    pub grants: GrantMap,

    /// Whether the request is authenticated
    pub logged_in: bool,
}

impl Principal {
    /// Creates a logged-in principal with no roles.
    pub fn new(id: PrincipalId) -> Self {
        Self {
            id,
            roles: Vec::new(),
            grants: GrantMap::new(),
            logged_in: !id.is_anonymous(),
        }
    }

    /// The anonymous visitor.
    pub fn anonymous() -> Self {
        Self::new(PrincipalId::ANONYMOUS)
    }

    /// Adds a role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        let role = role.into();
        if !self.roles.contains(&role) {
            self.roles.push(role);
        }
        self
    }

    /// Adds a user-specific grant.
    pub fn with_grant(mut self, capability: Capability, granted: bool) -> Self {
        self.grants.set(capability, granted);
        self
    }

    /// Check if the principal has a role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Administrators bypass every term-scoped check.
    pub fn is_administrator(&self) -> bool {
        self.has_role(ADMINISTRATOR)
    }

    /// Computes effective capabilities from the given role definitions.
    ///
    /// Roles not held by the principal are ignored, as are held roles with
    /// no definition. Each held role name is also granted as a capability.
    pub fn effective_capabilities(&self, roles: &[Role]) -> GrantMap {
        let mut effective = GrantMap::new();
        for name in &self.roles {
            if let Some(role) = roles.iter().find(|r| &r.name == name) {
                effective.merge(&role.grants);
            }
            effective.grant(Capability::named(name.as_str()));
        }
        effective.merge(&self.grants);
        effective
    }
}
