//! Role restrictions
//!
//! Documents may name the roles allowed to view them. A document with no
//! named roles is open to anyone the term scoping lets through.

use std::sync::Arc;

use docguard_taxonomy::{Principal, Resource};
use tracing::debug;

use crate::context::CheckContext;
use crate::error::EngineResult;
use crate::filter::{may_include, retain_accessible, FilterOutcome};
use crate::host::PrincipalStore;
use crate::mapper::{CapabilityChecker, ViewPermissionProvider};
use crate::query::QueryDescriptor;

/// Capability that lifts role restrictions.
pub const RESTRICT_CONTENT: &str = "restrict_content";

/// View-permission provider backed by per-document role lists.
pub struct RoleRestrictions {
    governed_type: String,
    principals: Arc<dyn PrincipalStore>,
}

impl RoleRestrictions {
    /// Create a provider for the governed post type.
    pub fn new(governed_type: impl Into<String>, principals: Arc<dyn PrincipalStore>) -> Self {
        Self {
            governed_type: governed_type.into(),
            principals,
        }
    }

    /// Drop restricted documents from a page of results.
    ///
    /// # Arguments
    ///
    /// * `principal` - The acting principal
    /// * `results` - The page, in query order
    /// * `query` - The query that produced the page
    /// * `checker` - Evaluates `restrict_content` for the principal
    pub fn filter_results(
        &self,
        principal: &Principal,
        results: Vec<Resource>,
        query: &QueryDescriptor,
        checker: &dyn CapabilityChecker,
    ) -> EngineResult<FilterOutcome<Resource>> {
        if self.principals.is_administrator(principal) || !may_include(query, &self.governed_type) {
            return Ok(FilterOutcome::unchanged(results, query.found_posts));
        }

        let ctx = CheckContext::new();
        retain_accessible(results, query.found_posts, |resource| {
            if !resource.is_type(&self.governed_type) {
                return Ok(true);
            }
            self.can_view(principal, resource, checker, &ctx)
        })
    }
}

impl ViewPermissionProvider for RoleRestrictions {
    fn can_view(
        &self,
        principal: &Principal,
        resource: &Resource,
        checker: &dyn CapabilityChecker,
        ctx: &CheckContext,
    ) -> EngineResult<bool> {
        if self.principals.is_administrator(principal) || resource.allowed_roles.is_empty() {
            return Ok(true);
        }
        if !principal.logged_in {
            return Ok(false);
        }
        if resource.is_authored_by(principal.id) {
            return Ok(true);
        }
        if checker.check(principal, RESTRICT_CONTENT, Some(resource.id), &ctx.nested())? {
            return Ok(true);
        }

        let allowed = resource.allowed_roles.iter().any(|role| principal.has_role(role));
        if !allowed {
            debug!(principal = %principal.id, resource = %resource.id, "Not in an allowed role");
        }
        Ok(allowed)
    }
}

impl std::fmt::Debug for RoleRestrictions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleRestrictions")
            .field("governed_type", &self.governed_type)
            .finish_non_exhaustive()
    }
}
