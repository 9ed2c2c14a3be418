//! Capability mapper
//!
//! Rewrites object-level checks (`edit_post` on document 42) into the
//! term-scoped capabilities of the document's terms. A principal passes
//! when it holds the scoped capability for at least one assigned term.
//!
//! ```text
//! edit_post, document in {accounting, legal}
//!   host requirement:  edit_documents
//!   rewritten:         edit_documents_in_accounting OR edit_documents_in_legal
//! ```
//!
//! Checks that are not object-level primitives, documents of other post
//! types, and administrators pass through unchanged.

use std::sync::Arc;

use docguard_caps::{Capability, PrimitiveAction, Requirement, TERM_SEPARATOR};
use docguard_taxonomy::{Principal, Resource, ResourceId, TermIndex};
use tracing::{debug, trace};

use crate::config::{PolicyConfig, ZeroTermPolicy};
use crate::context::CheckContext;
use crate::error::EngineResult;
use crate::host::HostServices;

/// Evaluates whether a principal holds a capability.
pub trait CapabilityChecker {
    /// Check a capability, optionally against a resource.
    ///
    /// # Arguments
    ///
    /// * `principal` - The acting principal
    /// * `capability` - Host capability name (`edit_post`, `restrict_content`, ...)
    /// * `resource` - The object checked; falls back to the context's current resource
    /// * `ctx` - Call context of this check
    fn check(
        &self,
        principal: &Principal,
        capability: &str,
        resource: Option<ResourceId>,
        ctx: &CheckContext,
    ) -> EngineResult<bool>;
}

/// Decides whether a principal may view a governed resource at all.
///
/// Consulted by the mapper after term scoping. Providers may issue their
/// own capability checks through `checker`; those run in a nested context
/// and are never mapped again.
pub trait ViewPermissionProvider: Send + Sync {
    /// Check whether the principal may view the resource.
    fn can_view(
        &self,
        principal: &Principal,
        resource: &Resource,
        checker: &dyn CapabilityChecker,
        ctx: &CheckContext,
    ) -> EngineResult<bool>;
}

/// Rewrites primitive checks into term-scoped requirements.
#[derive(Clone)]
pub struct CapabilityMapper {
    host: HostServices,
    taxonomy: String,
    governed_type: String,
    allow_no_term_access: bool,
    zero_term_policy: ZeroTermPolicy,
    view_provider: Option<Arc<dyn ViewPermissionProvider>>,
}

impl CapabilityMapper {
    /// Create a mapper.
    pub fn new(host: HostServices, config: &PolicyConfig) -> Self {
        Self {
            host,
            taxonomy: config.taxonomy.clone(),
            governed_type: config.governed_type.clone(),
            allow_no_term_access: config.allow_no_term_access,
            zero_term_policy: config.zero_term_policy,
            view_provider: None,
        }
    }

    /// Consult a view-permission provider for governed resources.
    pub fn with_view_provider(mut self, provider: Arc<dyn ViewPermissionProvider>) -> Self {
        self.view_provider = Some(provider);
        self
    }

    /// Rewrite the host's requirement for a check.
    ///
    /// # Arguments
    ///
    /// * `requirement` - What the host would require without term scoping
    /// * `requested` - The capability being checked
    /// * `principal` - The acting principal
    /// * `resource` - The object checked; falls back to the context's current resource
    /// * `ctx` - Call context; nested contexts get the requirement back untouched
    ///
    /// # Returns
    ///
    /// The requirement the principal's effective capabilities must satisfy.
    pub fn map_meta_cap(
        &self,
        requirement: Requirement,
        requested: &str,
        principal: &Principal,
        resource: Option<ResourceId>,
        ctx: &CheckContext,
    ) -> EngineResult<Requirement> {
        if PrimitiveAction::parse(requested).is_none() {
            return Ok(requirement);
        }
        if ctx.suppress_reentry() {
            trace!(requested, depth = ctx.depth(), "Nested check, requirement left unchanged");
            return Ok(requirement);
        }
        let Some(id) = resource.or(ctx.current_resource()) else {
            return Ok(requirement);
        };
        let Some(resource) = self.host.resources.resource(id)? else {
            return Ok(requirement);
        };
        self.map_resolved(requirement, principal, &resource, ctx)
    }

    /// The requirement the host derives for a check before term scoping.
    ///
    /// Object checks on documents expand by authorship and status; a plain
    /// view of a non-private document is the bare `read` capability. Checks
    /// on other post types and other capability names are taken as-is.
    pub fn host_requirement(
        &self,
        requested: &str,
        principal: &Principal,
        resource: Option<&Resource>,
    ) -> EngineResult<Requirement> {
        let Some(primitive) = PrimitiveAction::parse(requested) else {
            let index = if requested.contains(TERM_SEPARATOR) {
                TermIndex::new(self.host.terms.terms(&self.taxonomy)?)
            } else {
                TermIndex::default()
            };
            return Ok(Requirement::single(Capability::parse(requested, &index)));
        };

        let Some(resource) = resource else {
            return Ok(Requirement::single(Capability::base(primitive.base_action())));
        };
        if !resource.is_type(&self.governed_type) {
            return Ok(Requirement::single(Capability::named(requested)));
        }

        let is_author = resource.is_authored_by(principal.id);
        if primitive == PrimitiveAction::ReadPost && (is_author || !resource.is_private()) {
            return Ok(Requirement::single(Capability::Read));
        }

        Ok(Requirement::all_of(
            primitive
                .base_actions_for(is_author, resource.is_published(), resource.is_private())
                .into_iter()
                .map(Capability::base),
        ))
    }

    fn map_resolved(
        &self,
        requirement: Requirement,
        principal: &Principal,
        resource: &Resource,
        ctx: &CheckContext,
    ) -> EngineResult<Requirement> {
        if !resource.is_type(&self.governed_type) || self.host.principals.is_administrator(principal) {
            return Ok(requirement);
        }

        let mut mapped = self.scope_to_terms(requirement, resource)?;

        if let Some(provider) = &self.view_provider {
            if !provider.can_view(principal, resource, self, &ctx.nested())? {
                debug!(principal = %principal.id, resource = %resource.id, "View permission denied");
                mapped.require(Capability::DoNotAllow);
            }
        }

        Ok(mapped)
    }

    fn scope_to_terms(&self, requirement: Requirement, resource: &Resource) -> EngineResult<Requirement> {
        let terms = self.host.terms.resolve_terms(resource.id, &self.taxonomy)?;

        if terms.is_empty() {
            if self.allow_no_term_access || self.zero_term_policy == ZeroTermPolicy::Base {
                debug!(resource = %resource.id, "No terms assigned, base capabilities apply");
                return Ok(requirement);
            }
            debug!(resource = %resource.id, "No terms assigned, access denied");
            return Ok(Requirement::deny());
        }

        let mut scoped = Requirement::new();
        for clause in requirement.clauses() {
            let mut any_of = Vec::with_capacity(clause.len() * terms.len());
            for capability in clause {
                let per_term: Vec<Capability> =
                    terms.iter().filter_map(|term| capability.scope_to(term.id)).collect();
                if per_term.is_empty() {
                    any_of.push(capability.clone());
                } else {
                    any_of.extend(per_term);
                }
            }
            scoped.push_any_of(any_of);
        }

        debug!(resource = %resource.id, terms = terms.len(), "Requirement scoped to terms");
        Ok(scoped)
    }
}

impl CapabilityChecker for CapabilityMapper {
    fn check(
        &self,
        principal: &Principal,
        capability: &str,
        resource: Option<ResourceId>,
        ctx: &CheckContext,
    ) -> EngineResult<bool> {
        let resource_id = resource.or(ctx.current_resource());
        let loaded = match resource_id {
            Some(id) => self.host.resources.resource(id)?,
            None => None,
        };

        let requirement = self.host_requirement(capability, principal, loaded.as_ref())?;
        let requirement = match &loaded {
            Some(resource) if !ctx.suppress_reentry() && PrimitiveAction::parse(capability).is_some() => {
                self.map_resolved(requirement, principal, resource, ctx)?
            }
            _ => requirement,
        };

        let caps = self.host.principals.effective_capabilities(principal)?;
        let allowed = requirement.is_satisfied_by(&caps);
        debug!(
            principal = %principal.id,
            capability,
            resource = ?resource_id,
            depth = ctx.depth(),
            allowed,
            "Capability check"
        );
        Ok(allowed)
    }
}

impl std::fmt::Debug for CapabilityMapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityMapper")
            .field("taxonomy", &self.taxonomy)
            .field("governed_type", &self.governed_type)
            .field("allow_no_term_access", &self.allow_no_term_access)
            .field("zero_term_policy", &self.zero_term_policy)
            .field("view_provider", &self.view_provider.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::ResourceStore;
    use crate::memory::MemoryHost;
    use docguard_caps::{BaseAction, TermId};
    use docguard_taxonomy::{PrincipalId, ResourceStatus, Role, StandardRole, Term};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn host() -> Arc<MemoryHost> {
        let host = Arc::new(MemoryHost::new());
        host.add_term(Term::new(TermId(1), "department", "Accounting"));
        host.add_term(Term::new(TermId(2), "department", "Legal"));
        host.add_role(Role::standard(StandardRole::Administrator));
        host.add_role(Role::standard(StandardRole::Subscriber));

        let mut clerk = Role::new("clerk", "Clerk");
        clerk.grants.grant(Capability::Read);
        clerk.grants.grant(Capability::scoped(BaseAction::EditOthersDocuments, TermId(1)));
        clerk.grants.grant(Capability::scoped(BaseAction::EditPublishedDocuments, TermId(1)));
        clerk.grants.grant(Capability::scoped(BaseAction::ReadDocuments, TermId(1)));
        host.add_role(clerk);

        host.add_resource(
            Resource::new(ResourceId(10), "document")
                .with_status(ResourceStatus::Publish)
                .with_author(PrincipalId(99)),
        );
        host.assign_terms(ResourceId(10), "department", [TermId(1), TermId(2)]);
        host.add_resource(Resource::new(ResourceId(11), "document").with_author(PrincipalId(99)));
        host.add_resource(Resource::new(ResourceId(12), "post"));
        host
    }

    fn mapper(host: &Arc<MemoryHost>, config: &PolicyConfig) -> CapabilityMapper {
        CapabilityMapper::new(HostServices::from_shared(host.clone()), config)
    }

    fn clerk() -> Principal {
        Principal::new(PrincipalId(5)).with_role("clerk")
    }

    #[test]
    fn test_non_primitive_is_fast_path() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let original = Requirement::single(Capability::named("manage_options"));
        let mapped = mapper
            .map_meta_cap(original.clone(), "manage_options", &clerk(), Some(ResourceId(10)), &CheckContext::new())
            .unwrap();
        assert_eq!(mapped, original);
    }

    #[test]
    fn test_scopes_to_every_assigned_term() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let original = Requirement::all_of([
            Capability::base(BaseAction::EditOthersDocuments),
            Capability::base(BaseAction::EditPublishedDocuments),
        ]);

        let mapped = mapper
            .map_meta_cap(original, "edit_post", &clerk(), Some(ResourceId(10)), &CheckContext::new())
            .unwrap();

        assert_eq!(
            mapped.clauses(),
            &[
                vec![
                    Capability::scoped(BaseAction::EditOthersDocuments, TermId(1)),
                    Capability::scoped(BaseAction::EditOthersDocuments, TermId(2)),
                ],
                vec![
                    Capability::scoped(BaseAction::EditPublishedDocuments, TermId(1)),
                    Capability::scoped(BaseAction::EditPublishedDocuments, TermId(2)),
                ],
            ]
        );
    }

    #[test]
    fn test_read_maps_to_read_documents() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let mapped = mapper
            .map_meta_cap(
                Requirement::single(Capability::Read),
                "read_post",
                &clerk(),
                Some(ResourceId(10)),
                &CheckContext::new(),
            )
            .unwrap();
        assert!(mapped.mentions(&Capability::scoped(BaseAction::ReadDocuments, TermId(2))));
        assert!(!mapped.mentions(&Capability::Read));
    }

    #[test]
    fn test_other_post_types_unchanged() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let original = Requirement::single(Capability::named("edit_others_posts"));
        let mapped = mapper
            .map_meta_cap(original.clone(), "edit_post", &clerk(), Some(ResourceId(12)), &CheckContext::new())
            .unwrap();
        assert_eq!(mapped, original);
    }

    #[test]
    fn test_other_post_types_keep_host_requirement() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let post = host.resource(ResourceId(12)).unwrap().unwrap();

        let requirement = mapper.host_requirement("edit_post", &clerk(), Some(&post)).unwrap();
        assert_eq!(requirement, Requirement::single(Capability::named("edit_post")));
        assert!(!mapper.check(&clerk(), "edit_post", Some(ResourceId(12)), &CheckContext::new()).unwrap());

        let document = host.resource(ResourceId(11)).unwrap().unwrap();
        let requirement = mapper.host_requirement("edit_post", &clerk(), Some(&document)).unwrap();
        assert!(requirement.mentions(&Capability::base(BaseAction::EditOthersDocuments)));
    }

    #[test]
    fn test_current_resource_fallback() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let ctx = CheckContext::new().with_current_resource(ResourceId(10));
        let mapped = mapper
            .map_meta_cap(Requirement::single(Capability::Read), "read_post", &clerk(), None, &ctx)
            .unwrap();
        assert!(mapped.mentions(&Capability::scoped(BaseAction::ReadDocuments, TermId(1))));
    }

    #[test]
    fn test_zero_terms_follow_policy() {
        let host = host();
        let requirement = Requirement::single(Capability::base(BaseAction::EditOthersDocuments));

        let deny = mapper(&host, &PolicyConfig::default());
        let mapped = deny
            .map_meta_cap(requirement.clone(), "edit_post", &clerk(), Some(ResourceId(11)), &CheckContext::new())
            .unwrap();
        assert!(mapped.is_denied());

        let base = mapper(&host, &PolicyConfig::default().with_zero_term_policy(ZeroTermPolicy::Base));
        let mapped = base
            .map_meta_cap(requirement.clone(), "edit_post", &clerk(), Some(ResourceId(11)), &CheckContext::new())
            .unwrap();
        assert_eq!(mapped, requirement);

        let allowed = mapper(&host, &PolicyConfig::default().with_no_term_access(true));
        let mapped = allowed
            .map_meta_cap(requirement.clone(), "edit_post", &clerk(), Some(ResourceId(11)), &CheckContext::new())
            .unwrap();
        assert_eq!(mapped, requirement);
    }

    #[test]
    fn test_administrator_unchanged() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let admin = Principal::new(PrincipalId(1)).with_role("administrator");
        let original = Requirement::single(Capability::base(BaseAction::DeleteOthersDocuments));
        let mapped = mapper
            .map_meta_cap(original.clone(), "delete_post", &admin, Some(ResourceId(11)), &CheckContext::new())
            .unwrap();
        assert_eq!(mapped, original);
        assert!(mapper.check(&admin, "delete_post", Some(ResourceId(10)), &CheckContext::new()).unwrap());
    }

    #[test]
    fn test_check_any_term_suffices() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let ctx = CheckContext::new();

        assert!(mapper.check(&clerk(), "edit_post", Some(ResourceId(10)), &ctx).unwrap());
        assert!(mapper.check(&clerk(), "read_post", Some(ResourceId(10)), &ctx).unwrap());
        assert!(!mapper.check(&clerk(), "delete_post", Some(ResourceId(10)), &ctx).unwrap());

        let subscriber = Principal::new(PrincipalId(6)).with_role("subscriber");
        assert!(!mapper.check(&subscriber, "read_post", Some(ResourceId(10)), &ctx).unwrap());
    }

    #[test]
    fn test_check_scoped_name() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        assert!(mapper
            .check(&clerk(), "read_documents_in_accounting", None, &CheckContext::new())
            .unwrap());
        assert!(!mapper
            .check(&clerk(), "read_documents_in_legal", None, &CheckContext::new())
            .unwrap());
    }

    /// Asks for `read_post` on the same resource, which would recurse forever
    /// without the nested context.
    struct SelfReferential {
        calls: AtomicUsize,
    }

    impl ViewPermissionProvider for SelfReferential {
        fn can_view(
            &self,
            principal: &Principal,
            resource: &Resource,
            checker: &dyn CapabilityChecker,
            ctx: &CheckContext,
        ) -> EngineResult<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            checker.check(principal, "read_post", Some(resource.id), ctx)
        }
    }

    #[test]
    fn test_view_provider_is_not_reentered() {
        let host = host();
        let provider = Arc::new(SelfReferential {
            calls: AtomicUsize::new(0),
        });
        let mapper = mapper(&host, &PolicyConfig::default()).with_view_provider(provider.clone());

        let allowed = mapper
            .check(&clerk(), "read_post", Some(ResourceId(10)), &CheckContext::new())
            .unwrap();

        // nested check sees the bare `read` requirement, which the clerk holds
        assert!(allowed);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_nested_context_is_untouched() {
        let host = host();
        let mapper = mapper(&host, &PolicyConfig::default());
        let original = Requirement::single(Capability::Read);
        let mapped = mapper
            .map_meta_cap(
                original.clone(),
                "read_post",
                &clerk(),
                Some(ResourceId(10)),
                &CheckContext::new().nested(),
            )
            .unwrap();
        assert_eq!(mapped, original);
    }
}
