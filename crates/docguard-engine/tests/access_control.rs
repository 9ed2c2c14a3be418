//! End-to-end access control against the in-memory host.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::{Duration, Utc};
use docguard_caps::{BaseAction, Capability, Requirement, TermId};
use docguard_engine::{
    CapabilityChecker, CheckContext, EngineResult, HostServices, ManualClock, MemoryHost, PolicyConfig,
    PublishSubmission, QueryDescriptor, RoleRestrictions, RoleStore, TaxonomyPermissions, TermCountViolation,
    TermSyncHandler, ViewPermissionProvider, ZeroTermPolicy,
};
use docguard_events::{EventBus, HandlerDispatch, MemoryEventBus, TermEvent};
use docguard_taxonomy::{Principal, PrincipalId, Resource, ResourceId, ResourceStatus, Role, StandardRole, Term};

const ACCOUNTING: TermId = TermId(1);
const LEGAL: TermId = TermId(2);

/// Documents 1..=10 alternate between the two terms, every third one in
/// Legal. Document 20 carries both terms, 21 carries none, 30 is a post.
fn world() -> Arc<MemoryHost> {
    let host = Arc::new(MemoryHost::new());
    host.add_term(Term::new(ACCOUNTING, "department", "Accounting"));
    host.add_term(Term::new(LEGAL, "department", "Legal"));

    for role in [StandardRole::Administrator, StandardRole::Editor, StandardRole::Author] {
        host.add_role(Role::standard(role));
    }
    let mut clerk = Role::new("clerk", "Clerk");
    clerk.grants.grant(Capability::Read);
    host.add_role(clerk);

    for id in 1..=10 {
        host.add_resource(
            Resource::new(ResourceId(id), "document")
                .with_status(ResourceStatus::Publish)
                .with_author(PrincipalId(100)),
        );
        let term = if id % 3 == 0 { LEGAL } else { ACCOUNTING };
        host.assign_terms(ResourceId(id), "department", [term]);
    }
    host.add_resource(
        Resource::new(ResourceId(20), "document")
            .with_status(ResourceStatus::Publish)
            .with_author(PrincipalId(100)),
    );
    host.assign_terms(ResourceId(20), "department", [ACCOUNTING, LEGAL]);
    host.add_resource(Resource::new(ResourceId(21), "document").with_status(ResourceStatus::Publish));
    host.add_resource(Resource::new(ResourceId(30), "post").with_status(ResourceStatus::Publish));
    host
}

fn synced(host: &Arc<MemoryHost>, config: PolicyConfig) -> TaxonomyPermissions {
    let permissions = TaxonomyPermissions::new(config, HostServices::from_shared(host.clone())).unwrap();
    permissions.activate();
    permissions.on_admin_init().unwrap();
    permissions
}

fn clerk() -> Principal {
    Principal::new(PrincipalId(7)).with_role("clerk")
}

fn grant(host: &MemoryHost, role: &str, action: BaseAction, term: TermId) {
    host.add_cap(role, Capability::scoped(action, term), true).unwrap();
}

fn role_grant(host: &MemoryHost, role: &str, capability: &Capability) -> Option<bool> {
    host.role_snapshot(role).and_then(|r| r.grants.get(capability))
}

#[test]
fn test_add_caps_follows_base_grant() {
    let host = world();
    let _permissions = synced(&host, PolicyConfig::default());

    for term in [ACCOUNTING, LEGAL] {
        for action in BaseAction::all() {
            let scoped = Capability::scoped(action, term);
            let author = StandardRole::Author.default_grant(action);
            assert_eq!(role_grant(&host, "author", &scoped), Some(author), "{:?}", action);
            assert_eq!(role_grant(&host, "editor", &scoped), Some(true));
            assert_eq!(role_grant(&host, "clerk", &scoped), Some(false));
        }
    }
    assert_eq!(role_grant(&host, "editor", &Capability::named("manage_departments")), Some(true));
    assert_eq!(role_grant(&host, "author", &Capability::named("manage_departments")), Some(false));
}

#[test]
fn test_add_caps_is_idempotent_and_keeps_explicit_grants() {
    let host = world();
    let permissions = synced(&host, PolicyConfig::default());

    let denied = Capability::scoped(BaseAction::EditDocuments, LEGAL);
    host.add_cap("author", denied.clone(), false).unwrap();
    let before = host.role_snapshot("author").unwrap();

    let report = permissions.registry().add_caps(None).unwrap();
    assert_eq!(report.written, 0);
    assert_eq!(host.role_snapshot("author").unwrap(), before);
    assert_eq!(role_grant(&host, "author", &denied), Some(false));
}

#[test]
fn test_deleted_term_leaves_no_caps() {
    let host = world();
    let permissions = synced(&host, PolicyConfig::default());

    host.delete_term("department", LEGAL).unwrap();
    let removed = permissions.on_term_deleted(LEGAL, "legal").unwrap();
    assert!(removed > 0);

    for role in ["administrator", "editor", "author", "clerk"] {
        let grants = host.role_snapshot(role).unwrap().grants;
        assert!(grants.scoped_to(LEGAL).is_empty(), "{} still has legal caps", role);
        assert!(!grants.scoped_to(ACCOUNTING).is_empty());
    }
}

#[test]
fn test_remove_caps_of_unknown_term_is_fatal() {
    let host = world();
    let permissions = synced(&host, PolicyConfig::default());

    let err = permissions.remove_caps(TermId(99)).unwrap_err();
    assert!(err.is_fatal());
    assert_eq!(err.error_code(), "TERM_NOT_FOUND");
}

#[test]
fn test_any_assigned_term_grants_access() {
    let host = world();
    let permissions = synced(&host, PolicyConfig::default());
    grant(&host, "clerk", BaseAction::EditOthersDocuments, LEGAL);
    grant(&host, "clerk", BaseAction::EditPublishedDocuments, LEGAL);

    // document 20 is in Accounting and Legal; document 1 only in Accounting
    assert!(permissions.user_can(&clerk(), "edit_post", Some(ResourceId(20))).unwrap());
    assert!(!permissions.user_can(&clerk(), "edit_post", Some(ResourceId(1))).unwrap());
    assert!(permissions.user_can(&clerk(), "edit_post", Some(ResourceId(3))).unwrap());

    let mapped = permissions
        .map_meta_cap(
            Requirement::single(Capability::base(BaseAction::EditOthersDocuments)),
            "edit_post",
            &clerk(),
            Some(ResourceId(20)),
            &CheckContext::new(),
        )
        .unwrap();
    assert_eq!(
        mapped.clauses(),
        &[vec![
            Capability::scoped(BaseAction::EditOthersDocuments, ACCOUNTING),
            Capability::scoped(BaseAction::EditOthersDocuments, LEGAL),
        ]]
    );
}

#[test]
fn test_documents_without_terms() {
    let host = world();
    let editor = Principal::new(PrincipalId(4)).with_role("editor");

    let deny = synced(&host, PolicyConfig::default());
    assert!(!deny.user_can(&editor, "edit_post", Some(ResourceId(21))).unwrap());

    let base = synced(&host, PolicyConfig::default().with_zero_term_policy(ZeroTermPolicy::Base));
    assert!(base.user_can(&editor, "edit_post", Some(ResourceId(21))).unwrap());
    assert!(!base.user_can(&clerk(), "edit_post", Some(ResourceId(21))).unwrap());

    let open = synced(&host, PolicyConfig::default().with_no_term_access(true));
    assert!(open.user_can(&editor, "edit_post", Some(ResourceId(21))).unwrap());
}

#[test]
fn test_filter_drops_inaccessible_and_corrects_total() {
    let host = world();
    let permissions = synced(&host, PolicyConfig::default());
    grant(&host, "clerk", BaseAction::ReadDocuments, ACCOUNTING);

    let mut query = QueryDescriptor::for_type("document").with_post_in((1..=10).map(ResourceId).collect());
    let page = host.run_query(&mut query);
    assert_eq!(page.len(), 10);
    assert_eq!(query.found_posts, 10);

    let outcome = permissions.filter_results(&clerk(), page, &query).unwrap();
    let ids: Vec<u64> = outcome.results.iter().map(|r| r.id.0).collect();
    assert_eq!(ids, vec![1, 2, 4, 5, 7, 8, 10]);
    assert_eq!(outcome.found_posts, 7);
    assert_eq!(outcome.removed, 3);
}

#[test]
fn test_administrator_bypasses_everything() {
    let host = world();
    let permissions = synced(&host, PolicyConfig::default());
    let admin = Principal::new(PrincipalId(1)).with_role("administrator");

    for id in [1, 3, 20, 21] {
        assert!(permissions.user_can(&admin, "delete_post", Some(ResourceId(id))).unwrap());
    }

    let mut query = QueryDescriptor::for_type("document");
    let page = host.run_query(&mut query);
    let outcome = permissions.filter_results(&admin, page, &query).unwrap();
    assert_eq!(outcome.removed, 0);
    assert_eq!(outcome.found_posts, 12);

    let query = QueryDescriptor::for_type("document");
    assert_eq!(permissions.augment_query(&admin, query.clone()).unwrap(), query);
}

#[test]
fn test_augmented_query_matches_filter() {
    let host = world();
    let permissions = synced(&host, PolicyConfig::default());
    grant(&host, "clerk", BaseAction::ReadDocuments, LEGAL);

    let mut query = permissions
        .augment_query(&clerk(), QueryDescriptor::for_type("document"))
        .unwrap();
    let ids: Vec<u64> = host.run_query(&mut query).iter().map(|r| r.id.0).collect();
    assert_eq!(ids, vec![3, 6, 9, 20]);

    let nobody = Principal::new(PrincipalId(8));
    let mut query = permissions
        .augment_query(&nobody, QueryDescriptor::for_type("document"))
        .unwrap();
    assert_eq!(query.post_in, Some(Vec::new()));
    assert!(host.run_query(&mut query).is_empty());
}

/// Checks `edit_post` on the resource it is asked about.
struct Reentrant {
    calls: AtomicUsize,
}

impl ViewPermissionProvider for Reentrant {
    fn can_view(
        &self,
        principal: &Principal,
        resource: &Resource,
        checker: &dyn CapabilityChecker,
        ctx: &CheckContext,
    ) -> EngineResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(ctx.suppress_reentry());
        checker.check(principal, "edit_post", Some(resource.id), ctx)
    }
}

#[test]
fn test_provider_check_is_not_remapped() {
    let host = world();
    let provider = Arc::new(Reentrant {
        calls: AtomicUsize::new(0),
    });
    let permissions = synced(&host, PolicyConfig::default()).with_view_provider(provider.clone());
    let editor = Principal::new(PrincipalId(4)).with_role("editor");

    assert!(permissions.user_can(&editor, "read_post", Some(ResourceId(1))).unwrap());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);

    // the nested check sees plain base caps, which the clerk lacks
    grant(&host, "clerk", BaseAction::ReadDocuments, ACCOUNTING);
    assert!(!permissions.user_can(&clerk(), "read_post", Some(ResourceId(1))).unwrap());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_role_restrictions_through_facade() {
    let host = world();
    host.add_resource(
        Resource::new(ResourceId(40), "document")
            .with_status(ResourceStatus::Publish)
            .with_author(PrincipalId(100))
            .with_allowed_roles(["author"]),
    );
    host.assign_terms(ResourceId(40), "department", [ACCOUNTING]);

    let services = HostServices::from_shared(host.clone());
    let restrictions = Arc::new(RoleRestrictions::new("document", services.principals.clone()));
    let permissions = synced(&host, PolicyConfig::default()).with_view_provider(restrictions);

    let editor = Principal::new(PrincipalId(4)).with_role("editor");
    let author = Principal::new(PrincipalId(5)).with_role("author");
    assert!(!permissions.user_can(&editor, "read_post", Some(ResourceId(40))).unwrap());
    assert!(permissions.user_can(&author, "read_post", Some(ResourceId(40))).unwrap());

    host.add_cap("editor", Capability::named("restrict_content"), true).unwrap();
    assert!(permissions.user_can(&editor, "read_post", Some(ResourceId(40))).unwrap());
}

#[test]
fn test_cache_expires_after_ttl() {
    let host = world();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let permissions = synced(&host, PolicyConfig::default()).with_clock(clock.clone());
    grant(&host, "clerk", BaseAction::ReadDocuments, ACCOUNTING);

    let mut query = QueryDescriptor::for_type("document");
    let page = host.run_query(&mut query);
    assert_eq!(permissions.filter_results(&clerk(), page, &query).unwrap().found_posts, 8);

    grant(&host, "clerk", BaseAction::ReadDocuments, LEGAL);
    let page = host.run_query(&mut query);
    assert_eq!(permissions.filter_results(&clerk(), page, &query).unwrap().found_posts, 8);

    clock.advance(Duration::seconds(120));
    let page = host.run_query(&mut query);
    assert_eq!(permissions.filter_results(&clerk(), page, &query).unwrap().removed, 1);
}

#[test]
fn test_publish_requires_one_term() {
    let host = world();
    let permissions = synced(&host, PolicyConfig::default());

    let submission = PublishSubmission::new(ResourceId(5), "document", ResourceStatus::Publish)
        .with_terms("department", [ACCOUNTING, LEGAL]);
    let redirect = permissions.validate_publish(&submission).unwrap_err();
    assert_eq!(redirect.reason, TermCountViolation::Many);

    let submission = submission.with_terms("department", [LEGAL]);
    assert!(permissions.validate_publish(&submission).is_ok());
}

#[test]
fn test_publish_without_usable_terms() {
    let base = PublishSubmission::new(ResourceId(5), "document", ResourceStatus::Publish);
    let cases = [
        (base.clone(), TermCountViolation::Zero),
        (base.clone().with_terms("department", Vec::new()), TermCountViolation::None),
        (base.clone().with_terms("department", [TermId(0), TermId(0)]), TermCountViolation::None),
    ];

    let host = world();
    let strict = synced(&host, PolicyConfig::default());
    let lenient = synced(&host, PolicyConfig::default().with_no_term_access(true));

    for (submission, reason) in &cases {
        let redirect = strict.validate_publish(submission).unwrap_err();
        assert_eq!(redirect.reason, *reason);
        assert!(redirect.location.ends_with(&format!("docguard_tax_perm={}", reason.as_str())));

        assert!(lenient.validate_publish(submission).is_ok());
    }
}

#[tokio::test]
async fn test_term_lifecycle_over_the_bus() {
    let host = world();
    let permissions = Arc::new(synced(&host, PolicyConfig::default()));

    let bus = MemoryEventBus::new().with_dispatch(HandlerDispatch::Inline);
    bus.register_handler(Arc::new(TermSyncHandler::new(permissions.clone())))
        .await
        .unwrap();

    let hr = Term::new(TermId(3), "department", "HR");
    host.add_term(hr.clone());
    bus.publish(TermEvent::Created { term: hr }.to_event("department").unwrap())
        .await
        .unwrap();
    let scoped = Capability::scoped(BaseAction::PublishDocuments, TermId(3));
    assert_eq!(role_grant(&host, "author", &scoped), Some(true));

    let (renamed, previous_slug) = host.rename_term("department", TermId(3), "People").unwrap();
    host.add_cap("author", Capability::named("publish_documents_in_hr"), true)
        .unwrap();
    bus.publish(
        TermEvent::Renamed {
            term: renamed,
            previous_slug,
        }
        .to_event("department")
        .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(role_grant(&host, "author", &scoped), Some(true));
    assert_eq!(role_grant(&host, "author", &Capability::named("publish_documents_in_hr")), None);

    host.delete_term("department", TermId(3)).unwrap();
    bus.publish(
        TermEvent::Deleted {
            term_id: TermId(3),
            slug: "people".to_string(),
        }
        .to_event("department")
        .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(role_grant(&host, "author", &scoped), None);

    let stats = bus.stats().await;
    assert_eq!(stats.events_published, 3);
    assert_eq!(stats.events_delivered, 3);
    assert_eq!(stats.handler_failures, 0);
}
