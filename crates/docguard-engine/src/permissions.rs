//! Taxonomy permissions facade
//!
//! Wires the registry, mapper, cache, filter and query injector to one
//! host and one policy, and routes term lifecycle events to them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use docguard_caps::{Requirement, TermId};
use docguard_events::{Event, EventBusError, EventBusResult, EventHandler, TermEvent};
use docguard_taxonomy::{Principal, Resource, ResourceId, TaxonomyDefinition, Term};
use tracing::{info, warn};

use crate::cache::{Clock, TermCache};
use crate::config::PolicyConfig;
use crate::context::CheckContext;
use crate::error::{EngineError, EngineResult};
use crate::filter::{FilterOutcome, ResultFilter};
use crate::host::HostServices;
use crate::mapper::{CapabilityChecker, CapabilityMapper, ViewPermissionProvider};
use crate::query::{QueryDescriptor, QueryInjector};
use crate::registry::{Registry, SyncReport};
use crate::validation::{self, PublishRedirect, PublishSubmission};

/// Term-scoped access control for one taxonomy and post type.
pub struct TaxonomyPermissions {
    config: PolicyConfig,
    host: HostServices,
    registry: Registry,
    mapper: CapabilityMapper,
    cache: Arc<TermCache>,
    filter: ResultFilter,
    injector: QueryInjector,
    pending_sync: AtomicBool,
}

impl TaxonomyPermissions {
    /// Set up access control against a host.
    ///
    /// The taxonomy is registered for the governed type if the host does
    /// not know it yet.
    ///
    /// # Errors
    ///
    /// Fatal errors for an invalid configuration, or a registered taxonomy
    /// that does not classify the governed type.
    pub fn new(config: PolicyConfig, host: HostServices) -> EngineResult<Self> {
        config.validate()?;
        let taxonomy = ensure_taxonomy(&config, &host)?;

        let cache = Arc::new(TermCache::new(host.clone(), &config));
        Ok(Self {
            registry: Registry::new(host.clone(), taxonomy),
            mapper: CapabilityMapper::new(host.clone(), &config),
            filter: ResultFilter::new(host.clone(), cache.clone(), &config),
            injector: QueryInjector::new(config.governed_type.clone(), cache.clone(), host.principals.clone()),
            cache,
            config,
            host,
            pending_sync: AtomicBool::new(false),
        })
    }

    /// Consult a view-permission provider on every governed check.
    pub fn with_view_provider(mut self, provider: Arc<dyn ViewPermissionProvider>) -> Self {
        self.mapper = self.mapper.with_view_provider(provider);
        self
    }

    /// Use a different clock for cache expiry.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        let cache = Arc::new(TermCache::new(self.host.clone(), &self.config).with_clock(clock));
        self.filter = ResultFilter::new(self.host.clone(), cache.clone(), &self.config);
        self.injector = QueryInjector::new(
            self.config.governed_type.clone(),
            cache.clone(),
            self.host.principals.clone(),
        );
        self.cache = cache;
        self
    }

    /// Request a full capability sync on the next admin initialisation.
    pub fn activate(&self) {
        self.pending_sync.store(true, Ordering::SeqCst);
        info!(taxonomy = %self.config.taxonomy, "Activated, capability sync pending");
    }

    /// Run the pending capability sync, if any.
    ///
    /// A failed sync stays pending and is retried on the next call.
    pub fn on_admin_init(&self) -> EngineResult<Option<SyncReport>> {
        if !self.pending_sync.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }

        match self.registry.add_caps(None) {
            Ok(report) => {
                self.cache.clear();
                Ok(Some(report))
            }
            Err(e) => {
                self.pending_sync.store(true, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Check if a capability sync is pending.
    pub fn sync_pending(&self) -> bool {
        self.pending_sync.load(Ordering::SeqCst)
    }

    /// Rewrite the host's requirement for a check.
    pub fn map_meta_cap(
        &self,
        requirement: Requirement,
        requested: &str,
        principal: &Principal,
        resource: Option<ResourceId>,
        ctx: &CheckContext,
    ) -> EngineResult<Requirement> {
        self.mapper.map_meta_cap(requirement, requested, principal, resource, ctx)
    }

    /// Check a capability for a principal at the top level.
    pub fn user_can(&self, principal: &Principal, capability: &str, resource: Option<ResourceId>) -> EngineResult<bool> {
        self.user_can_in(principal, capability, resource, &CheckContext::new())
    }

    /// Check a capability within an existing call context.
    pub fn user_can_in(
        &self,
        principal: &Principal,
        capability: &str,
        resource: Option<ResourceId>,
        ctx: &CheckContext,
    ) -> EngineResult<bool> {
        self.mapper.check(principal, capability, resource, ctx)
    }

    /// Drop inaccessible governed documents from a page of results.
    pub fn filter_results(
        &self,
        principal: &Principal,
        results: Vec<Resource>,
        query: &QueryDescriptor,
    ) -> EngineResult<FilterOutcome<Resource>> {
        self.filter.filter(principal, results, query)
    }

    /// Restrict a listing query to the principal's terms.
    pub fn augment_query(&self, principal: &Principal, query: QueryDescriptor) -> EngineResult<QueryDescriptor> {
        self.injector.augment(principal, query)
    }

    /// Check the terms of a publish request.
    pub fn validate_publish(&self, submission: &PublishSubmission) -> Result<(), PublishRedirect> {
        validation::validate_publish(&self.config, submission)
    }

    /// A term was created.
    pub fn on_term_created(&self, term: &Term) -> EngineResult<SyncReport> {
        let result = self.registry.on_term_created(term);
        self.cache.clear();
        result
    }

    /// A term was renamed.
    pub fn on_term_renamed(&self, term: &Term, previous_slug: &str) -> EngineResult<SyncReport> {
        let result = self.registry.on_term_renamed(term, previous_slug);
        self.cache.clear();
        result
    }

    /// A term was deleted.
    pub fn on_term_deleted(&self, term: TermId, slug: &str) -> EngineResult<usize> {
        let result = self.registry.on_term_deleted(term, slug);
        self.cache.clear();
        result
    }

    /// Remove every capability of an existing term.
    pub fn remove_caps(&self, term: TermId) -> EngineResult<usize> {
        let result = self.registry.remove_caps(term);
        self.cache.clear();
        result
    }

    /// Apply a term lifecycle event.
    pub fn handle_term_event(&self, event: &TermEvent) -> EngineResult<()> {
        match event {
            TermEvent::Created { term } => self.on_term_created(term).map(|_| ()),
            TermEvent::Renamed { term, previous_slug } => self.on_term_renamed(term, previous_slug).map(|_| ()),
            TermEvent::Deleted { term_id, slug } => self.on_term_deleted(*term_id, slug).map(|_| ()),
        }
    }

    /// The capability registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The capability mapper, usable as a [`CapabilityChecker`].
    pub fn mapper(&self) -> &CapabilityMapper {
        &self.mapper
    }

    /// The per-principal term cache.
    pub fn cache(&self) -> &TermCache {
        &self.cache
    }

    /// The active policy.
    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// The governing taxonomy.
    pub fn taxonomy(&self) -> &TaxonomyDefinition {
        self.registry.taxonomy()
    }
}

impl std::fmt::Debug for TaxonomyPermissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaxonomyPermissions")
            .field("config", &self.config)
            .field("mapper", &self.mapper)
            .field("cache", &self.cache)
            .field("pending_sync", &self.sync_pending())
            .finish_non_exhaustive()
    }
}

/// Look up the governing taxonomy, registering it when missing.
fn ensure_taxonomy(config: &PolicyConfig, host: &HostServices) -> EngineResult<TaxonomyDefinition> {
    match host.terms.taxonomy(&config.taxonomy)? {
        Some(definition) if definition.applies_to(&config.governed_type) => Ok(definition),
        Some(_) => Err(EngineError::TaxonomyNotForGovernedType {
            taxonomy: config.taxonomy.clone(),
            post_type: config.governed_type.clone(),
        }),
        None => {
            let definition = TaxonomyDefinition::new(config.taxonomy.clone(), [config.governed_type.clone()]);
            host.terms.register_taxonomy(definition.clone())?;
            info!(taxonomy = %config.taxonomy, post_type = %config.governed_type, "Registered taxonomy");
            Ok(definition)
        }
    }
}

/// Keeps capabilities in step with term events from the bus.
#[derive(Debug, Clone)]
pub struct TermSyncHandler {
    permissions: Arc<TaxonomyPermissions>,
}

impl TermSyncHandler {
    /// Create a handler.
    pub fn new(permissions: Arc<TaxonomyPermissions>) -> Self {
        Self { permissions }
    }
}

#[async_trait]
impl EventHandler for TermSyncHandler {
    async fn handle(&self, event: Event) -> EventBusResult<()> {
        let Some(term_event) = TermEvent::from_event(&event) else {
            warn!(event_type = %event.event_type, event_id = %event.id, "Not a term event, ignored");
            return Ok(());
        };

        self.permissions
            .handle_term_event(&term_event)
            .map_err(|e| EventBusError::HandlerError(format!("{}: {}", e.error_code(), e)))
    }

    fn topics(&self) -> Vec<String> {
        vec![format!("{}.term.*", self.permissions.config().taxonomy)]
    }
}
