//! Per-principal term cache
//!
//! Memoizes, per principal id, the terms the principal holds any
//! term-scoped capability for, and the taxonomy clause built from them.
//! Entries expire after a short TTL and are evicted by the next insert
//! after that. Terms changing drops them wholesale. Within the TTL a role
//! edit is not seen; that staleness is accepted.
//!
//! Concurrent misses for the same principal compute the same value twice;
//! the last write wins.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use docguard_caps::TermId;
use docguard_taxonomy::{Principal, PrincipalId};
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use crate::config::{PolicyConfig, MAX_CACHE_TTL_SECS};
use crate::error::EngineResult;
use crate::host::HostServices;
use crate::query::UserTaxQuery;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at the given time.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(start) }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

/// TTL-bounded per-principal cache of accessible terms.
pub struct TermCache {
    host: HostServices,
    taxonomy: String,
    allow_no_term_access: bool,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    terms: RwLock<HashMap<PrincipalId, Entry<Vec<TermId>>>>,
    tax_queries: RwLock<HashMap<PrincipalId, Entry<UserTaxQuery>>>,
}

impl TermCache {
    /// Create a cache using the configured taxonomy and TTL.
    pub fn new(host: HostServices, config: &PolicyConfig) -> Self {
        Self {
            host,
            taxonomy: config.taxonomy.clone(),
            allow_no_term_access: config.allow_no_term_access,
            ttl: Duration::seconds(config.cache_ttl_secs().min(MAX_CACHE_TTL_SECS) as i64),
            clock: Arc::new(SystemClock),
            terms: RwLock::new(HashMap::new()),
            tax_queries: RwLock::new(HashMap::new()),
        }
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Terms the principal holds at least one granted term-scoped capability for.
    ///
    /// The anonymous principal has none.
    pub fn user_terms(&self, principal: &Principal) -> EngineResult<Vec<TermId>> {
        if principal.id.is_anonymous() {
            return Ok(Vec::new());
        }
        if let Some(terms) = self.fresh(&self.terms, principal.id) {
            return Ok(terms);
        }

        let caps = self.host.principals.effective_capabilities(principal)?;
        let terms = caps.granted_terms();
        trace!(principal = %principal.id, terms = terms.len(), "Computed accessible terms");

        self.store(&self.terms, principal.id, terms.clone());
        Ok(terms)
    }

    /// The taxonomy clause limiting listings to the principal's terms.
    ///
    /// Only terms that still exist are included.
    pub fn user_tax_query(&self, principal: &Principal) -> EngineResult<UserTaxQuery> {
        if let Some(query) = self.fresh(&self.tax_queries, principal.id) {
            return Ok(query);
        }

        let held = self.user_terms(principal)?;
        let accessible: Vec<TermId> = self
            .host
            .terms
            .terms(&self.taxonomy)?
            .into_iter()
            .map(|term| term.id)
            .filter(|id| held.contains(id))
            .collect();
        let query = UserTaxQuery::build(&self.taxonomy, accessible, self.allow_no_term_access);

        self.store(&self.tax_queries, principal.id, query.clone());
        Ok(query)
    }

    /// Drop the entries of one principal.
    pub fn invalidate(&self, principal: PrincipalId) {
        self.terms.write().remove(&principal);
        self.tax_queries.write().remove(&principal);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.terms.write().clear();
        self.tax_queries.write().clear();
    }

    /// Number of principals with a cached term set.
    pub fn len(&self) -> usize {
        self.terms.read().len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.terms.read().is_empty() && self.tax_queries.read().is_empty()
    }

    fn fresh<T: Clone>(&self, map: &RwLock<HashMap<PrincipalId, Entry<T>>>, principal: PrincipalId) -> Option<T> {
        let now = self.clock.now();
        map.read()
            .get(&principal)
            .filter(|entry| now - entry.stored_at < self.ttl)
            .map(|entry| entry.value.clone())
    }

    /// Insert an entry, dropping every expired one.
    fn store<T>(&self, map: &RwLock<HashMap<PrincipalId, Entry<T>>>, principal: PrincipalId, value: T) {
        let now = self.clock.now();
        let mut map = map.write();
        map.retain(|_, entry| now - entry.stored_at < self.ttl);
        map.insert(principal, Entry { value, stored_at: now });
    }
}

impl std::fmt::Debug for TermCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermCache")
            .field("taxonomy", &self.taxonomy)
            .field("ttl", &self.ttl)
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RoleStore;
    use crate::memory::MemoryHost;
    use crate::query::TaxQuery;
    use docguard_caps::{BaseAction, Capability};
    use docguard_taxonomy::{Role, Term};

    struct Fixture {
        host: Arc<MemoryHost>,
        clock: Arc<ManualClock>,
        cache: TermCache,
    }

    fn fixture(config: PolicyConfig) -> Fixture {
        let host = Arc::new(MemoryHost::new());
        host.add_term(Term::new(TermId(1), "department", "Accounting"));
        host.add_term(Term::new(TermId(2), "department", "Legal"));

        let mut clerk = Role::new("clerk", "Clerk");
        clerk.grants.grant(Capability::scoped(BaseAction::ReadDocuments, TermId(1)));
        clerk.grants.revoke(Capability::scoped(BaseAction::ReadDocuments, TermId(2)));
        // orphaned grant for a term that no longer exists
        clerk.grants.grant(Capability::scoped(BaseAction::EditDocuments, TermId(9)));
        host.add_role(clerk);

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = TermCache::new(HostServices::from_shared(host.clone()), &config).with_clock(clock.clone());
        Fixture { host, clock, cache }
    }

    fn clerk() -> Principal {
        Principal::new(PrincipalId(7)).with_role("clerk")
    }

    #[test]
    fn test_user_terms() {
        let f = fixture(PolicyConfig::default());
        assert_eq!(f.cache.user_terms(&clerk()).unwrap(), vec![TermId(1), TermId(9)]);
        assert!(f.cache.user_terms(&Principal::anonymous()).unwrap().is_empty());
    }

    #[test]
    fn test_user_tax_query_skips_missing_terms() {
        let f = fixture(PolicyConfig::default());
        assert_eq!(
            f.cache.user_tax_query(&clerk()).unwrap(),
            UserTaxQuery::Query(TaxQuery::In {
                taxonomy: "department".to_string(),
                terms: vec![TermId(1)],
            })
        );

        let nobody = Principal::new(PrincipalId(8));
        assert_eq!(f.cache.user_tax_query(&nobody).unwrap(), UserTaxQuery::NoAccess);
    }

    #[test]
    fn test_entries_live_until_ttl() {
        let f = fixture(PolicyConfig {
            debug: true,
            ..PolicyConfig::default()
        });
        assert_eq!(f.cache.ttl(), Duration::seconds(10));
        assert_eq!(f.cache.user_terms(&clerk()).unwrap().len(), 2);

        f.host
            .add_cap("clerk", Capability::scoped(BaseAction::ReadDocuments, TermId(2)), true)
            .unwrap();

        f.clock.advance(Duration::seconds(9));
        assert_eq!(f.cache.user_terms(&clerk()).unwrap().len(), 2);

        f.clock.advance(Duration::seconds(1));
        assert_eq!(f.cache.user_terms(&clerk()).unwrap(), vec![TermId(1), TermId(2), TermId(9)]);
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let f = fixture(PolicyConfig::default());
        for id in 100..1100 {
            let principal = Principal::new(PrincipalId(id)).with_role("clerk");
            f.cache.user_tax_query(&principal).unwrap();
        }
        assert_eq!(f.cache.len(), 1000);

        f.clock.advance(Duration::days(30));
        f.cache.user_tax_query(&clerk()).unwrap();
        assert_eq!(f.cache.len(), 1);
        assert_eq!(f.cache.tax_queries.read().len(), 1);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let f = fixture(PolicyConfig::default());
        f.cache.user_tax_query(&clerk()).unwrap();
        assert_eq!(f.cache.len(), 1);

        f.host
            .remove_cap("clerk", &Capability::scoped(BaseAction::ReadDocuments, TermId(1)))
            .unwrap();
        f.cache.invalidate(PrincipalId(7));
        assert!(f.cache.is_empty());
        assert_eq!(f.cache.user_terms(&clerk()).unwrap(), vec![TermId(9)]);

        f.cache.clear();
        assert!(f.cache.is_empty());
    }
}
