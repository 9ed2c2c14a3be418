//! Result filter
//!
//! Post-processes a page of query results, dropping governed documents the
//! principal cannot access. When anything is dropped the reported total is
//! set to the number of retained results. That is a page-level correction,
//! not a recount of the full result set.

use std::sync::Arc;

use docguard_caps::{BaseAction, Capability, GrantMap};
use docguard_taxonomy::{Principal, Resource};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::TermCache;
use crate::config::{PolicyConfig, ZeroTermPolicy};
use crate::error::EngineResult;
use crate::host::HostServices;
use crate::query::QueryDescriptor;

/// A filtered page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOutcome<T> {
    /// Retained results, in their original order
    pub results: Vec<T>,
    /// Total to report for the query
    pub found_posts: usize,
    /// Number of dropped results
    pub removed: usize,
}

impl<T> FilterOutcome<T> {
    /// Results passed through untouched.
    pub fn unchanged(results: Vec<T>, found_posts: usize) -> Self {
        Self {
            results,
            found_posts,
            removed: 0,
        }
    }
}

/// Keep the results `keep` accepts, preserving order.
///
/// # Arguments
///
/// * `results` - The page of results
/// * `found_posts` - Total reported by the query
/// * `keep` - Decides per result; an error aborts the whole filter
pub fn retain_accessible<T, F>(results: Vec<T>, found_posts: usize, mut keep: F) -> EngineResult<FilterOutcome<T>>
where
    F: FnMut(&T) -> EngineResult<bool>,
{
    let total = results.len();
    let mut retained = Vec::with_capacity(total);
    for result in results {
        if keep(&result)? {
            retained.push(result);
        }
    }

    let removed = total - retained.len();
    let found_posts = if removed > 0 { retained.len() } else { found_posts };
    Ok(FilterOutcome {
        results: retained,
        found_posts,
        removed,
    })
}

/// Whether a query's type filter can return resources of the governed type.
pub fn may_include(query: &QueryDescriptor, governed_type: &str) -> bool {
    query
        .post_type
        .as_ref()
        .map_or(true, |filter| filter.includes(governed_type))
}

/// Drops governed documents outside the principal's terms.
pub struct ResultFilter {
    host: HostServices,
    cache: Arc<TermCache>,
    taxonomy: String,
    governed_type: String,
    allow_no_term_access: bool,
    zero_term_policy: ZeroTermPolicy,
}

impl ResultFilter {
    /// Create a filter.
    pub fn new(host: HostServices, cache: Arc<TermCache>, config: &PolicyConfig) -> Self {
        Self {
            host,
            cache,
            taxonomy: config.taxonomy.clone(),
            governed_type: config.governed_type.clone(),
            allow_no_term_access: config.allow_no_term_access,
            zero_term_policy: config.zero_term_policy,
        }
    }

    /// Filter a page of results for a principal.
    ///
    /// Administrators and queries that cannot return governed documents are
    /// passed through. A governed document is kept when one of its terms is
    /// among the principal's accessible terms. Documents without terms are
    /// kept only when no-term access is allowed, or when the zero-term
    /// policy falls back to base capabilities and the principal can read.
    pub fn filter(
        &self,
        principal: &Principal,
        results: Vec<Resource>,
        query: &QueryDescriptor,
    ) -> EngineResult<FilterOutcome<Resource>> {
        if self.host.principals.is_administrator(principal) || !may_include(query, &self.governed_type) {
            return Ok(FilterOutcome::unchanged(results, query.found_posts));
        }

        let user_terms = self.cache.user_terms(principal)?;
        let mut caps: Option<GrantMap> = None;

        let outcome = retain_accessible(results, query.found_posts, |resource| {
            if !resource.is_type(&self.governed_type) {
                return Ok(true);
            }

            let terms = self.host.terms.resolve_terms(resource.id, &self.taxonomy)?;
            if terms.is_empty() {
                return self.zero_terms_visible(principal, &mut caps);
            }
            Ok(terms.iter().any(|term| user_terms.contains(&term.id)))
        })?;

        if outcome.removed > 0 {
            debug!(
                principal = %principal.id,
                removed = outcome.removed,
                found_posts = outcome.found_posts,
                "Filtered inaccessible documents"
            );
        }
        Ok(outcome)
    }

    fn zero_terms_visible(&self, principal: &Principal, caps: &mut Option<GrantMap>) -> EngineResult<bool> {
        if self.allow_no_term_access {
            return Ok(true);
        }
        if self.zero_term_policy == ZeroTermPolicy::Deny {
            return Ok(false);
        }
        if caps.is_none() {
            *caps = Some(self.host.principals.effective_capabilities(principal)?);
        }
        Ok(caps.as_ref().map_or(false, |caps| {
            caps.is_granted(&Capability::Read) || caps.is_granted(&Capability::base(BaseAction::ReadDocuments))
        }))
    }
}

impl std::fmt::Debug for ResultFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultFilter")
            .field("taxonomy", &self.taxonomy)
            .field("governed_type", &self.governed_type)
            .finish_non_exhaustive()
    }
}
