//! Term capability registry
//!
//! Keeps every role's term-scoped grants in step with the taxonomy. Each
//! role gets one `<action>_in_<term>` entry per base action and term,
//! defaulting to the role's grant for the unscoped base action.
//!
//! Writes go straight to the host's role store and are not transactional.
//! A failure for one role does not stop the others; the caller gets
//! [`EngineError::SyncIncomplete`] and can re-run the (idempotent) sync.

use std::slice;

use docguard_caps::{BaseAction, Capability, GrantMap, TermId, TERM_SEPARATOR};
use docguard_taxonomy::{Role, TaxonomyDefinition, Term};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{EngineError, EngineResult, StoreError};
use crate::host::HostServices;

/// Outcome of a capability sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Roles visited
    pub roles: usize,
    /// Terms covered
    pub terms: usize,
    /// Capability entries written
    pub written: usize,
}

/// Maintains the {role × base action × term} grant table.
#[derive(Debug, Clone)]
pub struct Registry {
    host: HostServices,
    taxonomy: TaxonomyDefinition,
}

impl Registry {
    /// Create a registry for a taxonomy.
    pub fn new(host: HostServices, taxonomy: TaxonomyDefinition) -> Self {
        Self { host, taxonomy }
    }

    /// The governing taxonomy.
    pub fn taxonomy(&self) -> &TaxonomyDefinition {
        &self.taxonomy
    }

    /// Add term-scoped capabilities for every existing term.
    ///
    /// Entries a role already has are left alone, so explicit grants and
    /// denials survive and a second run writes nothing.
    ///
    /// # Arguments
    ///
    /// * `role` - Restrict the sync to one role; `None` syncs every role
    pub fn add_caps(&self, role: Option<&str>) -> EngineResult<SyncReport> {
        let terms = self.host.terms.terms(&self.taxonomy.name)?;
        self.sync_terms(role, &terms)
    }

    /// Add term-scoped capabilities for the given terms only.
    pub fn sync_terms(&self, role: Option<&str>, terms: &[Term]) -> EngineResult<SyncReport> {
        let names = self.role_names(role)?;

        let written = self.for_each_role(&names, |name| {
            let role = self.load_role(name)?;
            let mut written = 0;
            for (capability, granted) in self.missing_caps(&role, terms) {
                self.host.roles.add_cap(name, capability, granted)?;
                written += 1;
            }
            Ok(written)
        })?;

        let report = SyncReport {
            roles: names.len(),
            terms: terms.len(),
            written,
        };
        info!(
            taxonomy = %self.taxonomy.name,
            roles = report.roles,
            terms = report.terms,
            written = report.written,
            "Synchronised term capabilities"
        );
        Ok(report)
    }

    /// Remove every capability scoped to a term from every role.
    ///
    /// # Errors
    ///
    /// [`EngineError::TermNotFound`] if the term cannot be resolved; the
    /// caller must not carry on as if the capabilities were gone.
    pub fn remove_caps(&self, term: TermId) -> EngineResult<usize> {
        let resolved = self
            .host
            .terms
            .term(&self.taxonomy.name, term)?
            .ok_or(EngineError::TermNotFound(term))?;
        self.purge(resolved.id, &resolved.slug)
    }

    /// The complete default grant set for a role.
    ///
    /// Base grants, every term-scoped capability and the taxonomy's term
    /// management capabilities. Keys the role already has keep their value.
    pub fn default_caps_for(&self, role: &Role) -> EngineResult<GrantMap> {
        let terms = self.host.terms.terms(&self.taxonomy.name)?;

        let mut caps = role.grants.clone();
        for action in BaseAction::all() {
            caps.set_if_absent(Capability::base(action), role.base_grant(action));
        }
        for (capability, granted) in self.missing_caps(role, &terms) {
            caps.set_if_absent(capability, granted);
        }
        Ok(caps)
    }

    /// A term was created.
    pub fn on_term_created(&self, term: &Term) -> EngineResult<SyncReport> {
        info!(term_id = %term.id, slug = %term.slug, "Term created");
        self.sync_terms(None, slice::from_ref(term))
    }

    /// A term was renamed.
    ///
    /// Scoped grants are keyed by term id and carry over untouched. Grants
    /// still stored under the old slug's name are purged.
    pub fn on_term_renamed(&self, term: &Term, previous_slug: &str) -> EngineResult<SyncReport> {
        info!(term_id = %term.id, slug = %term.slug, previous_slug, "Term renamed");
        let report = self.sync_terms(None, slice::from_ref(term))?;
        if previous_slug != term.slug {
            let legacy = legacy_keys(previous_slug);
            self.remove_matching(|capability| legacy.contains(capability))?;
        }
        Ok(report)
    }

    /// A term was deleted.
    ///
    /// The term is usually gone from the store by now, so the slug comes
    /// from the event instead of a lookup.
    pub fn on_term_deleted(&self, term: TermId, slug: &str) -> EngineResult<usize> {
        info!(term_id = %term, slug, "Term deleted");
        self.purge(term, slug)
    }

    fn purge(&self, term: TermId, slug: &str) -> EngineResult<usize> {
        let legacy = legacy_keys(slug);
        self.remove_matching(|capability| capability.term() == Some(term) || legacy.contains(capability))
    }

    fn remove_matching<F>(&self, predicate: F) -> EngineResult<usize>
    where
        F: Fn(&Capability) -> bool,
    {
        let names = self.role_names(None)?;
        self.for_each_role(&names, |name| {
            let role = self.load_role(name)?;
            let doomed: Vec<Capability> = role
                .grants
                .iter()
                .map(|(capability, _)| capability)
                .filter(|capability| predicate(capability))
                .cloned()
                .collect();
            for capability in &doomed {
                self.host.roles.remove_cap(name, capability)?;
            }
            Ok(doomed.len())
        })
    }

    /// Capabilities the role lacks for the given terms, with their defaults.
    fn missing_caps(&self, role: &Role, terms: &[Term]) -> Vec<(Capability, bool)> {
        let mut missing = Vec::new();

        for term in terms {
            for action in BaseAction::all() {
                let capability = Capability::scoped(action, term.id);
                if !role.grants.contains(&capability) {
                    missing.push((capability, role.base_grant(action)));
                }
            }
        }

        // Term management follows the role's grant over other people's documents.
        let manage = role.base_grant(BaseAction::EditOthersDocuments);
        for capability in self.taxonomy.term_caps.all() {
            if !role.grants.contains(&capability) {
                missing.push((capability, manage));
            }
        }

        missing
    }

    fn role_names(&self, role: Option<&str>) -> EngineResult<Vec<String>> {
        match role {
            Some(name) => Ok(vec![name.to_string()]),
            None => Ok(self.host.roles.role_names()?),
        }
    }

    fn load_role(&self, name: &str) -> EngineResult<Role> {
        Ok(self
            .host
            .roles
            .role(name)?
            .ok_or_else(|| StoreError::RoleNotFound(name.to_string()))?)
    }

    /// Run `f` for every role, continuing past failures.
    fn for_each_role<F>(&self, names: &[String], mut f: F) -> EngineResult<usize>
    where
        F: FnMut(&str) -> EngineResult<usize>,
    {
        let mut total = 0;
        let mut failed_roles = Vec::new();

        for name in names {
            match f(name) {
                Ok(count) => total += count,
                Err(e) => {
                    error!(role = %name, error = %e, "Capability sync failed for role");
                    failed_roles.push(name.clone());
                }
            }
        }

        if failed_roles.is_empty() {
            Ok(total)
        } else {
            Err(EngineError::SyncIncomplete { failed_roles })
        }
    }
}

/// Slug-keyed names a term's capabilities may still be stored under.
fn legacy_keys(slug: &str) -> Vec<Capability> {
    BaseAction::all()
        .into_iter()
        .map(|action| Capability::named(format!("{}{}{}", action.as_str(), TERM_SEPARATOR, slug)))
        .collect()
}
