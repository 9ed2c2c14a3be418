//! Pre-query filter injection
//!
//! Listing governed documents directly is cheaper to restrict in the query
//! than after the fact. The injector adds the principal's accessible-term
//! clause to the query's taxonomy filter before the host runs it.
//!
//! ```text
//! existing: none          → user
//! existing: A AND B       → A AND B AND user
//! existing: A OR B        → user AND (A OR B)
//! user has no access      → post_in = []   (matches nothing)
//! ```

use std::sync::Arc;

use docguard_caps::TermId;
use docguard_taxonomy::{PostTypeFilter, Principal, ResourceId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::TermCache;
use crate::error::EngineResult;
use crate::host::PrincipalStore;

/// How the queries of a group combine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relation {
    /// Every query must match
    And,
    /// Any query may match
    Or,
}

/// A taxonomy filter tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "operator", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaxQuery {
    /// Resource has at least one of the terms
    In {
        /// Taxonomy name
        taxonomy: String,
        /// Accepted terms
        terms: Vec<TermId>,
    },
    /// Resource has no term in the taxonomy
    NotExists {
        /// Taxonomy name
        taxonomy: String,
    },
    /// Combination of filters
    Group {
        /// How members combine
        relation: Relation,
        /// Members
        queries: Vec<TaxQuery>,
    },
}

impl TaxQuery {
    /// Evaluate the filter for one resource.
    ///
    /// `terms_of` returns the resource's terms in a taxonomy. An empty
    /// group matches everything.
    ///
    /// # Example
    ///
    /// ```
    /// use docguard_caps::TermId;
    /// use docguard_engine::TaxQuery;
    ///
    /// let query = TaxQuery::In { taxonomy: "department".to_string(), terms: vec![TermId(2)] };
    /// assert!(query.matches(&|_: &str| vec![TermId(1), TermId(2)]));
    /// assert!(!query.matches(&|_: &str| Vec::new()));
    /// ```
    pub fn matches(&self, terms_of: &dyn Fn(&str) -> Vec<TermId>) -> bool {
        match self {
            TaxQuery::In { taxonomy, terms } => terms_of(taxonomy).iter().any(|t| terms.contains(t)),
            TaxQuery::NotExists { taxonomy } => terms_of(taxonomy).is_empty(),
            TaxQuery::Group { queries, .. } if queries.is_empty() => true,
            TaxQuery::Group {
                relation: Relation::And,
                queries,
            } => queries.iter().all(|q| q.matches(terms_of)),
            TaxQuery::Group {
                relation: Relation::Or,
                queries,
            } => queries.iter().any(|q| q.matches(terms_of)),
        }
    }

    /// Combine an existing filter with the principal's clause.
    ///
    /// An AND group (or a single filter) gains the clause as one more
    /// member; an OR group is pushed down under a new AND.
    pub fn restrict(existing: Option<TaxQuery>, user: TaxQuery) -> TaxQuery {
        match existing {
            None => user,
            Some(TaxQuery::Group {
                relation: Relation::And,
                mut queries,
            }) => {
                queries.push(user);
                TaxQuery::Group {
                    relation: Relation::And,
                    queries,
                }
            }
            Some(or_group @ TaxQuery::Group { relation: Relation::Or, .. }) => TaxQuery::Group {
                relation: Relation::And,
                queries: vec![user, or_group],
            },
            Some(single) => TaxQuery::Group {
                relation: Relation::And,
                queries: vec![single, user],
            },
        }
    }
}

/// The taxonomy clause describing what a principal may list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "query", rename_all = "snake_case")]
pub enum UserTaxQuery {
    /// Nothing is accessible
    NoAccess,
    /// Resources matching this filter are accessible
    Query(TaxQuery),
}

impl UserTaxQuery {
    /// Build the clause from the principal's accessible terms.
    ///
    /// # Arguments
    ///
    /// * `taxonomy` - Governing taxonomy
    /// * `terms` - Terms the principal holds any scoped capability for
    /// * `allow_no_term_access` - Whether resources without terms are accessible
    pub fn build(taxonomy: &str, terms: Vec<TermId>, allow_no_term_access: bool) -> Self {
        let not_exists = || TaxQuery::NotExists {
            taxonomy: taxonomy.to_string(),
        };

        match (terms.is_empty(), allow_no_term_access) {
            (true, false) => UserTaxQuery::NoAccess,
            (true, true) => UserTaxQuery::Query(not_exists()),
            (false, false) => UserTaxQuery::Query(TaxQuery::In {
                taxonomy: taxonomy.to_string(),
                terms,
            }),
            (false, true) => UserTaxQuery::Query(TaxQuery::Group {
                relation: Relation::Or,
                queries: vec![
                    TaxQuery::In {
                        taxonomy: taxonomy.to_string(),
                        terms,
                    },
                    not_exists(),
                ],
            }),
        }
    }

    /// Check if nothing is accessible.
    pub fn is_no_access(&self) -> bool {
        matches!(self, UserTaxQuery::NoAccess)
    }
}

/// The parts of a listing query the engine reads and rewrites.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// Post-type restriction; `None` means any type
    pub post_type: Option<PostTypeFilter>,

    /// Taxonomy filter
    pub tax_query: Option<TaxQuery>,

    /// Explicit id allow-list; `Some(empty)` matches nothing
    pub post_in: Option<Vec<ResourceId>>,

    /// Total number of matches reported to the caller
    pub found_posts: usize,
}

impl QueryDescriptor {
    /// An unrestricted query.
    pub fn new() -> Self {
        Self::default()
    }

    /// A query for a single post type.
    pub fn for_type(post_type: impl Into<String>) -> Self {
        Self::new().with_post_type(PostTypeFilter::Single(post_type.into()))
    }

    /// Set the post-type restriction.
    pub fn with_post_type(mut self, post_type: PostTypeFilter) -> Self {
        self.post_type = Some(post_type);
        self
    }

    /// Set the taxonomy filter.
    pub fn with_tax_query(mut self, tax_query: TaxQuery) -> Self {
        self.tax_query = Some(tax_query);
        self
    }

    /// Set the id allow-list.
    pub fn with_post_in(mut self, ids: Vec<ResourceId>) -> Self {
        self.post_in = Some(ids);
        self
    }

    /// Check whether the query lists exactly one post type, and it is this one.
    pub fn is_single_type(&self, post_type: &str) -> bool {
        self.post_type
            .as_ref()
            .map_or(false, |filter| filter.is_exactly(post_type))
    }
}

/// Adds access restrictions to listing queries.
pub struct QueryInjector {
    governed_type: String,
    cache: Arc<TermCache>,
    principals: Arc<dyn PrincipalStore>,
}

impl QueryInjector {
    /// Create an injector.
    pub fn new(governed_type: impl Into<String>, cache: Arc<TermCache>, principals: Arc<dyn PrincipalStore>) -> Self {
        Self {
            governed_type: governed_type.into(),
            cache,
            principals,
        }
    }

    /// Restrict a query to what the principal may access.
    ///
    /// Only queries for exactly the governed type are touched, and never
    /// for administrators. Everything else comes back unchanged.
    pub fn augment(&self, principal: &Principal, mut query: QueryDescriptor) -> EngineResult<QueryDescriptor> {
        if !query.is_single_type(&self.governed_type) || self.principals.is_administrator(principal) {
            return Ok(query);
        }

        match self.cache.user_tax_query(principal)? {
            UserTaxQuery::NoAccess => {
                debug!(principal = %principal.id, "No accessible terms, query restricted to nothing");
                query.post_in = Some(Vec::new());
            }
            UserTaxQuery::Query(user) => {
                query.tax_query = Some(TaxQuery::restrict(query.tax_query.take(), user));
            }
        }
        Ok(query)
    }
}

impl std::fmt::Debug for QueryInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryInjector")
            .field("governed_type", &self.governed_type)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_terms(ids: &[u64]) -> TaxQuery {
        TaxQuery::In {
            taxonomy: "department".to_string(),
            terms: ids.iter().copied().map(TermId).collect(),
        }
    }

    fn not_exists() -> TaxQuery {
        TaxQuery::NotExists {
            taxonomy: "department".to_string(),
        }
    }

    #[test]
    fn test_build_user_tax_query() {
        assert_eq!(UserTaxQuery::build("department", vec![], false), UserTaxQuery::NoAccess);
        assert_eq!(
            UserTaxQuery::build("department", vec![], true),
            UserTaxQuery::Query(not_exists())
        );
        assert_eq!(
            UserTaxQuery::build("department", vec![TermId(1)], false),
            UserTaxQuery::Query(in_terms(&[1]))
        );
        assert_eq!(
            UserTaxQuery::build("department", vec![TermId(1)], true),
            UserTaxQuery::Query(TaxQuery::Group {
                relation: Relation::Or,
                queries: vec![in_terms(&[1]), not_exists()],
            })
        );
    }

    #[test]
    fn test_restrict_appends_to_and_group() {
        let existing = TaxQuery::Group {
            relation: Relation::And,
            queries: vec![in_terms(&[5])],
        };
        let merged = TaxQuery::restrict(Some(existing), in_terms(&[1]));
        assert_eq!(
            merged,
            TaxQuery::Group {
                relation: Relation::And,
                queries: vec![in_terms(&[5]), in_terms(&[1])],
            }
        );
    }

    #[test]
    fn test_restrict_wraps_or_group() {
        let existing = TaxQuery::Group {
            relation: Relation::Or,
            queries: vec![in_terms(&[5]), in_terms(&[6])],
        };
        let merged = TaxQuery::restrict(Some(existing.clone()), in_terms(&[1]));
        assert_eq!(
            merged,
            TaxQuery::Group {
                relation: Relation::And,
                queries: vec![in_terms(&[1]), existing],
            }
        );
    }

    #[test]
    fn test_restrict_without_existing() {
        assert_eq!(TaxQuery::restrict(None, in_terms(&[1])), in_terms(&[1]));
    }

    #[test]
    fn test_matches_groups() {
        let or = TaxQuery::Group {
            relation: Relation::Or,
            queries: vec![in_terms(&[1]), not_exists()],
        };
        assert!(or.matches(&|_: &str| Vec::new()));
        assert!(or.matches(&|_: &str| vec![TermId(1)]));
        assert!(!or.matches(&|_: &str| vec![TermId(2)]));

        let and = TaxQuery::Group {
            relation: Relation::And,
            queries: vec![in_terms(&[1, 2]), in_terms(&[2])],
        };
        assert!(and.matches(&|_: &str| vec![TermId(2)]));
        assert!(!and.matches(&|_: &str| vec![TermId(1)]));

        let empty = TaxQuery::Group {
            relation: Relation::Or,
            queries: Vec::new(),
        };
        assert!(empty.matches(&|_: &str| Vec::new()));
    }

    #[test]
    fn test_is_single_type() {
        assert!(QueryDescriptor::for_type("document").is_single_type("document"));
        assert!(!QueryDescriptor::new().is_single_type("document"));
        assert!(!QueryDescriptor::new()
            .with_post_type(PostTypeFilter::Many(vec!["document".to_string()]))
            .is_single_type("document"));
    }

    #[test]
    fn test_tax_query_serde_shape() {
        let json = serde_json::to_value(in_terms(&[3])).unwrap();
        assert_eq!(json["operator"], "IN");
        assert_eq!(json["terms"], serde_json::json!([3]));
    }
}
