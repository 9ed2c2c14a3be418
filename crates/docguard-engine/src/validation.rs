//! Publish-time term validation
//!
//! A governed document may only be published with a usable set of terms.
//! A violation is not an error: the host sends the editor back to the edit
//! form with a message naming the problem.

use std::collections::HashMap;

use docguard_caps::TermId;
use docguard_taxonomy::{ResourceId, ResourceStatus};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PolicyConfig;

/// Query parameter carrying the violation on the redirect.
pub const REASON_PARAM: &str = "docguard_tax_perm";

/// A save request as submitted by the editor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishSubmission {
    /// Document being saved
    pub resource: ResourceId,

    /// Post type of the document
    pub post_type: String,

    /// Requested status
    pub status: ResourceStatus,

    /// Submitted terms per taxonomy; the placeholder id `0` is ignored
    #[serde(default)]
    pub tax_input: HashMap<String, Vec<TermId>>,

    /// Path of the form the request came from
    #[serde(default)]
    pub referer: String,
}

impl PublishSubmission {
    /// A submission without terms.
    pub fn new(resource: ResourceId, post_type: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            resource,
            post_type: post_type.into(),
            status,
            tax_input: HashMap::new(),
            referer: String::new(),
        }
    }

    /// Submit terms for a taxonomy.
    pub fn with_terms<I>(mut self, taxonomy: impl Into<String>, terms: I) -> Self
    where
        I: IntoIterator<Item = TermId>,
    {
        self.tax_input.insert(taxonomy.into(), terms.into_iter().collect());
        self
    }

    /// Set the referring form path.
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }
}

/// Why a publish was refused.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TermCountViolation {
    /// The taxonomy was not submitted at all
    Zero,
    /// The taxonomy was submitted without terms
    None,
    /// More than one term where one is allowed
    Many,
}

impl TermCountViolation {
    /// Get the reason key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Zero => "zero",
            Self::None => "none",
            Self::Many => "many",
        }
    }

    /// Parse a reason key.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zero" => Some(Self::Zero),
            "none" => Some(Self::None),
            "many" => Some(Self::Many),
            _ => None,
        }
    }

    /// Message shown on the edit form.
    pub fn message(&self, taxonomy: &str) -> String {
        match self {
            Self::Zero => format!("Published documents require the taxonomy {} to be entered.", taxonomy),
            Self::None => format!("Published documents require one term entered for taxonomy {}.", taxonomy),
            Self::Many => format!("Published documents may only have one term entered for taxonomy {}.", taxonomy),
        }
    }
}

/// Where to send the editor after a refused publish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishRedirect {
    /// Document that was refused
    pub resource: ResourceId,
    /// Reason
    pub reason: TermCountViolation,
    /// Message for the edit form
    pub message: String,
    /// Redirect target: the referring form, reopened for editing
    pub location: String,
}

/// Check the submitted terms of a publish request.
///
/// Only submissions of the governed type at `Publish` status are checked.
/// The first rule that fails wins.
///
/// # Errors
///
/// A [`PublishRedirect`] back to the edit form.
pub fn validate_publish(config: &PolicyConfig, submission: &PublishSubmission) -> Result<(), PublishRedirect> {
    if submission.post_type != config.governed_type || submission.status != ResourceStatus::Publish {
        return Ok(());
    }

    let Some(violation) = term_count_violation(config, submission) else {
        return Ok(());
    };

    warn!(
        resource = %submission.resource,
        taxonomy = %config.taxonomy,
        reason = violation.as_str(),
        "Publish refused"
    );
    Err(PublishRedirect {
        resource: submission.resource,
        reason: violation,
        message: violation.message(&config.taxonomy),
        location: redirect_location(&submission.referer, submission.resource, violation),
    })
}

fn term_count_violation(config: &PolicyConfig, submission: &PublishSubmission) -> Option<TermCountViolation> {
    let Some(submitted) = submission.tax_input.get(&config.taxonomy) else {
        return (!config.allow_no_term_access).then_some(TermCountViolation::Zero);
    };
    let count = submitted.iter().filter(|id| id.0 != 0).count();

    if count == 0 && !config.allow_no_term_access {
        return Some(TermCountViolation::None);
    }
    if count > 1 && config.only_one_term {
        return Some(TermCountViolation::Many);
    }
    None
}

fn redirect_location(referer: &str, resource: ResourceId, violation: TermCountViolation) -> String {
    let base = if referer.is_empty() { "/" } else { referer };
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{}{}post={}&action=edit&{}={}",
        base,
        separator,
        resource,
        REASON_PARAM,
        violation.as_str()
    )
}
