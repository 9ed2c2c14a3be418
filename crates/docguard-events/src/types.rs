//! Event types for taxonomy changes
//!
//! Term lifecycle changes are published as events so the capability
//! registry (and anything else interested) can react to them.

use chrono::{DateTime, Utc};
use docguard_caps::TermId;
use docguard_taxonomy::{PrincipalId, Term};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::bus::{EventBusError, EventBusResult};

/// Event envelope.
///
/// All events are wrapped in this envelope which provides metadata
/// for routing, tracing, and processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event ID
    pub id: Uuid,

    /// Event type (e.g., "term.created", "term.deleted")
    pub event_type: String,

    /// Taxonomy the event belongs to
    pub taxonomy: String,

    /// Timestamp when event was created
    pub timestamp: DateTime<Utc>,

    /// User who triggered the event
    pub actor: Option<PrincipalId>,

    /// Correlation ID for tracing
    pub correlation_id: Option<String>,

    /// Event version for schema evolution
    pub version: u32,

    /// Event payload
    pub payload: serde_json::Value,

    /// Additional metadata
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl Event {
    /// Create a new event.
    ///
    /// # Arguments
    ///
    /// * `event_type` - The event type string
    /// * `taxonomy` - The taxonomy the event concerns
    /// * `payload` - The event payload
    pub fn new(event_type: impl Into<String>, taxonomy: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_type: event_type.into(),
            taxonomy: taxonomy.into(),
            timestamp: Utc::now(),
            actor: None,
            correlation_id: None,
            version: 1,
            payload,
            metadata: HashMap::new(),
        }
    }

    /// Set the acting user.
    pub fn with_actor(mut self, actor: PrincipalId) -> Self {
        self.actor = Some(actor);
        self
    }

    /// Set correlation ID.
    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Add metadata.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get the topic for this event.
    ///
    /// Topics are structured as: `{taxonomy}.{event_type}`
    pub fn topic(&self) -> String {
        format!("{}.{}", self.taxonomy, self.event_type)
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Term lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TermEvent {
    /// A term was created
    Created { term: Term },

    /// A term was renamed; its slug changed from `previous_slug`
    Renamed { term: Term, previous_slug: String },

    /// A term was deleted
    Deleted { term_id: TermId, slug: String },
}

impl TermEvent {
    /// Event type string, without the taxonomy prefix.
    pub fn event_type(&self) -> &'static str {
        match self {
            TermEvent::Created { .. } => "term.created",
            TermEvent::Renamed { .. } => "term.renamed",
            TermEvent::Deleted { .. } => "term.deleted",
        }
    }

    /// The term id this event concerns.
    pub fn term_id(&self) -> TermId {
        match self {
            TermEvent::Created { term } | TermEvent::Renamed { term, .. } => term.id,
            TermEvent::Deleted { term_id, .. } => *term_id,
        }
    }

    /// Convert to generic event.
    pub fn to_event(&self, taxonomy: impl Into<String>) -> EventBusResult<Event> {
        let payload =
            serde_json::to_value(self).map_err(|e| EventBusError::SerializationError(e.to_string()))?;
        Ok(Event::new(self.event_type(), taxonomy, payload))
    }

    /// Recover a term event from a generic event.
    ///
    /// Returns `None` for events that are not term events.
    pub fn from_event(event: &Event) -> Option<Self> {
        if !event.event_type.starts_with("term.") {
            return None;
        }
        event.parse_payload().ok()
    }
}
