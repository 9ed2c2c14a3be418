//! # Docguard Events
//!
//! Term lifecycle events and an in-process event bus.
//!
//! ## Overview
//!
//! The docguard-events crate handles:
//! - **Event Envelope**: Routing metadata around a JSON payload
//! - **Term Events**: Created, renamed and deleted notifications for taxonomy terms
//! - **Event Bus**: Publish/subscribe messaging
//! - **Event Handlers**: Async event processing, spawned or inline
//!
//! ## Features
//!
//! - `memory` (default): In-memory event bus for single-process hosts
//!
//! ## Usage
//!
//! ### Publishing Events
//!
//! ```rust,no_run
//! use docguard_caps::TermId;
//! use docguard_events::{EventBus, MemoryEventBus, TermEvent};
//! use docguard_taxonomy::Term;
//!
//! async fn publish_example() {
//!     let bus = MemoryEventBus::new();
//!
//!     let created = TermEvent::Created {
//!         term: Term::new(TermId(12), "department", "Accounting"),
//!     };
//!
//!     bus.publish(created.to_event("department").unwrap()).await.unwrap();
//! }
//! ```
//!
//! ### Subscribing to Events
//!
//! ```rust,no_run
//! use docguard_events::{EventBus, MemoryEventBus, TermEvent};
//!
//! async fn subscribe_example() {
//!     let bus = MemoryEventBus::new();
//!
//!     // All term events of the department taxonomy
//!     let mut sub = bus.subscribe("department.term.*").await.unwrap();
//!
//!     while let Ok(event) = sub.recv().await {
//!         if let Some(term_event) = TermEvent::from_event(&event) {
//!             println!("term {} changed", term_event.term_id());
//!         }
//!     }
//! }
//! ```
//!
//! ## Topic Patterns
//!
//! Topics are structured as `{taxonomy}.{event_type}`:
//! - `department.term.created` - Specific event
//! - `department.term.*` - All term events of one taxonomy
//! - `*.term.#` - Term events of any taxonomy
//! - `#` - All events
//!
//! Wildcards:
//! - `*` matches exactly one segment
//! - `#` matches zero or more segments

pub mod bus;
pub mod types;

// Re-export main types
pub use bus::{
    EventBus, EventBusError, EventBusResult, EventBusStats, EventHandler, HandlerDispatch, MemoryEventBus,
    Subscription,
};
pub use types::{Event, TermEvent};
