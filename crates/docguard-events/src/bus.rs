//! Event bus implementation
//!
//! This module provides the event bus abstraction and an in-process
//! implementation for publishing and subscribing to taxonomy events.

use crate::types::Event;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, RwLock};

/// Event bus error types.
#[derive(Debug, Error)]
pub enum EventBusError {
    /// Failed to publish event
    #[error("Failed to publish event: {0}")]
    PublishError(String),

    /// Failed to subscribe
    #[error("Failed to subscribe: {0}")]
    SubscribeError(String),

    /// Unknown subscription id
    #[error("Unknown subscription: {0}")]
    UnknownSubscription(String),

    /// Handler failed while processing an event
    #[error("Handler error: {0}")]
    HandlerError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Channel closed
    #[error("Channel closed")]
    ChannelClosed,
}

/// Result type for event bus operations.
pub type EventBusResult<T> = Result<T, EventBusError>;

/// Subscription handle for receiving events.
pub struct Subscription {
    /// Subscription ID
    pub id: String,
    /// Topic pattern
    pub topic: String,
    /// Event receiver
    pub receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receive the next event.
    pub async fn recv(&mut self) -> EventBusResult<Event> {
        self.receiver
            .recv()
            .await
            .map_err(|_| EventBusError::ChannelClosed)
    }
}

/// Event handler trait for processing events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: Event) -> EventBusResult<()>;

    /// Get the topics this handler is interested in.
    fn topics(&self) -> Vec<String>;
}

/// Event bus trait for publish/subscribe operations.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish an event.
    async fn publish(&self, event: Event) -> EventBusResult<()>;

    /// Subscribe to a topic pattern.
    ///
    /// Topic patterns support wildcards:
    /// - `*` matches any single segment
    /// - `#` matches zero or more segments
    ///
    /// Examples:
    /// - `department.term.*` matches `department.term.created`, `department.term.deleted`
    /// - `*.term.#` matches term events of any taxonomy
    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription>;

    /// Register an event handler.
    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()>;

    /// Unsubscribe from a topic.
    async fn unsubscribe(&self, subscription_id: &str) -> EventBusResult<()>;

    /// Get event bus stats.
    async fn stats(&self) -> EventBusStats;
}

/// Event bus statistics.
#[derive(Debug, Clone, Default)]
pub struct EventBusStats {
    /// Total events published
    pub events_published: u64,
    /// Total handler invocations that completed successfully
    pub events_delivered: u64,
    /// Handler invocations that returned an error
    pub handler_failures: u64,
    /// Active subscriptions
    pub active_subscriptions: usize,
    /// Registered handlers
    pub registered_handlers: usize,
}

/// How handlers are run when an event is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerDispatch {
    /// Each handler runs on its own spawned task; `publish` returns immediately.
    #[default]
    Spawned,
    /// Handlers are awaited in registration order before `publish` returns.
    ///
    /// Use this when a change must be fully applied before the next
    /// request, such as capability sync after a term edit.
    Inline,
}

/// In-memory event bus implementation.
///
/// This is suitable for single-process hosts and testing.
pub struct MemoryEventBus {
    /// Topic subscribers
    subscribers: Arc<RwLock<HashMap<String, broadcast::Sender<Event>>>>,
    /// Subscription id → topic pattern
    subscriptions: Arc<RwLock<HashMap<String, String>>>,
    /// Registered handlers
    handlers: Arc<RwLock<Vec<Arc<dyn EventHandler>>>>,
    /// Statistics
    stats: Arc<RwLock<EventBusStats>>,
    /// Default channel capacity
    channel_capacity: usize,
    /// Handler dispatch mode
    dispatch: HandlerDispatch,
}

impl std::fmt::Debug for MemoryEventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEventBus")
            .field("channel_capacity", &self.channel_capacity)
            .field("dispatch", &self.dispatch)
            .finish()
    }
}

impl MemoryEventBus {
    /// Create a new in-memory event bus.
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create with custom channel capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            handlers: Arc::new(RwLock::new(Vec::new())),
            stats: Arc::new(RwLock::new(EventBusStats::default())),
            channel_capacity: capacity,
            dispatch: HandlerDispatch::default(),
        }
    }

    /// Set the handler dispatch mode.
    pub fn with_dispatch(mut self, dispatch: HandlerDispatch) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Check if a topic matches a pattern.
    pub fn topic_matches(pattern: &str, topic: &str) -> bool {
        let pattern_parts: Vec<&str> = pattern.split('.').collect();
        let topic_parts: Vec<&str> = topic.split('.').collect();
        Self::segments_match(&pattern_parts, &topic_parts)
    }

    fn segments_match(pattern: &[&str], topic: &[&str]) -> bool {
        match (pattern.first(), topic.first()) {
            (None, None) => true,
            (Some(&"#"), _) => {
                // zero segments, or consume one and stay on `#`
                Self::segments_match(&pattern[1..], topic)
                    || (!topic.is_empty() && Self::segments_match(pattern, &topic[1..]))
            }
            (Some(&"*"), Some(_)) => Self::segments_match(&pattern[1..], &topic[1..]),
            (Some(segment), Some(actual)) => {
                segment == actual && Self::segments_match(&pattern[1..], &topic[1..])
            }
            _ => false,
        }
    }

    async fn record_handler_result(&self, result: EventBusResult<()>) {
        let mut stats = self.stats.write().await;
        match result {
            Ok(()) => stats.events_delivered += 1,
            Err(e) => {
                stats.handler_failures += 1;
                tracing::error!(error = %e, "Event handler failed");
            }
        }
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for MemoryEventBus {
    async fn publish(&self, event: Event) -> EventBusResult<()> {
        let topic = event.topic();

        {
            let mut stats = self.stats.write().await;
            stats.events_published += 1;
        }

        // Notify matching subscribers
        {
            let subscribers = self.subscribers.read().await;
            for (pattern, sender) in subscribers.iter() {
                if Self::topic_matches(pattern, &topic) {
                    let _ = sender.send(event.clone());
                }
            }
        }

        // Notify handlers
        let matching: Vec<Arc<dyn EventHandler>> = {
            let handlers = self.handlers.read().await;
            handlers
                .iter()
                .filter(|handler| {
                    handler
                        .topics()
                        .iter()
                        .any(|handler_topic| Self::topic_matches(handler_topic, &topic))
                })
                .cloned()
                .collect()
        };

        for handler in matching {
            match self.dispatch {
                HandlerDispatch::Inline => {
                    let result = handler.handle(event.clone()).await;
                    self.record_handler_result(result).await;
                }
                HandlerDispatch::Spawned => {
                    let event = event.clone();
                    let stats = self.stats.clone();
                    tokio::task::spawn(async move {
                        let result = handler.handle(event).await;
                        let mut stats = stats.write().await;
                        match result {
                            Ok(()) => stats.events_delivered += 1,
                            Err(e) => {
                                stats.handler_failures += 1;
                                tracing::error!(error = %e, "Event handler failed");
                            }
                        }
                    });
                }
            }
        }

        tracing::debug!(topic = %topic, event_id = %event.id, "Published event");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> EventBusResult<Subscription> {
        if topic.is_empty() {
            return Err(EventBusError::SubscribeError("empty topic pattern".to_string()));
        }

        let id = uuid::Uuid::now_v7().to_string();

        let receiver = {
            let mut subscribers = self.subscribers.write().await;

            if let Some(sender) = subscribers.get(topic) {
                sender.subscribe()
            } else {
                let (sender, receiver) = broadcast::channel(self.channel_capacity);
                subscribers.insert(topic.to_string(), sender);
                receiver
            }
        };

        self.subscriptions
            .write()
            .await
            .insert(id.clone(), topic.to_string());

        {
            let mut stats = self.stats.write().await;
            stats.active_subscriptions += 1;
        }

        Ok(Subscription {
            id,
            topic: topic.to_string(),
            receiver,
        })
    }

    async fn register_handler(&self, handler: Arc<dyn EventHandler>) -> EventBusResult<()> {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);

        {
            let mut stats = self.stats.write().await;
            stats.registered_handlers += 1;
        }

        Ok(())
    }

    async fn unsubscribe(&self, subscription_id: &str) -> EventBusResult<()> {
        {
            // Same lock order as subscribe.
            let mut subscribers = self.subscribers.write().await;
            let mut subscriptions = self.subscriptions.write().await;

            let Some(topic) = subscriptions.remove(subscription_id) else {
                return Err(EventBusError::UnknownSubscription(subscription_id.to_string()));
            };
            if !subscriptions.values().any(|t| *t == topic) {
                subscribers.remove(&topic);
            }
        }

        let mut stats = self.stats.write().await;
        stats.active_subscriptions = stats.active_subscriptions.saturating_sub(1);

        Ok(())
    }

    async fn stats(&self) -> EventBusStats {
        self.stats.read().await.clone()
    }
}
