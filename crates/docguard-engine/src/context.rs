//! Per-check call context
//!
//! Threaded down the call chain of a single capability check. Nested
//! checks (a view-permission provider asking whether the principal holds
//! some other capability) run with re-entry suppressed, so the mapper
//! cannot recurse into itself.

use docguard_taxonomy::ResourceId;

/// Context for one capability check.
///
/// # Example
///
/// ```
/// use docguard_engine::CheckContext;
/// use docguard_taxonomy::ResourceId;
///
/// let ctx = CheckContext::new().with_current_resource(ResourceId(7));
/// assert!(!ctx.suppress_reentry());
///
/// let nested = ctx.nested();
/// assert!(nested.suppress_reentry());
/// assert_eq!(nested.depth(), 1);
/// assert_eq!(nested.current_resource(), Some(ResourceId(7)));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckContext {
    suppress_reentry: bool,
    current_resource: Option<ResourceId>,
    depth: u8,
}

impl CheckContext {
    /// A top-level check.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resource a check falls back to when none is passed.
    pub fn with_current_resource(mut self, resource: ResourceId) -> Self {
        self.current_resource = Some(resource);
        self
    }

    /// Context for a check issued from inside this one.
    pub fn nested(&self) -> Self {
        Self {
            suppress_reentry: true,
            current_resource: self.current_resource,
            depth: self.depth.saturating_add(1),
        }
    }

    /// Whether the mapper must leave requirements untouched.
    pub fn suppress_reentry(&self) -> bool {
        self.suppress_reentry
    }

    /// The ambient resource, if any.
    pub fn current_resource(&self) -> Option<ResourceId> {
        self.current_resource
    }

    /// Nesting depth; 0 for a top-level check.
    pub fn depth(&self) -> u8 {
        self.depth
    }
}
