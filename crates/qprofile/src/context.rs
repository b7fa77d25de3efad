//! Shared state handed to every pass of a profile pipeline.
//!
//! A [`PassContext`] owns the two allocation managers and the value tracker
//! of a profile. Passes read and update them while rewriting a module, and
//! the profile exposes them afterwards. Passes that need to hand extra data
//! to later passes can store it as a custom property keyed by type.
//!
//! ```
//! use qprofile::{PassContext, ResourceKind};
//!
//! #[derive(Debug, PartialEq)]
//! struct RewriteStats {
//!     calls_removed: usize,
//! }
//!
//! let mut ctx = PassContext::default();
//! ctx.insert(RewriteStats { calls_removed: 4 });
//!
//! assert_eq!(ctx.get::<RewriteStats>().unwrap().calls_removed, 4);
//! assert_eq!(ctx.manager(ResourceKind::Qubit).max_used(), 0);
//! ```

use rustc_hash::FxHashMap;
use std::any::{Any, TypeId};
use std::fmt;

use crate::allocation::{AllocationManager, BasicAllocationManager, ResourceKind};
use crate::tracker::ValueTracker;

/// Allocation and tracking state shared across passes.
pub struct PassContext {
    qubits: Box<dyn AllocationManager>,
    results: Box<dyn AllocationManager>,
    tracker: ValueTracker,
    custom: FxHashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl PassContext {
    /// Create a context from its collaborators.
    pub fn new(
        qubits: Box<dyn AllocationManager>,
        results: Box<dyn AllocationManager>,
        tracker: ValueTracker,
    ) -> Self {
        Self {
            qubits,
            results,
            tracker,
            custom: FxHashMap::default(),
        }
    }

    /// The manager for `kind`.
    pub fn manager(&self, kind: ResourceKind) -> &dyn AllocationManager {
        match kind {
            ResourceKind::Qubit => self.qubits.as_ref(),
            ResourceKind::Result => self.results.as_ref(),
        }
    }

    /// Mutable access to the manager for `kind`.
    pub fn manager_mut(&mut self, kind: ResourceKind) -> &mut dyn AllocationManager {
        match kind {
            ResourceKind::Qubit => self.qubits.as_mut(),
            ResourceKind::Result => self.results.as_mut(),
        }
    }

    /// The value tracker.
    pub fn tracker(&self) -> &ValueTracker {
        &self.tracker
    }

    /// Mutable access to the value tracker.
    pub fn tracker_mut(&mut self) -> &mut ValueTracker {
        &mut self.tracker
    }

    /// Split borrow of one manager and the tracker.
    pub fn manager_and_tracker(
        &mut self,
        kind: ResourceKind,
    ) -> (&mut dyn AllocationManager, &mut ValueTracker) {
        let manager = match kind {
            ResourceKind::Qubit => self.qubits.as_mut(),
            ResourceKind::Result => self.results.as_mut(),
        };
        (manager, &mut self.tracker)
    }

    /// Insert a custom property.
    pub fn insert<T: Any + Send + Sync>(&mut self, value: T) {
        self.custom.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Get a custom property.
    pub fn get<T: Any>(&self) -> Option<&T> {
        self.custom
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref())
    }

    /// Get a mutable custom property.
    pub fn get_mut<T: Any>(&mut self) -> Option<&mut T> {
        self.custom
            .get_mut(&TypeId::of::<T>())
            .and_then(|v| v.downcast_mut())
    }

    /// Remove a custom property.
    pub fn remove<T: Any>(&mut self) -> Option<T> {
        self.custom
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast().ok())
            .map(|v| *v)
    }
}

impl Default for PassContext {
    fn default() -> Self {
        Self::new(
            Box::new(BasicAllocationManager::no_reuse()),
            Box::new(BasicAllocationManager::no_reuse()),
            ValueTracker::new(),
        )
    }
}

impl fmt::Debug for PassContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PassContext")
            .field("qubits", &self.qubits)
            .field("results", &self.results)
            .field("tracked_values", &self.tracker.len())
            .field("custom_properties", &self.custom.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::{AllocationPolicy, Handle};

    #[test]
    fn test_pools_are_independent() {
        let mut ctx = PassContext::new(
            Box::new(BasicAllocationManager::reuse()),
            Box::new(BasicAllocationManager::no_reuse()),
            ValueTracker::new(),
        );
        ctx.manager_mut(ResourceKind::Qubit).allocate().unwrap();
        ctx.manager_mut(ResourceKind::Qubit).allocate().unwrap();
        let r = ctx.manager_mut(ResourceKind::Result).allocate().unwrap();

        assert_eq!(r, Handle(0));
        assert_eq!(ctx.manager(ResourceKind::Qubit).max_used(), 2);
        assert!(ctx.manager(ResourceKind::Qubit).reuses_handles());
        assert!(!ctx.manager(ResourceKind::Result).reuses_handles());
    }

    #[test]
    fn test_custom_properties() {
        let mut ctx = PassContext::default();
        ctx.insert(AllocationPolicy::Reuse);
        assert_eq!(ctx.get::<AllocationPolicy>(), Some(&AllocationPolicy::Reuse));

        *ctx.get_mut::<AllocationPolicy>().unwrap() = AllocationPolicy::NoReuse;
        assert_eq!(ctx.remove::<AllocationPolicy>(), Some(AllocationPolicy::NoReuse));
        assert!(ctx.get::<AllocationPolicy>().is_none());
    }
}
