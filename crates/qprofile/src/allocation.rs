//! Allocation managers that turn dynamic acquisitions into static addresses.
//!
//! Each [`ResourceKind`] has its own pool, driven by an [`AllocationManager`].
//! The default [`BasicAllocationManager`] supports two policies:
//!
//! | Policy | `allocate` | `release` |
//! |--------|------------|-----------|
//! | [`AllocationPolicy::NoReuse`] | next fresh handle | rejected |
//! | [`AllocationPolicy::Reuse`] | smallest released handle, else fresh | returns handle to the free-list |
//!
//! A manager built with a capacity is bounded and fails with
//! [`AllocationError::ResourceExhausted`] once it cannot issue a handle.
//!
//! ```
//! use qprofile::{AllocationManager, BasicAllocationManager, Handle};
//!
//! let mut qubits = BasicAllocationManager::reuse();
//! let a = qubits.allocate().unwrap();
//! let b = qubits.allocate().unwrap();
//! qubits.release(a).unwrap();
//!
//! assert_eq!(qubits.allocate().unwrap(), a);
//! assert_eq!(b, Handle(1));
//! assert_eq!(qubits.max_used(), 2);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use qprofile_ir::{Operand, Type};

use crate::error::{AllocationError, AllocationResult, InvalidHandleReason};

/// A static address inside one resource pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Handle(pub u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An independent resource pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Qubits.
    Qubit,
    /// Measurement results.
    Result,
}

impl ResourceKind {
    /// The static operand addressing `handle` in this pool.
    pub fn operand(self, handle: Handle) -> Operand {
        match self {
            ResourceKind::Qubit => Operand::Qubit(handle.0),
            ResourceKind::Result => Operand::Result(handle.0),
        }
    }

    /// The static handle an operand addresses in this pool, if any.
    pub fn handle_of(self, operand: &Operand) -> Option<Handle> {
        match (self, operand) {
            (ResourceKind::Qubit, Operand::Qubit(h)) | (ResourceKind::Result, Operand::Result(h)) => {
                Some(Handle(*h))
            }
            _ => None,
        }
    }

    /// The IR type of a single resource of this kind.
    pub fn value_type(self) -> Type {
        match self {
            ResourceKind::Qubit => Type::Qubit,
            ResourceKind::Result => Type::Result,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Qubit => f.write_str("qubit"),
            ResourceKind::Result => f.write_str("result"),
        }
    }
}

/// Reuse policy of a [`BasicAllocationManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AllocationPolicy {
    /// Every acquisition gets a fresh, increasing handle.
    #[default]
    NoReuse,
    /// Released handles are handed out again, smallest first.
    Reuse,
}

/// Assigns static handles to resource acquisitions.
///
/// Managers are owned by one profile for one compilation and are never
/// shared between threads, hence `Send` but no `Sync` bound.
pub trait AllocationManager: Send + fmt::Debug {
    /// Issue an unused handle.
    fn allocate(&mut self) -> AllocationResult<Handle>;

    /// Reserve `size` contiguous fresh handles and return the first.
    ///
    /// Blocks never come from the free-list. A zero-sized block reserves
    /// nothing and returns the current high-water mark.
    fn allocate_block(&mut self, size: u64) -> AllocationResult<Handle>;

    /// Return a handle to the pool.
    fn release(&mut self, handle: Handle) -> AllocationResult<()>;

    /// Number of handles ever issued (the high-water mark).
    fn max_used(&self) -> u64;

    /// Forget all issued and released handles.
    fn reset(&mut self);

    /// Whether released handles are handed out again.
    fn reuses_handles(&self) -> bool;

    /// Number of handles currently issued and not released.
    fn live_count(&self) -> u64;
}

/// Default allocation manager: a high-water mark plus an ordered free-list.
#[derive(Debug, Clone, Default)]
pub struct BasicAllocationManager {
    policy: AllocationPolicy,
    capacity: Option<u64>,
    high_water: u64,
    free: BTreeSet<Handle>,
}

impl BasicAllocationManager {
    /// Create an unbounded manager with the given policy.
    pub fn new(policy: AllocationPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Unbounded manager that never reuses handles.
    pub fn no_reuse() -> Self {
        Self::new(AllocationPolicy::NoReuse)
    }

    /// Unbounded manager that reuses released handles.
    pub fn reuse() -> Self {
        Self::new(AllocationPolicy::Reuse)
    }

    /// Manager that never holds more than `capacity` handles.
    pub fn bounded(policy: AllocationPolicy, capacity: u64) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(policy)
        }
    }

    /// The reuse policy.
    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// The capacity, if bounded.
    pub fn capacity(&self) -> Option<u64> {
        self.capacity
    }

    /// Reserve `size` fresh handles past the high-water mark.
    ///
    /// An unbounded manager reports exhaustion at `u64::MAX` handles.
    fn reserve(&mut self, size: u64) -> AllocationResult<Handle> {
        let capacity = self.capacity.unwrap_or(u64::MAX);
        match self.high_water.checked_add(size) {
            Some(end) if end <= capacity => {
                let base = Handle(self.high_water);
                self.high_water = end;
                Ok(base)
            }
            _ => Err(AllocationError::ResourceExhausted { capacity }),
        }
    }
}

impl AllocationManager for BasicAllocationManager {
    fn allocate(&mut self) -> AllocationResult<Handle> {
        if self.policy == AllocationPolicy::Reuse {
            if let Some(handle) = self.free.pop_first() {
                return Ok(handle);
            }
        }
        self.reserve(1)
    }

    fn allocate_block(&mut self, size: u64) -> AllocationResult<Handle> {
        self.reserve(size)
    }

    fn release(&mut self, handle: Handle) -> AllocationResult<()> {
        if handle.0 >= self.high_water {
            return Err(AllocationError::InvalidHandle {
                handle,
                reason: InvalidHandleReason::NeverIssued,
            });
        }
        if self.free.contains(&handle) {
            return Err(AllocationError::InvalidHandle {
                handle,
                reason: InvalidHandleReason::AlreadyReleased,
            });
        }
        match self.policy {
            AllocationPolicy::NoReuse => Err(AllocationError::ReleaseUnsupported { handle }),
            AllocationPolicy::Reuse => {
                self.free.insert(handle);
                Ok(())
            }
        }
    }

    fn max_used(&self) -> u64 {
        self.high_water
    }

    fn reset(&mut self) {
        self.high_water = 0;
        self.free.clear();
    }

    fn reuses_handles(&self) -> bool {
        self.policy == AllocationPolicy::Reuse
    }

    fn live_count(&self) -> u64 {
        self.high_water - self.free.len() as u64
    }
}
