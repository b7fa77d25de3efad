//! Value tracking: which IR value stands for which allocated resource.
//!
//! Profile legality requires every resource operand to be a compile-time
//! constant address. The [`ValueTracker`] is the dataflow table that proves
//! (or fails to prove) that a value is one: allocations record a defining
//! value, copies propagate, and control-flow joins merge conservatively.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use qprofile_ir::{Operand, ValueId};

use crate::allocation::{Handle, ResourceKind};
use crate::error::{ProfileError, ProfileResult};

/// A resource, or a contiguous block of resources, in one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedResource {
    /// The pool.
    pub kind: ResourceKind,
    /// First handle.
    pub handle: Handle,
    /// Number of handles, 1 for a single resource.
    pub width: u64,
}

impl TrackedResource {
    /// A single resource.
    pub fn single(kind: ResourceKind, handle: Handle) -> Self {
        Self {
            kind,
            handle,
            width: 1,
        }
    }

    /// A block of `width` resources starting at `base`.
    pub fn block(kind: ResourceKind, base: Handle, width: u64) -> Self {
        Self {
            kind,
            handle: base,
            width,
        }
    }

    /// Whether this tracks a block rather than a single resource.
    pub fn is_block(&self) -> bool {
        self.width != 1
    }

    /// The `index`-th resource of a block.
    pub fn element(&self, index: u64) -> Option<TrackedResource> {
        (index < self.width).then(|| Self::single(self.kind, Handle(self.handle.0 + index)))
    }

    /// Every handle covered.
    pub fn handles(&self) -> impl Iterator<Item = Handle> {
        let base = self.handle.0;
        (base..base + self.width).map(Handle)
    }

    /// The static operand for a single resource.
    pub fn operand(&self) -> Option<Operand> {
        (!self.is_block()).then(|| self.kind.operand(self.handle))
    }
}

impl fmt::Display for TrackedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_block() {
            write!(f, "{} block {}+{}", self.kind, self.handle, self.width)
        } else {
            write!(f, "{} {}", self.kind, self.handle)
        }
    }
}

/// Join a sequence of resolutions: the common resource if every input
/// resolves to the same one, otherwise `None`. An empty input is `None`.
pub fn join(resolved: impl IntoIterator<Item = Option<TrackedResource>>) -> Option<TrackedResource> {
    let mut iter = resolved.into_iter();
    let first = iter.next()??;
    iter.all(|r| r == Some(first)).then_some(first)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Association {
    Known(TrackedResource),
    Unknown,
}

/// Associates IR values with the resources they address.
#[derive(Debug, Clone, Default)]
pub struct ValueTracker {
    values: FxHashMap<ValueId, Association>,
    definitions: FxHashMap<(ResourceKind, Handle), ValueId>,
}

impl ValueTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, value: ValueId, resource: TrackedResource) -> ProfileResult<()> {
        if let Some(Association::Known(existing)) = self.values.get(&value) {
            if *existing != resource {
                return Err(ProfileError::Redefinition {
                    value,
                    existing: *existing,
                    new: resource,
                });
            }
        }
        self.values.insert(value, Association::Known(resource));
        Ok(())
    }

    /// Register `value` as the defining occurrence of `handle`.
    ///
    /// Recording the same association twice is accepted; recording a
    /// different one fails with [`ProfileError::Redefinition`].
    pub fn record_allocation(
        &mut self,
        value: ValueId,
        handle: Handle,
        kind: ResourceKind,
    ) -> ProfileResult<()> {
        self.record(value, TrackedResource::single(kind, handle))?;
        self.definitions.insert((kind, handle), value);
        Ok(())
    }

    /// Register `value` as the defining occurrence of a block of handles.
    pub fn record_block(
        &mut self,
        value: ValueId,
        base: Handle,
        width: u64,
        kind: ResourceKind,
    ) -> ProfileResult<()> {
        let resource = TrackedResource::block(kind, base, width);
        self.record(value, resource)?;
        for handle in resource.handles() {
            self.definitions.insert((kind, handle), value);
        }
        Ok(())
    }

    /// Record a derived association that is not a defining occurrence,
    /// such as an element projected out of a block.
    pub fn assign(&mut self, value: ValueId, resource: TrackedResource) -> ProfileResult<()> {
        self.record(value, resource)
    }

    /// Mark `value` as not statically resolvable.
    pub fn mark_unknown(&mut self, value: ValueId) {
        self.values.insert(value, Association::Unknown);
    }

    /// Copy the association of `from` to `to`. If `from` is unknown or
    /// untracked, `to` becomes unknown.
    pub fn propagate(&mut self, from: ValueId, to: ValueId) {
        let association = match self.values.get(&from) {
            Some(Association::Known(r)) => Association::Known(*r),
            _ => Association::Unknown,
        };
        self.values.insert(to, association);
    }

    /// The resource `value` addresses, if known.
    pub fn resolve(&self, value: ValueId) -> Option<TrackedResource> {
        match self.values.get(&value) {
            Some(Association::Known(r)) => Some(*r),
            _ => None,
        }
    }

    /// Resolve an operand: static addresses resolve to themselves, values
    /// through the table.
    pub fn resolve_operand(&self, operand: &Operand) -> Option<TrackedResource> {
        match operand {
            Operand::Value(v) => self.resolve(*v),
            Operand::Qubit(h) => Some(TrackedResource::single(ResourceKind::Qubit, Handle(*h))),
            Operand::Result(h) => Some(TrackedResource::single(ResourceKind::Result, Handle(*h))),
            _ => None,
        }
    }

    /// Whether `value` was explicitly marked unknown.
    pub fn is_unknown(&self, value: ValueId) -> bool {
        self.values.get(&value) == Some(&Association::Unknown)
    }

    /// The common association of `values`, or `None` if any input is
    /// unresolved or two inputs differ.
    pub fn merge(&self, values: &[ValueId]) -> Option<TrackedResource> {
        join(values.iter().map(|v| self.resolve(*v)))
    }

    /// Merge `values` and record the outcome (or unknown) for `to`.
    pub fn join_into(&mut self, to: ValueId, values: &[ValueId]) -> ProfileResult<Option<TrackedResource>> {
        match self.merge(values) {
            Some(resource) => {
                self.assign(to, resource)?;
                Ok(Some(resource))
            }
            None => {
                self.mark_unknown(to);
                Ok(None)
            }
        }
    }

    /// The value most recently recorded as defining `handle`.
    pub fn defining_value(&self, kind: ResourceKind, handle: Handle) -> Option<ValueId> {
        self.definitions.get(&(kind, handle)).copied()
    }

    /// Iterate over every known association.
    pub fn known(&self) -> impl Iterator<Item = (ValueId, TrackedResource)> + '_ {
        self.values.iter().filter_map(|(v, a)| match a {
            Association::Known(r) => Some((*v, *r)),
            Association::Unknown => None,
        })
    }

    /// Number of tracked values, known or unknown.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Forget everything.
    pub fn clear(&mut self) {
        self.values.clear();
        self.definitions.clear();
    }
}
