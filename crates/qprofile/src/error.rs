//! Error types for the profile crate.

use std::fmt;

use qprofile_ir::{IrError, PipelineError, ValueId};
use thiserror::Error;

use crate::allocation::{Handle, ResourceKind};
use crate::tracker::TrackedResource;

/// Why a handle was rejected by an allocation manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidHandleReason {
    /// The handle lies beyond the high-water mark.
    NeverIssued,
    /// The handle is already on the free-list.
    AlreadyReleased,
}

impl fmt::Display for InvalidHandleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidHandleReason::NeverIssued => f.write_str("was never issued"),
            InvalidHandleReason::AlreadyReleased => f.write_str("is already released"),
        }
    }
}

/// Errors raised by an [`AllocationManager`](crate::AllocationManager).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AllocationError {
    /// Unknown handle or double release.
    #[error("Handle {handle} {reason}")]
    InvalidHandle {
        /// The rejected handle.
        handle: Handle,
        /// Why it was rejected.
        reason: InvalidHandleReason,
    },

    /// A bounded manager has no handle left to give out.
    #[error("Resource pool exhausted: capacity of {capacity} handles reached")]
    ResourceExhausted {
        /// The configured capacity.
        capacity: u64,
    },

    /// The manager never reuses handles, so it cannot take one back.
    #[error("Handle {handle} cannot be released: this manager never reuses handles")]
    ReleaseUnsupported {
        /// The handle passed to `release`.
        handle: Handle,
    },
}

/// Result type for allocation manager operations.
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Errors that can occur while building or applying a profile.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProfileError {
    /// Error from the IR crate.
    #[error("IR error: {0}")]
    Ir(#[from] IrError),

    /// An allocation manager rejected a request.
    #[error("{kind} allocation failed: {source}")]
    Allocation {
        /// Pool that failed.
        kind: ResourceKind,
        /// Underlying error.
        #[source]
        source: AllocationError,
    },

    /// A value was recorded against two different resources.
    #[error("Value {value} already tracks {existing}, cannot redefine it as {new}")]
    Redefinition {
        /// The value.
        value: ValueId,
        /// Association already on record.
        existing: TrackedResource,
        /// Association that was rejected.
        new: TrackedResource,
    },

    /// A compliance rule with this name already exists.
    #[error("Compliance rule '{0}' is already registered")]
    DuplicateRule(String),

    /// No built-in compliance rule has this name.
    #[error("Unknown compliance rule '{0}'")]
    UnknownRule(String),

    /// No registered pass has this name.
    #[error("Unknown pass '{0}'")]
    UnknownPass(String),

    /// Pipeline text did not parse.
    #[error("Invalid pipeline: {0}")]
    Pipeline(#[from] PipelineError),

    /// The profile was already applied to a module.
    #[error("Profile has already been applied; use a fresh profile per module")]
    AlreadyApplied,

    /// Structural verification failed after a pass.
    #[error("Module failed verification after pass '{pass}': {source}")]
    Verification {
        /// Pass that ran last.
        pass: String,
        /// Verifier error.
        #[source]
        source: IrError,
    },

    /// Pass execution failed.
    #[error("Pass '{name}' failed: {reason}")]
    PassFailed { name: String, reason: String },

    /// Invalid profile or pass configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProfileError {
    /// Wrap an allocation error with the pool it came from.
    pub fn allocation(kind: ResourceKind, source: AllocationError) -> Self {
        ProfileError::Allocation { kind, source }
    }
}

/// Result type for profile operations.
pub type ProfileResult<T> = Result<T, ProfileError>;
