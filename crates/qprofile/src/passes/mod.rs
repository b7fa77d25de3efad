//! Built-in profile passes.
//!
//! - [`QubitAllocation`] and [`ResultAllocation`] rewrite dynamic resource
//!   management into static addresses
//! - [`ResourceAnnotation`] records resource counts and profile flags
//! - [`VerifyModule`] and [`PrintModule`] inspect the module

mod annotation;
mod qubit_allocation;
mod result_allocation;
pub(crate) mod rewrite;
mod verification;

pub use annotation::ResourceAnnotation;
pub use qubit_allocation::QubitAllocation;
pub use result_allocation::ResultAllocation;
pub use verification::{PrintModule, VerifyModule};
