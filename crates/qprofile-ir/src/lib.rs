//! qprofile Program Representation
//!
//! This crate provides the mutable program representation that profile
//! transformations operate on, together with the generic structural checker
//! and the textual pass-pipeline grammar.
//!
//! # Overview
//!
//! A [`Module`] holds [`Function`]s made of basic [`Block`]s. Blocks contain
//! SSA-style [`Instruction`]s (calls, copies and phis) and end in a
//! [`Terminator`]. Operands are either references to values ([`ValueId`]) or
//! constants, including static [`Operand::Qubit`] and [`Operand::Result`]
//! addresses. Runtime and instruction-set intrinsics appear as function
//! declarations.
//!
//! # Example: dynamic qubit acquisition
//!
//! ```rust
//! use qprofile_ir::{Module, Operand, Type};
//!
//! let mut module = Module::new("example");
//! module.declare("__quantum__rt__qubit_allocate", [], Type::Qubit);
//! module.declare("__quantum__qis__h__body", [Type::Qubit], Type::Void);
//!
//! let mut main = module.build_function("main", Type::Void);
//! main.entry_point();
//! let q = main.call_value(Type::Qubit, "__quantum__rt__qubit_allocate", []);
//! main.call("__quantum__qis__h__body", [Operand::Value(q)]);
//! main.ret(None);
//! main.finish();
//!
//! assert!(module.verify().is_ok());
//! ```
//!
//! # Components
//!
//! - [`module`]: [`Module`], [`FunctionBuilder`] and [`Module::verify`]
//! - [`function`]: [`Function`], [`Block`] and the control-flow graph
//! - [`instruction`]: [`Instruction`] and [`Terminator`]
//! - [`pipeline`]: parser for pipeline text such as `module(verify,qubit-allocation)`

pub mod error;
pub mod function;
pub mod instruction;
pub mod module;
pub mod pipeline;
pub mod value;

pub use error::{IrError, IrResult};
pub use function::{Block, ENTRY_POINT_ATTR, Function, Param};
pub use instruction::{Instruction, InstructionKind, Terminator};
pub use module::{FlagValue, FunctionBuilder, Module};
pub use pipeline::{PipelineElement, PipelineError};
pub use value::{BlockId, Operand, Type, ValueId};
