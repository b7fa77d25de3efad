//! qprofile Profile Framework
//!
//! This crate lowers quantum programs into a restricted execution profile.
//! A profile rewrites dynamic qubit and result management into static
//! addresses, runs user pipelines at fixed extension points, and checks the
//! result against a set of named compliance rules.
//!
//! # Overview
//!
//! Lowering a module goes through three steps:
//! 1. **Apply**: Run the pass pipeline, hook by hook, over the module
//! 2. **Verify**: Check structural soundness of the rewritten module
//! 3. **Validate**: Evaluate every compliance rule and report per rule
//!
//! # Architecture
//!
//! ```text
//! Input Module
//!       │
//!       ▼
//! ┌─────────────┐
//! │ PassManager │ ◄── PassContext (qubit/result managers, value tracker)
//! └─────────────┘
//!       │
//!       ├── pipeline-start:  QubitAllocation / ResultAllocation
//!       ├── peephole .. vectorizer-start
//!       └── optimizer-last:  ResourceAnnotation
//!       │
//!       ▼
//! ┌───────────┐
//! │ Validator │ ──► ValidationReport
//! └───────────┘
//! ```
//!
//! # Example: Base Profile
//!
//! ```rust
//! use qprofile::ProfileConfig;
//! use qprofile_ir::{Module, Operand, Type};
//!
//! let mut module = Module::new("example");
//! qprofile::intrinsics::declare_runtime(&mut module);
//! let mut main = module.build_function("main", Type::Void);
//! main.entry_point();
//! let q = main.call_value(Type::Qubit, qprofile::intrinsics::QUBIT_ALLOCATE, []);
//! main.call_value(Type::Result, qprofile::intrinsics::MEASURE, [Operand::Value(q)]);
//! main.ret(None);
//! main.finish();
//!
//! let mut profile = ProfileConfig::base().build().unwrap();
//! profile.apply(&mut module).unwrap();
//! assert!(profile.verify(&module));
//! assert!(profile.validate(&module));
//! ```
//!
//! # Extension Points
//!
//! | Hook | Runs |
//! |------|------|
//! | `pipeline-start` | before anything else |
//! | `peephole` | after instruction combining |
//! | `late-loop-optimizations` | after loop deletion |
//! | `loop-optimizer-end` | at the end of the loop passes |
//! | `scalar-optimizer-late` | late in function simplification |
//! | `cgscc-optimizer-late` | after call-graph SCC simplification |
//! | `vectorizer-start` | before vectorization |
//! | `optimizer-last` | last |
//!
//! # Custom Passes
//!
//! Implement the [`Pass`] trait and register a factory to use a pass in
//! extension-point pipelines:
//!
//! ```rust
//! use qprofile::{Pass, PassContext, PassKind, PassRegistry, ProfileResult};
//! use qprofile_ir::Module;
//!
//! struct CountCalls;
//!
//! impl Pass for CountCalls {
//!     fn name(&self) -> &str { "count-calls" }
//!     fn kind(&self) -> PassKind { PassKind::Analysis }
//!
//!     fn run(&self, module: &mut Module, ctx: &mut PassContext) -> ProfileResult<()> {
//!         ctx.insert(module.num_instructions());
//!         Ok(())
//!     }
//! }
//!
//! let mut registry = PassRegistry::with_builtins();
//! registry.register_simple("count-calls", || Box::new(CountCalls));
//! assert!(registry.parse_and_resolve("module(count-calls)").is_ok());
//! ```

pub mod allocation;
pub mod config;
pub mod context;
pub mod error;
pub mod intrinsics;
pub mod manager;
pub mod pass;
pub mod profile;
pub mod registry;
pub mod tracker;
pub mod validator;

// Built-in passes
pub mod passes;

pub use allocation::{AllocationManager, AllocationPolicy, BasicAllocationManager, Handle, ResourceKind};
pub use config::{AllocationConfig, ProfileConfig};
pub use context::PassContext;
pub use error::{AllocationError, AllocationResult, InvalidHandleReason, ProfileError, ProfileResult};
pub use manager::{ExtensionPoint, PassManager};
pub use pass::{Pass, PassKind};
pub use profile::{HookDiagnostic, Profile, ProfileBuilder, ProfileState, TargetDescriptor};
pub use registry::{PassFactory, PassRegistry};
pub use tracker::{TrackedResource, ValueTracker};
pub use validator::{RuleOutcome, RuleResult, ValidationReport, Validator};
