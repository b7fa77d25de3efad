//! The profile orchestrator.
//!
//! A [`Profile`] bundles everything needed to lower one module into a
//! target profile: the qubit and result allocation managers, the value
//! tracker, the pass pipeline and the compliance validator. It is used once:
//!
//! ```text
//! Configured ──apply──▶ Applied ──validate──▶ Validated ─┐
//!                                                ▲        │ validate
//!                                                └────────┘
//! ```
//!
//! Profiles are assembled with a [`ProfileBuilder`], which installs the pass
//! manager and validator and turns the extension-point pipeline text into
//! passes before the profile is handed out.
//!
//! ```
//! use qprofile::{ExtensionPoint, Profile, Validator};
//! use qprofile_ir::{Module, Operand, Type};
//!
//! let mut module = Module::new("bell");
//! qprofile::intrinsics::declare_runtime(&mut module);
//! module.declare("__quantum__qis__h__body", [Type::Qubit], Type::Void);
//! let mut main = module.build_function("main", Type::Void);
//! main.entry_point();
//! let q = main.call_value(Type::Qubit, "__quantum__rt__qubit_allocate", []);
//! main.call("__quantum__qis__h__body", [Operand::Value(q)]);
//! main.ret(None);
//! main.finish();
//!
//! let mut profile = Profile::builder()
//!     .extension_point(ExtensionPoint::PipelineStart, "qubit-allocation,result-allocation")
//!     .extension_point(ExtensionPoint::OptimizerLast, "resource-annotation")
//!     .with_validator(Validator::base_profile())
//!     .build();
//!
//! profile.apply(&mut module).unwrap();
//! assert!(profile.verify(&module));
//! assert!(profile.validate(&module));
//! assert_eq!(profile.qubit_allocation_manager().max_used(), 1);
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use qprofile_ir::Module;

use crate::allocation::{AllocationManager, AllocationPolicy, BasicAllocationManager, ResourceKind};
use crate::config::ProfileConfig;
use crate::context::PassContext;
use crate::error::{ProfileError, ProfileResult};
use crate::manager::{ExtensionPoint, PassManager};
use crate::registry::PassRegistry;
use crate::tracker::ValueTracker;
use crate::validator::{ValidationReport, Validator};

/// Resource limits of the execution target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TargetDescriptor {
    /// Target name.
    pub name: String,
    /// Maximum number of qubits, if bounded.
    pub max_qubits: Option<u64>,
    /// Maximum number of measurement results, if bounded.
    pub max_results: Option<u64>,
}

impl TargetDescriptor {
    /// An unbounded target.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Limit the number of qubits.
    #[must_use]
    pub fn with_max_qubits(mut self, max: u64) -> Self {
        self.max_qubits = Some(max);
        self
    }

    /// Limit the number of results.
    #[must_use]
    pub fn with_max_results(mut self, max: u64) -> Self {
        self.max_results = Some(max);
        self
    }

    /// Capacity of the pool for `kind`.
    pub fn capacity(&self, kind: ResourceKind) -> Option<u64> {
        match kind {
            ResourceKind::Qubit => self.max_qubits,
            ResourceKind::Result => self.max_results,
        }
    }
}

/// Lifecycle state of a [`Profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    /// Built, not yet applied.
    Configured,
    /// Applied to a module.
    Applied,
    /// Applied and validated at least once.
    Validated,
}

/// An extension-point pipeline that was ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookDiagnostic {
    /// The hook.
    pub extension_point: ExtensionPoint,
    /// The rejected pipeline text.
    pub pipeline: String,
    /// Why it was rejected.
    pub error: String,
}

/// Lowers modules into a target profile and checks compliance.
pub struct Profile {
    debug: bool,
    target: Option<TargetDescriptor>,
    ctx: PassContext,
    pass_manager: PassManager,
    validator: Validator,
    state: ProfileState,
    diagnostics: Vec<HookDiagnostic>,
}

impl Profile {
    /// Create a profile around the given collaborators, running the
    /// default [`PassManager::allocation_pipeline`] and a validator without
    /// rules.
    pub fn new(
        debug: bool,
        target: Option<TargetDescriptor>,
        qubit_allocation_manager: Box<dyn AllocationManager>,
        result_allocation_manager: Box<dyn AllocationManager>,
        value_tracker: ValueTracker,
    ) -> Self {
        Self {
            debug,
            target,
            ctx: PassContext::new(
                qubit_allocation_manager,
                result_allocation_manager,
                value_tracker,
            ),
            pass_manager: PassManager::allocation_pipeline().with_verify_each(debug),
            validator: Validator::new(),
            state: ProfileState::Configured,
            diagnostics: vec![],
        }
    }

    /// Create a profile with non-reusing managers, bounded by the target
    /// when it declares limits.
    pub fn with_defaults(debug: bool, target: Option<TargetDescriptor>) -> Self {
        let qubits = default_manager(target.as_ref(), ResourceKind::Qubit);
        let results = default_manager(target.as_ref(), ResourceKind::Result);
        Self::new(debug, target, qubits, results, ValueTracker::new())
    }

    /// Start assembling a profile.
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder::new()
    }

    /// Run the pipeline on `module`, rewriting it in place.
    ///
    /// A profile can be applied only once; later calls fail with
    /// [`ProfileError::AlreadyApplied`] without touching the module.
    #[instrument(skip(self, module), fields(module = %module.name))]
    pub fn apply(&mut self, module: &mut Module) -> ProfileResult<()> {
        if self.state != ProfileState::Configured {
            return Err(ProfileError::AlreadyApplied);
        }
        self.state = ProfileState::Applied;
        info!(
            "Applying profile{} with {} passes",
            self.target
                .as_ref()
                .map(|t| format!(" for {}", t.name))
                .unwrap_or_default(),
            self.pass_manager.len()
        );
        self.pass_manager.run(module, &mut self.ctx)
    }

    /// Check structural soundness of `module`, logging any failure.
    pub fn verify(&self, module: &Module) -> bool {
        match module.verify() {
            Ok(()) => true,
            Err(e) => {
                warn!("Module {} failed verification: {}", module.name, e);
                false
            }
        }
    }

    /// Check `module` against every compliance rule.
    pub fn validate(&mut self, module: &Module) -> bool {
        self.validate_with_report(module).passed()
    }

    /// Check `module` against every compliance rule and return the
    /// per-rule outcomes.
    pub fn validate_with_report(&mut self, module: &Module) -> ValidationReport {
        let report = self.validator.run(module);
        if self.state == ProfileState::Applied {
            self.state = ProfileState::Validated;
        }
        for failure in report.failures() {
            info!(
                "Rule {} failed: {}",
                failure.name,
                failure.message.as_deref().unwrap_or("no details")
            );
        }
        report
    }

    /// The qubit allocation manager.
    pub fn qubit_allocation_manager(&self) -> &dyn AllocationManager {
        self.ctx.manager(ResourceKind::Qubit)
    }

    /// Mutable access to the qubit allocation manager.
    pub fn qubit_allocation_manager_mut(&mut self) -> &mut dyn AllocationManager {
        self.ctx.manager_mut(ResourceKind::Qubit)
    }

    /// The result allocation manager.
    pub fn result_allocation_manager(&self) -> &dyn AllocationManager {
        self.ctx.manager(ResourceKind::Result)
    }

    /// Mutable access to the result allocation manager.
    pub fn result_allocation_manager_mut(&mut self) -> &mut dyn AllocationManager {
        self.ctx.manager_mut(ResourceKind::Result)
    }

    /// The value tracker.
    pub fn value_tracker(&self) -> &ValueTracker {
        self.ctx.tracker()
    }

    /// The shared pass context.
    pub fn context(&self) -> &PassContext {
        &self.ctx
    }

    /// The assembled pass manager.
    pub fn pass_manager(&self) -> &PassManager {
        &self.pass_manager
    }

    /// The installed validator.
    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Extension-point pipelines that were ignored at construction.
    pub fn hook_diagnostics(&self) -> &[HookDiagnostic] {
        &self.diagnostics
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProfileState {
        self.state
    }

    /// Whether every pass is followed by structural verification.
    pub fn is_debug(&self) -> bool {
        self.debug
    }

    /// The target descriptor.
    pub fn target(&self) -> Option<&TargetDescriptor> {
        self.target.as_ref()
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Profile")
            .field("debug", &self.debug)
            .field("target", &self.target)
            .field("state", &self.state)
            .field("pass_manager", &self.pass_manager)
            .field("validator", &self.validator)
            .field("context", &self.ctx)
            .finish()
    }
}

fn default_manager(target: Option<&TargetDescriptor>, kind: ResourceKind) -> Box<dyn AllocationManager> {
    manager_for(target, kind, AllocationPolicy::NoReuse)
}

fn manager_for(
    target: Option<&TargetDescriptor>,
    kind: ResourceKind,
    policy: AllocationPolicy,
) -> Box<dyn AllocationManager> {
    match target.and_then(|t| t.capacity(kind)) {
        Some(capacity) => Box::new(BasicAllocationManager::bounded(policy, capacity)),
        None => Box::new(BasicAllocationManager::new(policy)),
    }
}

/// Assembles a [`Profile`].
///
/// Extension-point pipelines are parsed and resolved in [`build`](Self::build).
/// A pipeline that does not parse or names an unknown pass is logged,
/// recorded as a [`HookDiagnostic`] and ignored; building never fails.
pub struct ProfileBuilder {
    debug: bool,
    target: Option<TargetDescriptor>,
    qubits: Option<Box<dyn AllocationManager>>,
    results: Option<Box<dyn AllocationManager>>,
    tracker: ValueTracker,
    fragments: BTreeMap<ExtensionPoint, String>,
    pass_manager: Option<PassManager>,
    validator: Option<Validator>,
    registry: PassRegistry,
}

impl ProfileBuilder {
    /// A builder with default managers, no pipeline and no rules.
    pub fn new() -> Self {
        Self {
            debug: false,
            target: None,
            qubits: None,
            results: None,
            tracker: ValueTracker::new(),
            fragments: BTreeMap::new(),
            pass_manager: None,
            validator: None,
            registry: PassRegistry::with_builtins(),
        }
    }

    /// Start from a configuration.
    ///
    /// Repeated rule names are skipped with a warning; an unknown rule name
    /// fails with [`ProfileError::UnknownRule`].
    pub fn from_config(config: &ProfileConfig) -> ProfileResult<Self> {
        let mut validator = Validator::new();
        for name in &config.rules {
            if validator.contains(name) {
                warn!("Compliance rule {} listed twice, ignoring repeat", name);
                continue;
            }
            let rule = crate::validator::rules::builtin(name)
                .ok_or_else(|| ProfileError::UnknownRule(name.clone()))?;
            validator.register_rule(name.as_str(), rule)?;
        }

        let target = config.target.as_ref();
        let mut builder = Self::new()
            .debug(config.debug)
            .managers(
                manager_for(target, ResourceKind::Qubit, config.allocation.qubits),
                manager_for(target, ResourceKind::Result, config.allocation.results),
            )
            .with_validator(validator);
        builder.target = config.target.clone();
        for (ep, text) in &config.extension_points {
            builder = builder.extension_point(*ep, text.as_str());
        }
        Ok(builder)
    }

    /// Verify the module after every pass.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the target; it bounds the default managers.
    #[must_use]
    pub fn target(mut self, target: TargetDescriptor) -> Self {
        self.target = Some(target);
        self
    }

    /// Use a specific qubit allocation manager.
    #[must_use]
    pub fn qubit_allocation_manager(mut self, manager: impl AllocationManager + 'static) -> Self {
        self.qubits = Some(Box::new(manager));
        self
    }

    /// Use a specific result allocation manager.
    #[must_use]
    pub fn result_allocation_manager(mut self, manager: impl AllocationManager + 'static) -> Self {
        self.results = Some(Box::new(manager));
        self
    }

    /// Use boxed managers for both pools.
    #[must_use]
    pub fn managers(
        mut self,
        qubits: Box<dyn AllocationManager>,
        results: Box<dyn AllocationManager>,
    ) -> Self {
        self.qubits = Some(qubits);
        self.results = Some(results);
        self
    }

    /// Use a pre-populated value tracker.
    #[must_use]
    pub fn value_tracker(mut self, tracker: ValueTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Set the pipeline text of one extension point, replacing any earlier
    /// text for it.
    #[must_use]
    pub fn extension_point(mut self, ep: ExtensionPoint, pipeline: impl Into<String>) -> Self {
        self.fragments.insert(ep, pipeline.into());
        self
    }

    /// Install the pass manager; extension-point passes are appended to it.
    #[must_use]
    pub fn with_pass_manager(mut self, pass_manager: PassManager) -> Self {
        self.pass_manager = Some(pass_manager);
        self
    }

    /// Install the validator.
    #[must_use]
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Resolve pipeline text against this registry instead of the built-ins.
    #[must_use]
    pub fn with_registry(mut self, registry: PassRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Assemble the profile.
    pub fn build(self) -> Profile {
        let mut pass_manager = self.pass_manager.unwrap_or_default();
        if self.debug {
            pass_manager.set_verify_each(true);
        }

        let mut diagnostics = vec![];
        for (ep, text) in self.fragments {
            match self.registry.parse_and_resolve(&text) {
                Ok(passes) => pass_manager.extend(ep, passes),
                Err(e) => {
                    warn!("Ignoring {} pipeline '{}': {}", ep, text, e);
                    diagnostics.push(HookDiagnostic {
                        extension_point: ep,
                        pipeline: text,
                        error: e.to_string(),
                    });
                }
            }
        }

        let target = self.target;
        let qubits = self
            .qubits
            .unwrap_or_else(|| default_manager(target.as_ref(), ResourceKind::Qubit));
        let results = self
            .results
            .unwrap_or_else(|| default_manager(target.as_ref(), ResourceKind::Result));

        Profile {
            debug: self.debug,
            target,
            ctx: PassContext::new(qubits, results, self.tracker),
            pass_manager,
            validator: self.validator.unwrap_or_default(),
            state: ProfileState::Configured,
            diagnostics,
        }
    }
}

impl Default for ProfileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::Handle;
    use crate::intrinsics;
    use qprofile_ir::{Operand, Type};

    fn dynamic_bell() -> Module {
        let mut module = Module::new("bell");
        intrinsics::declare_runtime(&mut module);
        module.declare("__quantum__qis__h__body", [Type::Qubit], Type::Void);
        module.declare("__quantum__qis__cx__body", [Type::Qubit, Type::Qubit], Type::Void);
        let mut b = module.build_function("main", Type::Void);
        b.entry_point();
        let q0 = b.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
        let q1 = b.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
        b.call("__quantum__qis__h__body", [Operand::Value(q0)]);
        b.call("__quantum__qis__cx__body", [Operand::Value(q0), Operand::Value(q1)]);
        b.call_value(Type::Result, intrinsics::MEASURE, [Operand::Value(q0)]);
        b.call_value(Type::Result, intrinsics::MEASURE, [Operand::Value(q1)]);
        b.ret(None);
        b.finish();
        module
    }

    #[test]
    fn test_new_profile_runs_default_pipeline() {
        let profile = Profile::with_defaults(false, None);
        assert_eq!(profile.state(), ProfileState::Configured);
        assert_eq!(
            profile.pass_manager().pipeline(),
            vec![
                (ExtensionPoint::PipelineStart, "qubit-allocation"),
                (ExtensionPoint::PipelineStart, "result-allocation"),
                (ExtensionPoint::OptimizerLast, "resource-annotation"),
            ]
        );
        assert!(profile.validator().is_empty());
        assert!(profile.hook_diagnostics().is_empty());
        assert_eq!(profile.qubit_allocation_manager().max_used(), 0);
    }

    #[test]
    fn test_default_profile_lowers_module() {
        let mut module = dynamic_bell();
        let mut profile = Profile::with_defaults(false, None);
        profile.apply(&mut module).unwrap();

        assert!(profile.verify(&module));
        assert!(Validator::base_profile().run(&module).passed());
        assert_eq!(profile.qubit_allocation_manager().max_used(), 2);
        assert_eq!(profile.result_allocation_manager().max_used(), 2);
        assert_eq!(
            module.entry_point().and_then(|f| f.attribute(intrinsics::REQUIRED_NUM_QUBITS)),
            Some("2")
        );
    }

    #[test]
    fn test_apply_once() {
        let mut module = dynamic_bell();
        let mut profile = Profile::builder()
            .with_pass_manager(PassManager::allocation_pipeline())
            .build();
        profile.apply(&mut module).unwrap();
        assert_eq!(profile.state(), ProfileState::Applied);

        let snapshot = module.clone();
        assert!(matches!(
            profile.apply(&mut module),
            Err(ProfileError::AlreadyApplied)
        ));
        assert_eq!(module, snapshot);
    }

    #[test]
    fn test_validation_transitions_state() {
        let mut module = dynamic_bell();
        let mut profile = Profile::builder()
            .with_pass_manager(PassManager::allocation_pipeline())
            .with_validator(Validator::base_profile())
            .build();

        assert!(!profile.validate(&module));
        assert_eq!(profile.state(), ProfileState::Configured);

        profile.apply(&mut module).unwrap();
        assert!(profile.validate(&module));
        assert!(profile.validate(&module));
        assert_eq!(profile.state(), ProfileState::Validated);
        assert_eq!(profile.qubit_allocation_manager().max_used(), 2);
        assert_eq!(profile.result_allocation_manager().max_used(), 2);
    }

    #[test]
    fn test_target_bounds_default_managers() {
        let target = TargetDescriptor::new("tiny").with_max_qubits(1);
        let mut profile = Profile::builder()
            .target(target)
            .extension_point(ExtensionPoint::PipelineStart, "qubit-allocation")
            .build();

        let err = profile.apply(&mut dynamic_bell()).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::Allocation {
                kind: ResourceKind::Qubit,
                ..
            }
        ));
    }

    #[test]
    fn test_invalid_fragments_are_ignored() {
        let profile = Profile::builder()
            .extension_point(ExtensionPoint::Peephole, "module(verify")
            .extension_point(ExtensionPoint::VectorizerStart, "licm")
            .extension_point(ExtensionPoint::OptimizerLast, "verify")
            .build();

        let hooks: Vec<ExtensionPoint> = profile
            .hook_diagnostics()
            .iter()
            .map(|d| d.extension_point)
            .collect();
        assert_eq!(hooks, vec![ExtensionPoint::Peephole, ExtensionPoint::VectorizerStart]);
        assert_eq!(
            profile.pass_manager().pipeline(),
            vec![(ExtensionPoint::OptimizerLast, "verify")]
        );
    }

    #[test]
    fn test_fragments_append_to_installed_pass_manager() {
        let profile = Profile::builder()
            .with_pass_manager(PassManager::allocation_pipeline())
            .extension_point(ExtensionPoint::PipelineStart, "verify")
            .build();
        assert_eq!(
            profile.pass_manager().pass_names(ExtensionPoint::PipelineStart),
            vec!["qubit-allocation", "result-allocation", "verify"]
        );
    }

    #[test]
    fn test_debug_enables_verify_each() {
        let profile = Profile::builder().debug(true).build();
        assert!(profile.is_debug());
        assert!(profile.pass_manager().verify_each());
        assert!(Profile::with_defaults(true, None).pass_manager().verify_each());
    }

    #[test]
    fn test_manager_access_between_compilations() {
        let mut profile = Profile::builder()
            .qubit_allocation_manager(BasicAllocationManager::reuse())
            .build();
        let qubits = profile.qubit_allocation_manager_mut();
        let h = qubits.allocate().unwrap();
        qubits.release(h).unwrap();
        assert_eq!(qubits.allocate().unwrap(), Handle(0));
        assert!(profile.qubit_allocation_manager().reuses_handles());
    }

    #[test]
    fn test_verify_reports_broken_module() {
        let profile = Profile::with_defaults(false, None);
        let mut module = dynamic_bell();
        assert!(profile.verify(&module));
        module.function_mut("main").unwrap().blocks[0].terminator = None;
        assert!(!profile.verify(&module));
    }
}
