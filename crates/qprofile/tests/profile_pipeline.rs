//! End-to-end tests for applying and validating profiles.

use std::sync::{Arc, Mutex};

use qprofile::intrinsics;
use qprofile::{
    AllocationManager, AllocationPolicy, BasicAllocationManager, ExtensionPoint, Handle, Pass,
    PassContext, PassKind, PassRegistry, Profile, ProfileConfig, ProfileError, ProfileResult,
    ProfileState, TargetDescriptor, Validator,
};
use qprofile_ir::{FlagValue, Module, Operand, Type};

const H: &str = "__quantum__qis__h__body";
const CX: &str = "__quantum__qis__cx__body";

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Helper: a Bell pair written with dynamic qubits and results.
fn dynamic_bell() -> Module {
    let mut module = Module::new("bell");
    intrinsics::declare_runtime(&mut module);
    module.declare(H, [Type::Qubit], Type::Void);
    module.declare(CX, [Type::Qubit, Type::Qubit], Type::Void);

    let mut main = module.build_function("main", Type::Void);
    main.entry_point();
    let q0 = main.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
    let q1 = main.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
    main.call(H, [Operand::Value(q0)]);
    main.call(CX, [Operand::Value(q0), Operand::Value(q1)]);
    main.call_value(Type::Result, intrinsics::MEASURE, [Operand::Value(q0)]);
    main.call_value(Type::Result, intrinsics::MEASURE, [Operand::Value(q1)]);
    main.call(intrinsics::QUBIT_RELEASE, [Operand::Value(q1)]);
    main.call(intrinsics::QUBIT_RELEASE, [Operand::Value(q0)]);
    main.ret(None);
    main.finish();
    module
}

/// Helper: callee and arguments of every instruction-set call in `main`.
fn qis_calls(module: &Module) -> Vec<(String, Vec<Operand>)> {
    module
        .function("main")
        .unwrap()
        .instructions()
        .filter_map(|inst| {
            inst.callee()
                .filter(|c| c.starts_with(intrinsics::QIS_PREFIX))
                .map(|c| (c.to_string(), inst.args().to_vec()))
        })
        .collect()
}

#[test]
fn test_base_profile_lowers_bell_pair() {
    init_tracing();
    let mut module = dynamic_bell();
    let mut profile = ProfileConfig::base().build().unwrap();

    profile.apply(&mut module).unwrap();
    assert!(profile.verify(&module));

    let report = profile.validate_with_report(&module);
    assert!(report.passed(), "{report}");
    assert_eq!(profile.state(), ProfileState::Validated);

    assert_eq!(
        qis_calls(&module),
        vec![
            (H.to_string(), vec![Operand::Qubit(0)]),
            (CX.to_string(), vec![Operand::Qubit(0), Operand::Qubit(1)]),
            (
                intrinsics::MEASURE_Z.to_string(),
                vec![Operand::Qubit(0), Operand::Result(0)]
            ),
            (
                intrinsics::MEASURE_Z.to_string(),
                vec![Operand::Qubit(1), Operand::Result(1)]
            ),
        ]
    );

    let entry = module.entry_point().unwrap();
    assert_eq!(entry.attribute(intrinsics::REQUIRED_NUM_QUBITS), Some("2"));
    assert_eq!(entry.attribute(intrinsics::REQUIRED_NUM_RESULTS), Some("2"));
    assert_eq!(
        module.flag(intrinsics::FLAG_DYNAMIC_QUBIT_MANAGEMENT),
        Some(&FlagValue::Bool(false))
    );
    assert_eq!(
        module.flag(intrinsics::FLAG_DYNAMIC_RESULT_MANAGEMENT),
        Some(&FlagValue::Bool(false))
    );
}

#[test]
fn test_unlowered_module_fails_validation() {
    init_tracing();
    let module = dynamic_bell();
    let mut profile = ProfileConfig::base().build().unwrap();

    let report = profile.validate_with_report(&module);
    assert!(!report.passed());
    for rule in [
        "no-dynamic-qubit-management",
        "no-dynamic-result-management",
        "static-resource-operands",
        "required-resource-attributes",
        "module-flags",
    ] {
        assert_eq!(report.get(rule).map(|r| r.passed), Some(false), "{rule}");
    }
    assert_eq!(report.get("single-entry-point").map(|r| r.passed), Some(true));
    assert_eq!(profile.state(), ProfileState::Configured);
}

#[test]
fn test_invalid_peephole_fragment_is_ignored() {
    init_tracing();
    let mut module = dynamic_bell();
    let mut profile = Profile::builder()
        .extension_point(ExtensionPoint::PipelineStart, "qubit-allocation,result-allocation")
        .extension_point(ExtensionPoint::Peephole, "function(verify")
        .extension_point(ExtensionPoint::OptimizerLast, "resource-annotation")
        .with_validator(Validator::base_profile())
        .build();

    let diagnostics = profile.hook_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].extension_point, ExtensionPoint::Peephole);
    assert_eq!(diagnostics[0].pipeline, "function(verify");
    assert!(profile.pass_manager().pass_names(ExtensionPoint::Peephole).is_empty());

    profile.apply(&mut module).unwrap();
    assert!(profile.validate(&module));
}

#[test]
fn test_reuse_manager_hands_back_released_handle() {
    let mut manager = BasicAllocationManager::new(AllocationPolicy::Reuse);
    let handles: Vec<Handle> = (0..3).map(|_| manager.allocate().unwrap()).collect();
    assert_eq!(handles, vec![Handle(0), Handle(1), Handle(2)]);

    manager.release(Handle(1)).unwrap();
    assert_eq!(manager.allocate().unwrap(), Handle(1));
    assert_eq!(manager.max_used(), 3);
}

#[test]
fn test_release_reuse_through_profile() {
    init_tracing();
    let mut module = Module::new("sequential");
    intrinsics::declare_runtime(&mut module);
    module.declare(H, [Type::Qubit], Type::Void);
    let mut main = module.build_function("main", Type::Void);
    main.entry_point();
    for _ in 0..3 {
        let q = main.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
        main.call(H, [Operand::Value(q)]);
        main.call(intrinsics::QUBIT_RELEASE, [Operand::Value(q)]);
    }
    main.ret(None);
    main.finish();

    let mut profile = Profile::builder()
        .qubit_allocation_manager(BasicAllocationManager::reuse())
        .extension_point(ExtensionPoint::PipelineStart, "qubit-allocation")
        .extension_point(ExtensionPoint::OptimizerLast, "resource-annotation")
        .build();
    profile.apply(&mut module).unwrap();

    assert_eq!(profile.qubit_allocation_manager().max_used(), 1);
    assert_eq!(
        module.entry_point().unwrap().attribute(intrinsics::REQUIRED_NUM_QUBITS),
        Some("1")
    );
    assert!(
        qis_calls(&module)
            .iter()
            .all(|(_, args)| args == &vec![Operand::Qubit(0)])
    );
}

#[test]
fn test_qubit_live_across_call_keeps_its_own_address() {
    init_tracing();
    let mut module = Module::new("nested");
    intrinsics::declare_runtime(&mut module);
    module.declare(H, [Type::Qubit], Type::Void);
    module.declare(CX, [Type::Qubit, Type::Qubit], Type::Void);

    let mut main = module.build_function("main", Type::Void);
    main.entry_point();
    let q = main.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
    main.call("helper", []);
    main.call(CX, [Operand::Value(q), Operand::Value(q)]);
    main.call(intrinsics::QUBIT_RELEASE, [Operand::Value(q)]);
    main.ret(None);
    main.finish();

    let mut helper = module.build_function("helper", Type::Void);
    let a = helper.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
    helper.call(H, [Operand::Value(a)]);
    helper.call(intrinsics::QUBIT_RELEASE, [Operand::Value(a)]);
    helper.ret(None);
    helper.finish();

    let mut config = ProfileConfig::base();
    config.allocation.qubits = AllocationPolicy::Reuse;
    let mut profile = config.build().unwrap();
    profile.apply(&mut module).unwrap();
    assert!(profile.validate(&module));

    let helper_args: Vec<Vec<Operand>> = module
        .function("helper")
        .unwrap()
        .instructions()
        .filter(|inst| inst.is_call_to(H))
        .map(|inst| inst.args().to_vec())
        .collect();
    assert_eq!(helper_args, vec![vec![Operand::Qubit(1)]]);
    assert_eq!(
        qis_calls(&module),
        vec![(CX.to_string(), vec![Operand::Qubit(0), Operand::Qubit(0)])]
    );
    assert_eq!(profile.qubit_allocation_manager().max_used(), 2);
    assert_eq!(
        module.entry_point().unwrap().attribute(intrinsics::REQUIRED_NUM_QUBITS),
        Some("2")
    );
}

#[test]
fn test_profile_applies_only_once() {
    let mut module = dynamic_bell();
    let mut profile = ProfileConfig::base().build().unwrap();
    profile.apply(&mut module).unwrap();

    let mut other = dynamic_bell();
    assert!(matches!(
        profile.apply(&mut other),
        Err(ProfileError::AlreadyApplied)
    ));
    assert_eq!(other, dynamic_bell());
}

#[test]
fn test_target_capacity_is_enforced() {
    let mut module = dynamic_bell();
    let mut config = ProfileConfig::base();
    config.target = Some(TargetDescriptor::new("one-qubit").with_max_qubits(1));
    let mut profile = config.build().unwrap();

    let err = profile.apply(&mut module).unwrap_err();
    assert!(err.to_string().contains("exhausted"), "{err}");
}

struct Record {
    name: &'static str,
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Pass for Record {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, _module: &mut Module, _ctx: &mut PassContext) -> ProfileResult<()> {
        self.log.lock().unwrap().push(self.name);
        Ok(())
    }
}

#[test]
fn test_hooks_run_in_pipeline_order() {
    let log = Arc::new(Mutex::new(vec![]));
    let mut registry = PassRegistry::new();
    for name in ["first", "middle", "last"] {
        let log = Arc::clone(&log);
        registry.register_simple(name, move || {
            Box::new(Record {
                name,
                log: Arc::clone(&log),
            })
        });
    }

    let mut profile = Profile::builder()
        .with_registry(registry)
        .extension_point(ExtensionPoint::OptimizerLast, "last")
        .extension_point(ExtensionPoint::VectorizerStart, "module(middle)")
        .extension_point(ExtensionPoint::PipelineStart, "first,first")
        .build();
    profile.apply(&mut dynamic_bell()).unwrap();

    assert_eq!(*log.lock().unwrap(), vec!["first", "first", "middle", "last"]);
}

struct DropTerminators;

impl Pass for DropTerminators {
    fn name(&self) -> &str {
        "drop-terminators"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, module: &mut Module, _ctx: &mut PassContext) -> ProfileResult<()> {
        if let Some(main) = module.function_mut("main") {
            for block in &mut main.blocks {
                block.terminator = None;
            }
        }
        Ok(())
    }
}

#[test]
fn test_debug_profile_catches_broken_pass() {
    init_tracing();
    let mut registry = PassRegistry::with_builtins();
    registry.register_simple("drop-terminators", || Box::new(DropTerminators));

    let mut profile = Profile::builder()
        .debug(true)
        .with_registry(registry)
        .extension_point(ExtensionPoint::ScalarOptimizerLate, "drop-terminators")
        .build();

    let err = profile.apply(&mut dynamic_bell()).unwrap_err();
    assert!(matches!(
        err,
        ProfileError::Verification { ref pass, .. } if pass == "drop-terminators"
    ));
}
