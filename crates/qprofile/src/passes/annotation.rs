//! Resource annotation of the entry point and module flags.

use tracing::{debug, warn};

use qprofile_ir::{FlagValue, Module, Type};

use crate::allocation::{AllocationManager, Handle, ResourceKind};
use crate::context::PassContext;
use crate::error::ProfileResult;
use crate::intrinsics;
use crate::pass::{Pass, PassKind};

/// Records the number of qubits and results used by the program.
///
/// The entry point receives `required_num_qubits` and
/// `required_num_results` attributes, computed as the larger of the
/// managers' high-water marks and the highest static address already
/// present. The module flags `dynamic_qubit_management` and
/// `dynamic_result_management` are set to whether any dynamic management
/// is left, and the QIR version flags are added when missing.
pub struct ResourceAnnotation;

impl Pass for ResourceAnnotation {
    fn name(&self) -> &str {
        "resource-annotation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, module: &mut Module, ctx: &mut PassContext) -> ProfileResult<()> {
        let qubits = extent(module, ctx, ResourceKind::Qubit);
        let results = extent(module, ctx, ResourceKind::Result);

        let dynamic_qubits = module
            .instructions()
            .any(|(_, inst)| inst.callee().is_some_and(intrinsics::is_qubit_management));
        let dynamic_results = module
            .instructions()
            .any(|(_, inst)| inst.result.is_some() && inst.ty == Type::Result);

        match module.entry_point_mut() {
            Some(entry) => {
                entry.set_attribute(intrinsics::REQUIRED_NUM_QUBITS, qubits.to_string());
                entry.set_attribute(intrinsics::REQUIRED_NUM_RESULTS, results.to_string());
                debug!("{}: {} qubits, {} results", entry.name, qubits, results);
            }
            None => warn!("Module {} has no entry point, skipping resource attributes", module.name),
        }

        module.set_flag(
            intrinsics::FLAG_DYNAMIC_QUBIT_MANAGEMENT,
            FlagValue::Bool(dynamic_qubits),
        );
        module.set_flag(
            intrinsics::FLAG_DYNAMIC_RESULT_MANAGEMENT,
            FlagValue::Bool(dynamic_results),
        );
        module
            .flags
            .entry(intrinsics::FLAG_QIR_MAJOR_VERSION.to_string())
            .or_insert(FlagValue::Int(1));
        module
            .flags
            .entry(intrinsics::FLAG_QIR_MINOR_VERSION.to_string())
            .or_insert(FlagValue::Int(0));
        Ok(())
    }
}

fn extent(module: &Module, ctx: &PassContext, kind: ResourceKind) -> u64 {
    module
        .instructions()
        .flat_map(|(_, inst)| inst.operands())
        .filter_map(|op| kind.handle_of(op))
        .map(|Handle(h)| h.saturating_add(1))
        .fold(ctx.manager(kind).max_used(), u64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::QubitAllocation;
    use qprofile_ir::Operand;

    #[test]
    fn test_annotates_entry_point() {
        let mut module = Module::new("test");
        intrinsics::declare_runtime(&mut module);
        let mut b = module.build_function("main", Type::Void);
        b.entry_point();
        for _ in 0..3 {
            let q = b.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
            b.call("__quantum__qis__h__body", [Operand::Value(q)]);
        }
        b.call("__quantum__qis__mz__body", [Operand::Qubit(0), Operand::Result(1)]);
        b.ret(None);
        b.finish();

        let mut ctx = PassContext::default();
        QubitAllocation.run(&mut module, &mut ctx).unwrap();
        ResourceAnnotation.run(&mut module, &mut ctx).unwrap();

        let main = module.entry_point().unwrap();
        assert_eq!(main.attribute(intrinsics::REQUIRED_NUM_QUBITS), Some("3"));
        assert_eq!(main.attribute(intrinsics::REQUIRED_NUM_RESULTS), Some("2"));
        assert_eq!(
            module.flag(intrinsics::FLAG_DYNAMIC_QUBIT_MANAGEMENT),
            Some(&FlagValue::Bool(false))
        );
        assert_eq!(
            module.flag(intrinsics::FLAG_QIR_MAJOR_VERSION),
            Some(&FlagValue::Int(1))
        );
    }

    #[test]
    fn test_reports_remaining_dynamic_management() {
        let mut module = Module::new("test");
        intrinsics::declare_runtime(&mut module);
        module.set_flag(intrinsics::FLAG_QIR_MAJOR_VERSION, FlagValue::Int(2));
        let mut b = module.build_function("main", Type::Void);
        b.entry_point();
        b.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []);
        b.ret(None);
        b.finish();

        ResourceAnnotation
            .run(&mut module, &mut PassContext::default())
            .unwrap();
        assert_eq!(
            module.flag(intrinsics::FLAG_DYNAMIC_QUBIT_MANAGEMENT),
            Some(&FlagValue::Bool(true))
        );
        assert_eq!(
            module.flag(intrinsics::FLAG_QIR_MAJOR_VERSION),
            Some(&FlagValue::Int(2))
        );
    }

    #[test]
    fn test_highest_static_address_saturates() {
        let mut module = Module::new("test");
        let mut b = module.build_function("main", Type::Void);
        b.entry_point();
        b.call("__quantum__qis__h__body", [Operand::Qubit(u64::MAX)]);
        b.ret(None);
        b.finish();

        ResourceAnnotation
            .run(&mut module, &mut PassContext::default())
            .unwrap();
        let expected = u64::MAX.to_string();
        assert_eq!(
            module.entry_point().unwrap().attribute(intrinsics::REQUIRED_NUM_QUBITS),
            Some(expected.as_str())
        );
    }

    #[test]
    fn test_missing_entry_point_still_sets_flags() {
        let mut module = Module::new("library");
        ResourceAnnotation
            .run(&mut module, &mut PassContext::default())
            .unwrap();
        assert_eq!(
            module.flag(intrinsics::FLAG_DYNAMIC_RESULT_MANAGEMENT),
            Some(&FlagValue::Bool(false))
        );
    }
}
