//! Static result allocation.
//!
//! Rewrites measurements that return a dynamic result,
//! `%r = __quantum__qis__m__body(q)`, into measurements that write into a
//! static result, `__quantum__qis__mz__body(q, result h)`, and replaces
//! every use of `%r` (directly, through copies or through same-result phis)
//! with `result h`.

use rustc_hash::FxHashSet;
use tracing::{debug, instrument};

use qprofile_ir::{Function, Instruction, InstructionKind, Module, Type};

use crate::allocation::{AllocationManager, ResourceKind};
use crate::context::PassContext;
use crate::error::{ProfileError, ProfileResult};
use crate::intrinsics;
use crate::pass::{Pass, PassKind};
use crate::passes::rewrite::{Position, remove_unused, substitute};
use crate::tracker::join;

const KIND: ResourceKind = ResourceKind::Result;

/// Transformation pass that assigns static addresses to measurement results.
pub struct ResultAllocation;

impl Pass for ResultAllocation {
    fn name(&self) -> &str {
        "result-allocation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    #[instrument(skip_all, name = "result_allocation")]
    fn run(&self, module: &mut Module, ctx: &mut PassContext) -> ProfileResult<()> {
        let mut measured = false;
        for idx in 0..module.functions.len() {
            if module.functions[idx].is_declaration() {
                continue;
            }
            let plan = analyze(&module.functions[idx], ctx)?;
            measured |= !plan.measurements.is_empty();

            let function = &mut module.functions[idx];
            for ((b, i), rewritten) in plan.measurements {
                function.blocks[b].instructions[i] = rewritten;
            }
            let replaced = substitute(function, |v| {
                ctx.tracker()
                    .resolve(v)
                    .filter(|r| r.kind == KIND)
                    .and_then(|r| r.operand())
            });
            let removed = remove_unused(function, plan.removable);
            debug!(
                "{}: replaced {} result operands, removed {} instructions",
                function.name, replaced, removed
            );
        }

        if measured {
            module.declare(intrinsics::MEASURE_Z, [Type::Qubit, Type::Result], Type::Void);
        }
        Ok(())
    }

    fn should_run(&self, module: &Module, _ctx: &PassContext) -> bool {
        module
            .instructions()
            .any(|(_, inst)| inst.is_call_to(intrinsics::MEASURE))
    }
}

#[derive(Default)]
struct Plan {
    measurements: Vec<(Position, Instruction)>,
    removable: FxHashSet<Position>,
}

fn analyze(function: &Function, ctx: &mut PassContext) -> ProfileResult<Plan> {
    let mut plan = Plan::default();
    for b in function.reverse_post_order() {
        for (i, inst) in function.blocks[b].instructions.iter().enumerate() {
            if inst.ty != Type::Result {
                continue;
            }
            let Some(value) = inst.result else {
                continue;
            };
            let (manager, tracker) = ctx.manager_and_tracker(KIND);
            match &inst.kind {
                InstructionKind::Call { callee, args }
                    if callee == intrinsics::MEASURE && args.len() == 1 =>
                {
                    let handle = manager
                        .allocate()
                        .map_err(|e| ProfileError::allocation(KIND, e))?;
                    tracker.record_allocation(value, handle, KIND)?;
                    debug!("{} -> result {}", value, handle);
                    plan.measurements.push((
                        (b, i),
                        Instruction::call(intrinsics::MEASURE_Z, [args[0], KIND.operand(handle)]),
                    ));
                }
                InstructionKind::Copy { source } => {
                    match tracker.resolve_operand(source).filter(|r| r.kind == KIND) {
                        Some(resource) => {
                            tracker.assign(value, resource)?;
                            plan.removable.insert((b, i));
                        }
                        None => tracker.mark_unknown(value),
                    }
                }
                InstructionKind::Phi { incoming } => {
                    let joined = join(incoming.iter().map(|(_, op)| tracker.resolve_operand(op)));
                    match joined.filter(|r| r.kind == KIND) {
                        Some(resource) => {
                            tracker.assign(value, resource)?;
                            plan.removable.insert((b, i));
                        }
                        None => tracker.mark_unknown(value),
                    }
                }
                InstructionKind::Call { .. } => {}
            }
        }
    }
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qprofile_ir::Operand;

    const RECORD: &str = "__quantum__rt__result_record_output";

    fn measuring_module(measurements: usize) -> Module {
        let mut module = Module::new("test");
        intrinsics::declare_runtime(&mut module);
        module.declare(RECORD, [Type::Result], Type::Void);
        let mut b = module.build_function("main", Type::Void);
        b.entry_point();
        for q in 0..measurements as u64 {
            let r = b.call_value(Type::Result, intrinsics::MEASURE, [Operand::Qubit(q)]);
            let alias = b.copy(Type::Result, Operand::Value(r));
            b.call(RECORD, [Operand::Value(alias)]);
        }
        b.ret(None);
        b.finish();
        module
    }

    #[test]
    fn test_measurements_write_static_results() {
        let mut module = measuring_module(2);
        let mut ctx = PassContext::default();
        ResultAllocation.run(&mut module, &mut ctx).unwrap();

        let calls: Vec<(String, Vec<Operand>)> = module
            .function("main")
            .unwrap()
            .instructions()
            .map(|inst| (inst.name().to_string(), inst.args().to_vec()))
            .collect();
        assert_eq!(
            calls,
            vec![
                (
                    intrinsics::MEASURE_Z.to_string(),
                    vec![Operand::Qubit(0), Operand::Result(0)]
                ),
                (RECORD.to_string(), vec![Operand::Result(0)]),
                (
                    intrinsics::MEASURE_Z.to_string(),
                    vec![Operand::Qubit(1), Operand::Result(1)]
                ),
                (RECORD.to_string(), vec![Operand::Result(1)]),
            ]
        );
        assert_eq!(ctx.manager(ResourceKind::Result).max_used(), 2);
        assert!(module.function(intrinsics::MEASURE_Z).is_some());
        assert!(module.verify().is_ok());
    }

    #[test]
    fn test_no_measurements_is_a_no_op() {
        let mut module = measuring_module(0);
        assert!(!ResultAllocation.should_run(&module, &PassContext::default()));

        let before = module.clone();
        ResultAllocation
            .run(&mut module, &mut PassContext::default())
            .unwrap();
        assert_eq!(module, before);
    }

    #[test]
    fn test_bounded_results_exhaust() {
        let mut module = measuring_module(2);
        let mut ctx = PassContext::new(
            Box::new(crate::BasicAllocationManager::no_reuse()),
            Box::new(crate::BasicAllocationManager::bounded(
                crate::AllocationPolicy::NoReuse,
                1,
            )),
            crate::ValueTracker::new(),
        );
        let err = ResultAllocation.run(&mut module, &mut ctx).unwrap_err();
        assert!(matches!(
            err,
            ProfileError::Allocation {
                kind: ResourceKind::Result,
                ..
            }
        ));
    }
}
