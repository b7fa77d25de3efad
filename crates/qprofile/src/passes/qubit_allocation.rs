//! Static qubit allocation.
//!
//! Replaces dynamic qubit acquisition with static qubit addresses. Each
//! function is walked in reverse post-order of its control-flow graph so
//! that acquisitions are seen before their uses:
//!
//! - `__quantum__rt__qubit_allocate` draws a handle from the qubit manager;
//! - `__quantum__rt__qubit_allocate_array(n)` with a constant `n` draws a
//!   contiguous block;
//! - `__quantum__rt__array_get_element_ptr_1d(a, i)` with a constant `i`
//!   inside a known block resolves to that element;
//! - copies propagate and phis join through the value tracker;
//! - releases of resolved qubits return the handles when the manager
//!   reuses handles and no other function manages qubits, and are removed.
//!
//! Every use of a resolved value is then replaced by its static address and
//! the acquisition instructions are removed. Values that cannot be resolved
//! are left in place.

use rustc_hash::FxHashSet;
use tracing::{debug, instrument};

use qprofile_ir::{Function, InstructionKind, Module, Operand, Terminator, Type};

use crate::allocation::{AllocationManager, ResourceKind};
use crate::context::PassContext;
use crate::error::{ProfileError, ProfileResult};
use crate::intrinsics;
use crate::pass::{Pass, PassKind};
use crate::passes::rewrite::{Position, remove_unused, substitute};
use crate::tracker::{TrackedResource, join};

const KIND: ResourceKind = ResourceKind::Qubit;

/// Transformation pass that assigns static addresses to dynamic qubits.
pub struct QubitAllocation;

impl Pass for QubitAllocation {
    fn name(&self) -> &str {
        "qubit-allocation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    #[instrument(skip_all, name = "qubit_allocation")]
    fn run(&self, module: &mut Module, ctx: &mut PassContext) -> ProfileResult<()> {
        let managing = module.definitions().filter(|f| manages_qubits(f)).count();
        if managing > 1 && ctx.manager(KIND).reuses_handles() {
            debug!("{} functions manage qubits, releases will not be reused", managing);
        }
        for idx in 0..module.functions.len() {
            if module.functions[idx].is_declaration() {
                continue;
            }
            let removable = analyze(&module.functions[idx], ctx, managing <= 1)?;
            let function = &mut module.functions[idx];
            let replaced = substitute(function, |v| ctx.tracker().resolve(v).and_then(|r| r.operand()));
            let removed = remove_unused(function, removable);
            debug!(
                "{}: replaced {} qubit operands, removed {} instructions",
                function.name, replaced, removed
            );
        }
        Ok(())
    }

    fn should_run(&self, module: &Module, _ctx: &PassContext) -> bool {
        module
            .instructions()
            .any(|(_, inst)| inst.callee().is_some_and(intrinsics::is_qubit_management))
    }
}

fn manages_qubits(function: &Function) -> bool {
    function
        .instructions()
        .any(|inst| inst.callee().is_some_and(intrinsics::is_qubit_management))
}

fn is_qubit_typed(ty: Type) -> bool {
    matches!(ty, Type::Qubit | Type::Array)
}

fn resolved_qubits(resource: Option<TrackedResource>) -> Option<TrackedResource> {
    resource.filter(|r| r.kind == KIND)
}

/// Record every resolvable acquisition of `function` and return the
/// positions of the instructions the rewrite may drop.
///
/// Released handles go back to the manager only when `function` is the
/// sole owner of dynamic qubits in the module, is straight-line and does
/// not call itself. Any other release keeps its handle reserved, so a
/// qubit live across a call never shares an address with the callee's.
fn analyze(
    function: &Function,
    ctx: &mut PassContext,
    sole_owner: bool,
) -> ProfileResult<FxHashSet<Position>> {
    let straight_line = !function
        .blocks
        .iter()
        .any(|b| matches!(b.terminator, Some(Terminator::CondBranch { .. })));
    let recursive = function.instructions().any(|inst| inst.is_call_to(&function.name));
    let reuses = ctx.manager(KIND).reuses_handles();
    let honor_releases = reuses && sole_owner && straight_line && !recursive;
    if reuses && sole_owner && !honor_releases {
        debug!(
            "{}: branching or recursive control flow, qubit releases will not be reused",
            function.name
        );
    }

    let mut removable = FxHashSet::default();
    for b in function.reverse_post_order() {
        for (i, inst) in function.blocks[b].instructions.iter().enumerate() {
            let (manager, tracker) = ctx.manager_and_tracker(KIND);
            match (&inst.kind, inst.result) {
                (InstructionKind::Call { callee, .. }, Some(value))
                    if callee == intrinsics::QUBIT_ALLOCATE =>
                {
                    let handle = manager
                        .allocate()
                        .map_err(|e| ProfileError::allocation(KIND, e))?;
                    tracker.record_allocation(value, handle, KIND)?;
                    debug!("{} -> qubit {}", value, handle);
                    removable.insert((b, i));
                }
                (InstructionKind::Call { callee, args }, Some(value))
                    if callee == intrinsics::QUBIT_ALLOCATE_ARRAY =>
                {
                    match args.first().and_then(Operand::as_int) {
                        Some(size) if size >= 0 => {
                            let size = size as u64;
                            let base = manager
                                .allocate_block(size)
                                .map_err(|e| ProfileError::allocation(KIND, e))?;
                            tracker.record_block(value, base, size, KIND)?;
                            debug!("{} -> qubits {}..{}", value, base, base.0 + size);
                            removable.insert((b, i));
                        }
                        _ => {
                            debug!("{}: qubit array {} has no constant size", function.name, value);
                            tracker.mark_unknown(value);
                        }
                    }
                }
                (InstructionKind::Call { callee, args }, Some(value))
                    if callee == intrinsics::ARRAY_GET_ELEMENT_PTR_1D =>
                {
                    let element = match (args.first(), args.get(1).and_then(Operand::as_int)) {
                        (Some(array), Some(index)) if index >= 0 => {
                            resolved_qubits(tracker.resolve_operand(array))
                                .filter(TrackedResource::is_block)
                                .and_then(|block| block.element(index as u64))
                        }
                        _ => None,
                    };
                    match element {
                        Some(element) => {
                            tracker.assign(value, element)?;
                            removable.insert((b, i));
                        }
                        None => tracker.mark_unknown(value),
                    }
                }
                (InstructionKind::Call { callee, args }, None)
                    if callee == intrinsics::QUBIT_RELEASE
                        || callee == intrinsics::QUBIT_RELEASE_ARRAY =>
                {
                    let Some(resource) = args
                        .first()
                        .and_then(|op| resolved_qubits(tracker.resolve_operand(op)))
                    else {
                        continue;
                    };
                    if honor_releases {
                        for handle in resource.handles() {
                            manager
                                .release(handle)
                                .map_err(|e| ProfileError::allocation(KIND, e))?;
                        }
                    }
                    removable.insert((b, i));
                }
                (InstructionKind::Copy { source }, Some(value)) if is_qubit_typed(inst.ty) => {
                    if let Some(resource) = resolved_qubits(tracker.resolve_operand(source)) {
                        tracker.assign(value, resource)?;
                        removable.insert((b, i));
                    } else {
                        tracker.mark_unknown(value);
                    }
                }
                (InstructionKind::Phi { incoming }, Some(value)) if is_qubit_typed(inst.ty) => {
                    let joined = join(incoming.iter().map(|(_, op)| tracker.resolve_operand(op)));
                    match resolved_qubits(joined) {
                        Some(resource) => {
                            tracker.assign(value, resource)?;
                            removable.insert((b, i));
                        }
                        None => {
                            debug!("{}: phi {} joins different qubits", function.name, value);
                            tracker.mark_unknown(value);
                        }
                    }
                }
                _ => {}
            }
        }
    }
    Ok(removable)
}
