//! Rewriting helpers shared by the allocation passes.

use rustc_hash::FxHashSet;

use qprofile_ir::{Function, Operand, ValueId};

/// Position of an instruction: `(block index, instruction index)`.
pub(crate) type Position = (usize, usize);

/// Replace every use of a value for which `resolve` yields an operand.
///
/// Returns the number of operands replaced.
pub(crate) fn substitute(function: &mut Function, resolve: impl Fn(ValueId) -> Option<Operand>) -> usize {
    let mut replaced = 0;
    let mut apply = |op: &mut Operand| {
        if let Some(new) = op.as_value().and_then(&resolve) {
            *op = new;
            replaced += 1;
        }
    };
    for block in &mut function.blocks {
        for inst in &mut block.instructions {
            inst.operands_mut().for_each(&mut apply);
        }
        if let Some(term) = &mut block.terminator {
            term.operands_mut().for_each(&mut apply);
        }
    }
    replaced
}

/// Remove the instructions at `candidates` whose result is unused.
///
/// A candidate whose result is still used by a surviving instruction or a
/// terminator is kept, and so are the candidates it depends on. Returns
/// the number of instructions removed.
pub(crate) fn remove_unused(function: &mut Function, mut candidates: FxHashSet<Position>) -> usize {
    loop {
        let mut used: FxHashSet<ValueId> = FxHashSet::default();
        for (b, block) in function.blocks.iter().enumerate() {
            for (i, inst) in block.instructions.iter().enumerate() {
                if !candidates.contains(&(b, i)) {
                    used.extend(inst.operands().filter_map(Operand::as_value));
                }
            }
            if let Some(term) = &block.terminator {
                used.extend(term.operands().filter_map(Operand::as_value));
            }
        }

        let revived: Vec<Position> = candidates
            .iter()
            .copied()
            .filter(|&(b, i)| {
                function.blocks[b].instructions[i]
                    .result
                    .is_some_and(|r| used.contains(&r))
            })
            .collect();
        if revived.is_empty() {
            break;
        }
        for pos in revived {
            candidates.remove(&pos);
        }
    }

    let mut removed = 0;
    for (b, block) in function.blocks.iter_mut().enumerate() {
        let mut i = 0;
        block.instructions.retain(|_| {
            let keep = !candidates.contains(&(b, i));
            i += 1;
            if !keep {
                removed += 1;
            }
            keep
        });
    }
    removed
}
