//! Instructions and block terminators.

use serde::{Deserialize, Serialize};

use crate::value::{BlockId, Operand, Type, ValueId};

/// The kind of instruction in a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    /// Call to a named function or runtime intrinsic.
    Call {
        /// Name of the callee.
        callee: String,
        /// Call arguments.
        args: Vec<Operand>,
    },
    /// Copy of an operand into a new value (bitcast, assignment).
    Copy {
        /// The copied operand.
        source: Operand,
    },
    /// Control-flow join selecting an operand by predecessor block.
    Phi {
        /// Incoming `(predecessor, operand)` pairs.
        incoming: Vec<(BlockId, Operand)>,
    },
}

/// A complete instruction with its optional result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The value defined by this instruction, if any.
    pub result: Option<ValueId>,
    /// Type of the result (`Void` if none).
    pub ty: Type,
    /// The kind of instruction.
    pub kind: InstructionKind,
}

impl Instruction {
    /// Create a call instruction without a result.
    pub fn call(callee: impl Into<String>, args: impl IntoIterator<Item = Operand>) -> Self {
        Self {
            result: None,
            ty: Type::Void,
            kind: InstructionKind::Call {
                callee: callee.into(),
                args: args.into_iter().collect(),
            },
        }
    }

    /// Create a call instruction defining `result` of type `ty`.
    pub fn call_value(
        result: ValueId,
        ty: Type,
        callee: impl Into<String>,
        args: impl IntoIterator<Item = Operand>,
    ) -> Self {
        Self {
            result: Some(result),
            ty,
            ..Self::call(callee, args)
        }
    }

    /// Create a copy instruction.
    pub fn copy(result: ValueId, ty: Type, source: Operand) -> Self {
        Self {
            result: Some(result),
            ty,
            kind: InstructionKind::Copy { source },
        }
    }

    /// Create a phi instruction.
    pub fn phi(
        result: ValueId,
        ty: Type,
        incoming: impl IntoIterator<Item = (BlockId, Operand)>,
    ) -> Self {
        Self {
            result: Some(result),
            ty,
            kind: InstructionKind::Phi {
                incoming: incoming.into_iter().collect(),
            },
        }
    }

    /// Get the callee if this is a call.
    pub fn callee(&self) -> Option<&str> {
        match &self.kind {
            InstructionKind::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }

    /// Check whether this is a call to `name`.
    pub fn is_call_to(&self, name: &str) -> bool {
        self.callee() == Some(name)
    }

    /// Get the call arguments, or an empty slice for non-calls.
    pub fn args(&self) -> &[Operand] {
        match &self.kind {
            InstructionKind::Call { args, .. } => args,
            _ => &[],
        }
    }

    /// Check if this is a copy.
    pub fn is_copy(&self) -> bool {
        matches!(self.kind, InstructionKind::Copy { .. })
    }

    /// Check if this is a phi.
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, InstructionKind::Phi { .. })
    }

    /// Iterate over all operands.
    pub fn operands(&self) -> Box<dyn Iterator<Item = &Operand> + '_> {
        match &self.kind {
            InstructionKind::Call { args, .. } => Box::new(args.iter()),
            InstructionKind::Copy { source } => Box::new(std::iter::once(source)),
            InstructionKind::Phi { incoming } => Box::new(incoming.iter().map(|(_, op)| op)),
        }
    }

    /// Iterate mutably over all operands.
    pub fn operands_mut(&mut self) -> Box<dyn Iterator<Item = &mut Operand> + '_> {
        match &mut self.kind {
            InstructionKind::Call { args, .. } => Box::new(args.iter_mut()),
            InstructionKind::Copy { source } => Box::new(std::iter::once(source)),
            InstructionKind::Phi { incoming } => {
                Box::new(incoming.iter_mut().map(|(_, op)| op))
            }
        }
    }

    /// Short mnemonic for logging.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Call { callee, .. } => callee,
            InstructionKind::Copy { .. } => "copy",
            InstructionKind::Phi { .. } => "phi",
        }
    }
}

/// The instruction that ends a basic block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    /// Return from the function.
    Return(Option<Operand>),
    /// Unconditional branch.
    Branch(BlockId),
    /// Two-way conditional branch.
    CondBranch {
        /// Branch condition.
        condition: Operand,
        /// Target when the condition holds.
        then_block: BlockId,
        /// Target otherwise.
        else_block: BlockId,
    },
    /// Control never reaches the end of the block.
    Unreachable,
}

impl Terminator {
    /// Successor blocks in branch order.
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Terminator::Branch(b) => vec![*b],
            Terminator::CondBranch {
                then_block,
                else_block,
                ..
            } => vec![*then_block, *else_block],
            Terminator::Return(_) | Terminator::Unreachable => vec![],
        }
    }

    /// Iterate mutably over the operands of the terminator.
    pub fn operands_mut(&mut self) -> impl Iterator<Item = &mut Operand> {
        match self {
            Terminator::Return(op) => op.as_mut(),
            Terminator::CondBranch { condition, .. } => Some(condition),
            Terminator::Branch(_) | Terminator::Unreachable => None,
        }
        .into_iter()
    }

    /// Iterate over the operands of the terminator.
    pub fn operands(&self) -> impl Iterator<Item = &Operand> {
        match self {
            Terminator::Return(op) => op.as_ref(),
            Terminator::CondBranch { condition, .. } => Some(condition),
            Terminator::Branch(_) | Terminator::Unreachable => None,
        }
        .into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_instruction() {
        let inst = Instruction::call("__quantum__qis__h__body", [Operand::Qubit(0)]);
        assert!(inst.is_call_to("__quantum__qis__h__body"));
        assert_eq!(inst.result, None);
        assert_eq!(inst.args().len(), 1);
        assert_eq!(inst.name(), "__quantum__qis__h__body");
    }

    #[test]
    fn test_phi_operands() {
        let mut inst = Instruction::phi(
            ValueId(5),
            Type::Qubit,
            [
                (BlockId(0), Operand::Value(ValueId(1))),
                (BlockId(1), Operand::Value(ValueId(2))),
            ],
        );
        assert!(inst.is_phi());
        assert_eq!(inst.operands().count(), 2);

        for op in inst.operands_mut() {
            *op = Operand::Qubit(0);
        }
        assert!(inst.operands().all(Operand::is_constant));
    }

    #[test]
    fn test_terminator_successors() {
        let term = Terminator::CondBranch {
            condition: Operand::Bool(true),
            then_block: BlockId(1),
            else_block: BlockId(2),
        };
        assert_eq!(term.successors(), vec![BlockId(1), BlockId(2)]);
        assert!(Terminator::Return(None).successors().is_empty());
    }
}
