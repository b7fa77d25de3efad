//! Modules, the function builder and structural verification.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{IrError, IrResult};
use crate::function::{Block, ENTRY_POINT_ATTR, Function, Param};
use crate::instruction::{Instruction, InstructionKind, Terminator};
use crate::value::{BlockId, Operand, Type, ValueId};

/// Value of a module flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// Boolean flag.
    Bool(bool),
    /// Integer flag.
    Int(i64),
    /// String flag.
    String(String),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{b}"),
            FlagValue::Int(i) => write!(f, "{i}"),
            FlagValue::String(s) => write!(f, "\"{s}\""),
        }
    }
}

/// A program: a set of functions plus module-level flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Module name.
    pub name: String,
    /// Functions, definitions and declarations alike.
    pub functions: Vec<Function>,
    /// Module flags (`qir_major_version`, `dynamic_qubit_management`, ...).
    #[serde(default)]
    pub flags: BTreeMap<String, FlagValue>,
    /// Next unused value id.
    #[serde(default)]
    next_value: u32,
}

impl Module {
    /// Create an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Allocate a fresh value id.
    pub fn fresh_value(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    /// Declare a function if no function of that name exists yet.
    pub fn declare(
        &mut self,
        name: &str,
        signature: impl IntoIterator<Item = Type>,
        return_type: Type,
    ) -> &mut Self {
        if self.function(name).is_none() {
            self.functions
                .push(Function::declaration(name, signature, return_type));
        }
        self
    }

    /// Start building a function definition.
    pub fn build_function(&mut self, name: impl Into<String>, return_type: Type) -> FunctionBuilder<'_> {
        FunctionBuilder::new(self, name.into(), return_type)
    }

    /// Get a function by name.
    pub fn function(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    /// Get a mutable function by name.
    pub fn function_mut(&mut self, name: &str) -> Option<&mut Function> {
        self.functions.iter_mut().find(|f| f.name == name)
    }

    /// Iterate over function definitions (skipping declarations).
    pub fn definitions(&self) -> impl Iterator<Item = &Function> {
        self.functions.iter().filter(|f| !f.is_declaration())
    }

    /// The first definition marked as entry point.
    pub fn entry_point(&self) -> Option<&Function> {
        self.definitions().find(|f| f.is_entry_point())
    }

    /// Mutable access to the entry point.
    pub fn entry_point_mut(&mut self) -> Option<&mut Function> {
        self.functions
            .iter_mut()
            .find(|f| !f.is_declaration() && f.is_entry_point())
    }

    /// Set a module flag.
    pub fn set_flag(&mut self, key: impl Into<String>, value: FlagValue) {
        self.flags.insert(key.into(), value);
    }

    /// Get a module flag.
    pub fn flag(&self, key: &str) -> Option<&FlagValue> {
        self.flags.get(key)
    }

    /// Iterate over every instruction in every definition with its function.
    pub fn instructions(&self) -> impl Iterator<Item = (&Function, &Instruction)> {
        self.definitions()
            .flat_map(|f| f.instructions().map(move |inst| (f, inst)))
    }

    /// Total number of instructions across all definitions.
    pub fn num_instructions(&self) -> usize {
        self.instructions().count()
    }

    /// Check structural well-formedness.
    ///
    /// This is the generic soundness check; it knows nothing about
    /// profiles. It checks unique names and ids, terminated blocks,
    /// resolvable branch targets, single definition of every value, that
    /// every used value is defined in the same function, phi placement and
    /// predecessors, result typing, and call arity against known callees.
    pub fn verify(&self) -> IrResult<()> {
        let mut names = FxHashSet::default();
        for f in &self.functions {
            if !names.insert(f.name.as_str()) {
                return Err(IrError::DuplicateFunction(f.name.clone()));
            }
        }

        let mut defined = FxHashSet::default();
        for f in self.definitions() {
            self.verify_function(f, &mut defined)?;
        }
        Ok(())
    }

    fn verify_function(&self, f: &Function, defined: &mut FxHashSet<ValueId>) -> IrResult<()> {
        let mut blocks = FxHashSet::default();
        for block in &f.blocks {
            if !blocks.insert(block.id) {
                return Err(IrError::DuplicateBlock {
                    function: f.name.clone(),
                    block: block.id,
                });
            }
        }

        let mut preds: FxHashMap<BlockId, Vec<BlockId>> = FxHashMap::default();
        for block in &f.blocks {
            if block.terminator.is_none() {
                return Err(IrError::MissingTerminator {
                    function: f.name.clone(),
                    block: block.id,
                });
            }
            for succ in block.successors() {
                if !blocks.contains(&succ) {
                    return Err(IrError::UnknownBlock {
                        function: f.name.clone(),
                        block: succ,
                    });
                }
                preds.entry(succ).or_default().push(block.id);
            }
        }

        let mut local = FxHashSet::default();
        for param in &f.params {
            if !defined.insert(param.value) {
                return Err(IrError::DuplicateDefinition(param.value));
            }
            local.insert(param.value);
        }
        for inst in f.instructions() {
            if let Some(result) = inst.result {
                if !defined.insert(result) {
                    return Err(IrError::DuplicateDefinition(result));
                }
                local.insert(result);
            }
        }

        let check_use = |op: &Operand| match op {
            Operand::Value(v) if !local.contains(v) => Err(IrError::UndefinedValue {
                function: f.name.clone(),
                value: *v,
            }),
            _ => Ok(()),
        };

        for block in &f.blocks {
            let mut seen_non_phi = false;
            for inst in &block.instructions {
                if inst.result.is_some() == (inst.ty == Type::Void) {
                    return Err(IrError::ResultTypeMismatch {
                        function: f.name.clone(),
                        instruction: inst.name().to_string(),
                    });
                }
                inst.operands().try_for_each(check_use)?;

                match &inst.kind {
                    InstructionKind::Phi { incoming } => {
                        let value = inst.result.unwrap_or(ValueId(u32::MAX));
                        if seen_non_phi {
                            return Err(IrError::MisplacedPhi {
                                function: f.name.clone(),
                                value,
                            });
                        }
                        let block_preds = preds.get(&block.id);
                        for (pred, _) in incoming {
                            if !blocks.contains(pred) {
                                return Err(IrError::UnknownBlock {
                                    function: f.name.clone(),
                                    block: *pred,
                                });
                            }
                            if !block_preds.is_some_and(|p| p.contains(pred)) {
                                return Err(IrError::PhiPredecessor {
                                    function: f.name.clone(),
                                    value,
                                    block: *pred,
                                });
                            }
                        }
                    }
                    InstructionKind::Call { callee, args } => {
                        seen_non_phi = true;
                        if let Some(target) = self.function(callee) {
                            if target.arity() != args.len() {
                                return Err(IrError::ArityMismatch {
                                    callee: callee.clone(),
                                    expected: target.arity(),
                                    got: args.len(),
                                });
                            }
                        }
                    }
                    InstructionKind::Copy { .. } => seen_non_phi = true,
                }
            }
            if let Some(term) = &block.terminator {
                term.operands().try_for_each(check_use)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "; module {}", self.name)?;
        for (key, value) in &self.flags {
            writeln!(f, "!flag {key} = {value}")?;
        }
        for func in &self.functions {
            let params: Vec<String> = if func.is_declaration() {
                func.signature.iter().map(ToString::to_string).collect()
            } else {
                func.params
                    .iter()
                    .map(|p| format!("{} {}", p.ty, p.value))
                    .collect()
            };
            if func.is_declaration() {
                writeln!(f, "declare {} @{}({})", func.return_type, func.name, params.join(", "))?;
                continue;
            }
            let attrs: Vec<String> = func
                .attributes
                .iter()
                .map(|(k, v)| format!("\"{k}\"=\"{v}\""))
                .collect();
            writeln!(
                f,
                "define {} @{}({}) {{{}",
                func.return_type,
                func.name,
                params.join(", "),
                if attrs.is_empty() {
                    String::new()
                } else {
                    format!(" ; {}", attrs.join(" "))
                }
            )?;
            for block in &func.blocks {
                writeln!(f, "{}:  ; {}", block.label, block.id)?;
                for inst in &block.instructions {
                    write!(f, "  ")?;
                    if let Some(result) = inst.result {
                        write!(f, "{result} = ")?;
                    }
                    match &inst.kind {
                        InstructionKind::Call { callee, args } => {
                            let args: Vec<String> = args.iter().map(ToString::to_string).collect();
                            writeln!(f, "call {} @{}({})", inst.ty, callee, args.join(", "))?;
                        }
                        InstructionKind::Copy { source } => {
                            writeln!(f, "copy {} {}", inst.ty, source)?;
                        }
                        InstructionKind::Phi { incoming } => {
                            let arms: Vec<String> = incoming
                                .iter()
                                .map(|(b, op)| format!("[{op}, {b}]"))
                                .collect();
                            writeln!(f, "phi {} {}", inst.ty, arms.join(", "))?;
                        }
                    }
                }
                match &block.terminator {
                    Some(Terminator::Return(Some(op))) => writeln!(f, "  ret {op}")?,
                    Some(Terminator::Return(None)) => writeln!(f, "  ret void")?,
                    Some(Terminator::Branch(b)) => writeln!(f, "  br {b}")?,
                    Some(Terminator::CondBranch {
                        condition,
                        then_block,
                        else_block,
                    }) => writeln!(f, "  br {condition}, {then_block}, {else_block}")?,
                    Some(Terminator::Unreachable) => writeln!(f, "  unreachable")?,
                    None => writeln!(f, "  ; <unterminated>")?,
                }
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

/// Incremental builder for a function definition.
///
/// The builder starts positioned in an `entry` block. The function is added
/// to the module by [`finish`](Self::finish).
pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    function: Function,
    current: usize,
    next_block: u32,
}

impl<'m> FunctionBuilder<'m> {
    fn new(module: &'m mut Module, name: String, return_type: Type) -> Self {
        let mut function = Function::declaration(name, [], return_type);
        function.blocks.push(Block::new(BlockId(0), "entry"));
        Self {
            module,
            function,
            current: 0,
            next_block: 1,
        }
    }

    /// Add a parameter and return its value.
    pub fn param(&mut self, ty: Type) -> ValueId {
        let value = self.module.fresh_value();
        self.function.params.push(Param { value, ty });
        self.function.signature.push(ty);
        value
    }

    /// Set a string attribute.
    pub fn attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.function.set_attribute(key, value);
        self
    }

    /// Mark the function as entry point.
    pub fn entry_point(&mut self) -> &mut Self {
        self.attribute(ENTRY_POINT_ATTR, "")
    }

    /// Create a new block without switching to it.
    pub fn block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        self.function.blocks.push(Block::new(id, label));
        id
    }

    /// Continue inserting into `block`.
    ///
    /// Unknown ids leave the insertion point unchanged.
    pub fn switch_to(&mut self, block: BlockId) -> &mut Self {
        if let Some(idx) = self.function.blocks.iter().position(|b| b.id == block) {
            self.current = idx;
        }
        self
    }

    /// Id of the block currently being filled.
    pub fn current_block(&self) -> BlockId {
        self.function.blocks[self.current].id
    }

    fn push(&mut self, inst: Instruction) {
        self.function.blocks[self.current].instructions.push(inst);
    }

    /// Append a call without a result.
    pub fn call(&mut self, callee: &str, args: impl IntoIterator<Item = Operand>) -> &mut Self {
        self.push(Instruction::call(callee, args));
        self
    }

    /// Append a call producing a value of type `ty`.
    pub fn call_value(
        &mut self,
        ty: Type,
        callee: &str,
        args: impl IntoIterator<Item = Operand>,
    ) -> ValueId {
        let value = self.module.fresh_value();
        self.push(Instruction::call_value(value, ty, callee, args));
        value
    }

    /// Append a copy.
    pub fn copy(&mut self, ty: Type, source: Operand) -> ValueId {
        let value = self.module.fresh_value();
        self.push(Instruction::copy(value, ty, source));
        value
    }

    /// Append a phi.
    pub fn phi(&mut self, ty: Type, incoming: impl IntoIterator<Item = (BlockId, Operand)>) -> ValueId {
        let value = self.module.fresh_value();
        self.push(Instruction::phi(value, ty, incoming));
        value
    }

    /// Terminate the current block.
    pub fn terminate(&mut self, terminator: Terminator) -> &mut Self {
        self.function.blocks[self.current].terminator = Some(terminator);
        self
    }

    /// Terminate with an unconditional branch.
    pub fn branch(&mut self, target: BlockId) -> &mut Self {
        self.terminate(Terminator::Branch(target))
    }

    /// Terminate with a conditional branch.
    pub fn cond_branch(&mut self, condition: Operand, then_block: BlockId, else_block: BlockId) -> &mut Self {
        self.terminate(Terminator::CondBranch {
            condition,
            then_block,
            else_block,
        })
    }

    /// Terminate with a return.
    pub fn ret(&mut self, value: Option<Operand>) -> &mut Self {
        self.terminate(Terminator::Return(value))
    }

    /// Add the function to the module, replacing a declaration of the same
    /// name if present.
    pub fn finish(self) {
        let Self {
            module, function, ..
        } = self;
        match module.functions.iter_mut().find(|f| f.name == function.name) {
            Some(existing) if existing.is_declaration() => *existing = function,
            _ => module.functions.push(function),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bell_like() -> Module {
        let mut module = Module::new("test");
        module.declare("__quantum__rt__qubit_allocate", [], Type::Qubit);
        module.declare("__quantum__qis__h__body", [Type::Qubit], Type::Void);
        let mut b = module.build_function("main", Type::Void);
        b.entry_point();
        let q = b.call_value(Type::Qubit, "__quantum__rt__qubit_allocate", []);
        b.call("__quantum__qis__h__body", [Operand::Value(q)]);
        b.ret(None);
        b.finish();
        module
    }

    #[test]
    fn test_build_and_verify() {
        let module = bell_like();
        assert!(module.verify().is_ok());
        assert_eq!(module.num_instructions(), 2);
        assert_eq!(module.entry_point().map(|f| f.name.as_str()), Some("main"));
    }

    #[test]
    fn test_missing_terminator() {
        let mut module = Module::new("test");
        let b = module.build_function("main", Type::Void);
        b.finish();
        assert!(matches!(
            module.verify(),
            Err(IrError::MissingTerminator { .. })
        ));
    }

    #[test]
    fn test_undefined_value() {
        let mut module = Module::new("test");
        let mut b = module.build_function("main", Type::Void);
        b.call("__quantum__qis__h__body", [Operand::Value(ValueId(42))]);
        b.ret(None);
        b.finish();
        assert!(matches!(
            module.verify(),
            Err(IrError::UndefinedValue { value: ValueId(42), .. })
        ));
    }

    #[test]
    fn test_arity_mismatch() {
        let mut module = bell_like();
        let main = module.function_mut("main").unwrap();
        main.blocks[0].instructions[1] = Instruction::call("__quantum__qis__h__body", []);
        assert!(matches!(
            module.verify(),
            Err(IrError::ArityMismatch { expected: 1, got: 0, .. })
        ));
    }

    #[test]
    fn test_phi_must_name_predecessors() {
        let mut module = Module::new("test");
        let mut b = module.build_function("main", Type::Void);
        let exit = b.block("exit");
        let q = b.call_value(Type::Qubit, "alloc", []);
        b.branch(exit);
        b.switch_to(exit);
        b.phi(Type::Qubit, [(BlockId(7), Operand::Value(q))]);
        b.ret(None);
        b.finish();
        assert!(matches!(
            module.verify(),
            Err(IrError::UnknownBlock { block: BlockId(7), .. })
        ));
    }

    #[test]
    fn test_finish_replaces_declaration() {
        let mut module = Module::new("test");
        module.declare("helper", [Type::Qubit], Type::Void);
        let mut b = module.build_function("helper", Type::Void);
        b.param(Type::Qubit);
        b.ret(None);
        b.finish();
        assert_eq!(module.functions.len(), 1);
        assert!(!module.functions[0].is_declaration());
    }

    #[test]
    fn test_json_roundtrip_preserves_fresh_values() {
        let module = bell_like();
        let json = serde_json::to_string(&module).unwrap();
        let mut restored: Module = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, module);
        assert_eq!(restored.fresh_value(), ValueId(1));
    }

    #[test]
    fn test_display_mentions_entry_point() {
        let text = bell_like().to_string();
        assert!(text.contains("define void @main()"));
        assert!(text.contains("declare qubit @__quantum__rt__qubit_allocate()"));
    }
}
