//! Built-in compliance rules.
//!
//! Every rule is a plain function from a module to a [`RuleOutcome`] and can
//! be installed by name with [`Validator::from_rule_names`](super::Validator::from_rule_names).

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use qprofile_ir::{FlagValue, Function, InstructionKind, Module, Operand, Type, ValueId};

use super::RuleOutcome;
use crate::intrinsics;

/// Signature of a built-in rule.
pub type RuleFn = fn(&Module) -> RuleOutcome;

/// Names of the built-in rules, in the order of the base profile.
pub const BUILTIN_RULES: [&str; 7] = [
    "no-dynamic-qubit-management",
    "no-dynamic-result-management",
    "static-resource-operands",
    "single-entry-point",
    "required-resource-attributes",
    "allowed-intrinsics",
    "module-flags",
];

/// Look up a built-in rule.
pub fn builtin(name: &str) -> Option<RuleFn> {
    let rule: RuleFn = match name {
        "no-dynamic-qubit-management" => no_dynamic_qubit_management,
        "no-dynamic-result-management" => no_dynamic_result_management,
        "static-resource-operands" => static_resource_operands,
        "single-entry-point" => single_entry_point,
        "required-resource-attributes" => required_resource_attributes,
        "allowed-intrinsics" => allowed_intrinsics,
        "module-flags" => module_flags,
        _ => return None,
    };
    Some(rule)
}

/// No call to a dynamic qubit acquisition or release intrinsic remains.
pub fn no_dynamic_qubit_management(module: &Module) -> RuleOutcome {
    let found = module.instructions().find_map(|(f, inst)| {
        inst.callee()
            .filter(|c| intrinsics::is_qubit_management(c))
            .map(|c| (f.name.as_str(), c))
    });
    match found {
        Some((function, callee)) => RuleOutcome::fail(format!("`{function}` calls `{callee}`")),
        None => RuleOutcome::pass(),
    }
}

/// No instruction produces a dynamic result value.
pub fn no_dynamic_result_management(module: &Module) -> RuleOutcome {
    let found = module
        .instructions()
        .find(|(_, inst)| inst.result.is_some() && inst.ty == Type::Result);
    match found {
        Some((function, inst)) => RuleOutcome::fail(format!(
            "`{}` produces a dynamic result with `{}`",
            function.name,
            inst.name()
        )),
        None => RuleOutcome::pass(),
    }
}

fn value_types(function: &Function) -> FxHashMap<ValueId, Type> {
    function
        .params
        .iter()
        .map(|p| (p.value, p.ty))
        .chain(
            function
                .instructions()
                .filter_map(|inst| inst.result.map(|r| (r, inst.ty))),
        )
        .collect()
}

/// Every qubit or result argument of a call is a static address.
pub fn static_resource_operands(module: &Module) -> RuleOutcome {
    let mut offenders = vec![];
    for function in module.definitions() {
        let types = value_types(function);
        for inst in function.instructions() {
            let InstructionKind::Call { callee, args } = &inst.kind else {
                continue;
            };
            for arg in args {
                if let Operand::Value(v) = arg {
                    if types.get(v).is_some_and(|ty| ty.is_resource()) {
                        offenders.push(format!("{v} in call to `{callee}` in `{}`", function.name));
                    }
                }
            }
        }
    }
    if offenders.is_empty() {
        RuleOutcome::pass()
    } else {
        RuleOutcome::fail(format!("dynamic resource operands: {}", offenders.join(", ")))
    }
}

/// Exactly one definition is marked as entry point.
pub fn single_entry_point(module: &Module) -> RuleOutcome {
    let entries: Vec<&str> = module
        .definitions()
        .filter(|f| f.is_entry_point())
        .map(|f| f.name.as_str())
        .collect();
    match entries.len() {
        1 => RuleOutcome::pass(),
        0 => RuleOutcome::fail("no entry point"),
        _ => RuleOutcome::fail(format!("multiple entry points: {}", entries.join(", "))),
    }
}

/// The entry point declares how many qubits and results it needs.
pub fn required_resource_attributes(module: &Module) -> RuleOutcome {
    let Some(entry) = module.entry_point() else {
        return RuleOutcome::fail("no entry point");
    };
    let missing: Vec<&str> = [intrinsics::REQUIRED_NUM_QUBITS, intrinsics::REQUIRED_NUM_RESULTS]
        .into_iter()
        .filter(|key| entry.attribute(key).and_then(|v| v.parse::<u64>().ok()).is_none())
        .collect();
    if missing.is_empty() {
        RuleOutcome::pass()
    } else {
        RuleOutcome::fail(format!(
            "`{}` is missing numeric attributes: {}",
            entry.name,
            missing.join(", ")
        ))
    }
}

/// Every intrinsic called is part of the base profile.
pub fn allowed_intrinsics(module: &Module) -> RuleOutcome {
    let illegal: BTreeSet<&str> = module
        .instructions()
        .filter_map(|(_, inst)| inst.callee())
        .filter(|c| !intrinsics::is_base_profile_callee(c))
        .collect();
    if illegal.is_empty() {
        RuleOutcome::pass()
    } else {
        RuleOutcome::fail(format!(
            "intrinsics outside the profile: {}",
            illegal.into_iter().collect::<Vec<_>>().join(", ")
        ))
    }
}

/// The module flags declare a static-resource QIR 1.x program.
pub fn module_flags(module: &Module) -> RuleOutcome {
    let expected = [
        (intrinsics::FLAG_QIR_MAJOR_VERSION, FlagValue::Int(1)),
        (intrinsics::FLAG_DYNAMIC_QUBIT_MANAGEMENT, FlagValue::Bool(false)),
        (intrinsics::FLAG_DYNAMIC_RESULT_MANAGEMENT, FlagValue::Bool(false)),
    ];
    let wrong: Vec<String> = expected
        .iter()
        .filter(|(key, value)| module.flag(key) != Some(value))
        .map(|(key, value)| match module.flag(key) {
            Some(actual) => format!("{key} is {actual}, expected {value}"),
            None => format!("{key} is missing, expected {value}"),
        })
        .collect();
    if wrong.is_empty() {
        RuleOutcome::pass()
    } else {
        RuleOutcome::fail(wrong.join("; "))
    }
}
