//! Names and signatures of the runtime and instruction-set intrinsics the
//! profile passes and rules know about.

use qprofile_ir::{Module, Type};

/// Prefix of instruction-set intrinsics.
pub const QIS_PREFIX: &str = "__quantum__qis__";
/// Prefix of runtime intrinsics.
pub const RT_PREFIX: &str = "__quantum__rt__";
/// Prefix shared by every dynamic qubit management intrinsic.
pub const QUBIT_MANAGEMENT_PREFIX: &str = "__quantum__rt__qubit_";

/// Acquire one dynamic qubit.
pub const QUBIT_ALLOCATE: &str = "__quantum__rt__qubit_allocate";
/// Acquire an array of dynamic qubits.
pub const QUBIT_ALLOCATE_ARRAY: &str = "__quantum__rt__qubit_allocate_array";
/// Release one dynamic qubit.
pub const QUBIT_RELEASE: &str = "__quantum__rt__qubit_release";
/// Release an array of dynamic qubits.
pub const QUBIT_RELEASE_ARRAY: &str = "__quantum__rt__qubit_release_array";
/// Element of a one-dimensional qubit array.
pub const ARRAY_GET_ELEMENT_PTR_1D: &str = "__quantum__rt__array_get_element_ptr_1d";

/// Measurement returning a fresh dynamic result.
pub const MEASURE: &str = "__quantum__qis__m__body";
/// Measurement writing into a static result.
pub const MEASURE_Z: &str = "__quantum__qis__mz__body";

/// Entry-point attribute holding the number of qubits used.
pub const REQUIRED_NUM_QUBITS: &str = "required_num_qubits";
/// Entry-point attribute holding the number of results used.
pub const REQUIRED_NUM_RESULTS: &str = "required_num_results";

/// Module flag holding the QIR major version.
pub const FLAG_QIR_MAJOR_VERSION: &str = "qir_major_version";
/// Module flag holding the QIR minor version.
pub const FLAG_QIR_MINOR_VERSION: &str = "qir_minor_version";
/// Module flag set when dynamic qubit management remains.
pub const FLAG_DYNAMIC_QUBIT_MANAGEMENT: &str = "dynamic_qubit_management";
/// Module flag set when dynamic result management remains.
pub const FLAG_DYNAMIC_RESULT_MANAGEMENT: &str = "dynamic_result_management";

/// Instruction-set intrinsics legal in the base profile.
pub const BASE_QIS: [&str; 20] = [
    "__quantum__qis__h__body",
    "__quantum__qis__x__body",
    "__quantum__qis__y__body",
    "__quantum__qis__z__body",
    "__quantum__qis__s__body",
    "__quantum__qis__s__adj",
    "__quantum__qis__t__body",
    "__quantum__qis__t__adj",
    "__quantum__qis__rx__body",
    "__quantum__qis__ry__body",
    "__quantum__qis__rz__body",
    "__quantum__qis__rxy__body",
    "__quantum__qis__rzz__body",
    "__quantum__qis__cz__body",
    "__quantum__qis__cx__body",
    "__quantum__qis__cnot__body",
    "__quantum__qis__ccx__body",
    "__quantum__qis__reset__body",
    "__quantum__qis__mz__body",
    "__quantum__qis__mresetz__body",
];

/// Runtime intrinsics legal in the base profile.
pub const BASE_RT: [&str; 7] = [
    "__quantum__rt__initialize",
    "__quantum__rt__result_record_output",
    "__quantum__rt__array_record_output",
    "__quantum__rt__tuple_record_output",
    "__quantum__rt__bool_record_output",
    "__quantum__rt__int_record_output",
    "__quantum__rt__double_record_output",
];

/// Whether `name` is an intrinsic (instruction-set or runtime).
pub fn is_intrinsic(name: &str) -> bool {
    name.starts_with(QIS_PREFIX) || name.starts_with(RT_PREFIX)
}

/// Whether `name` is legal in the base profile. Non-intrinsic callees are
/// always legal.
pub fn is_base_profile_callee(name: &str) -> bool {
    if name.starts_with(QIS_PREFIX) {
        BASE_QIS.contains(&name)
    } else if name.starts_with(RT_PREFIX) {
        BASE_RT.contains(&name)
    } else {
        true
    }
}

/// Whether `name` acquires or releases qubits at run time.
pub fn is_qubit_management(name: &str) -> bool {
    name.starts_with(QUBIT_MANAGEMENT_PREFIX)
}

/// Declare the dynamic management intrinsics used by the allocation passes.
pub fn declare_runtime(module: &mut Module) {
    module
        .declare(QUBIT_ALLOCATE, [], Type::Qubit)
        .declare(QUBIT_ALLOCATE_ARRAY, [Type::Int], Type::Array)
        .declare(QUBIT_RELEASE, [Type::Qubit], Type::Void)
        .declare(QUBIT_RELEASE_ARRAY, [Type::Array], Type::Void)
        .declare(ARRAY_GET_ELEMENT_PTR_1D, [Type::Array, Type::Int], Type::Qubit)
        .declare(MEASURE, [Type::Qubit], Type::Result);
}
