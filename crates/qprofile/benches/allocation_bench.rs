//! Benchmarks for static allocation
//!
//! Run with: cargo bench -p qprofile

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use qprofile::intrinsics;
use qprofile::{AllocationManager, BasicAllocationManager, ProfileConfig};
use qprofile_ir::{Module, Operand, Type};

/// Build an entry point that acquires `n` qubits and entangles neighbours.
fn dynamic_chain(n: usize) -> Module {
    let mut module = Module::new("chain");
    intrinsics::declare_runtime(&mut module);
    module.declare("__quantum__qis__h__body", [Type::Qubit], Type::Void);
    module.declare("__quantum__qis__cx__body", [Type::Qubit, Type::Qubit], Type::Void);

    let mut main = module.build_function("main", Type::Void);
    main.entry_point();
    let qubits: Vec<_> = (0..n)
        .map(|_| main.call_value(Type::Qubit, intrinsics::QUBIT_ALLOCATE, []))
        .collect();
    main.call("__quantum__qis__h__body", [Operand::Value(qubits[0])]);
    for pair in qubits.windows(2) {
        main.call(
            "__quantum__qis__cx__body",
            [Operand::Value(pair[0]), Operand::Value(pair[1])],
        );
    }
    for q in &qubits {
        main.call_value(Type::Result, intrinsics::MEASURE, [Operand::Value(*q)]);
    }
    main.ret(None);
    main.finish();
    module
}

/// Benchmark handle churn on the reusing manager
fn bench_manager(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocation_manager");

    for n in &[16u64, 256, 4096] {
        group.bench_with_input(BenchmarkId::new("allocate_release", n), n, |b, &n| {
            b.iter(|| {
                let mut manager = BasicAllocationManager::reuse();
                for _ in 0..n {
                    let h = manager.allocate().unwrap();
                    if h.0 % 2 == 0 {
                        manager.release(h).unwrap();
                    }
                }
                black_box(manager.max_used())
            });
        });
    }

    group.finish();
}

/// Benchmark the base profile end to end
fn bench_base_profile(c: &mut Criterion) {
    let mut group = c.benchmark_group("base_profile");

    for n in &[2usize, 20, 200] {
        let module = dynamic_chain(*n);
        group.bench_with_input(BenchmarkId::new("apply_validate", n), &module, |b, module| {
            b.iter(|| {
                let mut module = module.clone();
                let mut profile = ProfileConfig::base().build().unwrap();
                profile.apply(&mut module).unwrap();
                black_box(profile.validate(&module))
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_manager, bench_base_profile);

criterion_main!(benches);
