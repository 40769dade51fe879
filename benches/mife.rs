use criterion::{criterion_group, criterion_main, Criterion};
use mife_core::circuit::{CircOp, Circuit, Gate};
use mife_core::{CircuitParams, DummyBackend, MifeInstance};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;

/// Two slots of width `d`; the single output multiplies every input together.
fn product_circuit(d: usize) -> Circuit {
    let ninputs = 2 * d;
    let mut gates: Vec<Gate> = (0..ninputs).map(Gate::Input).collect();
    for i in 1..ninputs {
        let lhs = if i == 1 { 0 } else { ninputs + i - 2 };
        gates.push(Gate::Op { op: CircOp::Mul, lhs, rhs: i });
    }
    let out = gates.len() - 1;
    Circuit::new(
        gates,
        vec![out],
        vec![d, d],
        vec![false, false],
        vec![],
        true,
        vec![],
    )
    .unwrap()
}

fn bench_mife(c: &mut Criterion) {
    let mut group = c.benchmark_group("mife");
    for d in [2, 4, 8] {
        let cp = Arc::new(CircuitParams::new(Arc::new(product_circuit(d))));

        group.bench_function(format!("setup/d={d}"), |bench| {
            bench.iter(|| {
                let mut rng = StdRng::seed_from_u64(1);
                MifeInstance::<DummyBackend>::setup(cp.clone(), 8, 0, 8, 0, &mut rng).unwrap()
            });
        });

        let mut rng = StdRng::seed_from_u64(1);
        let inst =
            MifeInstance::<DummyBackend>::setup(cp.clone(), 8, 0, 8, 0, &mut rng).unwrap();
        let (sk, ek) = inst.into_keys();

        group.bench_function(format!("encrypt/d={d}"), |bench| {
            bench.iter(|| sk.encrypt(0, &vec![1; d], 0, &mut rng).unwrap());
        });

        let cts: Vec<_> = (0..2)
            .map(|i| sk.encrypt(i, &vec![1; d], 0, &mut rng).unwrap())
            .collect();
        group.bench_function(format!("decrypt/d={d}"), |bench| {
            bench.iter(|| ek.decrypt(&cts, 0).unwrap());
        });
    }
    group.finish()
}

criterion_main!(mife);
criterion_group!(mife, bench_mife);
