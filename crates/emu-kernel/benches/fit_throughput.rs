use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use emu_core::{ParamRange, ParameterSpace, Sample, SystemId};
use emu_kernel::{fit_system, KernelSettings};

fn samples(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            let a = (i as f64 * 0.618_033_988_75).fract() * 10.0;
            let b = (i as f64 * 0.414_213_562_37).fract() * 5.0;
            Sample::evaluated(vec![a, b], vec![a * (-b).exp() + b])
        })
        .collect()
}

fn bench_fit(c: &mut Criterion) {
    let space = ParameterSpace::new(vec![
        ParamRange::new("a", 0.0, 10.0),
        ParamRange::new("b", 0.0, 5.0),
    ]);
    let settings = KernelSettings::default();
    let mut group = c.benchmark_group("fit_system");
    for n in [50usize, 100, 200] {
        let data = samples(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &data, |b, data| {
            b.iter(|| fit_system(SystemId::from_raw(0), data, &space, &settings).expect("fit"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fit);
criterion_main!(benches);
