use std::path::PathBuf;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use emu_core::ThreadSetting;
use emu_pipe::{Controller, PipelineConfig};

fn smoke_config(processes: usize) -> PipelineConfig {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../..")
        .join("configs/smoke.yaml");
    let mut config = PipelineConfig::load(&path).expect("load smoke config");
    config.runtime.processes = processes;
    config.runtime.threads = Some(ThreadSetting::Explicit(1));
    config.continuation.max_iterations = 2;
    config
}

fn bench_construct(c: &mut Criterion) {
    let mut group = c.benchmark_group("construct");
    group.sample_size(10);
    for processes in [1usize, 2, 4] {
        let controller = Controller::new(smoke_config(processes)).expect("controller");
        group.bench_with_input(
            BenchmarkId::from_parameter(processes),
            &controller,
            |b, controller| {
                b.iter(|| controller.construct().expect("construct"));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_construct);
criterion_main!(benches);
