use emu_core::{ParamRange, ParameterSpace, Sample, SystemId};
use emu_kernel::{fit_system, KernelSettings};

fn space() -> ParameterSpace {
    ParameterSpace::new(vec![
        ParamRange::new("a", 0.0, 4.0),
        ParamRange::new("b", -1.0, 1.0),
    ])
}

fn linear(a: f64, b: f64) -> f64 {
    2.0 * a + 3.0 * b + 1.0
}

fn grid_samples() -> Vec<Sample> {
    let mut samples = Vec::new();
    for i in 0..4 {
        for j in 0..3 {
            let a = i as f64 * 1.2 + 0.1;
            let b = j as f64 * 0.8 - 0.9;
            samples.push(Sample::evaluated(vec![a, b], vec![linear(a, b), (a * b).sin()]));
        }
    }
    samples
}

#[test]
fn linear_model_is_recovered_exactly() {
    let samples = grid_samples();
    let fitted = fit_system(
        SystemId::from_raw(0),
        &samples,
        &space(),
        &KernelSettings::default(),
    )
    .expect("fit");
    assert_eq!(fitted.n_train(), samples.len());
    assert!(fitted.residual_variance() < 1e-18);

    let prediction = fitted.predict(&[2.5, 0.3]).expect("predict");
    assert!((prediction.expectation - linear(2.5, 0.3)).abs() < 1e-8);
    assert!(prediction.variance < 1e-12);
}

#[test]
fn residual_process_interpolates_training_points() {
    let samples = grid_samples();
    let fitted = fit_system(
        SystemId::from_raw(1),
        &samples,
        &space(),
        &KernelSettings::default(),
    )
    .expect("fit");
    assert!(fitted.residual_variance() > 0.0);

    for sample in &samples {
        let prediction = fitted.predict(sample.params()).expect("predict");
        let truth = sample.output(SystemId::from_raw(1)).unwrap();
        assert!(
            (prediction.expectation - truth).abs() < 1e-4,
            "expected {truth}, got {}",
            prediction.expectation
        );
        assert!(prediction.variance < 1e-4 * fitted.residual_variance().max(1.0));
    }

    let away = fitted.predict(&[3.9, 0.95]).expect("predict");
    assert!(away.variance > 0.0);
    assert!(away.variance <= fitted.residual_variance() + 1e-12);
}

#[test]
fn missing_outputs_are_skipped() {
    let mut samples = grid_samples();
    samples.push(Sample::pending(vec![1.0, 0.0]));
    samples.push(Sample::evaluated(vec![1.5, 0.2], vec![f64::NAN, 0.0]));
    let fitted = fit_system(
        SystemId::from_raw(0),
        &samples,
        &space(),
        &KernelSettings::default(),
    )
    .expect("fit");
    assert_eq!(fitted.n_train(), grid_samples().len());
}

#[test]
fn prediction_rejects_wrong_dimension() {
    let fitted = fit_system(
        SystemId::from_raw(0),
        &grid_samples(),
        &space(),
        &KernelSettings::default(),
    )
    .expect("fit");
    let err = fitted.predict(&[1.0]).unwrap_err();
    assert_eq!(err.code(), "numerical_dimension");
}
