use emu_core::{EmuError, ParamRange, ParameterSpace, Sample, SystemId};
use emu_kernel::{fit_system, KernelSettings};

fn line_space() -> ParameterSpace {
    ParameterSpace::new(vec![ParamRange::new("x", 0.0, 4.0)])
}

#[test]
fn duplicate_samples_without_nugget_are_singular() {
    let samples = vec![
        Sample::evaluated(vec![1.0], vec![1.0]),
        Sample::evaluated(vec![1.0], vec![2.0]),
        Sample::evaluated(vec![2.0], vec![3.0]),
    ];
    let settings = KernelSettings {
        poly_order: 0,
        nugget: 0.0,
        ..KernelSettings::default()
    };
    let err = fit_system(SystemId::from_raw(0), &samples, &line_space(), &settings).unwrap_err();
    assert!(matches!(err, EmuError::Numerical(_)));
    assert_eq!(err.code(), "numerical_singular");
    assert_eq!(err.info().context.get("system").map(String::as_str), Some("0"));
}

#[test]
fn too_few_samples_are_underdetermined() {
    let space = ParameterSpace::new(vec![
        ParamRange::new("a", 0.0, 1.0),
        ParamRange::new("b", 0.0, 1.0),
    ]);
    let samples = vec![
        Sample::evaluated(vec![0.1, 0.2], vec![1.0]),
        Sample::evaluated(vec![0.5, 0.7], vec![2.0]),
        Sample::evaluated(vec![0.9, 0.4], vec![3.0]),
    ];
    let settings = KernelSettings {
        poly_order: 2,
        ..KernelSettings::default()
    };
    let err = fit_system(SystemId::from_raw(0), &samples, &space, &settings).unwrap_err();
    assert_eq!(err.code(), "numerical_underdetermined");
}

#[test]
fn no_evaluated_samples_is_an_error() {
    let samples = vec![Sample::pending(vec![1.0])];
    let err = fit_system(
        SystemId::from_raw(0),
        &samples,
        &line_space(),
        &KernelSettings::default(),
    )
    .unwrap_err();
    assert_eq!(err.code(), "numerical_underdetermined");
}

#[test]
fn invalid_settings_are_config_errors() {
    let samples = vec![Sample::evaluated(vec![1.0], vec![1.0])];
    let settings = KernelSettings {
        corr_length: 0.0,
        ..KernelSettings::default()
    };
    let err = fit_system(SystemId::from_raw(0), &samples, &line_space(), &settings).unwrap_err();
    assert!(matches!(err, EmuError::Config(_)));

    let settings = KernelSettings {
        poly_order: 3,
        ..KernelSettings::default()
    };
    let err = fit_system(SystemId::from_raw(0), &samples, &line_space(), &settings).unwrap_err();
    assert_eq!(err.code(), "config_poly_order");
}
