use emu_core::{ParamRange, ParameterSpace, Sample, SystemId};
use emu_kernel::{fit_system, FittedSystem, KernelSettings};

#[test]
fn fitted_system_survives_wire_encoding() {
    let space = ParameterSpace::new(vec![ParamRange::new("x", 0.0, 1.0)]);
    let samples: Vec<Sample> = (0..6)
        .map(|i| {
            let x = i as f64 / 5.0;
            Sample::evaluated(vec![x], vec![x * x])
        })
        .collect();
    let fitted = fit_system(
        SystemId::from_raw(0),
        &samples,
        &space,
        &KernelSettings::default(),
    )
    .unwrap();
    let bytes = bincode::serialize(&fitted).unwrap();
    let decoded: FittedSystem = bincode::deserialize(&bytes).unwrap();
    assert_eq!(decoded, fitted);
    assert_eq!(
        decoded.predict(&[0.35]).unwrap(),
        fitted.predict(&[0.35]).unwrap()
    );

    let settings_json = serde_json::to_string(&KernelSettings::default()).unwrap();
    let settings: KernelSettings = serde_json::from_str(&settings_json).unwrap();
    assert_eq!(settings, KernelSettings::default());
}
