use std::path::PathBuf;

use emu_core::serde::{from_yaml_slice, to_yaml_string};
use emu_core::ThreadSetting;
use emu_dist::StrategyKind;
use emu_pipe::model::ModelConfig;
use emu_pipe::PipelineConfig;

fn fixture_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join(relative)
}

#[test]
fn smoke_config_loads() {
    let config = PipelineConfig::load(&fixture_path("configs/smoke.yaml")).expect("load config");
    assert_eq!(config.n_sam_init, 40);
    assert_eq!(config.n_eval_sam, 400);
    assert_eq!(config.impl_cut, vec![0.0, 4.0, 3.8, 3.5]);
    assert_eq!(config.runtime.processes, 2);
    assert_eq!(config.runtime.threads, Some(ThreadSetting::Auto));
    assert_eq!(config.runtime.partition, StrategyKind::RoundRobin);
    assert_eq!(config.seed_policy.master_seed, 20240917);
    assert_eq!(
        config.model,
        ModelConfig::Gaussian {
            n_gaussians: 1,
            md_var: 0.01
        }
    );
    assert_eq!(config.data.mock_idx.len(), 5);
}

#[test]
fn config_survives_yaml() {
    let config = PipelineConfig::load(&fixture_path("configs/smoke.yaml")).expect("load config");
    let yaml = to_yaml_string(&config).expect("yaml");
    let restored: PipelineConfig = from_yaml_slice(yaml.as_bytes()).expect("parse");
    assert_eq!(restored, config);
}

#[test]
fn missing_fields_take_defaults() {
    let config: PipelineConfig = from_yaml_slice(b"n_sam_init: 12\n").expect("parse");
    assert_eq!(config.n_sam_init, 12);
    assert_eq!(config.n_sam_iter, PipelineConfig::default().n_sam_iter);
    assert_eq!(config.impl_cut, vec![0.0, 4.0, 3.8, 3.5]);
    assert_eq!(config.runtime.threads, None);
    config.validate().expect("defaults are valid");
}

#[test]
fn invalid_settings_are_rejected() {
    let mut config = PipelineConfig::default();
    config.impl_cut = vec![0.0, 0.0];
    assert_eq!(config.validate().unwrap_err().code(), "config_impl_cut");

    let mut config = PipelineConfig::default();
    config.runtime.processes = 0;
    assert_eq!(config.validate().unwrap_err().code(), "config_invalid");

    let mut config = PipelineConfig::default();
    config.kernel.nugget = -1.0;
    assert_eq!(config.validate().unwrap_err().code(), "config_nugget");

    let err = PipelineConfig::load(&fixture_path("configs/does-not-exist.yaml")).unwrap_err();
    assert_eq!(err.code(), "config_read");
}
