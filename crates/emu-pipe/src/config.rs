use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use emu_core::serde::from_yaml_slice;
use emu_core::{EmuError, ErrorInfo, Observation, Sample, ThreadSetting};
use emu_dist::StrategyKind;
use emu_kernel::{CostModel, KernelSettings};
use serde::{Deserialize, Serialize};

use crate::model::ModelConfig;
use crate::policy::ImplausibilityCut;
use crate::sampling::SamplingConfig;

fn config_error(code: &str, message: impl Into<String>) -> EmuError {
    EmuError::Config(ErrorInfo::new(code, message.into()))
}

/// YAML-configurable parameters of one emulator construction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model evaluations used to train the first iteration.
    #[serde(default = "default_n_sam_init")]
    pub n_sam_init: usize,
    /// Model evaluations drawn from the plausible pool for later iterations.
    #[serde(default = "default_n_sam_iter")]
    pub n_sam_iter: usize,
    /// Size of the candidate pool drawn at the first iteration.
    #[serde(default = "default_n_eval_sam")]
    pub n_eval_sam: usize,
    /// Implausibility cut-off list; zero entries are wildcards.
    #[serde(default = "default_impl_cut")]
    pub impl_cut: Vec<f64>,
    /// Latin-hypercube settings.
    #[serde(default)]
    pub sampling: SamplingConfig,
    /// Numerical kernel settings.
    #[serde(default)]
    pub kernel: KernelSettings,
    /// Modeled evaluation cost used for partitioning and throughput estimates.
    #[serde(default)]
    pub cost: CostModel,
    /// Worker process layout.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// When construction stops.
    #[serde(default)]
    pub continuation: ContinuationConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
    /// Model under emulation.
    #[serde(default)]
    pub model: ModelConfig,
    /// Observational data the emulator is compared against.
    #[serde(default)]
    pub data: DataConfig,
}

fn default_n_sam_init() -> usize {
    500
}

fn default_n_sam_iter() -> usize {
    250
}

fn default_n_eval_sam() -> usize {
    4000
}

fn default_impl_cut() -> Vec<f64> {
    vec![0.0, 4.0, 3.8, 3.5]
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            n_sam_init: default_n_sam_init(),
            n_sam_iter: default_n_sam_iter(),
            n_eval_sam: default_n_eval_sam(),
            impl_cut: default_impl_cut(),
            sampling: SamplingConfig::default(),
            kernel: KernelSettings::default(),
            cost: CostModel::default(),
            runtime: RuntimeConfig::default(),
            continuation: ContinuationConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
            model: ModelConfig::default(),
            data: DataConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads and validates a YAML configuration file.
    pub fn load(path: &Path) -> Result<Self, EmuError> {
        let bytes = fs::read(path).map_err(|err| {
            config_error("config_read", err.to_string()).with_context("path", path.display())
        })?;
        let config: Self =
            from_yaml_slice(&bytes).map_err(|err| err.with_context("path", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that cannot produce a run.
    pub fn validate(&self) -> Result<(), EmuError> {
        if self.n_sam_init == 0 && self.data.external_samples.is_empty() {
            return Err(config_error(
                "config_invalid",
                "the first iteration needs model evaluations",
            )
            .with_context("field", "n_sam_init"));
        }
        if self.n_eval_sam == 0 {
            return Err(config_error("config_invalid", "candidate pool must not be empty")
                .with_context("field", "n_eval_sam"));
        }
        if self.runtime.processes == 0 {
            return Err(config_error("config_invalid", "at least one process is required")
                .with_context("field", "runtime.processes"));
        }
        if self.runtime.timeout_secs == 0 {
            return Err(config_error("config_invalid", "receive timeout must be positive")
                .with_context("field", "runtime.timeout_secs"));
        }
        if let Some(ThreadSetting::Explicit(0)) = self.runtime.threads {
            return Err(config_error("config_invalid", "thread count must be positive")
                .with_context("field", "runtime.threads"));
        }
        ImplausibilityCut::new(&self.impl_cut)?;
        self.sampling.validate()?;
        self.kernel.validate()?;
        self.cost.validate()?;
        self.model.validate()?;
        Ok(())
    }
}

/// Layout of the worker processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Number of worker processes, coordinator included.
    #[serde(default = "default_processes")]
    pub processes: usize,
    /// Kernel thread setting; read from `OMP_NUM_THREADS` when absent.
    #[serde(default)]
    pub threads: Option<ThreadSetting>,
    /// Seconds the coordinator waits for worker replies before the run fails.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How emulator systems are spread over the processes.
    #[serde(default)]
    pub partition: StrategyKind,
}

fn default_processes() -> usize {
    1
}

fn default_timeout_secs() -> u64 {
    600
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            processes: default_processes(),
            threads: None,
            timeout_secs: default_timeout_secs(),
            partition: StrategyKind::default(),
        }
    }
}

impl RuntimeConfig {
    /// Receive timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Kernel thread setting, falling back to the environment.
    pub fn thread_setting(&self) -> Result<ThreadSetting, EmuError> {
        match self.threads {
            Some(setting) => Ok(setting),
            None => ThreadSetting::from_env(),
        }
    }
}

/// Stopping rule for the iteration loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContinuationConfig {
    /// Iterations to construct before stopping.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Plausible candidates required to start another iteration.
    #[serde(default = "default_min_plausible")]
    pub min_plausible: usize,
}

fn default_max_iterations() -> usize {
    3
}

fn default_min_plausible() -> usize {
    1
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            min_plausible: default_min_plausible(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in reports.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for the sample store and report.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Report filename relative to `run_directory`.
    #[serde(default = "default_report_file")]
    pub report_file: PathBuf,
}

fn default_report_file() -> PathBuf {
    PathBuf::from("run_report.json")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            report_file: default_report_file(),
        }
    }
}

/// Observational data and externally evaluated samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    /// Explicit observations, one per emulator system.
    #[serde(default)]
    pub observations: Vec<Observation>,
    /// Data coordinates for mock observations, used when `observations` is empty.
    #[serde(default = "default_mock_idx")]
    pub mock_idx: Vec<f64>,
    /// Already evaluated samples added to the first training set.
    #[serde(default)]
    pub external_samples: Vec<Sample>,
}

fn default_mock_idx() -> Vec<f64> {
    vec![0.0, 2.0, 4.0, 6.0, 8.0, 10.0]
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            observations: Vec::new(),
            mock_idx: default_mock_idx(),
            external_samples: Vec::new(),
        }
    }
}
