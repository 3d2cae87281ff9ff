use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::Utc;
use emu_core::hash::{round_f64, stable_hash_string};
use emu_core::serde::to_canonical_json_bytes;
use emu_core::{EmuError, ErrorInfo, RunProvenance, SchemaVersion};
use emu_dist::StrategyKind;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::controller::Phase;
use crate::store::SampleStore;

/// Schema of the run report.
pub const REPORT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Statistics for one emulator iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationStats {
    /// One-based iteration index.
    pub iteration: usize,
    /// Evaluated samples the systems were trained on.
    pub n_train: usize,
    /// Emulator systems fitted.
    pub n_systems: usize,
    /// Candidates plausible on entry.
    pub pool_in: usize,
    /// Candidates plausible on exit.
    pub pool_out: usize,
    /// Share of the candidate pool still plausible.
    pub remaining_fraction: f64,
    /// Wall-clock seconds from Init to Decide.
    pub construct_secs: f64,
    /// Candidate evaluations per second measured during Await.
    pub eval_rate: f64,
    /// Emulator evaluations per unit cost predicted from the partition.
    pub predicted_eval_rate: f64,
    /// Worker processes taking part.
    pub world_size: usize,
    /// Systems held by the busiest process.
    pub max_systems_per_process: usize,
    /// Kernel threads per process.
    pub thread_budget: usize,
}

/// A phase the controller entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    /// Iteration the phase belongs to.
    pub iteration: usize,
    /// Phase entered.
    pub phase: Phase,
}

/// Canonical summary of a construction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Report schema.
    pub schema: SchemaVersion,
    /// Provenance of the run.
    pub provenance: RunProvenance,
    /// Name of the emulated model.
    pub model: String,
    /// Partition strategy used.
    pub partition: StrategyKind,
    /// Per-iteration statistics, including iterations loaded on resume.
    pub iterations: Vec<IterationStats>,
    /// Phase trace of this run.
    pub phases: Vec<PhaseRecord>,
    /// Size of the candidate pool.
    pub candidates: usize,
    /// Candidates plausible after the last iteration.
    pub plausible: usize,
}

impl RunReport {
    /// Writes the report as canonical JSON.
    pub fn write(&self, path: &Path) -> Result<(), EmuError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                EmuError::Serde(
                    ErrorInfo::new("report_dir", err.to_string())
                        .with_context("path", parent.display()),
                )
            })?;
        }
        let bytes = to_canonical_json_bytes(self)?;
        fs::write(path, bytes).map_err(|err| {
            EmuError::Serde(
                ErrorInfo::new("report_write", err.to_string()).with_context("path", path.display()),
            )
        })
    }
}

/// Builds the provenance block of a run.
pub fn build_provenance(
    config: &PipelineConfig,
    world_size: usize,
    thread_budget: usize,
) -> Result<RunProvenance, EmuError> {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert("emu-pipe".to_string(), env!("CARGO_PKG_VERSION").to_string());
    Ok(RunProvenance {
        config_hash: stable_hash_string(config)?,
        seed: config.seed_policy.master_seed,
        world_size,
        thread_budget,
        created_at: Utc::now().to_rfc3339(),
        tool_versions,
    })
}

/// Summary of one stored iteration, as printed by `emu details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationDetails {
    /// One-based iteration index.
    pub iteration: usize,
    /// Evaluated training samples.
    pub n_train: usize,
    /// Emulator systems.
    pub n_systems: usize,
    /// Plausible candidates on exit.
    pub plausible: usize,
    /// Share of the candidate pool still plausible, rounded.
    pub remaining_fraction: f64,
    /// Mean residual variance over the systems, rounded.
    pub mean_residual_variance: f64,
}

/// Summary of a sample store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreDetails {
    /// Model parameter names.
    pub parameters: Vec<String>,
    /// Observations compared against.
    pub n_observations: usize,
    /// Size of the candidate pool.
    pub candidates: usize,
    /// Per-iteration summaries.
    pub iterations: Vec<IterationDetails>,
}

impl StoreDetails {
    /// Summarises `store`.
    pub fn from_store(store: &SampleStore) -> Self {
        let candidates = store.candidates().len();
        let iterations = store
            .iterations()
            .iter()
            .map(|record| {
                let n_systems = record.systems.len();
                let mean_residual_variance = if n_systems == 0 {
                    0.0
                } else {
                    record
                        .systems
                        .iter()
                        .map(|system| system.residual_variance())
                        .sum::<f64>()
                        / n_systems as f64
                };
                IterationDetails {
                    iteration: record.iteration,
                    n_train: record.training.len(),
                    n_systems,
                    plausible: record.plausible.len(),
                    remaining_fraction: round_f64(fraction(record.plausible.len(), candidates)),
                    mean_residual_variance: round_f64(mean_residual_variance),
                }
            })
            .collect();
        Self {
            parameters: store
                .space()
                .ranges
                .iter()
                .map(|range| range.name.clone())
                .collect(),
            n_observations: store.n_systems(),
            candidates,
            iterations,
        }
    }
}

pub(crate) fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
