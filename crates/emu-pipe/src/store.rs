//! Persistent record of every completed emulator iteration.
//!
//! On disk a store is a directory holding a `store.json` manifest plus one
//! `iteration_{n}.json` file per completed iteration, all canonical JSON. The
//! manifest is written last, so an interrupted save never references an
//! iteration file that was not written completely.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use emu_core::serde::{from_json_slice, to_canonical_json_bytes};
use emu_core::{EmuError, ErrorInfo, Observation, ParameterSpace, RunProvenance, Sample, SchemaVersion};
use emu_kernel::FittedSystem;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::report::IterationStats;

/// Schema written into every store manifest.
pub const STORE_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

const MANIFEST_FILE: &str = "store.json";

fn store_error(code: &str, message: impl ToString) -> EmuError {
    EmuError::Serde(ErrorInfo::new(code, message.to_string()))
}

fn iteration_file(dir: &Path, iteration: usize) -> PathBuf {
    dir.join(format!("iteration_{iteration}.json"))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), EmuError> {
    let bytes = to_canonical_json_bytes(value)?;
    fs::write(path, bytes)
        .map_err(|err| store_error("store_write", err).with_context("path", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, EmuError> {
    let bytes = fs::read(path)
        .map_err(|err| store_error("store_read", err).with_context("path", path.display()))?;
    from_json_slice(&bytes).map_err(|err| err.with_context("path", path.display()))
}

/// One completed emulator iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// One-based iteration index.
    pub iteration: usize,
    /// Evaluated samples the systems were trained on.
    pub training: Vec<Sample>,
    /// Fitted systems in system order.
    pub systems: Vec<FittedSystem>,
    /// Candidate pool indices that were plausible on entry.
    pub pool_in: Vec<usize>,
    /// Candidate pool indices that remain plausible on exit.
    pub plausible: Vec<usize>,
    /// Statistics gathered while constructing the iteration.
    pub stats: IterationStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreManifest {
    schema: SchemaVersion,
    space: ParameterSpace,
    observations: Vec<Observation>,
    candidates: Vec<Vec<f64>>,
    impl_cut: Vec<f64>,
    iterations: Vec<usize>,
    provenance: RunProvenance,
}

/// All iterations of one emulator, together with the candidate pool they filter.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleStore {
    space: ParameterSpace,
    observations: Vec<Observation>,
    candidates: Vec<Vec<f64>>,
    impl_cut: Vec<f64>,
    iterations: Vec<IterationRecord>,
    provenance: RunProvenance,
}

impl SampleStore {
    /// Empty store for an emulator of `observations` over `space`.
    pub fn new(space: ParameterSpace, observations: Vec<Observation>, impl_cut: Vec<f64>) -> Self {
        Self {
            space,
            observations,
            candidates: Vec::new(),
            impl_cut,
            iterations: Vec::new(),
            provenance: RunProvenance::default(),
        }
    }

    /// Parameter space of the emulated model.
    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    /// Observations, one per emulator system.
    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Number of emulator systems per iteration.
    pub fn n_systems(&self) -> usize {
        self.observations.len()
    }

    /// Candidate pool drawn at the first iteration.
    pub fn candidates(&self) -> &[Vec<f64>] {
        &self.candidates
    }

    /// Cut-off list the run was configured with.
    pub fn impl_cut(&self) -> &[f64] {
        &self.impl_cut
    }

    /// Provenance of the run that produced the store.
    pub fn provenance(&self) -> &RunProvenance {
        &self.provenance
    }

    /// Replaces the recorded provenance.
    pub fn set_provenance(&mut self, provenance: RunProvenance) {
        self.provenance = provenance;
    }

    /// Installs the candidate pool. The pool is fixed once an iteration exists.
    pub fn set_candidates(&mut self, candidates: Vec<Vec<f64>>) -> Result<(), EmuError> {
        if !self.iterations.is_empty() {
            return Err(store_error(
                "store_candidates_fixed",
                "candidate pool cannot change after the first iteration",
            ));
        }
        self.candidates = candidates;
        Ok(())
    }

    /// Number of completed iterations.
    pub fn n_iterations(&self) -> usize {
        self.iterations.len()
    }

    /// Completed iterations in order.
    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    /// Iteration `n` (one-based).
    pub fn iteration(&self, n: usize) -> Option<&IterationRecord> {
        n.checked_sub(1).and_then(|idx| self.iterations.get(idx))
    }

    /// Most recent completed iteration.
    pub fn latest(&self) -> Option<&IterationRecord> {
        self.iterations.last()
    }

    /// Candidate indices plausible in every completed iteration.
    pub fn plausible_pool(&self) -> Vec<usize> {
        match self.latest() {
            Some(record) => record.plausible.clone(),
            None => (0..self.candidates.len()).collect(),
        }
    }

    /// Parameter vectors of [`SampleStore::plausible_pool`].
    pub fn plausible_params(&self) -> Vec<Vec<f64>> {
        self.plausible_pool()
            .into_iter()
            .map(|idx| self.candidates[idx].clone())
            .collect()
    }

    /// Appends a completed iteration.
    ///
    /// The record must be the next iteration, hold one system per
    /// observation, and filter the pool monotonically: its entry pool is the
    /// plausible pool of the previous iteration and its exit pool a subset of
    /// the entry pool.
    pub fn push(&mut self, record: IterationRecord) -> Result<(), EmuError> {
        let expected = self.iterations.len() + 1;
        if record.iteration != expected {
            return Err(store_error("store_iteration_order", "iterations must be appended in order")
                .with_context("expected", expected)
                .with_context("found", record.iteration));
        }
        if record.systems.len() != self.observations.len() {
            return Err(store_error("store_system_count", "one system per observation is required")
                .with_context("iteration", record.iteration)
                .with_context("expected", self.observations.len())
                .with_context("found", record.systems.len()));
        }
        if record.pool_in != self.plausible_pool() {
            return Err(store_error(
                "store_non_monotonic",
                "entry pool differs from the previous plausible pool",
            )
            .with_context("iteration", record.iteration));
        }
        let entry: BTreeSet<usize> = record.pool_in.iter().copied().collect();
        if !record.plausible.iter().all(|idx| entry.contains(idx)) {
            return Err(store_error(
                "store_non_monotonic",
                "plausible pool is not a subset of the entry pool",
            )
            .with_context("iteration", record.iteration));
        }
        self.iterations.push(record);
        Ok(())
    }

    /// Writes the store into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path) -> Result<(), EmuError> {
        fs::create_dir_all(dir)
            .map_err(|err| store_error("store_dir", err).with_context("path", dir.display()))?;
        for record in &self.iterations {
            write_json(&iteration_file(dir, record.iteration), record)?;
        }
        let manifest = StoreManifest {
            schema: STORE_SCHEMA,
            space: self.space.clone(),
            observations: self.observations.clone(),
            candidates: self.candidates.clone(),
            impl_cut: self.impl_cut.clone(),
            iterations: self.iterations.iter().map(|record| record.iteration).collect(),
            provenance: self.provenance.clone(),
        };
        write_json(&dir.join(MANIFEST_FILE), &manifest)?;
        debug!(path = %dir.display(), iterations = self.iterations.len(), "saved sample store");
        Ok(())
    }

    /// Reads a store written by [`SampleStore::save`].
    pub fn load(dir: &Path) -> Result<Self, EmuError> {
        let manifest: StoreManifest = read_json(&dir.join(MANIFEST_FILE))?;
        if !STORE_SCHEMA.is_compatible_with(&manifest.schema) {
            return Err(store_error("store_schema", "unsupported store schema")
                .with_context("found", format!("{:?}", manifest.schema))
                .with_context("supported", format!("{:?}", STORE_SCHEMA)));
        }
        let mut store = SampleStore {
            space: manifest.space,
            observations: manifest.observations,
            candidates: manifest.candidates,
            impl_cut: manifest.impl_cut,
            iterations: Vec::new(),
            provenance: manifest.provenance,
        };
        for iteration in manifest.iterations {
            let record: IterationRecord = read_json(&iteration_file(dir, iteration))?;
            store.push(record)?;
        }
        debug!(path = %dir.display(), iterations = store.n_iterations(), "loaded sample store");
        Ok(store)
    }
}
