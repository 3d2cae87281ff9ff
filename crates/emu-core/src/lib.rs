#![deny(missing_docs)]
#![doc = "Core data types shared by every EMU crate: identifiers, samples, observations, errors and determinism helpers."]

use ::serde::{Deserialize, Serialize};

pub mod errors;
pub mod hash;
pub mod provenance;
pub mod rng;
pub mod serde;
pub mod threads;

pub use errors::{EmuError, ErrorInfo};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use threads::{ThreadBudget, ThreadSetting};

/// Identifier for an emulator system (one emulated output quantity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SystemId(u32);

impl SystemId {
    /// Creates a new identifier from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the identifier.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns the identifier as a vector index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// Rank of a worker process within a run. Rank 0 is the coordinator.
pub type Rank = usize;

/// Position of a single worker process inside the distributed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct World {
    /// Rank of this process.
    pub rank: Rank,
    /// Total number of processes in the run.
    pub size: usize,
}

impl World {
    /// Rank that coordinates sampling, model calls and plausibility decisions.
    pub const COORDINATOR: Rank = 0;

    /// Returns true when this process is the coordinator.
    pub fn is_coordinator(&self) -> bool {
        self.rank == Self::COORDINATOR
    }
}

/// Closed interval describing the admissible range of one model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    /// Parameter name used in reports.
    pub name: String,
    /// Lower bound (inclusive).
    pub lower: f64,
    /// Upper bound (inclusive).
    pub upper: f64,
}

impl ParamRange {
    /// Creates a named parameter range.
    pub fn new(name: impl Into<String>, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            lower,
            upper,
        }
    }

    /// Width of the interval.
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    /// Maps a value from the interval onto [-1, 1].
    pub fn normalize(&self, value: f64) -> f64 {
        let width = self.width();
        if width == 0.0 {
            return 0.0;
        }
        2.0 * (value - self.lower) / width - 1.0
    }

    /// Maps a value from [0, 1] onto the interval.
    pub fn from_unit(&self, unit: f64) -> f64 {
        self.lower + unit * self.width()
    }
}

/// Ordered collection of parameter ranges spanning the model parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ParameterSpace {
    /// Ranges in model parameter order.
    pub ranges: Vec<ParamRange>,
}

impl ParameterSpace {
    /// Creates a parameter space from the provided ranges.
    pub fn new(ranges: Vec<ParamRange>) -> Self {
        Self { ranges }
    }

    /// Number of model parameters.
    pub fn dim(&self) -> usize {
        self.ranges.len()
    }

    /// Maps a parameter vector onto the normalized hypercube [-1, 1]^n.
    pub fn normalize(&self, params: &[f64]) -> Vec<f64> {
        self.ranges
            .iter()
            .zip(params)
            .map(|(range, &value)| range.normalize(value))
            .collect()
    }

    /// Returns true when every coordinate lies inside its range.
    pub fn contains(&self, params: &[f64]) -> bool {
        params.len() == self.dim()
            && self
                .ranges
                .iter()
                .zip(params)
                .all(|(range, &value)| value >= range.lower && value <= range.upper)
    }
}

/// A parameter vector together with its (possibly missing) model evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    params: Vec<f64>,
    outputs: Option<Vec<f64>>,
}

impl Sample {
    /// Creates a sample that has not been evaluated yet.
    pub fn pending(params: Vec<f64>) -> Self {
        Self {
            params,
            outputs: None,
        }
    }

    /// Creates an already evaluated sample.
    pub fn evaluated(params: Vec<f64>, outputs: Vec<f64>) -> Self {
        Self {
            params,
            outputs: Some(outputs),
        }
    }

    /// Parameter vector of the sample.
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Model outputs, one per emulator system, if the sample was evaluated.
    pub fn outputs(&self) -> Option<&[f64]> {
        self.outputs.as_deref()
    }

    /// Output for a single system, if present and finite.
    pub fn output(&self, system: SystemId) -> Option<f64> {
        self.outputs
            .as_ref()
            .and_then(|outputs| outputs.get(system.index()).copied())
            .filter(|value| value.is_finite())
    }

    /// Consumes a pending sample and attaches its evaluation.
    ///
    /// Evaluated samples are immutable, so attaching outputs to a sample that
    /// already carries them is rejected.
    pub fn with_outputs(self, outputs: Vec<f64>) -> Result<Self, EmuError> {
        if self.outputs.is_some() {
            return Err(EmuError::Model(ErrorInfo::new(
                "model_sample_immutable",
                "sample has already been evaluated",
            )));
        }
        Ok(Self {
            params: self.params,
            outputs: Some(outputs),
        })
    }
}

/// Observational data point that one emulator system is compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Coordinate handed to the model to produce this output.
    pub data_idx: f64,
    /// Observed value.
    pub value: f64,
    /// One-sigma observational error.
    pub error: f64,
    /// Model discrepancy variance; defaults to `(value / 6)^2` when absent.
    #[serde(default)]
    pub md_var: Option<f64>,
}

impl Observation {
    /// Model discrepancy variance used in implausibility calculations.
    ///
    /// A factor two difference on a two sigma interval gives a sigma of one
    /// sixth of the data value.
    pub fn md_variance(&self) -> f64 {
        self.md_var.unwrap_or_else(|| (self.value / 6.0).powi(2))
    }
}
