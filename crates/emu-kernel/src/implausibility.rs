use emu_core::{EmuError, Observation, SystemId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::fit::{FittedSystem, Prediction};
use crate::pool::KernelPool;

/// `|E - z| / sqrt(Var + md_var + err^2)`.
pub fn univariate_implausibility(prediction: &Prediction, observation: &Observation) -> f64 {
    let diff = (prediction.expectation - observation.value).abs();
    let denom = prediction.variance + observation.md_variance() + observation.error.powi(2);
    if denom <= 0.0 {
        return if diff == 0.0 { 0.0 } else { f64::INFINITY };
    }
    diff / denom.sqrt()
}

/// Implausibility of every candidate sample against one system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemEvaluation {
    /// System that produced the values.
    pub system: SystemId,
    /// One value per candidate, in candidate order.
    pub implausibility: Vec<f64>,
}

/// Scores every candidate against `observation` on the capped kernel pool.
pub fn evaluate_candidates(
    fitted: &FittedSystem,
    observation: &Observation,
    candidates: &[Vec<f64>],
    pool: &KernelPool,
) -> Result<SystemEvaluation, EmuError> {
    let implausibility = pool.install(|| {
        candidates
            .par_iter()
            .map(|params| {
                fitted
                    .predict(params)
                    .map(|prediction| univariate_implausibility(&prediction, observation))
            })
            .collect::<Result<Vec<_>, EmuError>>()
    })?;
    Ok(SystemEvaluation {
        system: fitted.system(),
        implausibility,
    })
}
