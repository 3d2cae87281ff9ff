use emu_core::{EmuError, ErrorInfo, SystemId};
use emu_kernel::univariate_implausibility;
use serde::{Deserialize, Serialize};

use crate::policy::{ImplausibilityCut, PlausibilityPolicy};
use crate::store::SampleStore;

/// Prediction of one system at one parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemPrediction {
    /// System that produced the prediction.
    pub system: SystemId,
    /// Adjusted expectation.
    pub expectation: f64,
    /// Adjusted variance.
    pub variance: f64,
    /// Univariate implausibility against the system's observation.
    pub implausibility: f64,
}

/// Emulator output at one parameter vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmulatorEvaluation {
    /// Iteration the predictions come from.
    pub iteration: usize,
    /// Per-system predictions of that iteration.
    pub predictions: Vec<SystemPrediction>,
    /// True when the point is plausible in every iteration up to `iteration`.
    pub plausible: bool,
    /// First iteration that ruled the point out.
    pub ruled_out_at: Option<usize>,
}

/// Read-only view evaluating the iterations of a sample store.
pub struct Emulator<'a> {
    store: &'a SampleStore,
    policy: Box<dyn PlausibilityPolicy>,
}

impl<'a> Emulator<'a> {
    /// Emulator using an explicit plausibility policy.
    pub fn new(store: &'a SampleStore, policy: Box<dyn PlausibilityPolicy>) -> Self {
        Self { store, policy }
    }

    /// Emulator using the cut-off list recorded in the store.
    pub fn from_store(store: &'a SampleStore) -> Result<Self, EmuError> {
        let policy = ImplausibilityCut::new(store.impl_cut())?;
        Ok(Self::new(store, Box::new(policy)))
    }

    /// Number of iterations available.
    pub fn iterations(&self) -> usize {
        self.store.n_iterations()
    }

    fn predict(&self, iteration: usize, params: &[f64]) -> Result<Vec<SystemPrediction>, EmuError> {
        let record = self.store.iteration(iteration).ok_or_else(|| {
            EmuError::Config(
                ErrorInfo::new("emulator_iteration", "iteration has not been constructed")
                    .with_context("iteration", iteration)
                    .with_context("available", self.store.n_iterations()),
            )
        })?;
        record
            .systems
            .iter()
            .zip(self.store.observations())
            .map(|(system, observation)| {
                let prediction = system.predict(params)?;
                Ok(SystemPrediction {
                    system: system.system(),
                    expectation: prediction.expectation,
                    variance: prediction.variance,
                    implausibility: univariate_implausibility(&prediction, observation),
                })
            })
            .collect()
    }

    /// Evaluates iteration `iteration` at `params`.
    ///
    /// Plausibility is judged against every iteration up to and including
    /// `iteration`, matching how the candidate pool was filtered.
    pub fn evaluate(&self, iteration: usize, params: &[f64]) -> Result<EmulatorEvaluation, EmuError> {
        let predictions = self.predict(iteration, params)?;
        let mut ruled_out_at = None;
        for current in 1..=iteration {
            let values: Vec<f64> = if current == iteration {
                predictions.iter().map(|p| p.implausibility).collect()
            } else {
                self.predict(current, params)?
                    .iter()
                    .map(|p| p.implausibility)
                    .collect()
            };
            if !self.policy.is_plausible(&values) {
                ruled_out_at = Some(current);
                break;
            }
        }
        Ok(EmulatorEvaluation {
            iteration,
            predictions,
            plausible: ruled_out_at.is_none(),
            ruled_out_at,
        })
    }
}
