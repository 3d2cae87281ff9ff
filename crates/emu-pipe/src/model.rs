use emu_core::rng::MOCK_STREAM;
use emu_core::{EmuError, ErrorInfo, Observation, ParamRange, ParameterSpace, RngHandle};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::info;

fn model_error(code: &str, message: impl Into<String>) -> EmuError {
    EmuError::Model(ErrorInfo::new(code, message.into()))
}

/// The expensive model being emulated.
///
/// Only the coordinator calls the model; implementations do not need to be
/// reentrant across ranks.
pub trait ModelEvaluator: Send + Sync {
    /// Name recorded in reports.
    fn name(&self) -> String;

    /// Parameter space the model is defined on.
    fn space(&self) -> &ParameterSpace;

    /// Number of model parameters.
    fn n_par(&self) -> usize {
        self.space().dim()
    }

    /// Evaluates the model at `params`, returning one output per entry of `data_idx`.
    fn evaluate(&self, params: &[f64], data_idx: &[f64]) -> Result<Vec<f64>, EmuError>;

    /// Model discrepancy variance per data point, if the model defines one.
    fn md_variance(&self, _data_idx: &[f64]) -> Option<Vec<f64>> {
        None
    }
}

/// Calls `model` and checks the shape and finiteness of its outputs.
pub fn evaluate_checked(
    model: &dyn ModelEvaluator,
    params: &[f64],
    data_idx: &[f64],
) -> Result<Vec<f64>, EmuError> {
    let outputs = model.evaluate(params, data_idx)?;
    if outputs.len() != data_idx.len() {
        return Err(model_error("model_output_len", "model returned the wrong number of outputs")
            .with_context("model", model.name())
            .with_context("expected", data_idx.len())
            .with_context("found", outputs.len()));
    }
    if let Some(idx) = outputs.iter().position(|value| !value.is_finite()) {
        return Err(model_error("model_non_finite", "model returned a non-finite output")
            .with_context("model", model.name())
            .with_context("data_idx", data_idx[idx])
            .with_context("params", format!("{params:?}")));
    }
    Ok(outputs)
}

/// Sum of `n_gaussians` Gaussians `A exp(-(x - B)^2 / (2 C^2))`.
///
/// Parameters are ordered `A1, B1, C1, A2, ...`; the data coordinate is `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianModel {
    n_gaussians: usize,
    space: ParameterSpace,
    md_var: f64,
}

impl GaussianModel {
    /// Model with the default parameter ranges `A in [1, 10]`, `B in [0, 10]`, `C in [0, 5]`.
    pub fn new(n_gaussians: usize, md_var: f64) -> Result<Self, EmuError> {
        if n_gaussians == 0 {
            return Err(EmuError::Config(
                ErrorInfo::new("config_invalid", "at least one gaussian is required")
                    .with_context("field", "model.n_gaussians"),
            ));
        }
        if !(md_var.is_finite() && md_var >= 0.0) {
            return Err(EmuError::Config(
                ErrorInfo::new("config_invalid", "model discrepancy variance must be non-negative")
                    .with_context("field", "model.md_var")
                    .with_context("value", md_var),
            ));
        }
        let ranges = (1..=n_gaussians)
            .flat_map(|i| {
                [
                    ParamRange::new(format!("A{i}"), 1.0, 10.0),
                    ParamRange::new(format!("B{i}"), 0.0, 10.0),
                    ParamRange::new(format!("C{i}"), 0.0, 5.0),
                ]
            })
            .collect();
        Ok(Self {
            n_gaussians,
            space: ParameterSpace::new(ranges),
            md_var,
        })
    }
}

impl ModelEvaluator for GaussianModel {
    fn name(&self) -> String {
        format!("gaussian-n{}", self.n_gaussians)
    }

    fn space(&self) -> &ParameterSpace {
        &self.space
    }

    fn evaluate(&self, params: &[f64], data_idx: &[f64]) -> Result<Vec<f64>, EmuError> {
        if params.len() != self.space.dim() {
            return Err(model_error("model_param_len", "parameter vector has the wrong length")
                .with_context("expected", self.space.dim())
                .with_context("found", params.len()));
        }
        Ok(data_idx
            .iter()
            .map(|&x| {
                params
                    .chunks_exact(3)
                    .map(|p| p[0] * (-(x - p[1]).powi(2) / (2.0 * p[2].powi(2))).exp())
                    .sum::<f64>()
            })
            .collect())
    }

    fn md_variance(&self, data_idx: &[f64]) -> Option<Vec<f64>> {
        Some(vec![self.md_var; data_idx.len()])
    }
}

/// Model selection in the pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ModelConfig {
    /// [`GaussianModel`].
    Gaussian {
        /// Number of Gaussians; the model has three parameters per Gaussian.
        #[serde(default = "default_n_gaussians")]
        n_gaussians: usize,
        /// Model discrepancy variance applied to every data point.
        #[serde(default = "default_md_var")]
        md_var: f64,
    },
}

fn default_n_gaussians() -> usize {
    1
}

fn default_md_var() -> f64 {
    0.01
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig::Gaussian {
            n_gaussians: default_n_gaussians(),
            md_var: default_md_var(),
        }
    }
}

impl ModelConfig {
    /// Instantiates the configured model.
    pub fn build(&self) -> Result<Box<dyn ModelEvaluator>, EmuError> {
        match self {
            ModelConfig::Gaussian {
                n_gaussians,
                md_var,
            } => Ok(Box::new(GaussianModel::new(*n_gaussians, *md_var)?)),
        }
    }

    /// Checks the model parameters without building the model.
    pub fn validate(&self) -> Result<(), EmuError> {
        self.build().map(|_| ())
    }
}

/// Mock observational data generated from the model itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockData {
    /// Parameter vector the data was generated at.
    pub par_est: Vec<f64>,
    /// One observation per data coordinate.
    pub observations: Vec<Observation>,
}

/// Evaluates the model at a random parameter estimate and turns the outputs
/// into observations whose errors are the square root of the model
/// discrepancy variance (or `value / 6` when the model defines none).
/// Each observed value is the model output plus Gaussian noise of that error.
pub fn mock_observations(
    model: &dyn ModelEvaluator,
    data_idx: &[f64],
    master_seed: u64,
) -> Result<MockData, EmuError> {
    let mut rng = RngHandle::substream(master_seed, MOCK_STREAM);
    let par_est: Vec<f64> = model
        .space()
        .ranges
        .iter()
        .map(|range| range.from_unit(rng.unit()))
        .collect();
    let values = evaluate_checked(model, &par_est, data_idx)?;
    let md_var = model
        .md_variance(data_idx)
        .unwrap_or_else(|| values.iter().map(|value| (value / 6.0).powi(2)).collect());
    if md_var.len() != values.len() || md_var.iter().any(|var| !(var.is_finite() && *var >= 0.0)) {
        return Err(model_error("model_md_var", "model discrepancy variance must be non-negative")
            .with_context("model", model.name()));
    }
    let mut observations = Vec::with_capacity(data_idx.len());
    for (&idx, (&value, &var)) in data_idx.iter().zip(values.iter().zip(&md_var)) {
        let error = var.sqrt();
        let noise: f64 = rng.inner_mut().sample(StandardNormal);
        observations.push(Observation {
            data_idx: idx,
            value: value + error * noise,
            error,
            md_var: Some(var),
        });
    }
    info!(model = %model.name(), points = data_idx.len(), "generated mock data");
    Ok(MockData {
        par_est,
        observations,
    })
}
