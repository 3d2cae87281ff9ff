use emu_core::{EmuError, ErrorInfo, ParameterSpace, Sample, SystemId};
use nalgebra::linalg::Cholesky;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::correlation::GaussianCorrelation;
use crate::regression::{least_squares, PolynomialBasis};

fn numerical_error(code: &str, message: impl Into<String>) -> EmuError {
    EmuError::Numerical(ErrorInfo::new(code, message.into()))
}

fn default_poly_order() -> u8 {
    1
}

fn default_corr_length() -> f64 {
    0.6
}

fn default_nugget() -> f64 {
    1e-8
}

/// Tuning knobs for the per-system fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSettings {
    /// Order of the polynomial regression (0, 1 or 2).
    #[serde(default = "default_poly_order")]
    pub poly_order: u8,
    /// Correlation length of the residual process in normalized units.
    #[serde(default = "default_corr_length")]
    pub corr_length: f64,
    /// Jitter added to the diagonal of the correlation matrix.
    #[serde(default = "default_nugget")]
    pub nugget: f64,
}

impl Default for KernelSettings {
    fn default() -> Self {
        Self {
            poly_order: default_poly_order(),
            corr_length: default_corr_length(),
            nugget: default_nugget(),
        }
    }
}

impl KernelSettings {
    /// Rejects settings the kernel cannot work with.
    pub fn validate(&self) -> Result<(), EmuError> {
        if !(self.corr_length.is_finite() && self.corr_length > 0.0) {
            return Err(EmuError::Config(
                ErrorInfo::new("config_corr_length", "correlation length must be positive")
                    .with_context("corr_length", self.corr_length),
            ));
        }
        if !(self.nugget.is_finite() && self.nugget >= 0.0) {
            return Err(EmuError::Config(
                ErrorInfo::new("config_nugget", "nugget must be non-negative")
                    .with_context("nugget", self.nugget),
            ));
        }
        PolynomialBasis::new(self.poly_order, 0).map(|_| ())
    }
}

/// Adjusted expectation and variance of an emulator system at one point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Adjusted expectation.
    pub expectation: f64,
    /// Adjusted variance (never negative).
    pub variance: f64,
}

/// Emulator for one output quantity, fitted on one iteration's samples.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSystem {
    system: SystemId,
    space: ParameterSpace,
    basis: PolynomialBasis,
    correlation: GaussianCorrelation,
    beta: Vec<f64>,
    sigma_sq: f64,
    points: Vec<Vec<f64>>,
    weights: Vec<f64>,
    chol_lower: DMatrix<f64>,
}

impl FittedSystem {
    /// System this emulator belongs to.
    pub fn system(&self) -> SystemId {
        self.system
    }

    /// Number of samples the system was trained on.
    pub fn n_train(&self) -> usize {
        self.points.len()
    }

    /// Regression coefficients.
    pub fn coefficients(&self) -> &[f64] {
        &self.beta
    }

    /// Variance of the residual process.
    pub fn residual_variance(&self) -> f64 {
        self.sigma_sq
    }

    /// Predicts the output at a parameter vector in model units.
    pub fn predict(&self, params: &[f64]) -> Result<Prediction, EmuError> {
        if params.len() != self.space.dim() {
            return Err(numerical_error(
                "numerical_dimension",
                "parameter vector does not match the parameter space",
            )
            .with_context("expected", self.space.dim())
            .with_context("found", params.len()));
        }
        let x = self.space.normalize(params);
        let trend: f64 = self
            .basis
            .evaluate(&x)
            .iter()
            .zip(&self.beta)
            .map(|(g, b)| g * b)
            .sum();
        let r = self.correlation.vector(&x, &self.points);
        let adjustment: f64 = r.iter().zip(&self.weights).map(|(a, w)| a * w).sum();
        let v = self.chol_lower.solve_lower_triangular(&r).ok_or_else(|| {
            numerical_error("numerical_singular", "triangular solve failed during prediction")
                .with_context("system", self.system.as_raw())
        })?;
        let variance = (self.sigma_sq * (1.0 - v.norm_squared())).max(0.0);
        let expectation = trend + adjustment;
        if !expectation.is_finite() || !variance.is_finite() {
            return Err(
                numerical_error("numerical_non_finite", "prediction is not finite")
                    .with_context("system", self.system.as_raw()),
            );
        }
        Ok(Prediction {
            expectation,
            variance,
        })
    }
}

/// Fits the emulator for `system` from every sample that carries a finite
/// output for it.
pub fn fit_system(
    system: SystemId,
    samples: &[Sample],
    space: &ParameterSpace,
    settings: &KernelSettings,
) -> Result<FittedSystem, EmuError> {
    settings.validate()?;
    let mut points = Vec::with_capacity(samples.len());
    let mut targets = Vec::with_capacity(samples.len());
    for sample in samples {
        if let Some(value) = sample.output(system) {
            points.push(space.normalize(sample.params()));
            targets.push(value);
        }
    }
    let basis = PolynomialBasis::new(settings.poly_order, space.dim())?;
    let design = basis.design(&points);
    let y = DVector::from_vec(targets);
    let beta = least_squares(&design, &y).map_err(|err| err.with_context("system", system.as_raw()))?;
    let residuals = &y - &design * &beta;
    let n = residuals.len() as f64;
    let sigma_sq = residuals.norm_squared() / n;

    let correlation = GaussianCorrelation {
        length: settings.corr_length,
    };
    let matrix = correlation.matrix(&points, settings.nugget);
    let chol = Cholesky::new(matrix).ok_or_else(|| {
        EmuError::Numerical(
            ErrorInfo::new(
                "numerical_singular",
                "correlation matrix is not positive definite",
            )
            .with_context("system", system.as_raw())
            .with_context("samples", points.len())
            .with_hint("duplicate samples need a positive nugget"),
        )
    })?;
    let weights = chol.solve(&residuals);
    if weights.iter().any(|w| !w.is_finite()) {
        return Err(
            numerical_error("numerical_non_finite", "residual weights are not finite")
                .with_context("system", system.as_raw()),
        );
    }
    trace!(
        system = system.as_raw(),
        samples = points.len(),
        sigma_sq,
        "fitted emulator system"
    );
    Ok(FittedSystem {
        system,
        space: space.clone(),
        basis,
        correlation,
        beta: beta.iter().copied().collect(),
        sigma_sq,
        points,
        weights: weights.iter().copied().collect(),
        chol_lower: chol.l(),
    })
}
