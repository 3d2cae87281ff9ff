use emu_core::{EmuError, ErrorInfo};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

fn numerical_error(code: &str, message: impl Into<String>) -> EmuError {
    EmuError::Numerical(ErrorInfo::new(code, message.into()))
}

/// Full polynomial basis of a given order over normalized parameters.
///
/// Order 2 includes every cross term `x_i * x_j` with `i <= j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolynomialBasis {
    /// Polynomial order (0, 1 or 2).
    pub order: u8,
    /// Number of model parameters.
    pub dim: usize,
}

impl PolynomialBasis {
    /// Creates a basis, rejecting orders above two.
    pub fn new(order: u8, dim: usize) -> Result<Self, EmuError> {
        if order > 2 {
            return Err(EmuError::Config(
                ErrorInfo::new("config_poly_order", "polynomial order must be 0, 1 or 2")
                    .with_context("order", order),
            ));
        }
        Ok(Self { order, dim })
    }

    /// Number of basis terms.
    pub fn terms(&self) -> usize {
        match self.order {
            0 => 1,
            1 => 1 + self.dim,
            _ => 1 + self.dim + self.dim * (self.dim + 1) / 2,
        }
    }

    /// Evaluates every basis term at a normalized point.
    pub fn evaluate(&self, x: &[f64]) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.terms());
        row.push(1.0);
        if self.order >= 1 {
            row.extend(x.iter().copied());
        }
        if self.order >= 2 {
            for i in 0..x.len() {
                for j in i..x.len() {
                    row.push(x[i] * x[j]);
                }
            }
        }
        row
    }

    /// Builds the design matrix for a set of normalized points.
    pub fn design(&self, points: &[Vec<f64>]) -> DMatrix<f64> {
        let terms = self.terms();
        let mut design = DMatrix::<f64>::zeros(points.len(), terms);
        for (row_idx, point) in points.iter().enumerate() {
            for (col, value) in self.evaluate(point).into_iter().enumerate() {
                design[(row_idx, col)] = value;
            }
        }
        design
    }
}

/// Ordinary least squares fit `design * beta ~= targets` through an SVD.
pub fn least_squares(design: &DMatrix<f64>, targets: &DVector<f64>) -> Result<DVector<f64>, EmuError> {
    if design.nrows() < design.ncols() {
        return Err(numerical_error(
            "numerical_underdetermined",
            "fewer evaluated samples than regression terms",
        )
        .with_context("samples", design.nrows())
        .with_context("terms", design.ncols()));
    }
    let svd = design.clone().svd(true, true);
    let beta = svd
        .solve(targets, 1e-12)
        .map_err(|err| numerical_error("numerical_svd", err))?;
    if beta.iter().any(|value| !value.is_finite()) {
        return Err(numerical_error(
            "numerical_non_finite",
            "regression coefficients are not finite",
        ));
    }
    Ok(beta)
}
