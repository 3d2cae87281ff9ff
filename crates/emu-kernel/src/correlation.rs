use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Squared-exponential correlation `exp(-|a - b|^2 / l^2)` in normalized units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaussianCorrelation {
    /// Correlation length.
    pub length: f64,
}

impl GaussianCorrelation {
    /// Correlation between two normalized points.
    pub fn corr(&self, a: &[f64], b: &[f64]) -> f64 {
        let dist_sq: f64 = a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum();
        (-dist_sq / (self.length * self.length)).exp()
    }

    /// Correlation matrix of a point set with `nugget` added on the diagonal.
    pub fn matrix(&self, points: &[Vec<f64>], nugget: f64) -> DMatrix<f64> {
        let n = points.len();
        let mut matrix = DMatrix::<f64>::zeros(n, n);
        for i in 0..n {
            matrix[(i, i)] = 1.0 + nugget;
            for j in 0..i {
                let value = self.corr(&points[i], &points[j]);
                matrix[(i, j)] = value;
                matrix[(j, i)] = value;
            }
        }
        matrix
    }

    /// Correlations between one point and every point of a set.
    pub fn vector(&self, x: &[f64], points: &[Vec<f64>]) -> DVector<f64> {
        DVector::from_iterator(points.len(), points.iter().map(|p| self.corr(x, p)))
    }
}
