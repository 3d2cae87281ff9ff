#![deny(missing_docs)]
#![doc = "Numerical kernel: fits one emulator system from evaluated samples and scores candidate samples against its observation."]

/// Squared-exponential correlation functions.
pub mod correlation;
/// Modeled evaluation cost as a function of the training sample count.
pub mod cost;
/// System fitting and prediction.
pub mod fit;
/// Univariate implausibility measures.
pub mod implausibility;
/// Thread-capped rayon pool used for batch predictions.
pub mod pool;
/// Polynomial regression basis and least squares.
pub mod regression;

pub use cost::CostModel;
pub use fit::{fit_system, FittedSystem, KernelSettings, Prediction};
pub use implausibility::{evaluate_candidates, univariate_implausibility, SystemEvaluation};
pub use pool::KernelPool;
pub use regression::PolynomialBasis;
