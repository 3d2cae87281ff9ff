#![deny(missing_docs)]
#![doc = "Emulator construction pipeline: iteration controller, sample store, model interface and run reports."]

/// YAML pipeline configuration.
pub mod config;
pub mod controller;
/// Evaluation of stored emulator iterations.
pub mod emulator;
/// Model evaluator interface and the Gaussian test model.
pub mod model;
/// Plausibility and continuation predicates.
pub mod policy;
/// Run reports and store summaries.
pub mod report;
/// Latin-hypercube designs.
pub mod sampling;
pub mod store;

pub use config::PipelineConfig;
pub use controller::{Construction, Controller, IterationContext, Phase};
pub use emulator::{Emulator, EmulatorEvaluation};
pub use model::{GaussianModel, ModelEvaluator};
pub use policy::{ContinuationCriterion, ImplausibilityCut, IterationLimit, PlausibilityPolicy};
pub use report::{RunReport, StoreDetails};
pub use store::{IterationRecord, SampleStore};
