use emu_core::{EmuError, ErrorInfo};
use serde::{Deserialize, Serialize};

fn cut_error(message: impl Into<String>) -> EmuError {
    EmuError::Config(ErrorInfo::new("config_impl_cut", message.into()))
}

/// Decides whether a candidate survives, given its implausibility against
/// every system of one iteration.
pub trait PlausibilityPolicy: Send + Sync {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// True when the candidate stays plausible.
    fn is_plausible(&self, implausibility: &[f64]) -> bool;
}

/// Decides whether another iteration is constructed.
pub trait ContinuationCriterion: Send + Sync {
    /// Called after iteration `completed` left `plausible` candidates.
    fn should_continue(&self, completed: usize, plausible: usize) -> bool;
}

/// Cut-offs applied to the implausibilities sorted from high to low.
///
/// Entry `i` bounds the `i`-th highest value. A zero entry repeats the
/// previous cut-off; leading zeros let the highest values through unchecked.
/// Values beyond the end of the list are bounded by its last entry through
/// the sort order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplausibilityCut {
    cuts: Vec<f64>,
    first_cut: usize,
}

impl ImplausibilityCut {
    /// Completes and validates a raw cut-off list.
    pub fn new(raw: &[f64]) -> Result<Self, EmuError> {
        let mut cuts = Vec::with_capacity(raw.len());
        for (idx, &value) in raw.iter().enumerate() {
            if !(value.is_finite() && value >= 0.0) {
                return Err(cut_error("cut-offs must be non-negative")
                    .with_context("index", idx)
                    .with_context("value", value));
            }
            let previous = cuts.last().copied().unwrap_or(0.0);
            if value == 0.0 {
                cuts.push(previous);
            } else if previous != 0.0 && value > previous {
                return Err(cut_error("cut-offs must not increase")
                    .with_context("index", idx)
                    .with_context("value", value)
                    .with_context("previous", previous));
            } else {
                cuts.push(value);
            }
        }
        let first_cut = cuts
            .iter()
            .position(|&cut| cut != 0.0)
            .ok_or_else(|| cut_error("no non-wildcard cut-off provided"))?;
        Ok(Self { cuts, first_cut })
    }

    /// Completed cut-off list.
    pub fn cuts(&self) -> &[f64] {
        &self.cuts
    }

    /// Index of the first non-wildcard cut-off.
    pub fn first_cut(&self) -> usize {
        self.first_cut
    }

    /// Implausibility at the first real cut-off, i.e. the `first_cut`-th
    /// highest value. Fewer values than that yield the smallest one.
    pub fn ranked_value(&self, implausibility: &[f64]) -> f64 {
        let sorted = sorted_descending(implausibility);
        sorted
            .get(self.first_cut)
            .or_else(|| sorted.last())
            .copied()
            .unwrap_or(0.0)
    }
}

fn sorted_descending(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));
    sorted
}

impl PlausibilityPolicy for ImplausibilityCut {
    fn name(&self) -> &'static str {
        "implausibility-cut"
    }

    fn is_plausible(&self, implausibility: &[f64]) -> bool {
        if implausibility.iter().any(|value| value.is_nan()) {
            return false;
        }
        sorted_descending(implausibility)
            .iter()
            .zip(&self.cuts)
            .all(|(&value, &cut)| cut == 0.0 || value <= cut)
    }
}

/// Stops after `max_iterations` or once fewer than `min_plausible`
/// candidates remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationLimit {
    /// Last iteration to construct.
    pub max_iterations: usize,
    /// Smallest plausible pool worth another iteration.
    pub min_plausible: usize,
}

impl ContinuationCriterion for IterationLimit {
    fn should_continue(&self, completed: usize, plausible: usize) -> bool {
        completed < self.max_iterations && plausible >= self.min_plausible.max(1)
    }
}
