use emu_core::{EmuError, ErrorInfo};
use serde::{Deserialize, Serialize};

fn default_overhead() -> f64 {
    1.0
}

fn default_scale() -> f64 {
    1.0
}

fn default_exponent() -> f64 {
    3f64.log2()
}

/// Modeled cost of one emulator evaluation for a system trained on `n` samples:
/// `overhead + scale * n^exponent`.
///
/// With the default exponent `log2(3)` doubling `n` multiplies the cost by a
/// factor that grows towards, but never exceeds, three.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Fixed per-evaluation cost.
    #[serde(default = "default_overhead")]
    pub overhead: f64,
    /// Multiplier of the sample-dependent term.
    #[serde(default = "default_scale")]
    pub scale: f64,
    /// Growth exponent of the sample-dependent term.
    #[serde(default = "default_exponent")]
    pub exponent: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            overhead: default_overhead(),
            scale: default_scale(),
            exponent: default_exponent(),
        }
    }
}

impl CostModel {
    /// Creates a validated cost model. The exponent must lie in `[1, log2(3)]`.
    pub fn new(overhead: f64, scale: f64, exponent: f64) -> Result<Self, EmuError> {
        let model = Self {
            overhead,
            scale,
            exponent,
        };
        model.validate()?;
        Ok(model)
    }

    /// Checks the parameter ranges.
    pub fn validate(&self) -> Result<(), EmuError> {
        let max_exponent = default_exponent();
        if !(self.overhead >= 0.0 && self.scale > 0.0)
            || !(1.0..=max_exponent + 1e-12).contains(&self.exponent)
        {
            return Err(EmuError::Config(
                ErrorInfo::new("config_cost_model", "invalid cost model parameters")
                    .with_context("overhead", self.overhead)
                    .with_context("scale", self.scale)
                    .with_context("exponent", self.exponent),
            ));
        }
        Ok(())
    }

    /// Cost of one evaluation for a system trained on `n_samples`.
    pub fn evaluation_cost(&self, n_samples: usize) -> f64 {
        self.overhead + self.scale * (n_samples as f64).powf(self.exponent)
    }

    /// Evaluations per unit time.
    pub fn throughput(&self, n_samples: usize) -> f64 {
        1.0 / self.evaluation_cost(n_samples)
    }

    /// Factor by which throughput drops when going from `from` to `to` samples.
    pub fn slowdown(&self, from: usize, to: usize) -> f64 {
        self.evaluation_cost(to) / self.evaluation_cost(from)
    }

    /// Per-system cost estimates for a set of training sample counts.
    pub fn system_costs(&self, samples_per_system: &[usize]) -> Vec<f64> {
        samples_per_system
            .iter()
            .map(|&n| self.evaluation_cost(n))
            .collect()
    }
}
