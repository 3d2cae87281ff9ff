use emu_kernel::CostModel;
use serde::{Deserialize, Serialize};

use crate::partition::Partition;

/// Modeled evaluation rate of one partitioned iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputEstimate {
    /// Systems held by the busiest rank.
    pub max_load: usize,
    /// Modeled cost of a single system evaluation.
    pub cost_per_system: f64,
    /// Full emulator evaluations per unit time.
    pub eval_rate: f64,
    /// `S / (P * max_load)`: share of the ranks' time spent on useful work.
    pub efficiency: f64,
}

/// Evaluations of the full emulator per unit time implied by the busiest rank.
///
/// Every emulator evaluation needs all systems, so the rank holding the most
/// systems bounds the rate. A partition without systems has rate zero.
pub fn predicted_eval_rate(partition: &Partition, cost_model: &CostModel, n_samples: usize) -> f64 {
    let max_load = partition.max_load();
    if max_load == 0 {
        return 0.0;
    }
    1.0 / (max_load as f64 * cost_model.evaluation_cost(n_samples))
}

/// Rate implied by explicit per-system costs; the slowest rank bounds it.
pub fn predicted_eval_rate_with_costs(partition: &Partition, costs: &[f64]) -> f64 {
    let mut loads = vec![0.0f64; partition.processes()];
    for (system, &rank) in partition.assignments().iter().enumerate() {
        loads[rank] += costs.get(system).copied().unwrap_or(0.0);
    }
    let busiest = loads.into_iter().fold(0.0f64, f64::max);
    if busiest > 0.0 {
        1.0 / busiest
    } else {
        0.0
    }
}

/// Summarises the modeled throughput of a partition.
pub fn estimate(partition: &Partition, cost_model: &CostModel, n_samples: usize) -> ThroughputEstimate {
    let max_load = partition.max_load();
    let efficiency = if max_load == 0 {
        0.0
    } else {
        partition.n_systems() as f64 / (partition.processes() * max_load) as f64
    };
    ThroughputEstimate {
        max_load,
        cost_per_system: cost_model.evaluation_cost(n_samples),
        eval_rate: predicted_eval_rate(partition, cost_model, n_samples),
        efficiency,
    }
}
