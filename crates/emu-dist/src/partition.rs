use std::cmp::Ordering;

use emu_core::{EmuError, ErrorInfo, Rank, SystemId};
use serde::{Deserialize, Serialize};

fn partition_error(code: &str, message: impl Into<String>) -> EmuError {
    EmuError::Partition(ErrorInfo::new(code, message.into()))
}

fn require_processes(processes: usize) -> Result<(), EmuError> {
    if processes == 0 {
        return Err(
            partition_error("partition_no_processes", "at least one worker process is required")
                .with_context("processes", processes),
        );
    }
    Ok(())
}

/// Assignment of every emulator system to exactly one worker process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    assignments: Vec<Rank>,
    processes: usize,
}

impl Partition {
    /// Builds a partition from an explicit owner list, one entry per system.
    pub fn from_assignments(assignments: Vec<Rank>, processes: usize) -> Result<Self, EmuError> {
        require_processes(processes)?;
        if let Some((system, &rank)) = assignments
            .iter()
            .enumerate()
            .find(|&(_, &rank)| rank >= processes)
        {
            return Err(
                partition_error("partition_invalid_rank", "system assigned to an unknown rank")
                    .with_context("system", system)
                    .with_context("rank", rank)
                    .with_context("processes", processes),
            );
        }
        Ok(Self {
            assignments,
            processes,
        })
    }

    /// Number of systems covered by the partition.
    pub fn n_systems(&self) -> usize {
        self.assignments.len()
    }

    /// Number of worker processes.
    pub fn processes(&self) -> usize {
        self.processes
    }

    /// Owner list indexed by system.
    pub fn assignments(&self) -> &[Rank] {
        &self.assignments
    }

    /// Rank owning `system`, if the system exists.
    pub fn owner(&self, system: SystemId) -> Option<Rank> {
        self.assignments.get(system.index()).copied()
    }

    /// Systems owned by `rank`, in ascending system order.
    pub fn systems_for(&self, rank: Rank) -> Vec<SystemId> {
        self.assignments
            .iter()
            .enumerate()
            .filter(|&(_, &owner)| owner == rank)
            .map(|(idx, _)| SystemId::from_raw(idx as u32))
            .collect()
    }

    /// Number of systems owned by each rank.
    pub fn sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.processes];
        for &rank in &self.assignments {
            sizes[rank] += 1;
        }
        sizes
    }

    /// Largest number of systems owned by a single rank.
    pub fn max_load(&self) -> usize {
        self.sizes().into_iter().max().unwrap_or(0)
    }

    /// Ranks that own no system.
    pub fn idle_ranks(&self) -> Vec<Rank> {
        self.sizes()
            .into_iter()
            .enumerate()
            .filter(|(_, size)| *size == 0)
            .map(|(rank, _)| rank)
            .collect()
    }

    /// Lower bound on the busiest rank's load: `ceil(S / P)`.
    pub fn optimal_load(&self) -> usize {
        self.assignments.len().div_ceil(self.processes)
    }

    /// True when no rank holds more than `ceil(S / P)` systems.
    pub fn is_balanced(&self) -> bool {
        self.max_load() <= self.optimal_load()
    }
}

/// Policy mapping emulator systems onto worker processes.
pub trait PartitionStrategy {
    /// Short identifier used in logs and reports.
    fn name(&self) -> &'static str;

    /// Assigns one system per entry of `costs` to `processes` ranks.
    fn assign(&self, costs: &[f64], processes: usize) -> Result<Partition, EmuError>;
}

/// System `i` goes to rank `i mod P`.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

impl PartitionStrategy for RoundRobin {
    fn name(&self) -> &'static str {
        "round-robin"
    }

    fn assign(&self, costs: &[f64], processes: usize) -> Result<Partition, EmuError> {
        require_processes(processes)?;
        let assignments = (0..costs.len()).map(|idx| idx % processes).collect();
        Partition::from_assignments(assignments, processes)
    }
}

/// Contiguous system ranges; the first `S mod P` ranks take one extra system.
#[derive(Debug, Clone, Copy, Default)]
pub struct Block;

impl PartitionStrategy for Block {
    fn name(&self) -> &'static str {
        "block"
    }

    fn assign(&self, costs: &[f64], processes: usize) -> Result<Partition, EmuError> {
        require_processes(processes)?;
        let n = costs.len();
        let base = n / processes;
        let extra = n % processes;
        let mut assignments = Vec::with_capacity(n);
        for rank in 0..processes {
            let len = base + usize::from(rank < extra);
            assignments.extend(std::iter::repeat(rank).take(len));
        }
        Partition::from_assignments(assignments, processes)
    }
}

/// Greedy longest-processing-time assignment on per-system cost estimates.
///
/// Systems are visited by descending cost (lower index first on equal cost)
/// and each goes to the rank with the smallest accumulated cost, lowest rank
/// first on ties. A rank already holding `ceil(S / P)` systems is skipped, so
/// the system count per rank never exceeds the count-balanced optimum. With
/// uniform costs this reduces to round-robin.
#[derive(Debug, Clone, Copy, Default)]
pub struct CostBalanced;

impl PartitionStrategy for CostBalanced {
    fn name(&self) -> &'static str {
        "cost-balanced"
    }

    fn assign(&self, costs: &[f64], processes: usize) -> Result<Partition, EmuError> {
        require_processes(processes)?;
        if let Some((system, cost)) = costs
            .iter()
            .enumerate()
            .find(|(_, cost)| !cost.is_finite() || **cost < 0.0)
        {
            return Err(
                partition_error("partition_invalid_cost", "system cost must be finite and non-negative")
                    .with_context("system", system)
                    .with_context("cost", cost),
            );
        }
        let mut order: Vec<usize> = (0..costs.len()).collect();
        order.sort_by(|&a, &b| costs[b].total_cmp(&costs[a]).then(a.cmp(&b)));

        let cap = costs.len().div_ceil(processes);
        let mut loads = vec![0.0f64; processes];
        let mut counts = vec![0usize; processes];
        let mut assignments = vec![0; costs.len()];
        for system in order {
            let rank = loads
                .iter()
                .enumerate()
                .filter(|&(rank, _)| counts[rank] < cap)
                .min_by(|(ra, la), (rb, lb)| match la.total_cmp(lb) {
                    Ordering::Equal => ra.cmp(rb),
                    other => other,
                })
                .map(|(rank, _)| rank)
                .unwrap_or(0);
            loads[rank] += costs[system];
            counts[rank] += 1;
            assignments[system] = rank;
        }
        Partition::from_assignments(assignments, processes)
    }
}

/// Configuration selector for the partition strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// [`RoundRobin`].
    #[default]
    RoundRobin,
    /// [`Block`].
    Block,
    /// [`CostBalanced`].
    CostBalanced,
}

impl StrategyKind {
    /// Returns the strategy implementation.
    pub fn strategy(&self) -> Box<dyn PartitionStrategy + Send + Sync> {
        match self {
            StrategyKind::RoundRobin => Box::new(RoundRobin),
            StrategyKind::Block => Box::new(Block),
            StrategyKind::CostBalanced => Box::new(CostBalanced),
        }
    }

    /// Runs the selected strategy.
    pub fn assign(&self, costs: &[f64], processes: usize) -> Result<Partition, EmuError> {
        self.strategy().assign(costs, processes)
    }
}

/// Default partition of `n_systems` systems over `processes` ranks.
pub fn partition(n_systems: usize, processes: usize) -> Result<Partition, EmuError> {
    RoundRobin.assign(&vec![1.0; n_systems], processes)
}
