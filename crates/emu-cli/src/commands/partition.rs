use std::error::Error;

use clap::{Args, ValueEnum};
use emu_dist::{estimate, StrategyKind, ThroughputEstimate};
use emu_kernel::CostModel;
use serde::Serialize;

use super::print_json;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum StrategyArg {
    RoundRobin,
    Block,
    CostBalanced,
}

impl From<StrategyArg> for StrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::RoundRobin => StrategyKind::RoundRobin,
            StrategyArg::Block => StrategyKind::Block,
            StrategyArg::CostBalanced => StrategyKind::CostBalanced,
        }
    }
}

#[derive(Args, Debug)]
pub struct PartitionArgs {
    /// Number of emulator systems.
    #[arg(long)]
    pub systems: usize,
    /// Number of processes.
    #[arg(long)]
    pub processes: usize,
    /// Training samples per system, used by the cost model.
    #[arg(long, default_value_t = 500)]
    pub samples: usize,
    #[arg(long, value_enum, default_value = "round-robin")]
    pub strategy: StrategyArg,
}

#[derive(Debug, Serialize)]
struct PartitionSummary {
    strategy: StrategyKind,
    sizes: Vec<usize>,
    idle_ranks: Vec<usize>,
    balanced: bool,
    throughput: ThroughputEstimate,
}

pub fn run(args: &PartitionArgs) -> Result<(), Box<dyn Error>> {
    let strategy = StrategyKind::from(args.strategy);
    let cost_model = CostModel::default();
    let costs = vec![cost_model.evaluation_cost(args.samples); args.systems];
    let partition = strategy.assign(&costs, args.processes)?;
    print_json(&PartitionSummary {
        strategy,
        sizes: partition.sizes(),
        idle_ranks: partition.idle_ranks(),
        balanced: partition.is_balanced(),
        throughput: estimate(&partition, &cost_model, args.samples),
    })
}
