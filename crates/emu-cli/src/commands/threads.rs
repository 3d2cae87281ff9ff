use std::error::Error;

use clap::Args;
use emu_core::ThreadBudget;

use super::print_json;

#[derive(Args, Debug)]
pub struct ThreadsArgs {
    /// Number of processes sharing the machine.
    #[arg(long, default_value_t = 1)]
    pub processes: usize,
}

pub fn run(args: &ThreadsArgs) -> Result<(), Box<dyn Error>> {
    let budget = ThreadBudget::for_processes(args.processes)?;
    print_json(&budget)
}
