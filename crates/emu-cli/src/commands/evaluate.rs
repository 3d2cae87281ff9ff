use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use emu_pipe::{Emulator, SampleStore};

use super::print_json;

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Run directory holding `store.json`.
    #[arg(long)]
    pub store: PathBuf,
    /// Parameter vector in model units.
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    pub params: Vec<f64>,
    /// Iteration to evaluate; defaults to the latest.
    #[arg(long)]
    pub iteration: Option<usize>,
}

pub fn run(args: &EvaluateArgs) -> Result<(), Box<dyn Error>> {
    let store = SampleStore::load(&args.store)?;
    let emulator = Emulator::from_store(&store)?;
    let iteration = args.iteration.unwrap_or_else(|| emulator.iterations());
    print_json(&emulator.evaluate(iteration, &args.params)?)
}
