use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use emu_pipe::{SampleStore, StoreDetails};

use super::print_json;

#[derive(Args, Debug)]
pub struct DetailsArgs {
    /// Run directory holding `store.json`.
    #[arg(long)]
    pub store: PathBuf,
}

pub fn run(args: &DetailsArgs) -> Result<(), Box<dyn Error>> {
    let store = SampleStore::load(&args.store)?;
    print_json(&StoreDetails::from_store(&store))
}
