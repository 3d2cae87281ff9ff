use std::error::Error;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::{
    construct::{self, ConstructArgs},
    details::{self, DetailsArgs},
    evaluate::{self, EvaluateArgs},
    partition::{self, PartitionArgs},
    threads::{self, ThreadsArgs},
};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "emu", about = "Distributed emulator construction CLI")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Construct (or resume) an emulator from a YAML configuration.
    Construct(ConstructArgs),
    /// Show how systems would be spread over processes.
    Partition(PartitionArgs),
    /// Show the kernel thread budget per process.
    Threads(ThreadsArgs),
    /// Summarise a saved sample store.
    Details(DetailsArgs),
    /// Evaluate a saved emulator at one parameter vector.
    Evaluate(EvaluateArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Construct(args) => construct::run(&args),
        Command::Partition(args) => partition::run(&args),
        Command::Threads(args) => threads::run(&args),
        Command::Details(args) => details::run(&args),
        Command::Evaluate(args) => evaluate::run(&args),
    }
}
