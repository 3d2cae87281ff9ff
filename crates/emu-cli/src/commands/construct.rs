use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use emu_pipe::{Controller, PipelineConfig, SampleStore};
use tracing::info;

#[derive(Args, Debug)]
pub struct ConstructArgs {
    /// YAML pipeline configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Run directory for the sample store and report; overrides the configuration.
    #[arg(long)]
    pub out: Option<PathBuf>,
    /// Number of ranks; overrides the configuration.
    #[arg(long)]
    pub processes: Option<usize>,
    /// Continue from the store saved in the run directory.
    #[arg(long)]
    pub resume: bool,
}

pub fn run(args: &ConstructArgs) -> Result<(), Box<dyn Error>> {
    let mut config = PipelineConfig::load(&args.config)?;
    if let Some(out) = &args.out {
        config.output.run_directory = Some(out.clone());
    }
    if let Some(processes) = args.processes {
        config.runtime.processes = processes;
    }
    let controller = Controller::new(config)?;
    let run_directory = controller.config().output.run_directory.clone();

    let construction = match (&run_directory, args.resume) {
        (Some(dir), true) => controller.resume(SampleStore::load(dir)?)?,
        (None, true) => return Err("--resume needs a run directory".into()),
        (_, false) => controller.construct()?,
    };

    if let Some(dir) = &run_directory {
        let path = dir.join(&controller.config().output.report_file);
        construction.report.write(&path)?;
        info!(path = %path.display(), "wrote run report");
    }
    for stats in &construction.report.iterations {
        println!(
            "iteration {}: n_train={} pool {} -> {} ({:.3} remaining) in {:.3}s",
            stats.iteration,
            stats.n_train,
            stats.pool_in,
            stats.pool_out,
            stats.remaining_fraction,
            stats.construct_secs
        );
    }
    Ok(())
}
