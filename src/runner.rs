use std::path::PathBuf;

use clap::{Args, Command, FromArgMatches as _};

use crate::experiment::{Experiment, Replicate};
use crate::log::{info, set_log_level, LevelFilter};

/// Default cli arguments for the setup runner
#[derive(Args, Debug)]
pub struct BaseArgs {
    /// Path to the experiment configuration (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Random seed
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Number of replicates, overriding the configuration
    #[arg(short, long)]
    pub nsim: Option<usize>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short, long, default_value = "off")]
    pub log_level: LevelFilter,
}

fn create_cli() -> Command {
    let cli = Command::new("seir-setup")
        .about("Builds the spatial setup and draws seeding and parameters for each replicate");
    BaseArgs::augment_args(cli)
}

/// Parses the command line and runs every replicate.
///
/// # Errors
/// Returns an error if argument parsing, loading the experiment, or any draw fails.
pub fn run_with_args() -> Result<Vec<Replicate>, Box<dyn std::error::Error>> {
    let matches = create_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    run(args)
}

/// Runs every replicate of the experiment described by `args`.
///
/// # Errors
/// Returns an error if loading the experiment or any draw fails.
pub fn run(args: BaseArgs) -> Result<Vec<Replicate>, Box<dyn std::error::Error>> {
    set_log_level(args.log_level);
    let experiment = Experiment::from_file(&args.config, args.random_seed, args.nsim)?;
    let replicates = experiment.draw_all()?;
    info!(
        "drew {} replicates for '{}'",
        replicates.len(),
        experiment.setup().setup_name()
    );
    Ok(replicates)
}
