use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "FE-RS",
    about = "A time-discrete multi-car Formula E race simulator written in Rust"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug printing
    #[clap(short, long)]
    pub debug: bool,

    /// Print live timing while the race is simulated
    #[clap(short, long)]
    pub live: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs; runs beyond the first use consecutive seeds
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Override the master random seed from the parameter file
    #[clap(short, long)]
    pub random_seed: Option<u64>,

    /// Set simulation timestep size in seconds, must be in the range [0.1, 0.5]
    #[clap(short, long, default_value = "0.2")]
    pub timestep_size: f64,
}
