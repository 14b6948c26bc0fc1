/// o5m command-line tool: inspect, validate, and analyse `.o5m`/`.o5c`
/// files.
///
/// # Command overview
///
/// ```text
/// o5m <COMMAND> [OPTIONS]
///
/// Commands:
///   inspect    Print the file header and a record-by-record summary
///   stats      Print per-kind counts and size statistics
///   validate   Decode the whole file and report structural correctness
///   help       Print help information
/// ```
///
/// # Exit codes
///
/// | Code | Meaning                                 |
/// |------|-----------------------------------------|
/// | 0    | Success                                 |
/// | 1    | Error (I/O failure, invalid file, etc.) |
///
/// All error details are written to stderr so stdout can be piped cleanly.
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod cmd_inspect;
mod cmd_stats;
mod cmd_validate;

/// The o5m command-line tool.
#[derive(Parser)]
#[command(name = "o5m", version, about = "o5m/o5c file tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the file header and a record-by-record summary.
    Inspect(InspectArgs),
    /// Print per-kind counts and size statistics.
    Stats(StatsArgs),
    /// Decode the whole file and report structural correctness.
    Validate(ValidateArgs),
}

/// Arguments for `o5m inspect`.
#[derive(clap::Args)]
pub struct InspectArgs {
    /// Path to the `.o5m`/`.o5c` file to inspect.
    pub file: PathBuf,

    /// Show at most this many records (0 = no limit).
    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Show the tags of each record.
    #[arg(long)]
    pub tags: bool,
}

/// Arguments for `o5m stats`.
#[derive(clap::Args)]
pub struct StatsArgs {
    /// Path to the `.o5m`/`.o5c` file to analyse.
    pub file: PathBuf,
}

/// Arguments for `o5m validate`.
#[derive(clap::Args)]
pub struct ValidateArgs {
    /// Path to the `.o5m`/`.o5c` file to validate.
    pub file: PathBuf,
}

fn main() {
    env_logger::init();
    o5m_decoder::register_builtin_formats();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Inspect(args) => cmd_inspect::run(&args),
        Commands::Stats(args) => cmd_stats::run(&args),
        Commands::Validate(args) => cmd_validate::run(&args),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}
