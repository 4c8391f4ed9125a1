mod app;
mod commands;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::Parser;

use commands::Commands;

#[derive(Parser)]
#[command(
    name = "bsgit",
    about = "Synchronize build service packages with a local git repository"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API base URL, overriding configuration and branch metadata
    #[arg(short = 'A', long = "apiurl", global = true)]
    apiurl: Option<String>,

    /// Fetch at most this many revisions back from the newest
    #[arg(long, global = true)]
    depth: Option<usize>,

    /// Re-emit commits for revisions the mapping cache already knows
    #[arg(short, long, global = true)]
    force: bool,

    /// Path to the git binary
    #[arg(long = "git", global = true, default_value = "git")]
    git: PathBuf,

    /// Chatty progress output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Print the full error chain instead of a single message
    #[arg(short = 't', long, global = true)]
    traceback: bool,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // partially translated revisions are simply rebuilt next run, so
    // an interrupt only has to be reported, not unwound
    if let Err(err) = ctrlc::set_handler(|| {
        eprintln!("bsgit: interrupted");
        process::exit(1);
    }) {
        tracing::debug!("cannot install interrupt handler: {err}");
    }

    match run(&cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            if cli.traceback {
                eprintln!("bsgit: {err:?}");
            } else {
                eprintln!("bsgit: {err}");
            }
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<i32> {
    commands::run(cli)
}
