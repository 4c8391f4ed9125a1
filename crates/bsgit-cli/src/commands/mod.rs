pub mod dump;
pub mod fetch;
pub mod pull;
pub mod push;
pub mod usermap;

use anyhow::Result;
use clap::Subcommand;

use crate::Cli;

#[derive(Subcommand)]
pub enum Commands {
    /// Import a package's revision history into the local repository
    Fetch(fetch::FetchArgs),
    /// Fetch, then rebase the local branch onto the imported history
    Pull(pull::PullArgs),
    /// Replay local commits as new build service revisions
    Push(push::PushArgs),
    /// Inspect or record login/email mappings
    Usermap(usermap::UsermapArgs),
    /// Print every mapping cache entry
    Dump(dump::DumpArgs),
}

pub fn run(cli: &Cli) -> Result<i32> {
    match &cli.command {
        Commands::Fetch(args) => fetch::run(args, cli),
        Commands::Pull(args) => pull::run(args, cli),
        Commands::Push(args) => push::run(args, cli),
        Commands::Usermap(args) => usermap::run(args, cli),
        Commands::Dump(args) => dump::run(args, cli),
    }
}
