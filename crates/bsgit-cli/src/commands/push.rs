use anyhow::Result;
use clap::Args;

use bsgit_sync::{push_package, Fetcher};

use crate::app::{self, App};
use crate::Cli;

#[derive(Args)]
pub struct PushArgs {
    /// Local branch, or a project/package pair
    pub target: Option<String>,
}

pub fn run(args: &PushArgs, cli: &Cli) -> Result<i32> {
    let app = App::open(cli)?;
    let target = app::resolve(&app, cli, args.target.as_deref())?;

    let mut client = app.client(&target.api)?;
    let mut fetcher = Fetcher::new(&mut client, &app.repo, &app.cache, &app.options);
    let outcome = push_package(&mut fetcher, &target.project, &target.package, &target.branch)?;
    fetcher.verify_link(&target.project, &target.package)?;

    println!(
        "pushed {} revision(s); {}/{} is at {}",
        outcome.pushed, target.project, target.package, outcome.new_tip
    );
    Ok(0)
}
