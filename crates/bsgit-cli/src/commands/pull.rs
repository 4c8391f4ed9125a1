use anyhow::Result;
use clap::Args;

use crate::app::{self, App};
use crate::commands::fetch::fetch_target;
use crate::Cli;

#[derive(Args)]
pub struct PullArgs {
    /// Local branch, or a project/package pair
    pub target: Option<String>,
}

pub fn run(args: &PullArgs, cli: &Cli) -> Result<i32> {
    let app = App::open(cli)?;
    let target = app::resolve(&app, cli, args.target.as_deref())?;
    fetch_target(&app, &target)?;
    app.repo.rebase(&target.tracking_ref(), &target.branch)?;
    Ok(0)
}
