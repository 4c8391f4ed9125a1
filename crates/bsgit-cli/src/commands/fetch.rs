use anyhow::Result;
use clap::Args;

use bsgit_sync::Fetcher;

use crate::app::{self, App, Target};
use crate::Cli;

#[derive(Args)]
pub struct FetchArgs {
    /// Local branch, or a project/package pair
    pub target: Option<String>,
}

pub fn run(args: &FetchArgs, cli: &Cli) -> Result<i32> {
    let app = App::open(cli)?;
    let target = app::resolve(&app, cli, args.target.as_deref())?;
    fetch_target(&app, &target)?;
    Ok(0)
}

/// Fetch one package and keep the local branch wired up. Shared with
/// `pull` and `push`.
pub(crate) fn fetch_target(app: &App, target: &Target) -> Result<()> {
    // pick up objects that appeared on the branch since the last run;
    // a failure here only costs re-downloads
    if let Some(tip) = app.repo.branch_tip(&target.branch)? {
        if let Err(err) = app.cache.reindex(&app.repo, &tip) {
            tracing::warn!("cannot reindex branch '{}': {err}", target.branch);
        }
    }

    let mut client = app.client(&target.api)?;
    let mut fetcher = Fetcher::new(&mut client, &app.repo, &app.cache, &app.options);
    let tip = fetcher.fetch_package(&target.project, &target.package)?;
    drop(fetcher);

    let Some(tip) = tip else {
        println!(
            "{}/{} has no revisions yet",
            target.project, target.package
        );
        return Ok(());
    };

    if app.repo.branch_tip(&target.branch)?.is_none() {
        app.repo.create_branch(&target.branch, &tip.to_hex())?;
        app.repo.config_set(
            &format!("branch.{}.remote", target.branch),
            &target.api.to_string(),
        )?;
        app.repo.config_set(
            &format!("branch.{}.merge", target.branch),
            &target.tracking_ref(),
        )?;
        println!(
            "created branch '{}' tracking {}/{}",
            target.branch, target.project, target.package
        );
    }
    if app.repo.head_is_unborn()? {
        app.repo.checkout(&target.branch)?;
    }

    println!("{}/{} is at {}", target.project, target.package, tip);
    Ok(())
}
