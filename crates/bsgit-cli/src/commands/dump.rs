use anyhow::Result;
use clap::Args;

use crate::app::App;
use crate::Cli;

#[derive(Args)]
pub struct DumpArgs {}

pub fn run(_args: &DumpArgs, cli: &Cli) -> Result<i32> {
    let app = App::open(cli)?;
    for key in app.cache.keys()? {
        let value = app.cache.get(&key)?.unwrap_or_default();
        println!(
            "{} {}",
            String::from_utf8_lossy(&key),
            String::from_utf8_lossy(&value)
        );
    }
    Ok(0)
}
