use anyhow::{bail, Result};
use clap::Args;

use bsgit_cache::{keys, BsCache};

use crate::app::App;
use crate::Cli;

#[derive(Args)]
pub struct UsermapArgs {
    /// Build service login
    pub login: Option<String>,

    /// Addresses for the login; the first becomes its email. Either
    /// `user@host` or `Name <user@host>`, the latter also setting the
    /// display name.
    pub addresses: Vec<String>,
}

pub fn run(args: &UsermapArgs, cli: &Cli) -> Result<i32> {
    let app = App::open(cli)?;
    match (&args.login, args.addresses.as_slice()) {
        (None, _) => list_mappings(&app.cache),
        (Some(login), []) => show_mapping(&app.cache, login),
        (Some(login), addresses) => record_mapping(&app.cache, login, addresses),
    }
}

fn list_mappings(cache: &BsCache) -> Result<i32> {
    for key in cache.keys()? {
        let Some(login) = key.strip_prefix(b"email ") else {
            continue;
        };
        let login = String::from_utf8_lossy(login).into_owned();
        print_mapping(cache, &login)?;
    }
    Ok(0)
}

fn show_mapping(cache: &BsCache, login: &str) -> Result<i32> {
    if !cache.contains(&keys::email(login))? {
        bail!("no mapping recorded for '{login}'");
    }
    print_mapping(cache, login)?;
    Ok(0)
}

fn print_mapping(cache: &BsCache, login: &str) -> Result<()> {
    let email = cache.get_str(&keys::email(login))?.unwrap_or_default();
    match cache.get_str(&keys::realname(login))? {
        Some(name) => println!("{login}: {name} <{email}>"),
        None => println!("{login}: <{email}>"),
    }
    Ok(())
}

/// Parse `Name <user@host>` or a bare address.
fn parse_address(address: &str) -> (Option<String>, String) {
    if let (Some(open), Some(close)) = (address.find('<'), address.rfind('>')) {
        if open < close {
            let name = address[..open].trim();
            let email = address[open + 1..close].trim().to_string();
            let name = (!name.is_empty()).then(|| name.to_string());
            return (name, email);
        }
    }
    (None, address.trim().to_string())
}

fn record_mapping(cache: &BsCache, login: &str, addresses: &[String]) -> Result<i32> {
    let (name, email) = parse_address(&addresses[0]);
    if !email.contains('@') {
        bail!("'{email}' does not look like an email address");
    }

    // retire the old reverse entry before the forward one moves
    if let Some(old_email) = cache.get_str(&keys::email(login))? {
        if old_email != email {
            cache.del(&keys::login(&old_email))?;
        }
    }

    cache.put(&keys::email(login), email.as_bytes())?;
    cache.put(&keys::login(&email), login.as_bytes())?;
    if let Some(name) = name {
        cache.put(&keys::realname(login), name.as_bytes())?;
    }

    // further addresses are aliases that resolve to the same login
    for address in &addresses[1..] {
        let (_, alias) = parse_address(address);
        cache.put(&keys::login(&alias), login.as_bytes())?;
    }

    print_mapping(cache, login)?;
    Ok(0)
}
