//! Shared command context: repository, cache, configuration, and the
//! resolution of what to synchronize.

use anyhow::{anyhow, bail, Context as _, Result};

use bsgit_api::{ApiClient, ApiUrl};
use bsgit_cache::BsCache;
use bsgit_config::Config;
use bsgit_git::{refs, GitRepo};
use bsgit_sync::Options;

use crate::Cli;

/// Everything a command needs before it talks to the network.
pub struct App {
    pub repo: GitRepo,
    pub cache: BsCache,
    pub config: Config,
    pub options: Options,
}

impl App {
    /// Open the repository at the current directory, the mapping
    /// cache inside its meta directory, and the user configuration.
    pub fn open(cli: &Cli) -> Result<Self> {
        let repo = GitRepo::discover(&cli.git, ".")?;
        let cache = BsCache::open(repo.git_dir().join("bsgit-cache"))?;
        let config = Config::load_default()?;
        Ok(Self {
            repo,
            cache,
            config,
            options: Options {
                depth: cli.depth,
                force: cli.force,
            },
        })
    }

    /// An authenticated client for one API base.
    pub fn client(&self, api: &ApiUrl) -> Result<ApiClient> {
        let credentials = self
            .config
            .credentials(api.host())
            .map(|(user, password)| (user.to_string(), password.to_string()));
        if credentials.is_none() {
            tracing::warn!("no credentials configured for {}", api.host());
        }
        Ok(ApiClient::new(api.clone(), credentials)?)
    }
}

/// What a command operates on.
#[derive(Debug)]
pub struct Target {
    pub api: ApiUrl,
    pub project: String,
    pub package: String,
    /// Local branch carrying the package.
    pub branch: String,
}

impl Target {
    pub fn tracking_ref(&self) -> String {
        refs::tracking_ref(self.api.host(), &self.project, &self.package)
    }
}

/// Interpret a command argument as `project/package` if it looks like
/// one: exactly one slash, both sides nonempty.
pub fn parse_package_arg(arg: &str) -> Option<(String, String)> {
    let (project, package) = arg.split_once('/')?;
    if project.is_empty() || package.is_empty() || package.contains('/') {
        return None;
    }
    Some((project.to_string(), package.to_string()))
}

/// Resolve the `(api, project, package, branch)` tuple from a command
/// argument, or from the current branch when there is none.
///
/// An argument shaped like `project/package` names the remote pair
/// directly; any other argument names a local branch.
pub fn resolve(app: &App, cli: &Cli, arg: Option<&str>) -> Result<Target> {
    if let Some(arg) = arg {
        if let Some((project, package)) = parse_package_arg(arg) {
            let api = api_from_flag_or_default(app, cli)?;
            let branch = package.clone();
            return Ok(Target {
                api,
                project,
                package,
                branch,
            });
        }
        resolve_branch(app, cli, arg)
    } else {
        let branch = app
            .repo
            .head_branch()?
            .ok_or_else(|| anyhow!("HEAD is detached; name a branch or project/package"))?;
        resolve_branch(app, cli, &branch)
    }
}

fn resolve_branch(app: &App, cli: &Cli, branch: &str) -> Result<Target> {
    let merge = app
        .repo
        .config_get(&format!("branch.{branch}.merge"))?
        .ok_or_else(|| {
            anyhow!("branch '{branch}' does not track a build service package (no merge ref)")
        })?;
    let (host, project, package) = refs::parse_tracking_ref(&merge).ok_or_else(|| {
        anyhow!("branch '{branch}' tracks '{merge}', which is not a build service ref")
    })?;

    let api = if let Some(url) = &cli.apiurl {
        ApiUrl::parse(url)?
    } else if let Some(url) = app.repo.config_get(&format!("branch.{branch}.remote"))? {
        ApiUrl::parse(&url)
            .with_context(|| format!("branch '{branch}' has an unusable remote '{url}'"))?
    } else {
        ApiUrl::parse(&app.config.apiurl_for_host(&host))?
    };

    Ok(Target {
        api,
        project,
        package,
        branch: branch.to_string(),
    })
}

fn api_from_flag_or_default(app: &App, cli: &Cli) -> Result<ApiUrl> {
    if let Some(url) = &cli.apiurl {
        return Ok(ApiUrl::parse(url)?);
    }
    match &app.config.apiurl {
        Some(url) => Ok(ApiUrl::parse(url)?),
        None => bail!("no API base URL configured; pass -A or set `apiurl` in the configuration"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_arg_needs_exactly_one_slash() {
        assert_eq!(
            parse_package_arg("devel:tools/pkg"),
            Some(("devel:tools".to_string(), "pkg".to_string()))
        );
        assert_eq!(parse_package_arg("pkg"), None);
        assert_eq!(parse_package_arg("a/b/c"), None);
        assert_eq!(parse_package_arg("/pkg"), None);
        assert_eq!(parse_package_arg("prj/"), None);
    }
}
