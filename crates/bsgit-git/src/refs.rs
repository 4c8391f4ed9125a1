//! Remote-tracking refs for build service packages.
//!
//! A package `pkg` in project `some:project` on host `api.example.com`
//! is tracked under `refs/remotes/api.example.com/some/project/pkg`:
//! the project's `:` separators become path components. Updates are
//! written straight into the ref file; these refs are not meant to be
//! touched by ordinary branch commands.

use std::fs;

use bsgit_hash::GitOid;

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::Result;

/// Ref name for a package's remote-tracking ref.
pub fn tracking_ref(host: &str, project: &str, package: &str) -> String {
    format!(
        "refs/remotes/{}/{}/{}",
        host,
        project.replace(':', "/"),
        package
    )
}

/// Reverse [`tracking_ref`]: recover `(host, project, package)`.
///
/// Returns `None` for refs that were not produced by the rule above.
pub fn parse_tracking_ref(name: &str) -> Option<(String, String, String)> {
    let rest = name.strip_prefix("refs/remotes/")?;
    let mut parts: Vec<&str> = rest.split('/').collect();
    if parts.len() < 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }
    let package = parts.pop()?.to_string();
    let host = parts.remove(0).to_string();
    Some((host, parts.join(":"), package))
}

/// Point `name` at `target`, creating parent directories as needed.
pub fn write_ref(repo: &GitRepo, name: &str, target: &GitOid) -> Result<()> {
    let path = repo.git_dir().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GitError::IoPath {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(&path, format!("{}\n", target.to_hex())).map_err(|e| GitError::IoPath {
        path,
        source: e,
    })
}

/// Resolve a ref to a commit, `None` when it does not exist.
pub fn read_ref(repo: &GitRepo, name: &str) -> Result<Option<GitOid>> {
    repo.rev_parse(name)
}
