use std::collections::{HashMap, HashSet};

use bsgit_api::BuildService;
use bsgit_cache::BsCache;
use bsgit_git::GitRepo;
use bsgit_hash::{GitOid, Md5};

use crate::history::PackageHistory;

/// Run options shared by every operation.
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// How many revisions deep to fetch; `None` is unbounded.
    pub depth: Option<usize>,
    /// Re-emit commits even for revisions the cache already knows.
    pub force: bool,
}

/// One synchronization run against one build service.
///
/// Bundles the service connection, the repository, the mapping cache
/// and the options, plus the per-run memoization the history builder
/// needs. Created per command; dropping it drops the memoization but
/// never the persistent cache.
pub struct Fetcher<'a> {
    pub(crate) service: &'a mut dyn BuildService,
    pub(crate) repo: &'a GitRepo,
    pub(crate) cache: &'a BsCache,
    pub(crate) options: &'a Options,
    /// The `<server>` part of cache keys and ref names.
    pub(crate) host: String,
    pub(crate) histories: HashMap<(String, String), PackageHistory>,
    /// Link base per package as observed at the remote tip.
    pub(crate) uptodate: HashMap<(String, String), Option<(Md5, GitOid)>>,
    /// Revisions a base guess was already reported for.
    pub(crate) guess_warned: HashSet<(String, String, String)>,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        service: &'a mut dyn BuildService,
        repo: &'a GitRepo,
        cache: &'a BsCache,
        options: &'a Options,
    ) -> Self {
        let host = service.api().host().to_string();
        Self {
            service,
            repo,
            cache,
            options,
            host,
            histories: HashMap::new(),
            uptodate: HashMap::new(),
            guess_warned: HashSet::new(),
        }
    }

    /// The server name used in cache keys and ref names.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub(crate) fn revision_key(&self, project: &str, package: &str, rev: &str) -> Vec<u8> {
        bsgit_cache::keys::revision(&self.host, project, package, rev)
    }

    /// Commit already recorded for a revision, honoring `--force`.
    pub(crate) fn cached_revision(
        &self,
        project: &str,
        package: &str,
        rev: &str,
    ) -> crate::Result<Option<GitOid>> {
        if self.options.force {
            return Ok(None);
        }
        Ok(self
            .cache
            .get_oid(&self.revision_key(project, package, rev))?)
    }
}
