//! The history builder: package revision chains into commit chains.
//!
//! Fetching works in two passes. The first pass loads the package's
//! revision history, reconnects it with commits already recorded in
//! the mapping cache, and decides how far back to materialize (the
//! depth limit, overridden where the graph has to be reconnected).
//! The second pass emits commits oldest to newest so every commit's
//! first parent already exists.

use std::collections::HashMap;

use bsgit_api::{ApiError, LinkInfo, PackageStatus, StatusOptions};
use bsgit_git::{refs, Signature};
use bsgit_hash::{GitOid, Md5};

use crate::context::Fetcher;
use crate::error::SyncError;
use crate::Result;

/// One revision of a package, as the builder tracks it.
#[derive(Debug, Clone)]
pub(crate) struct Revision {
    pub rev: String,
    pub srcmd5: Md5,
    pub time: i64,
    pub user: String,
    pub comment: String,
    /// Index of the previous (older) revision.
    pub parent: Option<usize>,
    /// Commit already emitted or recovered from the cache.
    pub commit: Option<GitOid>,
    /// Fetch regardless of the depth limit (reconnects the graph).
    pub must_fetch: bool,
}

/// A package's revision records, newest first, indexed both ways.
pub(crate) struct PackageHistory {
    pub revisions: Vec<Revision>,
    pub by_rev: HashMap<String, usize>,
    /// No-op revisions share a srcmd5; the earliest one wins here.
    pub by_srcmd5: HashMap<Md5, usize>,
}

/// The link target, defaulting to the linking package's own location.
pub(crate) fn link_target(link: &LinkInfo, project: &str, package: &str) -> (String, String) {
    (
        link.project.clone().unwrap_or_else(|| project.to_string()),
        link.package.clone().unwrap_or_else(|| package.to_string()),
    )
}

impl Fetcher<'_> {
    /// Load and index a package's history, reconnecting it with the
    /// mapping cache. Idempotent per run.
    pub(crate) fn load_history(&mut self, project: &str, package: &str) -> Result<()> {
        let key = (project.to_string(), package.to_string());
        if self.histories.contains_key(&key) {
            return Ok(());
        }

        let entries = self.service.history(project, package)?;
        let count = entries.len();
        let mut revisions: Vec<Revision> = entries
            .into_iter()
            .enumerate()
            .map(|(i, entry)| Revision {
                rev: entry.rev,
                srcmd5: entry.srcmd5,
                time: entry.time,
                user: entry.user,
                comment: entry.comment,
                parent: (i + 1 < count).then_some(i + 1),
                commit: None,
                must_fetch: false,
            })
            .collect();

        let mut by_rev = HashMap::new();
        let mut by_srcmd5 = HashMap::new();
        // iterate newest to oldest; later (older) inserts win, making
        // the earliest revision the canonical entry for a shared hash
        for (i, rev) in revisions.iter().enumerate() {
            by_rev.insert(rev.rev.clone(), i);
            by_srcmd5.insert(rev.srcmd5, i);
        }

        let mut oldest_cached = None;
        for (i, rev) in revisions.iter_mut().enumerate() {
            if let Some(commit) = self.cached_revision(project, package, &rev.rev)? {
                rev.commit = Some(commit);
                oldest_cached = Some(i);
            }
        }
        // everything newer than a cached revision has to be fetched,
        // depth limit or not, so the commit graph stays connected
        if let Some(oldest) = oldest_cached {
            for rev in revisions.iter_mut().take(oldest) {
                rev.must_fetch = true;
            }
        }

        self.histories.insert(
            key,
            PackageHistory {
                revisions,
                by_rev,
                by_srcmd5,
            },
        );
        Ok(())
    }

    /// Drop per-run knowledge about a package; the next operation
    /// observes it afresh. Used after a push created new revisions.
    pub(crate) fn forget_package(&mut self, project: &str, package: &str) {
        let key = (project.to_string(), package.to_string());
        self.histories.remove(&key);
        self.uptodate.remove(&key);
    }

    /// Fetch a package: emit missing commits and move the
    /// remote-tracking ref to the newest revision's commit.
    pub fn fetch_package(&mut self, project: &str, package: &str) -> Result<Option<GitOid>> {
        self.load_history(project, package)?;
        let key = (project.to_string(), package.to_string());

        let chain: Vec<usize> = {
            let history = &self.histories[&key];
            let mut chain = Vec::new();
            let mut cursor = if history.revisions.is_empty() {
                None
            } else {
                Some(0usize)
            };
            let mut steps = 0usize;
            while let Some(idx) = cursor {
                let rev = &history.revisions[idx];
                if rev.commit.is_some() {
                    break;
                }
                let within_depth = self.options.depth.map_or(true, |d| steps < d);
                if !within_depth && !rev.must_fetch {
                    break;
                }
                chain.push(idx);
                cursor = rev.parent;
                steps += 1;
            }
            chain
        };

        for &idx in chain.iter().rev() {
            self.emit_revision(project, package, idx)?;
        }

        let tip = self.histories[&key].revisions.first().and_then(|r| r.commit);
        if let Some(tip) = &tip {
            let name = refs::tracking_ref(&self.host, project, package);
            refs::write_ref(self.repo, &name, tip)?;
        }
        Ok(tip)
    }

    /// Materialize the commit for one known revision, together with
    /// any older revisions it needs. Ignores the depth limit: callers
    /// ask for this revision because a link depends on it.
    pub(crate) fn ensure_commit_at(
        &mut self,
        project: &str,
        package: &str,
        idx: usize,
    ) -> Result<GitOid> {
        let key = (project.to_string(), package.to_string());
        let chain: Vec<usize> = {
            let history = &self.histories[&key];
            let mut chain = Vec::new();
            let mut cursor = Some(idx);
            while let Some(i) = cursor {
                let rev = &history.revisions[i];
                if rev.commit.is_some() {
                    break;
                }
                chain.push(i);
                cursor = rev.parent;
            }
            chain
        };
        for &i in chain.iter().rev() {
            self.emit_revision(project, package, i)?;
        }
        self.histories[&key].revisions[idx].commit.ok_or_else(|| {
            SyncError::BadLink {
                detail: format!(
                    "revision {} of {project}/{package} could not be materialized",
                    self.histories[&key].revisions[idx].rev
                ),
            }
        })
    }

    /// Translate one revision into a commit.
    fn emit_revision(&mut self, project: &str, package: &str, idx: usize) -> Result<GitOid> {
        let key = (project.to_string(), package.to_string());
        let rev = self.histories[&key].revisions[idx].clone();
        if let Some(commit) = rev.commit {
            return Ok(commit);
        }

        let (status, base) = self.resolve_base_status(project, package, &rev)?;
        let first_parent = rev
            .parent
            .and_then(|p| self.histories[&key].revisions[p].commit);

        let mut parents = Vec::new();
        if let Some(parent) = first_parent {
            parents.push(parent);
        }
        if let (Some(base), Some(link)) = (&base, status.link.clone()) {
            let (tproj, tpkg) = link_target(&link, project, package);
            let base_commit = self.base_commit(&tproj, &tpkg, base)?;
            // the merge parent is redundant once the ordinary parent
            // chain already contains the base
            let covered = match &first_parent {
                Some(parent) => self.repo.is_ancestor(&base_commit, parent)?,
                None => false,
            };
            if !covered {
                parents.push(base_commit);
            }
        }

        let fetch_rev = status.srcmd5.to_hex();
        let tree = self.derive_tree(project, package, &fetch_rev, &status.files)?;
        let ident = self.user_ident(&rev.user)?;
        let sig = Signature::utc(ident.name, ident.email, rev.time);
        let commit = self
            .repo
            .commit_tree(&tree, &parents, &sig, &sig, &rev.comment)?;

        self.cache
            .put_oid(&self.revision_key(project, package, &rev.rev), &commit)?;
        if self.histories[&key].by_srcmd5.get(&rev.srcmd5) == Some(&idx) {
            self.cache
                .put_oid(&self.revision_key(project, package, &rev.srcmd5.to_hex()), &commit)?;
        }
        if let Some(history) = self.histories.get_mut(&key) {
            history.revisions[idx].commit = Some(commit);
        }
        tracing::info!("imported {project}/{package} rev {} as {commit}", rev.rev);
        Ok(commit)
    }

    /// The listing a revision's tree is built from.
    ///
    /// First choice is the server-expanded listing against the link
    /// base; a 404 degrades to the unexpanded listing. When the link
    /// metadata does not name its base revision, the base is guessed
    /// and the expanded listing retried once against the guess.
    fn resolve_base_status(
        &mut self,
        project: &str,
        package: &str,
        rev: &Revision,
    ) -> Result<(PackageStatus, Option<Md5>)> {
        let expanded_opts = StatusOptions {
            rev: Some(rev.rev.clone()),
            linkrev: Some("base".to_string()),
            expand: true,
            emptylink: false,
        };
        let mut expanded = true;
        let mut status = match self.service.list_dir(project, package, &expanded_opts) {
            Ok(status) => status,
            Err(ApiError::NotFound { .. }) => {
                expanded = false;
                self.service
                    .list_dir(project, package, &StatusOptions::at(rev.rev.clone()))?
            }
            Err(err) => return Err(err.into()),
        };

        let Some(link) = status.link.clone() else {
            return Ok((status, None));
        };
        let base = self.resolve_baserev(project, package, &link, &rev.rev, rev.time)?;

        if let (Some(base), false) = (&base, expanded) {
            let retry = StatusOptions {
                rev: Some(rev.rev.clone()),
                linkrev: Some(base.to_hex()),
                expand: true,
                emptylink: false,
            };
            match self.service.list_dir(project, package, &retry) {
                Ok(expanded_status) => status = expanded_status,
                Err(ApiError::NotFound { .. }) => {
                    tracing::warn!(
                        "cannot expand {project}/{package} rev {} against base {base}; \
                         using unexpanded sources",
                        rev.rev
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok((status, base))
    }

    /// Determine the link base revision (by srcmd5) for a revision.
    ///
    /// Preference: the link's explicit `baserev`; the target history
    /// entry named by the link's `rev`; finally a walk down the target
    /// history to the first revision not newer than the linking one,
    /// which is only a guess and says so once on stderr.
    pub(crate) fn resolve_baserev(
        &mut self,
        project: &str,
        package: &str,
        link: &LinkInfo,
        rev_label: &str,
        rev_time: i64,
    ) -> Result<Option<Md5>> {
        let (tproj, tpkg) = link_target(link, project, package);

        if let Some(baserev) = &link.baserev {
            if let Ok(md5) = Md5::from_hex(baserev) {
                return Ok(Some(md5));
            }
        }

        self.load_history(&tproj, &tpkg)?;
        let target_key = (tproj.clone(), tpkg.clone());
        let target = &self.histories[&target_key];

        // a numeric baserev, or the link's rev, names a target revision
        for named in [link.baserev.as_ref(), link.rev.as_ref()].into_iter().flatten() {
            if let Some(&idx) = target.by_rev.get(named) {
                return Ok(Some(target.revisions[idx].srcmd5));
            }
        }

        // walk the target history from its tip to the first revision
        // not newer than the linking one
        let candidate = target
            .revisions
            .iter()
            .find(|r| r.time <= rev_time)
            .map(|r| (r.rev.clone(), r.srcmd5));
        match candidate {
            Some((rev, srcmd5)) => {
                let warn_key = (
                    project.to_string(),
                    package.to_string(),
                    rev_label.to_string(),
                );
                if self.guess_warned.insert(warn_key) {
                    tracing::warn!(
                        "no base revision recorded for {project}/{package} rev {rev_label}; \
                         guessing {tproj}/{tpkg} rev {rev} ({srcmd5}) from timestamps"
                    );
                }
                Ok(Some(srcmd5))
            }
            None => Ok(None),
        }
    }

    /// The package's latest listing, expanded when it is a link.
    pub(crate) fn tip_status(&mut self, project: &str, package: &str) -> Result<PackageStatus> {
        let opts = StatusOptions {
            rev: None,
            linkrev: Some("base".to_string()),
            expand: true,
            emptylink: false,
        };
        match self.service.list_dir(project, package, &opts) {
            Ok(status) => Ok(status),
            Err(ApiError::NotFound { .. }) => Ok(self
                .service
                .list_dir(project, package, &StatusOptions::default())?),
            Err(err) => Err(err.into()),
        }
    }

    /// Link base of the package's current remote tip: the base srcmd5
    /// and its commit. `None` for packages that are not links. The
    /// pusher uses this to tell merge parents apart.
    pub(crate) fn uptodate_info(
        &mut self,
        project: &str,
        package: &str,
    ) -> Result<Option<(Md5, GitOid)>> {
        let key = (project.to_string(), package.to_string());
        if let Some(info) = self.uptodate.get(&key) {
            return Ok(info.clone());
        }

        let status = self.tip_status(project, package)?;
        let info = match status.link {
            None => None,
            Some(link) => {
                self.load_history(project, package)?;
                let tip = self.histories[&key].revisions.first().cloned();
                let (rev_label, rev_time) = match &tip {
                    Some(rev) => (rev.rev.clone(), rev.time),
                    None => ("latest".to_string(), i64::MAX),
                };
                match self.resolve_baserev(project, package, &link, &rev_label, rev_time)? {
                    None => None,
                    Some(base) => {
                        let (tproj, tpkg) = link_target(&link, project, package);
                        let commit = self.base_commit(&tproj, &tpkg, &base)?;
                        Some((base, commit))
                    }
                }
            }
        };
        self.uptodate.insert(key, info.clone());
        Ok(info)
    }

    /// Warn when the package's link no longer points at the target's
    /// newest revision. Run after a successful push.
    pub fn verify_link(&mut self, project: &str, package: &str) -> Result<()> {
        let status = self.tip_status(project, package)?;
        let Some(link) = status.link else {
            return Ok(());
        };
        let (tproj, tpkg) = link_target(&link, project, package);
        let target_tip = self
            .service
            .list_dir(&tproj, &tpkg, &StatusOptions::default())?;
        let base = link
            .baserev
            .as_deref()
            .and_then(|b| Md5::from_hex(b).ok())
            .or(link.srcmd5);
        if let Some(base) = base {
            if base != target_tip.srcmd5 {
                tracing::warn!(
                    "link of {project}/{package} is based on {tproj}/{tpkg} revision {base}, \
                     which is no longer the newest ({})",
                    target_tip.srcmd5
                );
            }
        }
        Ok(())
    }
}
