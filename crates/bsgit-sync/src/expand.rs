//! The link expander.
//!
//! A link's base is named by srcmd5. Usually that hash is an ordinary
//! revision of the target package and the history builder covers it.
//! When the target is itself a link, the hash names an *expanded*
//! revision that exists in no history; it is materialized here as a
//! synthetic two-parent commit: the link carrier's own revision on one
//! side, the base of the target's link on the other.

use bsgit_api::StatusOptions;
use bsgit_cache::keys;
use bsgit_git::Signature;
use bsgit_hash::{GitOid, Md5};

use crate::context::Fetcher;
use crate::error::SyncError;
use crate::history::link_target;
use crate::Result;

impl Fetcher<'_> {
    /// Commit corresponding to a target srcmd5.
    pub(crate) fn base_commit(
        &mut self,
        project: &str,
        package: &str,
        srcmd5: &Md5,
    ) -> Result<GitOid> {
        if let Some(commit) = self.cached_revision(project, package, &srcmd5.to_hex())? {
            return Ok(commit);
        }

        self.load_history(project, package)?;
        let key = (project.to_string(), package.to_string());
        if let Some(&idx) = self.histories[&key].by_srcmd5.get(srcmd5) {
            return self.ensure_commit_at(project, package, idx);
        }

        self.expand_link(project, package, srcmd5)
    }

    /// Materialize an expanded revision that no history lists.
    fn expand_link(&mut self, project: &str, package: &str, srcmd5: &Md5) -> Result<GitOid> {
        tracing::info!("expanding link revision {srcmd5} of {project}/{package}");
        let opts = StatusOptions {
            rev: Some(srcmd5.to_hex()),
            linkrev: None,
            expand: true,
            emptylink: false,
        };
        let status = self.service.list_dir(project, package, &opts)?;
        let link = status.link.clone().ok_or_else(|| SyncError::BadLink {
            detail: format!("expanded revision {srcmd5} of {project}/{package} has no link info"),
        })?;
        let lsrcmd5 = link.lsrcmd5.ok_or_else(|| SyncError::BadLink {
            detail: format!("link at {project}/{package} rev {srcmd5} lacks lsrcmd5"),
        })?;
        let base_srcmd5 = link.srcmd5.ok_or_else(|| SyncError::BadLink {
            detail: format!("link at {project}/{package} rev {srcmd5} lacks a target srcmd5"),
        })?;
        let (tproj, tpkg) = link_target(&link, project, package);

        let parent_commit = self.base_commit(project, package, &lsrcmd5)?;
        let base_commit = self.base_commit(&tproj, &tpkg, &base_srcmd5)?;

        // the synthetic revision borrows identity and time from the
        // revision carrying the link
        let key = (project.to_string(), package.to_string());
        let carrier = self.histories[&key].by_srcmd5.get(&lsrcmd5).copied();
        let (parent_label, sig) = match carrier {
            Some(idx) => {
                let rev = self.histories[&key].revisions[idx].clone();
                let ident = self.user_ident(&rev.user)?;
                (rev.rev, Signature::utc(ident.name, ident.email, rev.time))
            }
            None => {
                let info = self.repo.read_commit(&parent_commit)?;
                (lsrcmd5.to_hex(), info.committer)
            }
        };
        let comment = format!("Expanded {}({})", package, parent_label);

        let fetch_rev = status.srcmd5.to_hex();
        let tree = self.derive_tree(project, package, &fetch_rev, &status.files)?;
        let commit =
            self.repo
                .commit_tree(&tree, &[parent_commit, base_commit], &sig, &sig, &comment)?;

        self.cache
            .put_oid(&self.revision_key(project, package, &srcmd5.to_hex()), &commit)?;
        self.cache.put_oid(&keys::commit(&commit), &tree)?;

        // make the link package's ordinary history available as well
        self.fetch_package(project, package)?;
        Ok(commit)
    }
}
