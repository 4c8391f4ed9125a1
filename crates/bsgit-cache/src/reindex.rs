use bsgit_git::GitRepo;
use bsgit_hash::{compute_srcmd5, GitOid, Md5, Md5Hasher};

use crate::error::CacheError;
use crate::keys;
use crate::store::BsCache;
use crate::Result;

impl BsCache {
    /// Index every object reachable from `commit`.
    ///
    /// Walks commit → tree → blobs, recomputing each blob's MD5 and
    /// each tree's srcmd5, and stores the corresponding `blob` and
    /// `tree` entries. Parent commits are walked as well; commits
    /// whose `commit <oid>` sentinel is already present are skipped,
    /// which makes re-runs cheap. Used to rebuild a deleted cache and
    /// to pick up commits created behind bsgit's back.
    pub fn reindex(&self, repo: &GitRepo, commit: &GitOid) -> Result<()> {
        let mut pending = vec![*commit];
        while let Some(oid) = pending.pop() {
            if self.contains(&keys::commit(&oid))? {
                continue;
            }
            tracing::info!("caching commit {oid}");
            let info = repo.read_commit(&oid)?;
            self.index_tree(repo, &oid, &info.tree)?;
            pending.extend(info.parents);
            self.put_oid(&keys::commit(&oid), &info.tree)?;
        }
        Ok(())
    }

    /// Index a commit's tree: one `blob` entry per file, then the
    /// `tree` entry under the listing's srcmd5.
    fn index_tree(&self, repo: &GitRepo, commit: &GitOid, tree: &GitOid) -> Result<()> {
        let mut files: Vec<(String, Md5)> = Vec::new();
        for entry in repo.ls_tree(&tree.to_hex())? {
            match entry.kind.as_str() {
                "blob" => {
                    if entry.mode == "120000" {
                        return Err(CacheError::CorruptCommit {
                            commit: *commit,
                            detail: format!("symbolic link '{}' not supported", entry.name),
                        });
                    }
                    let md5 = self.index_blob(repo, &entry.oid)?;
                    files.push((entry.name, md5));
                }
                "tree" => {
                    return Err(CacheError::CorruptCommit {
                        commit: *commit,
                        detail: format!("subdirectory '{}' not supported", entry.name),
                    });
                }
                other => {
                    return Err(CacheError::CorruptCommit {
                        commit: *commit,
                        detail: format!("unexpected {} object '{}'", other, entry.name),
                    });
                }
            }
        }
        let srcmd5 = compute_srcmd5(files.iter().map(|(n, m)| (n.as_str(), *m)));
        self.put_oid(&keys::tree(&srcmd5), tree)?;
        Ok(())
    }

    /// Recompute a blob's MD5 by streaming its bytes, and record it.
    fn index_blob(&self, repo: &GitRepo, blob: &GitOid) -> Result<Md5> {
        let mut hasher = Md5Hasher::new();
        repo.stream_blob(blob, |chunk| hasher.update(chunk))?;
        let md5 = hasher.finalize();
        self.put_oid(&keys::blob(&md5), blob)?;
        Ok(md5)
    }
}
